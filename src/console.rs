//! Console transport: one line per message on stdout.
//!
//! Line format is `device_id[key]: payload (k=v, ...)`, with the key and
//! property list left out when absent.

use async_trait::async_trait;
use device_simulator::{Transport, TransportFactory};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// A message printed by the console transport.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsoleMessage {
    pub payload: Vec<u8>,
    pub properties: Vec<(String, String)>,
    pub key: Option<String>,
}

impl ConsoleMessage {
    fn line(&self, device_id: &str) -> String {
        let mut line = String::with_capacity(device_id.len() + self.payload.len() + 4);
        line.push_str(device_id);
        if let Some(key) = &self.key {
            line.push('[');
            line.push_str(key);
            line.push(']');
        }
        line.push_str(": ");
        line.push_str(&String::from_utf8_lossy(&self.payload));
        if !self.properties.is_empty() {
            let properties: Vec<String> = self
                .properties
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            line.push_str(" (");
            line.push_str(&properties.join(", "));
            line.push(')');
        }
        line
    }
}

/// Creates console transports sharing one writer.
#[derive(Clone)]
pub struct ConsoleFactory {
    writer: SharedWriter,
}

impl ConsoleFactory {
    /// Factory writing to stdout.
    pub fn stdout() -> Self {
        Self::with_writer(std::io::stdout())
    }

    /// Factory writing to any sink.
    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }
}

impl TransportFactory for ConsoleFactory {
    type Transport = ConsoleTransport;
    type Error = std::convert::Infallible;

    fn create(&self, device_id: &str) -> Result<Self::Transport, Self::Error> {
        Ok(ConsoleTransport {
            device_id: device_id.to_string(),
            writer: Arc::clone(&self.writer),
        })
    }
}

/// Console transport for one device.
pub struct ConsoleTransport {
    device_id: String,
    writer: SharedWriter,
}

#[async_trait]
impl Transport for ConsoleTransport {
    type Message = ConsoleMessage;
    type Error = std::io::Error;

    async fn open(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn build_message(&self, payload: Vec<u8>) -> Self::Message {
        ConsoleMessage {
            payload,
            ..Default::default()
        }
    }

    fn set_property(&self, message: &mut Self::Message, key: &str, value: &str) {
        message.properties.push((key.to_string(), value.to_string()));
    }

    fn set_partition_key(&self, message: &mut Self::Message, key: &str) {
        message.key = Some(key.to_string());
    }

    async fn send(
        &self,
        message: &Self::Message,
        _cancel: &CancellationToken,
    ) -> Result<(), Self::Error> {
        let line = message.line(&self.device_id);
        let writer = Arc::clone(&self.writer);
        // Stdout writes block, keep them off the runtime workers
        tokio::task::spawn_blocking(move || {
            let mut writer = writer
                .lock()
                .map_err(|_| std::io::Error::other("console writer lock poisoned"))?;
            writeln!(writer, "{line}")?;
            writer.flush()
        })
        .await
        .map_err(std::io::Error::other)?
    }

    fn is_transient(&self, _error: &Self::Error) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_writes_one_line_per_message() {
        let buffer = Buffer::default();
        let factory = ConsoleFactory::with_writer(buffer.clone());
        let transport = factory.create("sim000001").unwrap();
        let cancel = CancellationToken::new();

        let plain = transport.build_message(br#"{"c": 1}"#.to_vec());
        transport.send(&plain, &cancel).await.unwrap();

        let mut enriched = transport.build_message(b"42".to_vec());
        transport.set_property(&mut enriched, "a", "b");
        transport.set_property(&mut enriched, "c", "d");
        transport.set_partition_key(&mut enriched, "pk");
        transport.send(&enriched, &cancel).await.unwrap();

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(
            output,
            "sim000001: {\"c\": 1}\nsim000001[pk]: 42 (a=b, c=d)\n"
        );
    }

    struct ThreadRecorder(Arc<Mutex<Vec<std::thread::ThreadId>>>);

    impl Write for ThreadRecorder {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().push(std::thread::current().id());
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_writes_happen_off_the_runtime_thread() {
        let threads = Arc::new(Mutex::new(Vec::new()));
        let factory = ConsoleFactory::with_writer(ThreadRecorder(Arc::clone(&threads)));
        let transport = factory.create("sim000001").unwrap();

        let message = transport.build_message(b"1".to_vec());
        transport
            .send(&message, &CancellationToken::new())
            .await
            .unwrap();

        let runtime_thread = std::thread::current().id();
        let threads = threads.lock().unwrap();
        assert!(!threads.is_empty());
        assert!(threads.iter().all(|id| *id != runtime_thread));
    }

    #[test]
    fn test_errors_are_never_transient() {
        let factory = ConsoleFactory::with_writer(Buffer::default());
        let transport = factory.create("sim000001").unwrap();
        assert!(!transport.is_transient(&std::io::Error::other("boom")));
    }
}
