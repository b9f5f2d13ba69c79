//! Shared fixtures for device-simulator integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use device_simulator::{StatsSink, Transport, TransportFactory};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use telemetry_core::{VariableDefinition, VariableSet};
use telemetry_generator::{CompiledTemplate, VariableGenerator};
use telemetry_payload::PayloadDefinition;
use tokio_util::sync::CancellationToken;

/// How a scripted transport answers `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    FailTransient,
    FailPermanent,
    /// Every send takes the given time before succeeding
    Delay(Duration),
    /// The first `n` sends take the given time, later ones are instant
    SlowFor(u64, Duration),
    /// The first `n` sends fail transiently, later ones succeed
    FailThenSucceed(u64),
}

#[derive(Debug, thiserror::Error)]
#[error("scripted failure (transient: {transient})")]
pub struct ScriptedError {
    pub transient: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestMessage {
    pub payload: Vec<u8>,
    pub properties: HashMap<String, String>,
    pub key: Option<String>,
}

impl TestMessage {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Record of every delivered message, keyed by device id.
pub type SentLog = Arc<Mutex<Vec<(String, TestMessage)>>>;

pub struct ScriptedTransport {
    device_id: String,
    behavior: Behavior,
    fail_open: bool,
    attempts: Arc<AtomicU64>,
    attempted: Arc<Mutex<Vec<String>>>,
    sent: SentLog,
}

impl ScriptedTransport {
    fn deliver(&self, message: &TestMessage) -> Result<(), ScriptedError> {
        self.sent
            .lock()
            .unwrap()
            .push((self.device_id.clone(), message.clone()));
        Ok(())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    type Message = TestMessage;
    type Error = ScriptedError;

    async fn open(&mut self) -> Result<(), Self::Error> {
        if self.fail_open {
            return Err(ScriptedError { transient: false });
        }
        Ok(())
    }

    fn build_message(&self, payload: Vec<u8>) -> Self::Message {
        TestMessage {
            payload,
            ..Default::default()
        }
    }

    fn set_property(&self, message: &mut Self::Message, key: &str, value: &str) {
        message.properties.insert(key.to_string(), value.to_string());
    }

    fn set_partition_key(&self, message: &mut Self::Message, key: &str) {
        message.key = Some(key.to_string());
    }

    async fn send(
        &self,
        message: &Self::Message,
        _cancel: &CancellationToken,
    ) -> Result<(), Self::Error> {
        let previous = self.attempts.fetch_add(1, Ordering::SeqCst);
        self.attempted.lock().unwrap().push(message.text());
        match self.behavior {
            Behavior::Succeed => self.deliver(message),
            Behavior::FailTransient => Err(ScriptedError { transient: true }),
            Behavior::FailPermanent => Err(ScriptedError { transient: false }),
            Behavior::Delay(cost) => {
                tokio::time::sleep(cost).await;
                self.deliver(message)
            }
            Behavior::SlowFor(n, cost) => {
                if previous < n {
                    tokio::time::sleep(cost).await;
                }
                self.deliver(message)
            }
            Behavior::FailThenSucceed(n) if previous < n => {
                Err(ScriptedError { transient: true })
            }
            Behavior::FailThenSucceed(_) => self.deliver(message),
        }
    }

    fn is_transient(&self, error: &Self::Error) -> bool {
        error.transient
    }
}

#[derive(Clone)]
pub struct ScriptedFactory {
    pub behavior: Behavior,
    pub fail_open: bool,
    pub attempts: Arc<AtomicU64>,
    pub attempted: Arc<Mutex<Vec<String>>>,
    pub sent: SentLog,
}

impl ScriptedFactory {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            fail_open: false,
            attempts: Arc::new(AtomicU64::new(0)),
            attempted: Arc::new(Mutex::new(Vec::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::new(Behavior::Succeed)
        }
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Payload text of every send attempt, in order.
    pub fn attempted_payloads(&self) -> Vec<String> {
        self.attempted.lock().unwrap().clone()
    }

    pub fn messages_for(&self, device_id: &str) -> Vec<TestMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == device_id)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl TransportFactory for ScriptedFactory {
    type Transport = ScriptedTransport;
    type Error = std::convert::Infallible;

    fn create(&self, device_id: &str) -> Result<Self::Transport, Self::Error> {
        Ok(ScriptedTransport {
            device_id: device_id.to_string(),
            behavior: self.behavior,
            fail_open: self.fail_open,
            attempts: Arc::clone(&self.attempts),
            attempted: Arc::clone(&self.attempted),
            sent: Arc::clone(&self.sent),
        })
    }
}

#[derive(Debug, Default)]
pub struct CountingStats {
    pub connected: AtomicU64,
    pub completed: AtomicU64,
    pub sent: AtomicU64,
    pub errors: AtomicU64,
}

impl CountingStats {
    pub fn connected(&self) -> u64 {
        self.connected.load(Ordering::SeqCst)
    }
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::SeqCst)
    }
}

impl StatsSink for CountingStats {
    fn increment_connected(&self) {
        self.connected.fetch_add(1, Ordering::SeqCst);
    }
    fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn increment_sent(&self) {
        self.sent.fetch_add(1, Ordering::SeqCst);
    }
    fn increment_error(&self) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

/// Generator over the given JSON variable definitions.
pub fn generator(variables_json: &str) -> Arc<VariableGenerator> {
    let defs = VariableDefinition::list_from_json(variables_json).unwrap();
    Arc::new(VariableGenerator::new(VariableSet::new(&defs).unwrap()))
}

/// Compile a template against a generator's names.
pub fn template(generator: &VariableGenerator, text: &str) -> CompiledTemplate {
    CompiledTemplate::compile(text, generator.known_names()).unwrap()
}

/// Templated payload definition.
pub fn templated(weight: u32, generator: &Arc<VariableGenerator>, text: &str) -> PayloadDefinition {
    PayloadDefinition::templated(
        weight,
        Arc::new(template(generator, text)),
        Arc::clone(generator),
    )
    .unwrap()
}
