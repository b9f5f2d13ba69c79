//! Run-wide statistics shared by every device.

use device_simulator::StatsSink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// A report is logged every time a counter reaches a multiple of this.
pub const REPORT_RATE: u64 = 100;

/// Lock-free counters with periodic progress reports.
#[derive(Debug)]
pub struct RunnerStats {
    connected: AtomicU64,
    completed: AtomicU64,
    sent: AtomicU64,
    errors: AtomicU64,
    started: Instant,
    /// Milliseconds since `started` at the previous sent report
    window_start_ms: AtomicU64,
}

impl Default for RunnerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunnerStats {
    pub fn new() -> Self {
        Self {
            connected: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            started: Instant::now(),
            window_start_ms: AtomicU64::new(0),
        }
    }

    pub fn connected(&self) -> u64 {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Time since the stats were created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Log the end-of-run summary.
    pub fn log_summary(&self) {
        let errors = self.errors();
        if errors != 0 {
            info!(errors, "Errors sending telemetry == {errors}");
        } else {
            info!("No errors sending telemetry");
        }
        info!(
            sent = self.sent(),
            elapsed_ms = self.elapsed().as_millis() as u64,
            "Telemetry generation ended after {}ms",
            self.elapsed().as_millis()
        );
    }

    /// Messages per second over the window since the previous report.
    fn window_rate(&self) -> f64 {
        let now_ms = self.started.elapsed().as_millis() as u64;
        let window_start = self.window_start_ms.swap(now_ms, Ordering::Relaxed);
        let elapsed_ms = now_ms.saturating_sub(window_start).max(1);
        REPORT_RATE as f64 / elapsed_ms as f64 * 1000.0
    }
}

fn is_report(value: u64) -> bool {
    value % REPORT_RATE == 0
}

impl StatsSink for RunnerStats {
    fn increment_connected(&self) {
        let value = self.connected.fetch_add(1, Ordering::Relaxed) + 1;
        if is_report(value) {
            info!("{value} devices connected");
        }
    }

    fn increment_completed(&self) {
        let value = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        if is_report(value) {
            info!("{value} devices have completed sending messages");
        }
    }

    fn increment_sent(&self) {
        let value = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        if is_report(value) {
            let rate = self.window_rate();
            info!("{value} total messages have been sent @ {rate:.2} msgs/sec");
        }
    }

    fn increment_error(&self) {
        let value = self.errors.fetch_add(1, Ordering::Relaxed) + 1;
        if is_report(value) {
            info!("{value} errors sending telemetry");
        }
    }
}
