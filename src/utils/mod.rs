use std::time::{Duration, Instant};
use tracing::info;

/// Logs when a phase starts and, on drop, how long it ran.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("⏱  {}…", label);
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!("⏱  {} done in {:.2?}", self.label, self.elapsed());
    }
}
