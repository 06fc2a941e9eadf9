//! Phase timing.

use std::time::Instant;
use tracing::info;

/// Measures one phase (packing, linking, flashing).
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start: Instant::now(),
        }
    }

    /// Log the elapsed time.
    pub fn finish(self) {
        let secs = self.start.elapsed().as_secs_f64();
        if secs >= 60.0 {
            info!(phase = %self.name, "done in {:.1}m", secs / 60.0);
        } else {
            info!(phase = %self.name, "done in {:.2}s", secs);
        }
    }
}
