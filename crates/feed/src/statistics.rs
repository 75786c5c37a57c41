use std::sync::Mutex;

use tracing::debug;

/// Running totals of recorded durations
#[derive(Debug, Default)]
struct Totals {
    sum: f64,
    count: u64,
}

impl Totals {
    fn average(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        (self.sum / self.count as f64) as f32
    }
}

/// Running statistics about block import durations
#[derive(Debug, Default)]
pub struct ImportStatistics {
    totals: Mutex<Totals>,
}

impl ImportStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record how long a block import took and return the new average (seconds)
    pub fn add_block_import_duration(&self, seconds: f32) -> f32 {
        let mut totals = self.totals.lock().unwrap_or_else(|e| e.into_inner());
        totals.sum += f64::from(seconds);
        totals.count += 1;
        let average = totals.average();
        debug!(seconds, average, count = totals.count, "Recorded block import duration");
        average
    }

    /// Average import duration in seconds, 0 when nothing was recorded
    pub fn average_block_import_duration(&self) -> f32 {
        self.totals
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .average()
    }

    /// Forget every recorded duration
    pub fn clear(&self) {
        *self.totals.lock().unwrap_or_else(|e| e.into_inner()) = Totals::default();
    }
}
