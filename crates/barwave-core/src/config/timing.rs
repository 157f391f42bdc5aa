//! Render loop and input timing configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing parameters for the render loop and input handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Minimum time between two completed renders
    /// A frame arriving sooner is re-queued, not dropped.
    /// Default: 16 ms (~60 fps ceiling)
    pub min_frame_interval_ms: u64,

    /// Quiet period before a burst of resize notifications is reported
    /// Default: 150 ms
    pub resize_debounce_ms: u64,

    /// Progress changes smaller than this are ignored
    /// Default: 0.001
    pub progress_epsilon: f32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_frame_interval_ms: 16,
            resize_debounce_ms: 150,
            progress_epsilon: 0.001,
        }
    }
}

impl TimingConfig {
    pub fn min_frame_interval(&self) -> Duration {
        Duration::from_millis(self.min_frame_interval_ms)
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let timing = TimingConfig::default();
        assert_eq!(timing.min_frame_interval(), Duration::from_millis(16));
        assert_eq!(timing.resize_debounce(), Duration::from_millis(150));
        assert_eq!(timing.progress_epsilon, 0.001);
    }
}
