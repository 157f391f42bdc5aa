//! Configuration for barwave hosts
//!
//! This module provides:
//!
//! - Generic YAML config loading/saving
//! - Default config file locations
//! - Timing configuration (frame throttle, resize debounce, progress epsilon)
//! - [`WaveformConfig`], the on-disk bundle of timing and style overrides
//!
//! # Usage
//!
//! ```ignore
//! use barwave_core::config::{default_config_path, load_config, WaveformConfig};
//!
//! let config: WaveformConfig = load_config(&default_config_path("waveform.yaml"));
//! ```

mod io;
mod paths;
mod timing;

pub use io::{load_config, read_config, save_config};
pub use paths::{default_config_dir, default_config_path};
pub use timing::TimingConfig;

use serde::{Deserialize, Serialize};

use crate::style::StylePatch;

/// Everything a host can configure from a file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    pub timing: TimingConfig,
    /// Style overrides applied over the built-in defaults
    pub style: StylePatch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position;

    #[test]
    fn test_waveform_config_partial_yaml() {
        let yaml = "timing:\n  resize_debounce_ms: 300\nstyle:\n  position: top\n";
        let config: WaveformConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.timing.resize_debounce_ms, 300);
        assert_eq!(config.timing.min_frame_interval_ms, 16);
        assert_eq!(config.style.position, Some(Position::Top));
        assert_eq!(config.style.bar_width, None);
    }
}
