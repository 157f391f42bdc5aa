//! barwave core - style, peak and scheduling primitives for bar waveforms
//!
//! Host-independent building blocks shared by the rendering pipeline in
//! `barwave-widgets`:
//!
//! - **types**: colors, points, rectangles, anchors, stroke styles
//! - **style**: complete style configuration and its partial patch form
//! - **peaks**: peak extraction and normalization
//! - **events**: typed notification registry
//! - **scheduler**: frame/timer scheduling traits and a virtual-clock scheduler
//! - **config**: YAML configuration files
//! - **error**: the error taxonomy every waveform reports through

pub mod config;
pub mod error;
pub mod events;
pub mod peaks;
pub mod scheduler;
pub mod style;
pub mod types;

pub use error::{Result, SurfaceError, WaveformError};
pub use events::{EventKind, EventRegistry, SubscriptionId, WaveformEvent};
pub use style::{ProgressLinePatch, ProgressLineStyle, StyleConfig, StylePatch};
pub use types::*;
