//! barwave widgets - bar waveform rendering for canvas-like surfaces
//!
//! Turns a peak series and a style into bar geometry, caches that geometry
//! across frames, and draws it through a narrow [`DrawingSurface`] trait.
//! The [`Waveform`] facade drives rendering from a frame scheduler and
//! handles click-to-seek and resize input.
//!
//! ## Architecture
//!
//! ```text
//! Waveform ──> GeometryCache ──> RenderEngine ──> DrawingSurface
//!    ^                                                 |
//!    └── InputCoordinator <── SurfaceHost <────────────┘
//! ```
//!
//! Headless hosts render into a [`DisplayList`]; the iced integration
//! replays that list onto a canvas frame ([`waveform_canvas`]).

pub mod waveform;

pub use waveform::*;

pub use barwave_core::scheduler::{FrameScheduler, ManualScheduler, TimerScheduler};
pub use barwave_core::{
    Color, EventKind, Position, ProgressLinePatch, ProgressLineStyle, StyleConfig, StylePatch,
    WaveformError, WaveformEvent,
};
