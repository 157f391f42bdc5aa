//! Bar waveform rendering pipeline
//!
//! - [`geometry`]: bar layout and its cache
//! - [`surface`]: the drawing surface trait and the retained display list
//! - [`render`]: the render engine, hooks and custom renderers
//! - [`host`]: surface hosts
//! - [`input`]: click-to-seek and debounced resize
//! - [`orchestrator`]: the [`Waveform`] facade and its render loop
//! - [`canvas`] / [`view`]: iced integration

pub mod canvas;
pub mod geometry;
pub mod host;
pub mod input;
pub mod orchestrator;
pub mod render;
pub mod surface;
pub mod view;

pub use canvas::{replay, WaveformCanvas};
pub use geometry::{BarGeometry, BarPath, GeometryCache, GeometryEntry, PathShape, PeakFingerprint};
pub use host::{RetainedHost, SurfaceHost};
pub use input::{seek_progress, InputCoordinator, PointerEvent, PointerKind, RESIZE_DEBOUNCE};
pub use orchestrator::{DirtyFlags, Waveform, WaveformBuilder};
pub use render::{CustomRenderer, HookContext, RenderEngine, RenderHook, RenderHooks};
pub use surface::{DisplayList, DrawCommand, DrawingSurface, SharedSurface, SurfaceResult};
pub use view::waveform_canvas;
