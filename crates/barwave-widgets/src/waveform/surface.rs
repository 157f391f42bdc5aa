//! Drawing surface abstraction
//!
//! [`DrawingSurface`] is the narrow 2D-context interface the render engine
//! draws through: rects, rounded rects, lines, clip, fill and stroke, plus
//! whole compiled paths. Every primitive returns a `Result` so backend
//! failures surface at the render call site.
//!
//! [`DisplayList`] is the retained implementation: it records the calls as
//! [`DrawCommand`]s, which a GUI backend replays (see the iced canvas
//! integration) and tests inspect.

use std::cell::RefCell;
use std::rc::Rc;

use barwave_core::{Color, Point, Rect, StrokeStyle, SurfaceError};

use super::geometry::BarPath;

pub type SurfaceResult = Result<(), SurfaceError>;

/// Surface shared between a host and the waveform that renders into it
pub type SharedSurface = Rc<RefCell<dyn DrawingSurface>>;

/// 2D drawing context used by the render engine
///
/// Coordinates are logical pixels; implementations apply the scale set by
/// [`set_size`](Self::set_size).
pub trait DrawingSurface {
    /// Backing store size in device pixels
    fn size(&self) -> (u32, u32);

    /// Resize the backing store and set the logical-to-device scale
    fn set_size(&mut self, width: u32, height: u32, scale: f32) -> SurfaceResult;

    /// Whether [`round_rect`](Self::round_rect) is available
    fn supports_round_rect(&self) -> bool;

    /// Called once before every render pass
    ///
    /// Retained surfaces drop the previous picture here; immediate-mode
    /// surfaces have nothing to do.
    fn begin_frame(&mut self) -> SurfaceResult {
        Ok(())
    }

    fn set_smoothing(&mut self, enabled: bool) -> SurfaceResult;

    fn clear_rect(&mut self, rect: Rect) -> SurfaceResult;

    /// Push the clip state
    fn save(&mut self) -> SurfaceResult;

    /// Pop the clip state pushed by the matching [`save`](Self::save)
    fn restore(&mut self) -> SurfaceResult;

    /// Start a new current path
    fn begin_path(&mut self) -> SurfaceResult;

    fn rect(&mut self, rect: Rect) -> SurfaceResult;

    fn round_rect(&mut self, rect: Rect, radius: f32) -> SurfaceResult;

    fn move_to(&mut self, point: Point) -> SurfaceResult;

    fn line_to(&mut self, point: Point) -> SurfaceResult;

    /// Intersect the clip region with the current path
    fn clip(&mut self) -> SurfaceResult;

    /// Fill the current path
    fn fill(&mut self, color: Color) -> SurfaceResult;

    /// Stroke the current path
    fn stroke(&mut self, style: &StrokeStyle) -> SurfaceResult;

    /// Fill a compiled path in one call
    fn fill_path(&mut self, path: &Rc<BarPath>, color: Color) -> SurfaceResult;

    /// Stroke a compiled path in one call
    fn stroke_path(&mut self, path: &Rc<BarPath>, style: &StrokeStyle) -> SurfaceResult;
}

// =============================================================================
// Display list
// =============================================================================

/// One recorded surface call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    SetSmoothing(bool),
    ClearRect(Rect),
    Save,
    Restore,
    BeginPath,
    Rect(Rect),
    RoundRect { rect: Rect, radius: f32 },
    MoveTo(Point),
    LineTo(Point),
    Clip,
    Fill(Color),
    Stroke(StrokeStyle),
    FillPath { path: Rc<BarPath>, color: Color },
    StrokePath { path: Rc<BarPath>, style: StrokeStyle },
}

/// Retained-mode surface recording every draw call
///
/// Each render pass starts from an empty list ([`begin_frame`]), and a clear
/// covering the whole logical surface discards everything recorded before
/// it, so the list always describes exactly the current picture. Compiled
/// paths are shared with the geometry cache, not copied.
///
/// [`begin_frame`]: DrawingSurface::begin_frame
#[derive(Debug)]
pub struct DisplayList {
    commands: Vec<DrawCommand>,
    width: u32,
    height: u32,
    scale: f32,
    round_rect: bool,
    smoothing: bool,
    save_depth: usize,
}

impl DisplayList {
    /// Empty list supporting every primitive
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            width: 0,
            height: 0,
            scale: 1.0,
            round_rect: true,
            smoothing: true,
            save_depth: 0,
        }
    }

    /// Toggle rounded-rect support (the capability reported to renderers)
    pub fn with_round_rect_support(mut self, supported: bool) -> Self {
        self.round_rect = supported;
        self
    }

    /// Wrap into the shared form hosts hand to a waveform
    pub fn into_shared(self) -> Rc<RefCell<DisplayList>> {
        Rc::new(RefCell::new(self))
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Copy of the current picture, for backends that replay off-thread or
    /// outside the borrow
    pub fn snapshot(&self) -> Vec<DrawCommand> {
        self.commands.clone()
    }

    /// Number of recorded commands matching `predicate`
    pub fn count(&self, predicate: impl Fn(&DrawCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(c)).count()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn smoothing(&self) -> bool {
        self.smoothing
    }

    /// Logical surface size
    pub fn logical_size(&self) -> (f32, f32) {
        (self.width as f32 / self.scale, self.height as f32 / self.scale)
    }

    fn record(&mut self, command: DrawCommand) -> SurfaceResult {
        self.commands.push(command);
        Ok(())
    }
}

impl Default for DisplayList {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawingSurface for DisplayList {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_size(&mut self, width: u32, height: u32, scale: f32) -> SurfaceResult {
        self.width = width;
        self.height = height;
        self.scale = if scale > 0.0 { scale } else { 1.0 };
        // Resizing a canvas resets its contents and state
        self.commands.clear();
        self.save_depth = 0;
        Ok(())
    }

    fn supports_round_rect(&self) -> bool {
        self.round_rect
    }

    fn begin_frame(&mut self) -> SurfaceResult {
        self.commands.clear();
        self.save_depth = 0;
        Ok(())
    }

    fn set_smoothing(&mut self, enabled: bool) -> SurfaceResult {
        self.smoothing = enabled;
        self.record(DrawCommand::SetSmoothing(enabled))
    }

    fn clear_rect(&mut self, rect: Rect) -> SurfaceResult {
        let (width, height) = self.logical_size();
        if rect.x <= 0.0 && rect.y <= 0.0 && rect.right() >= width && rect.bottom() >= height {
            self.commands.clear();
            self.save_depth = 0;
        }
        self.record(DrawCommand::ClearRect(rect))
    }

    fn save(&mut self) -> SurfaceResult {
        self.save_depth += 1;
        self.record(DrawCommand::Save)
    }

    fn restore(&mut self) -> SurfaceResult {
        if self.save_depth == 0 {
            return Err(SurfaceError::UnbalancedRestore);
        }
        self.save_depth -= 1;
        self.record(DrawCommand::Restore)
    }

    fn begin_path(&mut self) -> SurfaceResult {
        self.record(DrawCommand::BeginPath)
    }

    fn rect(&mut self, rect: Rect) -> SurfaceResult {
        self.record(DrawCommand::Rect(rect))
    }

    fn round_rect(&mut self, rect: Rect, radius: f32) -> SurfaceResult {
        if !self.round_rect {
            return Err(SurfaceError::Unsupported("round_rect"));
        }
        self.record(DrawCommand::RoundRect { rect, radius })
    }

    fn move_to(&mut self, point: Point) -> SurfaceResult {
        self.record(DrawCommand::MoveTo(point))
    }

    fn line_to(&mut self, point: Point) -> SurfaceResult {
        self.record(DrawCommand::LineTo(point))
    }

    fn clip(&mut self) -> SurfaceResult {
        self.record(DrawCommand::Clip)
    }

    fn fill(&mut self, color: Color) -> SurfaceResult {
        self.record(DrawCommand::Fill(color))
    }

    fn stroke(&mut self, style: &StrokeStyle) -> SurfaceResult {
        self.record(DrawCommand::Stroke(style.clone()))
    }

    fn fill_path(&mut self, path: &Rc<BarPath>, color: Color) -> SurfaceResult {
        if path.is_rounded() && !self.round_rect {
            return Err(SurfaceError::Unsupported("round_rect"));
        }
        self.record(DrawCommand::FillPath {
            path: Rc::clone(path),
            color,
        })
    }

    fn stroke_path(&mut self, path: &Rc<BarPath>, style: &StrokeStyle) -> SurfaceResult {
        if path.is_rounded() && !self.round_rect {
            return Err(SurfaceError::Unsupported("round_rect"));
        }
        self.record(DrawCommand::StrokePath {
            path: Rc::clone(path),
            style: style.clone(),
        })
    }
}
