//! Surface hosts
//!
//! A host is the element a waveform lives in: it owns the drawing surface,
//! knows its on-screen rectangle and reports the device pixel ratio.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use barwave_core::{Rect, Result, WaveformError};

use super::surface::{DisplayList, DrawCommand, SharedSurface};

/// Element hosting a drawing surface
pub trait SurfaceHost {
    /// The 2D surface to draw into; `None` when no context can be acquired
    fn surface(&self) -> Option<SharedSurface>;

    /// Current on-screen rectangle in logical pixels
    fn client_rect(&self) -> Result<Rect>;

    /// Physical pixels per logical pixel
    fn device_pixel_ratio(&self) -> f32 {
        1.0
    }
}

/// Host backed by a [`DisplayList`]
///
/// Used headlessly and as the bridge to the iced canvas: the canvas program
/// reports its bounds through [`set_client_rect`](Self::set_client_rect) and
/// replays [`snapshot`](Self::snapshot) every draw.
#[derive(Debug)]
pub struct RetainedHost {
    list: Rc<RefCell<DisplayList>>,
    rect: Cell<Rect>,
    ratio: Cell<f32>,
}

impl RetainedHost {
    pub fn new(width: f32, height: f32) -> Self {
        Self::with_display_list(DisplayList::new(), Rect::from_size(width, height))
    }

    pub fn with_display_list(list: DisplayList, rect: Rect) -> Self {
        Self {
            list: list.into_shared(),
            rect: Cell::new(rect),
            ratio: Cell::new(1.0),
        }
    }

    pub fn with_device_pixel_ratio(self, ratio: f32) -> Self {
        self.ratio.set(ratio);
        self
    }

    /// Shared handle, the form a waveform builder takes
    pub fn shared(self) -> Rc<Self> {
        Rc::new(self)
    }

    /// Update the on-screen rectangle; returns true when the size changed
    pub fn set_client_rect(&self, rect: Rect) -> bool {
        let previous = self.rect.replace(rect);
        previous.width != rect.width || previous.height != rect.height
    }

    pub fn set_device_pixel_ratio(&self, ratio: f32) {
        self.ratio.set(ratio);
    }

    pub fn display_list(&self) -> Rc<RefCell<DisplayList>> {
        Rc::clone(&self.list)
    }

    /// Copy of the current picture
    pub fn snapshot(&self) -> Vec<DrawCommand> {
        self.list.borrow().snapshot()
    }
}

impl SurfaceHost for RetainedHost {
    fn surface(&self) -> Option<SharedSurface> {
        let surface: SharedSurface = self.list.clone();
        Some(surface)
    }

    fn client_rect(&self) -> Result<Rect> {
        let rect = self.rect.get();
        if !(rect.width.is_finite() && rect.height.is_finite()) {
            return Err(WaveformError::InvalidHost(format!(
                "non-finite client size {}x{}",
                rect.width, rect.height
            )));
        }
        Ok(rect)
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.ratio.get()
    }
}
