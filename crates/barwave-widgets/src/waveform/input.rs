//! Pointer and resize input for a hosted waveform
//!
//! [`InputCoordinator`] turns clicks and taps into normalized seek positions
//! and collapses bursts of resize notifications into a single measured size.
//! It is the one place where errors are absorbed: every measurement and
//! every user callback runs behind a boundary that catches both `Err`
//! results and panics and hands them to the error callback.

use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::time::Duration;

use barwave_core::scheduler::{TimerScheduler, TimerToken};
use barwave_core::{Result, WaveformError};

use super::host::SurfaceHost;

/// Called with the normalized seek position (0.0 to 1.0)
pub type SeekCallback = Rc<dyn Fn(f32) -> Result<()>>;

/// Called with the settled logical size
pub type ResizeCallback = Rc<dyn Fn(f32, f32) -> Result<()>>;

/// Receives every error caught at the input boundary
pub type ErrorCallback = Rc<dyn Fn(WaveformError)>;

/// Default resize debounce window
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Click,
    Touch,
}

/// A click or tap in client coordinates
#[derive(Debug)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub client_x: f32,
    pub client_y: f32,
    default_prevented: Cell<bool>,
}

impl PointerEvent {
    pub fn click(client_x: f32, client_y: f32) -> Self {
        Self::new(PointerKind::Click, client_x, client_y)
    }

    pub fn touch(client_x: f32, client_y: f32) -> Self {
        Self::new(PointerKind::Touch, client_x, client_y)
    }

    fn new(kind: PointerKind, client_x: f32, client_y: f32) -> Self {
        Self {
            kind,
            client_x,
            client_y,
            default_prevented: Cell::new(false),
        }
    }

    /// Mark the event as consumed so the host skips its default handling
    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

/// Map a client x coordinate to a progress value in `[0, 1]`
///
/// A zero-width (or non-finite) element maps every position to 0.
pub fn seek_progress(client_x: f32, left: f32, width: f32) -> f32 {
    if width <= 0.0 || !width.is_finite() {
        return 0.0;
    }
    let progress = (client_x - left) / width;
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

/// Routes pointer and resize input from a host to waveform callbacks
///
/// Cloning yields another handle to the same coordinator.
#[derive(Clone)]
pub struct InputCoordinator {
    inner: Rc<Inner>,
}

struct Inner {
    host: Rc<dyn SurfaceHost>,
    timers: Rc<dyn TimerScheduler>,
    debounce: Duration,
    on_seek: SeekCallback,
    on_resize: ResizeCallback,
    on_error: ErrorCallback,
    attached: Cell<bool>,
    pending_resize: RefCell<Option<TimerToken>>,
}

impl InputCoordinator {
    pub fn new(
        host: Rc<dyn SurfaceHost>,
        timers: Rc<dyn TimerScheduler>,
        debounce: Duration,
        on_seek: SeekCallback,
        on_resize: ResizeCallback,
        on_error: ErrorCallback,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                host,
                timers,
                debounce,
                on_seek,
                on_resize,
                on_error,
                attached: Cell::new(true),
                pending_resize: RefCell::new(None),
            }),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attached.get()
    }

    /// Whether a debounced resize report is waiting to fire
    pub fn has_pending_resize(&self) -> bool {
        self.inner.pending_resize.borrow().is_some()
    }

    /// Handle a click or tap on the host element
    pub fn handle_pointer(&self, event: &PointerEvent) {
        if !self.is_attached() {
            return;
        }
        event.prevent_default();

        let inner = &self.inner;
        inner.guard(|| {
            let rect = inner.host.client_rect()?;
            let progress = seek_progress(event.client_x, rect.x, rect.width);
            (inner.on_seek)(progress)
        });
    }

    /// Note that the host element may have changed size
    ///
    /// The size is measured and reported once the debounce window passes
    /// without another notification.
    pub fn notify_resize(&self) {
        if !self.is_attached() {
            return;
        }

        if let Some(token) = self.inner.pending_resize.borrow_mut().take() {
            self.inner.timers.clear_timeout(token);
        }

        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        let token = self.inner.timers.set_timeout(
            self.inner.debounce,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.pending_resize.borrow_mut().take();
                    inner.report_size();
                }
            }),
        );
        *self.inner.pending_resize.borrow_mut() = Some(token);
    }

    /// Detach from the host and cancel the pending resize report
    ///
    /// Safe to call more than once.
    pub fn teardown(&self) {
        if !self.inner.attached.replace(false) {
            return;
        }
        if let Some(token) = self.inner.pending_resize.borrow_mut().take() {
            self.inner.timers.clear_timeout(token);
        }
        log::debug!("Input coordinator detached");
    }
}

impl Inner {
    fn report_size(&self) {
        if !self.attached.get() {
            return;
        }
        self.guard(|| {
            let rect = self.host.client_rect()?;
            (self.on_resize)(rect.width, rect.height)
        });
    }

    /// Run `f`, routing errors and panics to the error callback
    fn guard(&self, f: impl FnOnce() -> Result<()>) {
        let error = match catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err,
            Err(payload) => WaveformError::from_panic(payload),
        };
        log::warn!("Input handling failed: {}", error);
        (self.on_error)(error);
    }
}

impl std::fmt::Debug for InputCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputCoordinator")
            .field("attached", &self.is_attached())
            .field("debounce", &self.inner.debounce)
            .field("pending_resize", &self.has_pending_resize())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::host::RetainedHost;
    use barwave_core::scheduler::ManualScheduler;
    use barwave_core::Rect;

    struct Harness {
        host: Rc<RetainedHost>,
        scheduler: Rc<ManualScheduler>,
        seeks: Rc<RefCell<Vec<f32>>>,
        sizes: Rc<RefCell<Vec<(f32, f32)>>>,
        errors: Rc<RefCell<Vec<WaveformError>>>,
        input: InputCoordinator,
    }

    fn harness_with(on_seek: Option<SeekCallback>) -> Harness {
        let host = RetainedHost::new(800.0, 100.0).shared();
        host.set_client_rect(Rect::new(100.0, 0.0, 800.0, 100.0));
        let scheduler = ManualScheduler::shared();
        let seeks = Rc::new(RefCell::new(Vec::new()));
        let sizes = Rc::new(RefCell::new(Vec::new()));
        let errors = Rc::new(RefCell::new(Vec::new()));

        let on_seek = on_seek.unwrap_or_else(|| {
            let seeks = Rc::clone(&seeks);
            let callback: SeekCallback = Rc::new(move |p| {
                seeks.borrow_mut().push(p);
                Ok(())
            });
            callback
        });
        let s = Rc::clone(&sizes);
        let e = Rc::clone(&errors);
        let input = InputCoordinator::new(
            host.clone(),
            scheduler.clone(),
            RESIZE_DEBOUNCE,
            on_seek,
            Rc::new(move |w, h| {
                s.borrow_mut().push((w, h));
                Ok(())
            }),
            Rc::new(move |err| e.borrow_mut().push(err)),
        );

        Harness {
            host,
            scheduler,
            seeks,
            sizes,
            errors,
            input,
        }
    }

    fn harness() -> Harness {
        harness_with(None)
    }

    #[test]
    fn test_seek_progress_mapping() {
        assert_eq!(seek_progress(500.0, 100.0, 800.0), 0.5);
        assert_eq!(seek_progress(100.0, 100.0, 800.0), 0.0);
        assert_eq!(seek_progress(1000.0, 100.0, 800.0), 1.0);
        assert_eq!(seek_progress(0.0, 100.0, 800.0), 0.0);
    }

    #[test]
    fn test_seek_progress_zero_width() {
        assert_eq!(seek_progress(500.0, 100.0, 0.0), 0.0);
        assert_eq!(seek_progress(500.0, 100.0, f32::NAN), 0.0);
    }

    #[test]
    fn test_click_reports_seek_and_prevents_default() {
        let h = harness();
        let event = PointerEvent::click(500.0, 10.0);
        h.input.handle_pointer(&event);

        assert!(event.default_prevented());
        assert_eq!(*h.seeks.borrow(), vec![0.5]);

        h.input.handle_pointer(&PointerEvent::touch(1000.0, 10.0));
        assert_eq!(*h.seeks.borrow(), vec![0.5, 1.0]);
    }

    #[test]
    fn test_resize_debounce_collapses_burst() {
        let h = harness();

        h.input.notify_resize();
        h.scheduler.advance(Duration::from_millis(50));
        h.host.set_client_rect(Rect::new(100.0, 0.0, 600.0, 80.0));
        h.input.notify_resize();
        h.scheduler.advance(Duration::from_millis(50));
        h.host.set_client_rect(Rect::new(100.0, 0.0, 400.0, 60.0));
        h.input.notify_resize();

        h.scheduler.advance(Duration::from_millis(149));
        assert!(h.sizes.borrow().is_empty());

        h.scheduler.advance(Duration::from_millis(1));
        assert_eq!(*h.sizes.borrow(), vec![(400.0, 60.0)]);
        assert!(!h.input.has_pending_resize());
    }

    #[test]
    fn test_size_measured_at_end_of_window() {
        let h = harness();
        h.input.notify_resize();
        h.host.set_client_rect(Rect::new(0.0, 0.0, 320.0, 40.0));
        h.scheduler.advance(RESIZE_DEBOUNCE);
        assert_eq!(*h.sizes.borrow(), vec![(320.0, 40.0)]);
    }

    #[test]
    fn test_callback_panic_routed_to_error_callback() {
        let h = harness_with(Some(Rc::new(|_| panic!("seek exploded"))));
        h.input.handle_pointer(&PointerEvent::click(500.0, 0.0));

        assert_eq!(
            *h.errors.borrow(),
            vec![WaveformError::Callback("seek exploded".into())]
        );
        // Pipeline keeps working
        h.input.notify_resize();
        h.scheduler.advance(RESIZE_DEBOUNCE);
        assert_eq!(h.sizes.borrow().len(), 1);
    }

    #[test]
    fn test_callback_error_routed_to_error_callback() {
        let h = harness_with(Some(Rc::new(|_| {
            Err(WaveformError::Callback("rejected".into()))
        })));
        h.input.handle_pointer(&PointerEvent::click(500.0, 0.0));
        assert_eq!(
            *h.errors.borrow(),
            vec![WaveformError::Callback("rejected".into())]
        );
    }

    #[test]
    fn test_measurement_error_routed() {
        let h = harness();
        h.host.set_client_rect(Rect::new(0.0, 0.0, f32::INFINITY, 10.0));
        h.input.handle_pointer(&PointerEvent::click(5.0, 0.0));

        assert!(h.seeks.borrow().is_empty());
        assert!(matches!(h.errors.borrow()[0], WaveformError::InvalidHost(_)));
    }

    #[test]
    fn test_teardown_idempotent_and_cancels_resize() {
        let h = harness();
        h.input.notify_resize();
        assert_eq!(h.scheduler.pending_timers(), 1);

        h.input.teardown();
        h.input.teardown();
        assert!(!h.input.is_attached());
        assert_eq!(h.scheduler.pending_timers(), 0);

        h.scheduler.advance(Duration::from_secs(1));
        h.input.handle_pointer(&PointerEvent::click(500.0, 0.0));
        h.input.notify_resize();

        assert!(h.sizes.borrow().is_empty());
        assert!(h.seeks.borrow().is_empty());
        assert_eq!(h.scheduler.pending_timers(), 0);
    }
}
