//! Waveform facade: owns the pipeline and drives the render loop
//!
//! A [`Waveform`] ties together a [`SurfaceHost`], the [`GeometryCache`],
//! the [`RenderEngine`] and an [`InputCoordinator`], and exposes the public
//! mutators. Mutators only record state and request a frame; the frame
//! callback does the actual rendering. Several mutations between two frames
//! land in one render.
//!
//! Lifecycle: constructing, then ready (after the first frame tick), then
//! destroyed. Destroyed is terminal and every mutator becomes a no-op.
//!
//! # Usage
//!
//! ```ignore
//! let scheduler = ManualScheduler::shared();
//! let host = RetainedHost::new(800.0, 128.0).shared();
//!
//! let waveform = Waveform::builder()
//!     .host(host.clone())
//!     .peaks(&peaks)
//!     .scheduler(scheduler.clone())
//!     .on(EventKind::Seek, |event| println!("{:?}", event))
//!     .build()?;
//!
//! waveform.set_progress(0.25);
//! scheduler.step(Duration::from_millis(16));
//! ```
//!
//! # Re-entrancy
//!
//! No internal borrow is held while listeners, hooks or custom renderers
//! run, so any of them may call back into the waveform. Surface resizes
//! requested while a render is drawing are applied at the start of the next
//! render.

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::time::Instant;

use barwave_core::config::TimingConfig;
use barwave_core::peaks::prepare_peaks;
use barwave_core::scheduler::{FrameScheduler, FrameToken, TimerScheduler};
use barwave_core::style::clamp_progress;
use barwave_core::{
    EventKind, EventRegistry, ProgressLinePatch, Result, StyleConfig, StylePatch, SubscriptionId,
    WaveformError, WaveformEvent,
};

use super::geometry::{GeometryCache, GeometryEntry, PeakFingerprint};
use super::host::SurfaceHost;
use super::input::{ErrorCallback, InputCoordinator, PointerEvent, ResizeCallback, SeekCallback};
use super::render::{CustomRenderer, RenderEngine, RenderHooks};
use super::surface::SharedSurface;

/// What changed since the last successful render
///
/// Diagnostic only: whether a render rebuilds geometry is decided by the
/// cache fingerprints, not by these flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyFlags {
    pub peaks: bool,
    pub style: bool,
    pub size: bool,
    pub progress: bool,
}

impl DirtyFlags {
    pub fn any(&self) -> bool {
        self.peaks || self.style || self.size || self.progress
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Constructing,
    Ready,
    Destroyed,
}

struct State {
    lifecycle: Lifecycle,
    peaks: Rc<[f32]>,
    style: StyleConfig,
    pixel_ratio: f32,
    cache: GeometryCache,
    engine: RenderEngine,
    dirty: DirtyFlags,
    pending_frame: Option<FrameToken>,
    last_render: Option<Instant>,
    /// Logical size waiting to be applied because the surface was busy
    deferred_size: Option<(f32, f32)>,
}

struct Shared {
    state: RefCell<State>,
    events: EventRegistry,
    host: Rc<dyn SurfaceHost>,
    surface: SharedSurface,
    frames: Rc<dyn FrameScheduler>,
    timing: TimingConfig,
    input: InputCoordinator,
}

// =============================================================================
// Builder
// =============================================================================

/// Configures and constructs a [`Waveform`]
pub struct WaveformBuilder {
    host: Option<Rc<dyn SurfaceHost>>,
    peaks: Option<Vec<f32>>,
    style: StylePatch,
    timing: TimingConfig,
    frames: Option<Rc<dyn FrameScheduler>>,
    timers: Option<Rc<dyn TimerScheduler>>,
    fingerprint: PeakFingerprint,
    events: EventRegistry,
}

impl Default for WaveformBuilder {
    fn default() -> Self {
        Self {
            host: None,
            peaks: None,
            style: StylePatch::default(),
            timing: TimingConfig::default(),
            frames: None,
            timers: None,
            fingerprint: PeakFingerprint::default(),
            events: EventRegistry::new(),
        }
    }
}

impl WaveformBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: Rc<dyn SurfaceHost>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn peaks(mut self, peaks: &[f32]) -> Self {
        self.peaks = Some(peaks.to_vec());
        self
    }

    /// Style overrides merged over the defaults
    pub fn style(mut self, patch: StylePatch) -> Self {
        self.style = patch;
        self
    }

    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Use one scheduler for both frames and timers
    pub fn scheduler<S>(mut self, scheduler: Rc<S>) -> Self
    where
        S: FrameScheduler + TimerScheduler + 'static,
    {
        self.frames = Some(scheduler.clone());
        self.timers = Some(scheduler);
        self
    }

    pub fn frame_scheduler(mut self, frames: Rc<dyn FrameScheduler>) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn timer_scheduler(mut self, timers: Rc<dyn TimerScheduler>) -> Self {
        self.timers = Some(timers);
        self
    }

    /// Peak fingerprint strategy for the geometry cache
    pub fn peak_fingerprint(mut self, fingerprint: PeakFingerprint) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// Register a listener before construction
    ///
    /// Error listeners registered here also receive construction failures.
    pub fn on(self, kind: EventKind, listener: impl Fn(&WaveformEvent) + 'static) -> Self {
        self.events.subscribe(kind, listener);
        self
    }

    pub fn once(self, kind: EventKind, listener: impl Fn(&WaveformEvent) + 'static) -> Self {
        self.events.once(kind, listener);
        self
    }

    /// Validate inputs, size the surface and schedule the first render
    ///
    /// Fails on a missing host, empty peaks, an unavailable drawing context,
    /// a host that cannot be measured or a missing frame or timer scheduler.
    /// Failures are also emitted to the pre-registered error listeners.
    pub fn build(self) -> Result<Waveform> {
        let WaveformBuilder {
            host,
            peaks,
            style,
            timing,
            frames,
            timers,
            fingerprint,
            events,
        } = self;

        let prepared = host
            .ok_or(WaveformError::MissingHost)
            .and_then(|host| {
                let peaks = prepare_peaks(peaks.as_deref().unwrap_or_default())?;
                let surface = host.surface().ok_or(WaveformError::ContextUnavailable)?;
                let rect = host.client_rect()?;
                let schedulers = frames.zip(timers).ok_or(WaveformError::MissingScheduler)?;
                Ok((host, peaks, surface, rect, schedulers))
            });

        let (host, peaks, surface, rect, (frames, timers)) = match prepared {
            Ok(parts) => parts,
            Err(err) => return Err(construction_failed(&events, err)),
        };

        let style = StyleConfig::from_patch(Some(&style));
        let debounce = timing.resize_debounce();

        let shared = Rc::new_cyclic(|weak: &Weak<Shared>| {
            let on_seek: SeekCallback = {
                let weak = weak.clone();
                Rc::new(move |progress: f32| {
                    if let Some(shared) = weak.upgrade() {
                        Waveform { shared }.emit(WaveformEvent::Seek(progress));
                    }
                    Ok(())
                })
            };
            let on_resize: ResizeCallback = {
                let weak = weak.clone();
                Rc::new(move |width: f32, height: f32| match weak.upgrade() {
                    Some(shared) => Waveform { shared }.apply_resize(width, height),
                    None => Ok(()),
                })
            };
            let on_error: ErrorCallback = {
                let weak = weak.clone();
                Rc::new(move |err: WaveformError| {
                    if let Some(shared) = weak.upgrade() {
                        Waveform { shared }.report(err);
                    }
                })
            };

            Shared {
                state: RefCell::new(State {
                    lifecycle: Lifecycle::Constructing,
                    peaks: peaks.into(),
                    style,
                    pixel_ratio: 1.0,
                    cache: GeometryCache::with_fingerprint(fingerprint),
                    engine: RenderEngine::new(),
                    dirty: DirtyFlags {
                        peaks: true,
                        style: true,
                        size: true,
                        progress: true,
                    },
                    pending_frame: None,
                    last_render: None,
                    deferred_size: None,
                }),
                events,
                host: Rc::clone(&host),
                surface,
                frames,
                timing,
                input: InputCoordinator::new(host, timers, debounce, on_seek, on_resize, on_error),
            }
        });

        let waveform = Waveform { shared };
        if let Err(err) = waveform.setup_surface(rect.width, rect.height) {
            waveform.shared.input.teardown();
            return Err(construction_failed(&waveform.shared.events, err));
        }

        log::info!(
            "Waveform created: {} peaks, {}x{} @ {}x",
            waveform.peaks().len(),
            rect.width,
            rect.height,
            waveform.pixel_ratio()
        );

        waveform.schedule_render();
        Ok(waveform)
    }
}

fn construction_failed(events: &EventRegistry, err: WaveformError) -> WaveformError {
    log::warn!("Waveform construction failed: {}", err);
    events.emit(WaveformEvent::Error(err.clone()));
    err
}

/// `max(host ratio, minimum)`, with unusable values replaced by 1
fn effective_pixel_ratio(host_ratio: f32, min_ratio: f32) -> f32 {
    let ratio = host_ratio.max(min_ratio);
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    }
}

fn to_device_pixels(logical: f32, ratio: f32) -> u32 {
    let px = (logical * ratio).round();
    if px.is_finite() && px > 0.0 {
        px as u32
    } else {
        0
    }
}

// =============================================================================
// Waveform
// =============================================================================

/// Handle to an interactive bar waveform
///
/// Cloning yields another handle to the same instance.
#[derive(Clone)]
pub struct Waveform {
    shared: Rc<Shared>,
}

impl Waveform {
    pub fn builder() -> WaveformBuilder {
        WaveformBuilder::new()
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn progress(&self) -> f32 {
        self.shared.state.borrow().style.progress
    }

    pub fn style(&self) -> StyleConfig {
        self.shared.state.borrow().style.clone()
    }

    /// Normalized peak series
    pub fn peaks(&self) -> Rc<[f32]> {
        Rc::clone(&self.shared.state.borrow().peaks)
    }

    pub fn dirty_flags(&self) -> DirtyFlags {
        self.shared.state.borrow().dirty
    }

    /// Effective device pixel ratio
    pub fn pixel_ratio(&self) -> f32 {
        self.shared.state.borrow().pixel_ratio
    }

    /// Geometry of the most recent render, if any
    pub fn geometry(&self) -> Option<Rc<GeometryEntry>> {
        self.shared.state.borrow().cache.entry().cloned()
    }

    /// Whether the first frame tick has completed
    pub fn is_ready(&self) -> bool {
        self.shared.state.borrow().lifecycle == Lifecycle::Ready
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.state.borrow().lifecycle == Lifecycle::Destroyed
    }

    pub fn has_pending_frame(&self) -> bool {
        self.shared.state.borrow().pending_frame.is_some()
    }

    // -------------------------------------------------------------------------
    // Events and input
    // -------------------------------------------------------------------------

    pub fn on(&self, kind: EventKind, listener: impl Fn(&WaveformEvent) + 'static) -> SubscriptionId {
        self.shared.events.subscribe(kind, listener)
    }

    pub fn once(&self, kind: EventKind, listener: impl Fn(&WaveformEvent) + 'static) -> SubscriptionId {
        self.shared.events.once(kind, listener)
    }

    pub fn off(&self, id: SubscriptionId) -> bool {
        self.shared.events.unsubscribe(id)
    }

    /// Forward a click or tap from the host element
    pub fn handle_pointer(&self, event: &PointerEvent) {
        self.shared.input.handle_pointer(event);
    }

    /// Tell the waveform its host element may have changed size
    pub fn notify_resize(&self) {
        self.shared.input.notify_resize();
    }

    // -------------------------------------------------------------------------
    // Mutators
    // -------------------------------------------------------------------------

    /// Merge a partial style over the current one
    pub fn set_style(&self, patch: StylePatch) {
        if self.is_destroyed() {
            return;
        }

        let ratio_changed = {
            let mut state = self.shared.state.borrow_mut();
            let next = state.style.merged(&patch);
            if state.style.layout_differs(&next) {
                state.cache.clear();
                state.dirty.style = true;
            } else {
                state.dirty.progress = true;
            }
            let ratio_changed = next.min_pixel_ratio != state.style.min_pixel_ratio;
            state.style = next;
            ratio_changed
        };

        if ratio_changed {
            let resized = self
                .shared
                .host
                .client_rect()
                .and_then(|rect| self.setup_surface(rect.width, rect.height));
            if let Err(err) = resized {
                self.report(err);
            }
        }

        self.schedule_render();
    }

    /// Replace the peak series
    ///
    /// Empty input is rejected through the error channel and the current
    /// peaks are kept.
    pub fn set_peaks(&self, peaks: &[f32]) {
        if self.is_destroyed() {
            return;
        }

        let peaks = match prepare_peaks(peaks) {
            Ok(peaks) => peaks,
            Err(err) => {
                self.report(err);
                return;
            }
        };

        {
            let mut state = self.shared.state.borrow_mut();
            state.peaks = peaks.into();
            state.cache.clear();
            state.dirty.peaks = true;
        }
        self.schedule_render();
    }

    /// Move the progress indicator
    ///
    /// Values are clamped to 0.0..=1.0 (NaN passes through); changes smaller
    /// than the configured epsilon are ignored.
    pub fn set_progress(&self, value: f32) {
        if self.is_destroyed() {
            return;
        }

        let progress = clamp_progress(value);
        {
            let mut state = self.shared.state.borrow_mut();
            if (progress - state.style.progress).abs() < self.shared.timing.progress_epsilon {
                return;
            }
            state.style.progress = progress;
            state.dirty.progress = true;
        }

        self.emit(WaveformEvent::ProgressChange(progress));
        self.schedule_render();
    }

    /// Restyle the progress line; `None` removes it
    pub fn set_progress_line_style(&self, patch: Option<ProgressLinePatch>) {
        if self.is_destroyed() {
            return;
        }

        {
            let mut state = self.shared.state.borrow_mut();
            state.style = state.style.merged(&StylePatch {
                progress_line: Some(patch),
                ..Default::default()
            });
            state.dirty.style = true;
        }
        self.schedule_render();
    }

    pub fn set_custom_renderer(&self, renderer: Option<Rc<dyn CustomRenderer>>) {
        if self.is_destroyed() {
            return;
        }

        {
            let mut state = self.shared.state.borrow_mut();
            state.engine.set_custom_renderer(renderer);
            state.dirty.style = true;
        }
        self.schedule_render();
    }

    /// Install hooks; hooks left `None` in `hooks` keep their current value
    pub fn set_render_hooks(&self, hooks: RenderHooks) {
        if self.is_destroyed() {
            return;
        }

        {
            let mut state = self.shared.state.borrow_mut();
            state.engine.set_hooks(hooks);
            state.dirty.style = true;
        }
        self.schedule_render();
    }

    pub fn clear_render_hooks(&self) {
        if self.is_destroyed() {
            return;
        }

        {
            let mut state = self.shared.state.borrow_mut();
            state.engine.clear_hooks();
            state.dirty.style = true;
        }
        self.schedule_render();
    }

    /// Tear down the instance
    ///
    /// Detaches input, cancels the pending frame, drops cached geometry and
    /// emits `destroy` once. Listeners are released afterwards.
    pub fn destroy(&self) {
        let pending = {
            let mut state = self.shared.state.borrow_mut();
            if state.lifecycle == Lifecycle::Destroyed {
                return;
            }
            state.lifecycle = Lifecycle::Destroyed;
            state.cache.clear();
            state.pending_frame.take()
        };

        if let Some(token) = pending {
            self.shared.frames.cancel_frame(token);
        }
        self.shared.input.teardown();

        log::info!("Waveform destroyed");
        self.emit(WaveformEvent::Destroy);
        self.shared.events.clear();
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn emit(&self, event: WaveformEvent) {
        self.shared.events.emit(event);
    }

    /// Single reporting path for every recoverable failure
    fn report(&self, err: WaveformError) {
        log::warn!("Waveform error: {}", err);
        self.emit(WaveformEvent::Error(err));
    }

    /// Size the surface for a logical client size at the effective ratio
    fn setup_surface(&self, width: f32, height: f32) -> Result<()> {
        let ratio = {
            let state = self.shared.state.borrow();
            effective_pixel_ratio(self.shared.host.device_pixel_ratio(), state.style.min_pixel_ratio)
        };
        let (px_width, px_height) = (to_device_pixels(width, ratio), to_device_pixels(height, ratio));

        let applied = match self.shared.surface.try_borrow_mut() {
            Ok(mut surface) => {
                surface.set_size(px_width, px_height, ratio)?;
                true
            }
            Err(_) => false,
        };

        let mut state = self.shared.state.borrow_mut();
        if applied {
            state.pixel_ratio = ratio;
            state.dirty.size = true;
            state.deferred_size = None;
        } else {
            log::debug!("Surface busy, deferring resize to {}x{}", width, height);
            state.deferred_size = Some((width, height));
        }
        Ok(())
    }

    fn apply_resize(&self, width: f32, height: f32) -> Result<()> {
        if self.is_destroyed() {
            return Ok(());
        }
        self.setup_surface(width, height)?;
        self.emit(WaveformEvent::Resize { width, height });
        self.schedule_render();
        Ok(())
    }

    /// Request a frame unless one is already pending
    fn schedule_render(&self) {
        {
            let state = self.shared.state.borrow();
            if state.lifecycle == Lifecycle::Destroyed || state.pending_frame.is_some() {
                return;
            }
        }

        let weak = Rc::downgrade(&self.shared);
        let token = self.shared.frames.request_frame(Box::new(move |now| {
            if let Some(shared) = weak.upgrade() {
                Waveform { shared }.on_frame(now);
            }
        }));
        self.shared.state.borrow_mut().pending_frame = Some(token);
    }

    /// Frame callback: throttle, render, report
    fn on_frame(&self, now: Instant) {
        let too_soon = {
            let mut state = self.shared.state.borrow_mut();
            state.pending_frame = None;
            if state.lifecycle == Lifecycle::Destroyed {
                return;
            }
            let min_interval = self.shared.timing.min_frame_interval();
            state
                .last_render
                .map_or(false, |last| now.saturating_duration_since(last) < min_interval)
        };

        if too_soon {
            log::debug!("Frame arrived early, re-queueing");
            self.schedule_render();
            return;
        }

        self.emit(WaveformEvent::RenderStart);
        if self.is_destroyed() {
            return;
        }

        let outcome = match catch_unwind(AssertUnwindSafe(|| self.render())) {
            Ok(result) => result,
            Err(payload) => Err(WaveformError::from_panic(payload)),
        };

        match outcome {
            Ok(()) => {
                {
                    let mut state = self.shared.state.borrow_mut();
                    state.dirty = DirtyFlags::default();
                    state.last_render = Some(now);
                }
                self.emit(WaveformEvent::RenderComplete);
            }
            Err(err) => {
                log::error!("Render failed: {}", err);
                self.report(err);
            }
        }

        let first_tick = {
            let mut state = self.shared.state.borrow_mut();
            if state.lifecycle == Lifecycle::Constructing {
                state.lifecycle = Lifecycle::Ready;
                true
            } else {
                false
            }
        };
        if first_tick {
            self.emit(WaveformEvent::Ready);
        }
    }

    /// One render pass; internal borrows are released before user code runs
    fn render(&self) -> Result<()> {
        let deferred = self.shared.state.borrow_mut().deferred_size.take();
        if let Some((width, height)) = deferred {
            self.setup_surface(width, height)?;
        }

        let (px_width, px_height, supports_round_rect) = {
            let surface = self.shared.surface.borrow();
            let (w, h) = surface.size();
            (w, h, surface.supports_round_rect())
        };

        let (geometry, path, engine, style) = {
            let mut state = self.shared.state.borrow_mut();
            if state.lifecycle == Lifecycle::Destroyed {
                return Ok(());
            }
            let state = &mut *state;

            let geometry = state
                .cache
                .get(px_width, px_height, state.pixel_ratio, &state.peaks, &state.style);
            let radius = state.style.border_radius;
            let path = (radius <= 0.0 || supports_round_rect)
                .then(|| state.cache.create_static_path(&geometry, radius, supports_round_rect));

            (geometry, path, state.engine.clone(), state.style.clone())
        };

        let mut surface = self.shared.surface.borrow_mut();
        surface.begin_frame()?;
        engine.render(&mut *surface, &geometry, &style, path.as_ref())
    }
}

impl std::fmt::Debug for Waveform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("Waveform")
            .field("lifecycle", &state.lifecycle)
            .field("peaks", &state.peaks.len())
            .field("progress", &state.style.progress)
            .field("pixel_ratio", &state.pixel_ratio)
            .field("dirty", &state.dirty)
            .field("pending_frame", &state.pending_frame.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::geometry::BarPath;
    use barwave_core::scheduler::ManualScheduler;
    use crate::waveform::host::RetainedHost;
    use crate::waveform::render::HookContext;
    use crate::waveform::surface::{DrawCommand, DrawingSurface};
    use barwave_core::{Color, Rect};
    use std::cell::Cell;
    use std::time::Duration;

    const FRAME: Duration = Duration::from_millis(16);

    struct Fixture {
        host: Rc<RetainedHost>,
        scheduler: Rc<ManualScheduler>,
        waveform: Waveform,
        log: Rc<RefCell<Vec<WaveformEvent>>>,
    }

    fn record(log: &Rc<RefCell<Vec<WaveformEvent>>>) -> impl Fn(&WaveformEvent) + 'static {
        let log = Rc::clone(log);
        move |event: &WaveformEvent| log.borrow_mut().push(event.clone())
    }

    fn fixture_with(style: StylePatch) -> Fixture {
        let host = RetainedHost::new(800.0, 100.0).shared();
        let scheduler = ManualScheduler::shared();
        let log = Rc::new(RefCell::new(Vec::new()));

        let mut builder = Waveform::builder()
            .host(host.clone())
            .peaks(&[1000.0, 2000.0, 3000.0, 4000.0])
            .style(style)
            .scheduler(scheduler.clone());
        for kind in [
            EventKind::Ready,
            EventKind::RenderComplete,
            EventKind::ProgressChange,
            EventKind::Seek,
            EventKind::Resize,
            EventKind::Error,
            EventKind::Destroy,
        ] {
            builder = builder.on(kind, record(&log));
        }

        Fixture {
            host,
            scheduler,
            waveform: builder.build().unwrap(),
            log,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(StylePatch::default())
    }

    fn count(log: &Rc<RefCell<Vec<WaveformEvent>>>, kind: EventKind) -> usize {
        log.borrow().iter().filter(|e| e.kind() == kind).count()
    }

    #[test]
    fn test_construction_normalizes_and_sizes_surface() {
        let f = fixture();
        assert_eq!(&*f.waveform.peaks(), &[0.25, 0.5, 0.75, 1.0]);
        assert_eq!(f.host.display_list().borrow().size(), (800, 100));
        assert!(f.waveform.has_pending_frame());
        assert!(!f.waveform.is_ready());
    }

    #[test]
    fn test_pixel_ratio_uses_minimum() {
        let host = RetainedHost::new(400.0, 50.0)
            .with_device_pixel_ratio(1.5)
            .shared();
        let waveform = Waveform::builder()
            .host(host.clone())
            .peaks(&[0.5])
            .style(StylePatch {
                min_pixel_ratio: Some(2.0),
                ..Default::default()
            })
            .scheduler(ManualScheduler::shared())
            .build()
            .unwrap();

        assert_eq!(waveform.pixel_ratio(), 2.0);
        assert_eq!(host.display_list().borrow().size(), (800, 100));
    }

    #[test]
    fn test_construction_errors_reported() {
        let errors = Rc::new(RefCell::new(Vec::new()));
        let err = Waveform::builder()
            .peaks(&[1.0])
            .on(EventKind::Error, record(&errors))
            .build()
            .unwrap_err();
        assert_eq!(err, WaveformError::MissingHost);
        assert_eq!(*errors.borrow(), vec![WaveformEvent::Error(WaveformError::MissingHost)]);

        let err = Waveform::builder()
            .host(RetainedHost::new(10.0, 10.0).shared())
            .peaks(&[])
            .build()
            .unwrap_err();
        assert_eq!(err, WaveformError::EmptyPeaks);
    }

    #[test]
    fn test_context_unavailable() {
        struct Headless;
        impl SurfaceHost for Headless {
            fn surface(&self) -> Option<SharedSurface> {
                None
            }
            fn client_rect(&self) -> Result<Rect> {
                Ok(Rect::from_size(10.0, 10.0))
            }
        }

        let err = Waveform::builder()
            .host(Rc::new(Headless))
            .peaks(&[1.0])
            .build()
            .unwrap_err();
        assert_eq!(err, WaveformError::ContextUnavailable);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_scheduler_fails_construction() {
        let errors = Rc::new(RefCell::new(Vec::new()));
        let err = Waveform::builder()
            .host(RetainedHost::new(100.0, 50.0).shared())
            .peaks(&[0.5])
            .on(EventKind::Error, record(&errors))
            .build()
            .unwrap_err();
        assert_eq!(err, WaveformError::MissingScheduler);
        assert_eq!(*errors.borrow(), vec![WaveformEvent::Error(WaveformError::MissingScheduler)]);

        let err = Waveform::builder()
            .host(RetainedHost::new(100.0, 50.0).shared())
            .peaks(&[0.5])
            .frame_scheduler(ManualScheduler::shared())
            .build()
            .unwrap_err();
        assert_eq!(err, WaveformError::MissingScheduler);
    }

    #[test]
    fn test_wall_clock_ticks_drive_rendering() {
        let f = fixture();
        let start = f.scheduler.now();

        f.scheduler.tick(start + Duration::from_millis(1));
        assert!(f.waveform.is_ready());

        f.waveform.set_progress(0.4);
        f.scheduler.tick(start + Duration::from_millis(9));
        assert_eq!(count(&f.log, EventKind::RenderComplete), 1, "inside the throttle window");

        f.scheduler.tick(start + Duration::from_millis(17));
        assert_eq!(count(&f.log, EventKind::RenderComplete), 2);
        assert!(!f.waveform.has_pending_frame());
    }

    #[test]
    fn test_first_frame_renders_and_emits_ready_once() {
        let f = fixture();
        assert_eq!(f.scheduler.run_frame(), 1);

        assert!(f.waveform.is_ready());
        assert_eq!(count(&f.log, EventKind::Ready), 1);
        assert_eq!(count(&f.log, EventKind::RenderComplete), 1);
        assert!(!f.waveform.dirty_flags().any());
        assert!(f.host.display_list().borrow().count(|c| matches!(c, DrawCommand::FillPath { .. })) >= 1);

        f.waveform.set_progress(0.5);
        f.scheduler.step(FRAME);
        assert_eq!(count(&f.log, EventKind::Ready), 1);
        assert_eq!(count(&f.log, EventKind::RenderComplete), 2);
    }

    #[test]
    fn test_bar_count_through_pipeline() {
        let f = fixture_with(StylePatch {
            border_width: Some(1.0),
            ..Default::default()
        });
        f.waveform.set_peaks(&[0.7]);
        f.scheduler.run_frame();
        assert_eq!(f.waveform.geometry().unwrap().total_bars, 159);
    }

    #[test]
    fn test_progress_clamping() {
        let f = fixture();
        for (input, expected) in [(-5.0, 0.0), (0.0, 0.0), (0.5, 0.5), (1.0, 1.0), (10.0, 1.0)] {
            f.waveform.set_progress(input);
            assert_eq!(f.waveform.progress(), expected, "input {}", input);
        }

        f.waveform.set_progress(f32::NAN);
        assert!(f.waveform.progress().is_nan());
    }

    #[test]
    fn test_progress_epsilon_coalescing() {
        let f = fixture();
        f.waveform.set_progress(0.5);
        f.waveform.set_progress(0.5001);

        assert_eq!(count(&f.log, EventKind::ProgressChange), 1);
        assert_eq!(f.waveform.progress(), 0.5);
    }

    #[test]
    fn test_mutations_coalesce_into_one_frame() {
        let f = fixture();
        f.waveform.set_progress(0.2);
        f.waveform.set_style(StylePatch {
            gap: Some(2.0),
            ..Default::default()
        });
        f.waveform.set_peaks(&[0.1, 0.9]);

        assert_eq!(f.scheduler.pending_frames(), 1);
        f.scheduler.run_frame();
        assert_eq!(count(&f.log, EventKind::RenderComplete), 1);
    }

    #[test]
    fn test_early_frame_requeued_not_dropped() {
        let f = fixture();
        f.scheduler.run_frame();

        f.waveform.set_progress(0.3);
        f.scheduler.advance(Duration::from_millis(5));
        assert_eq!(f.scheduler.run_frame(), 1);
        assert_eq!(count(&f.log, EventKind::RenderComplete), 1, "too soon, no render");
        assert_eq!(f.scheduler.pending_frames(), 1, "re-queued");

        f.scheduler.advance(Duration::from_millis(11));
        f.scheduler.run_frame();
        assert_eq!(count(&f.log, EventKind::RenderComplete), 2);
    }

    #[test]
    fn test_paint_only_style_reuses_geometry() {
        let f = fixture();
        f.scheduler.run_frame();
        let before = f.waveform.geometry().unwrap();

        f.waveform.set_style(StylePatch {
            progress_color: Some(Color::WHITE),
            ..Default::default()
        });
        assert!(f.waveform.dirty_flags().progress);
        assert!(!f.waveform.dirty_flags().style);
        f.scheduler.step(FRAME);
        assert!(Rc::ptr_eq(&before, &f.waveform.geometry().unwrap()));

        f.waveform.set_style(StylePatch {
            bar_width: Some(4.0),
            ..Default::default()
        });
        assert!(f.waveform.dirty_flags().style);
        f.scheduler.step(FRAME);
        assert!(!Rc::ptr_eq(&before, &f.waveform.geometry().unwrap()));
    }

    #[test]
    fn test_set_peaks_empty_is_recoverable() {
        let f = fixture();
        f.waveform.set_peaks(&[]);

        assert_eq!(count(&f.log, EventKind::Error), 1);
        assert_eq!(&*f.waveform.peaks(), &[0.25, 0.5, 0.75, 1.0]);
        assert!(!f.waveform.is_destroyed());

        f.waveform.set_peaks(&[2.0, -4.0]);
        assert_eq!(&*f.waveform.peaks(), &[0.5, -1.0]);
    }

    #[test]
    fn test_progress_line_toggle() {
        let f = fixture();
        f.waveform.set_progress_line_style(None);
        assert!(f.waveform.style().progress_line.is_none());

        f.waveform.set_progress_line_style(Some(ProgressLinePatch {
            width: Some(5.0),
            ..Default::default()
        }));
        let line = f.waveform.style().progress_line.unwrap();
        assert_eq!(line.width, 5.0);
        assert_eq!(line.height_fraction, 1.0);
    }

    #[test]
    fn test_destroy_idempotent() {
        let f = fixture();
        f.waveform.destroy();
        f.waveform.destroy();

        assert_eq!(count(&f.log, EventKind::Destroy), 1);
        assert!(f.waveform.is_destroyed());
        assert_eq!(f.scheduler.pending_frames(), 0);

        f.waveform.set_progress(0.7);
        f.waveform.set_peaks(&[]);
        f.waveform.set_style(StylePatch {
            gap: Some(9.0),
            ..Default::default()
        });
        assert_eq!(f.waveform.progress(), 0.0);
        assert_eq!(f.waveform.style().gap, 1.0);
        assert_eq!(f.scheduler.pending_frames(), 0);
        assert_eq!(count(&f.log, EventKind::Error), 0);
        assert!(f.waveform.geometry().is_none());
    }

    #[test]
    fn test_render_error_keeps_dirty_flags() {
        let f = fixture();
        f.waveform.set_render_hooks(RenderHooks {
            after_background: Some(Rc::new(|_s: &mut dyn DrawingSurface, _c: &HookContext<'_>| {
                Err(WaveformError::Hook("boom".into()))
            })),
            ..Default::default()
        });
        f.scheduler.run_frame();

        assert_eq!(count(&f.log, EventKind::Error), 1);
        assert_eq!(count(&f.log, EventKind::RenderComplete), 0);
        assert!(f.waveform.dirty_flags().any());
        assert_eq!(count(&f.log, EventKind::Ready), 1, "ready follows the first tick");

        f.waveform.clear_render_hooks();
        f.scheduler.step(FRAME);
        assert_eq!(count(&f.log, EventKind::RenderComplete), 1);
        assert!(!f.waveform.dirty_flags().any());
    }

    #[test]
    fn test_render_panic_normalized() {
        let f = fixture();
        f.waveform.set_custom_renderer(Some(Rc::new(
            |_s: &mut dyn DrawingSurface,
             _g: &GeometryEntry,
             _st: &StyleConfig,
             _p: Option<&Rc<BarPath>>|
             -> Result<bool> { std::panic::panic_any(42_u32) },
        )));
        f.scheduler.run_frame();

        let log = f.log.borrow();
        let error = log.iter().find(|e| e.kind() == EventKind::Error).unwrap();
        assert_eq!(*error, WaveformEvent::Error(WaveformError::Unknown));
        assert_eq!(WaveformError::Unknown.to_string(), "An unknown error occurred");
    }

    #[test]
    fn test_handled_custom_renders_do_not_accumulate() {
        let f = fixture();
        f.waveform.set_custom_renderer(Some(Rc::new(
            |surface: &mut dyn DrawingSurface,
             _g: &GeometryEntry,
             _st: &StyleConfig,
             _p: Option<&Rc<BarPath>>|
             -> Result<bool> {
                surface.fill(Color::WHITE)?;
                Ok(true)
            },
        )));
        f.scheduler.run_frame();

        let mut sizes = Vec::new();
        for progress in [0.1, 0.2, 0.3, 0.4, 0.5] {
            f.waveform.set_progress(progress);
            f.scheduler.step(FRAME);
            sizes.push(f.host.display_list().borrow().commands().len());
        }

        assert_eq!(count(&f.log, EventKind::RenderComplete), 6);
        assert!(sizes.iter().all(|&n| n == sizes[0]), "sizes {:?}", sizes);
    }

    #[test]
    fn test_recorded_path_shared_with_cache() {
        let f = fixture();
        f.scheduler.run_frame();

        let geometry = f.waveform.geometry().unwrap();
        let radius = f.waveform.style().border_radius;
        let cached = f
            .waveform
            .shared
            .state
            .borrow_mut()
            .cache
            .create_static_path(&geometry, radius, true);

        let list = f.host.display_list();
        let list = list.borrow();
        let recorded = list
            .commands()
            .iter()
            .find_map(|c| match c {
                DrawCommand::FillPath { path, .. } => Some(Rc::clone(path)),
                _ => None,
            })
            .unwrap();
        assert!(Rc::ptr_eq(&recorded, &cached));
    }

    #[test]
    fn test_listener_may_mutate_during_dispatch() {
        let f = fixture();
        let handle = f.waveform.clone();
        f.waveform.once(EventKind::RenderComplete, move |_| {
            handle.set_progress(0.8);
            handle.set_style(StylePatch {
                min_pixel_ratio: Some(2.0),
                ..Default::default()
            });
        });

        f.scheduler.run_frame();
        assert_eq!(f.waveform.progress(), 0.8);
        assert_eq!(f.waveform.pixel_ratio(), 2.0);
        assert_eq!(f.scheduler.pending_frames(), 1);
    }

    #[test]
    fn test_hook_resize_deferred_until_next_render() {
        let f = fixture();
        let handle = f.waveform.clone();
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        f.waveform.set_render_hooks(RenderHooks {
            after_complete: Some(Rc::new(move |_s: &mut dyn DrawingSurface, _c: &HookContext<'_>| {
                if !flag.replace(true) {
                    handle.set_style(StylePatch {
                        min_pixel_ratio: Some(2.0),
                        ..Default::default()
                    });
                }
                Ok(())
            })),
            ..Default::default()
        });

        f.scheduler.run_frame();
        assert_eq!(f.host.display_list().borrow().size(), (800, 100));
        assert_eq!(count(&f.log, EventKind::Error), 0);

        f.scheduler.step(FRAME);
        assert_eq!(f.host.display_list().borrow().size(), (1600, 200));
        assert_eq!(f.waveform.pixel_ratio(), 2.0);

        // The hook holds a handle to the waveform; destroying breaks the cycle
        f.waveform.destroy();
    }

    #[test]
    fn test_seek_and_debounced_resize() {
        let f = fixture();
        f.host.set_client_rect(Rect::new(100.0, 0.0, 800.0, 100.0));
        f.waveform.handle_pointer(&PointerEvent::click(500.0, 50.0));
        assert_eq!(f.log.borrow().last(), Some(&WaveformEvent::Seek(0.5)));

        f.host.set_client_rect(Rect::new(100.0, 0.0, 600.0, 80.0));
        f.waveform.notify_resize();
        f.waveform.notify_resize();
        f.waveform.notify_resize();
        f.scheduler.advance(Duration::from_millis(150));

        assert_eq!(count(&f.log, EventKind::Resize), 1);
        assert!(f
            .log
            .borrow()
            .contains(&WaveformEvent::Resize { width: 600.0, height: 80.0 }));
        assert_eq!(f.host.display_list().borrow().size(), (600, 80));
        assert!(f.waveform.dirty_flags().size);
    }

    #[test]
    fn test_destroy_inside_listener() {
        let f = fixture();
        let handle = f.waveform.clone();
        f.waveform.on(EventKind::RenderStart, move |_| handle.destroy());

        f.scheduler.run_frame();
        assert!(f.waveform.is_destroyed());
        assert_eq!(count(&f.log, EventKind::Destroy), 1);
        assert_eq!(f.scheduler.pending_frames(), 0);
    }
}
