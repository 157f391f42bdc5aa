//! Frame and timer scheduling abstractions
//!
//! Rendering is driven by the host's frame source ("run once per display
//! refresh"), resize handling by one-shot timers. Both are expressed as
//! traits so the waveform never depends on a particular event loop:
//!
//! - [`FrameScheduler`]: submit a callback for the next frame, cancel it
//! - [`TimerScheduler`]: run a callback after a delay, cancel it
//!
//! [`ManualScheduler`] implements both over a virtual clock. Hosts without
//! an animation-frame primitive drive it from their own loop: an iced frame
//! subscription (`iced::window::frames()`) yields wall-clock instants that go
//! straight to [`ManualScheduler::tick`]. Tests use
//! [`advance`](ManualScheduler::advance) and
//! [`run_frame`](ManualScheduler::run_frame) to step time exactly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Callback run on a frame, receiving the frame timestamp
pub type FrameCallback = Box<dyn FnOnce(Instant)>;

/// Callback run when a timer elapses
pub type TimerCallback = Box<dyn FnOnce()>;

/// Identifies a pending frame request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(pub u64);

/// Identifies a pending timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(pub u64);

/// Source of display-refresh callbacks
pub trait FrameScheduler {
    /// Run `callback` on the next frame
    fn request_frame(&self, callback: FrameCallback) -> FrameToken;

    /// Drop a pending request; unknown or already-run tokens are ignored
    fn cancel_frame(&self, token: FrameToken);

    /// Current time on this scheduler's clock
    fn now(&self) -> Instant;
}

/// Source of cancellable one-shot timers
pub trait TimerScheduler {
    /// Run `callback` once `delay` has elapsed
    fn set_timeout(&self, delay: Duration, callback: TimerCallback) -> TimerToken;

    /// Drop a pending timer; unknown or already-fired tokens are ignored
    fn clear_timeout(&self, token: TimerToken);
}

struct PendingTimer {
    token: TimerToken,
    due: Instant,
    callback: TimerCallback,
}

/// Virtual-clock scheduler implementing both frame and timer scheduling
///
/// Nothing runs on its own: frames run on [`run_frame`](Self::run_frame),
/// timers fire on [`advance`](Self::advance).
pub struct ManualScheduler {
    now: Cell<Instant>,
    next_id: Cell<u64>,
    frames: RefCell<Vec<(FrameToken, FrameCallback)>>,
    timers: RefCell<Vec<PendingTimer>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Scheduler whose clock starts at `start`
    pub fn starting_at(start: Instant) -> Self {
        Self {
            now: Cell::new(start),
            next_id: Cell::new(1),
            frames: RefCell::new(Vec::new()),
            timers: RefCell::new(Vec::new()),
        }
    }

    /// Shared handle, the form waveforms take
    pub fn shared() -> Rc<Self> {
        Rc::new(Self::new())
    }

    /// Move the clock forward, firing every timer that becomes due
    ///
    /// Timers fire in due order, each observing the clock at its own due
    /// time. Timers scheduled by a firing callback are honored if they fall
    /// within the same advance.
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;

        loop {
            let next = {
                let mut timers = self.timers.borrow_mut();
                let due_idx = timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| t.due)
                    .map(|(idx, _)| idx);
                due_idx.map(|idx| timers.remove(idx))
            };

            match next {
                Some(timer) => {
                    if timer.due > self.now.get() {
                        self.now.set(timer.due);
                    }
                    (timer.callback)();
                }
                None => break,
            }
        }

        self.now.set(target);
    }

    /// Run every frame callback queued before this call
    ///
    /// Callbacks requested while the frame runs wait for the next frame, as
    /// with a browser animation-frame queue. Returns the number run.
    pub fn run_frame(&self) -> usize {
        let queued = std::mem::take(&mut *self.frames.borrow_mut());
        let now = self.now.get();
        let count = queued.len();
        for (_, callback) in queued {
            callback(now);
        }
        count
    }

    /// Bring the clock up to `now`, firing due timers, then run the frame
    ///
    /// Entry point for real frame sources. An instant earlier than the
    /// current clock leaves the clock where it is.
    pub fn tick(&self, now: Instant) -> usize {
        self.advance(now.saturating_duration_since(self.now.get()));
        self.run_frame()
    }

    /// Advance by one frame interval and run the frame
    pub fn step(&self, frame_interval: Duration) -> usize {
        self.advance(frame_interval);
        self.run_frame()
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&self, callback: FrameCallback) -> FrameToken {
        let token = FrameToken(self.next_id());
        self.frames.borrow_mut().push((token, callback));
        token
    }

    fn cancel_frame(&self, token: FrameToken) {
        self.frames.borrow_mut().retain(|(t, _)| *t != token);
    }

    fn now(&self) -> Instant {
        self.now.get()
    }
}

impl TimerScheduler for ManualScheduler {
    fn set_timeout(&self, delay: Duration, callback: TimerCallback) -> TimerToken {
        let token = TimerToken(self.next_id());
        self.timers.borrow_mut().push(PendingTimer {
            token,
            due: self.now.get() + delay,
            callback,
        });
        token
    }

    fn clear_timeout(&self, token: TimerToken) {
        self.timers.borrow_mut().retain(|t| t.token != token);
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending_frames", &self.pending_frames())
            .field("pending_timers", &self.pending_timers())
            .finish()
    }
}
