//! Frame-driven progress synchronization.
//!
//! While playing, [`PlaybackSync`] keeps exactly one frame request outstanding with
//! the host's [`FrameScheduler`]. When the host fires that frame the sync reads the
//! media position and reports an update only when the progress fraction moved by
//! more than [`PROGRESS_EPSILON`].

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Smallest progress change that triggers a redraw.
pub const PROGRESS_EPSILON: f64 = 0.001;

/// Identifies one requested animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameHandle(pub u64);

/// The host's animation-frame primitive.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// A shared queue of pending frame requests.
///
/// Controllers request frames through their clone; the host drains due frames
/// with [`FrameQueue::take_due`] once per display refresh and hands each one back
/// to the players.
#[derive(Debug, Clone, Default)]
pub struct FrameQueue {
    inner: Rc<RefCell<FrameQueueInner>>,
}

#[derive(Debug, Default)]
struct FrameQueueInner {
    next: u64,
    pending: BTreeSet<FrameHandle>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every frame requested so far, oldest first.
    pub fn take_due(&self) -> Vec<FrameHandle> {
        let mut inner = self.inner.borrow_mut();
        std::mem::take(&mut inner.pending).into_iter().collect()
    }

    pub fn pending(&self) -> usize {
        self.inner.borrow().pending.len()
    }
}

impl FrameScheduler for FrameQueue {
    fn request_frame(&mut self) -> FrameHandle {
        let mut inner = self.inner.borrow_mut();
        inner.next += 1;
        let handle = FrameHandle(inner.next);
        inner.pending.insert(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.inner.borrow_mut().pending.remove(&handle);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    Running,
}

/// An accepted progress change.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncUpdate {
    pub position: f64,
    pub duration: f64,
    pub fraction: f64,
    /// Elapsed time readout, e.g. `1:05`.
    pub elapsed: String,
}

impl SyncUpdate {
    fn new(position: f64, duration: f64) -> Self {
        let fraction = (position / duration).clamp(0.0, 1.0);
        Self {
            position,
            duration,
            fraction,
            elapsed: format_time(position),
        }
    }
}

#[derive(Debug, Default)]
pub struct PlaybackSync {
    state: SyncState,
    pending: Option<FrameHandle>,
    last_fraction: f64,
}

fn usable_duration(duration: f64) -> bool {
    duration.is_finite() && duration > 0.0
}

impl PlaybackSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    pub fn last_fraction(&self) -> f64 {
        self.last_fraction
    }

    /// Forget the last reported fraction, e.g. when a new source loads.
    pub fn reset(&mut self) {
        self.last_fraction = 0.0;
    }

    /// Enter `Running` and schedule a fresh frame, replacing any pending one.
    pub fn start(&mut self, scheduler: &mut dyn FrameScheduler) {
        self.cancel(scheduler);
        self.state = SyncState::Running;
        self.pending = Some(scheduler.request_frame());
    }

    /// Return to `Idle` and cancel the pending frame.
    pub fn stop(&mut self, scheduler: &mut dyn FrameScheduler) {
        self.cancel(scheduler);
        self.state = SyncState::Idle;
    }

    fn cancel(&mut self, scheduler: &mut dyn FrameScheduler) {
        if let Some(handle) = self.pending.take() {
            scheduler.cancel_frame(handle);
        }
    }

    /// Handle a fired frame.
    ///
    /// Frames other than the pending one are stale and ignored. The loop keeps
    /// itself alive only while running, playing and with a known duration.
    pub fn on_frame(
        &mut self,
        handle: FrameHandle,
        scheduler: &mut dyn FrameScheduler,
        position: f64,
        duration: f64,
        playing: bool,
    ) -> Option<SyncUpdate> {
        if self.pending != Some(handle) {
            return None;
        }
        self.pending = None;

        if self.state != SyncState::Running || !playing || !usable_duration(duration) {
            self.state = SyncState::Idle;
            return None;
        }

        let update = self.sample(position, duration);
        self.pending = Some(scheduler.request_frame());
        update
    }

    /// Compare the current position against the last reported fraction.
    pub fn sample(&mut self, position: f64, duration: f64) -> Option<SyncUpdate> {
        if !usable_duration(duration) {
            return None;
        }
        let update = SyncUpdate::new(position, duration);
        if (update.fraction - self.last_fraction).abs() > PROGRESS_EPSILON {
            self.last_fraction = update.fraction;
            Some(update)
        } else {
            None
        }
    }

    /// Report the current position unconditionally, bypassing the threshold.
    pub fn force(&mut self, position: f64, duration: f64) -> Option<SyncUpdate> {
        if !usable_duration(duration) {
            return None;
        }
        let update = SyncUpdate::new(position, duration);
        self.last_fraction = update.fraction;
        Some(update)
    }
}

/// Format seconds as `m:ss`, or `h:mm:ss` from one hour up.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
