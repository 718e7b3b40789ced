use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::{AbortInfo, PlaybackCallbacks, PlaybackHandle};

/// Where a queued buffer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Queued,
    Playing,
    /// Abort requested while playing; the driver has not reported it yet.
    Aborting,
    Completed,
    Aborted,
}

impl PlaybackState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Queued,
            1 => Self::Playing,
            2 => Self::Aborting,
            3 => Self::Completed,
            _ => Self::Aborted,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

#[derive(Default)]
struct Timing {
    started_at: Option<Instant>,
    abort_requested_at: Option<Instant>,
}

/// A buffer in a playback queue, shared between the queue driver and the
/// handle returned to the submitter.
///
/// State moves `Queued -> Playing -> Completed`, or to `Aborted` directly from
/// `Queued`, or through `Aborting` from `Playing`. Every transition is a
/// compare-and-swap, so exactly one terminal state is ever reached and only
/// the matching callback runs.
pub(crate) struct QueuedBuffer {
    id: u64,
    state: AtomicU8,
    duration: Duration,
    samples: Mutex<Option<Vec<f32>>>,
    callbacks: Mutex<PlaybackCallbacks>,
    timing: Mutex<Timing>,
    wake: Condvar,
}

impl QueuedBuffer {
    pub(crate) fn new(
        id: u64,
        samples: Vec<f32>,
        sample_rate: u32,
        callbacks: PlaybackCallbacks,
    ) -> Self {
        let duration = Duration::from_secs_f64(samples.len() as f64 / sample_rate.max(1) as f64);
        Self {
            id,
            state: AtomicU8::new(PlaybackState::Queued as u8),
            duration,
            samples: Mutex::new(Some(samples)),
            callbacks: Mutex::new(callbacks),
            timing: Mutex::new(Timing::default()),
            wake: Condvar::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn duration(&self) -> Duration {
        self.duration
    }

    pub(crate) fn take_samples(&self) -> Vec<f32> {
        self.samples.lock().take().unwrap_or_default()
    }

    fn transition(&self, from: PlaybackState, to: PlaybackState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Start playing. Returns `false` if the buffer was aborted while queued.
    pub(crate) fn begin(&self) -> bool {
        if !self.transition(PlaybackState::Queued, PlaybackState::Playing) {
            return false;
        }
        self.timing.lock().started_at = Some(Instant::now());
        let on_start = self.callbacks.lock().on_start.take();
        if let Some(cb) = on_start {
            cb();
        }
        true
    }

    /// Report natural completion. Returns `false` if an abort got there first.
    pub(crate) fn finish(&self) -> bool {
        if !self.transition(PlaybackState::Playing, PlaybackState::Completed) {
            return false;
        }
        let on_complete = {
            let mut callbacks = self.callbacks.lock();
            callbacks.on_abort = None;
            callbacks.on_complete.take()
        };
        if let Some(cb) = on_complete {
            cb();
        }
        true
    }

    /// Deliver a pending abort. Returns `false` if none was requested.
    pub(crate) fn resolve_abort(&self, info: AbortInfo) -> bool {
        if !self.transition(PlaybackState::Aborting, PlaybackState::Aborted) {
            return false;
        }
        let on_abort = {
            let mut callbacks = self.callbacks.lock();
            callbacks.on_complete = None;
            callbacks.on_abort.take()
        };
        if let Some(cb) = on_abort {
            cb(info);
        }
        true
    }

    /// Abort info measured against the wall clock.
    pub(crate) fn measured_abort(&self) -> AbortInfo {
        let timing = self.timing.lock();
        let elapsed = match (timing.started_at, timing.abort_requested_at) {
            (Some(start), Some(stop)) => stop.saturating_duration_since(start),
            _ => Duration::ZERO,
        };
        let fraction = if self.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0) as f32
        };
        AbortInfo { elapsed, fraction }
    }

    /// Block until `deadline` or an abort request. Returns `true` on abort.
    pub(crate) fn wait_until(&self, deadline: Instant) -> bool {
        let mut timing = self.timing.lock();
        while self.state() != PlaybackState::Aborting {
            if self.wake.wait_until(&mut timing, deadline).timed_out() {
                break;
            }
        }
        self.state() == PlaybackState::Aborting
    }
}

impl PlaybackHandle for QueuedBuffer {
    fn abort(&self) {
        loop {
            match self.state() {
                PlaybackState::Queued => {
                    if self.transition(PlaybackState::Queued, PlaybackState::Aborted) {
                        *self.callbacks.lock() = PlaybackCallbacks::default();
                        log::debug!("Buffer {} aborted before playing", self.id);
                        return;
                    }
                }
                PlaybackState::Playing => {
                    if self.transition(PlaybackState::Playing, PlaybackState::Aborting) {
                        self.timing.lock().abort_requested_at = Some(Instant::now());
                        self.wake.notify_all();
                        log::debug!("Buffer {} abort requested", self.id);
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::SeqCst))
    }
}
