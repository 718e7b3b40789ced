use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::buffer::QueuedBuffer;
use super::{AbortInfo, PlaybackCallbacks, PlaybackHandle, PlaybackQueue, PlaybackState};

#[derive(Default)]
struct State {
    queue: VecDeque<Arc<QueuedBuffer>>,
    current: Option<Arc<QueuedBuffer>>,
    position: f32,
    enqueued: usize,
    shut_down: bool,
}

/// A playback queue advanced explicitly by its owner.
///
/// Nothing plays until the owner calls [`start_next`](Self::start_next);
/// the playing buffer ends with [`complete_current`](Self::complete_current)
/// or, after an abort request, with [`settle`](Self::settle). Callbacks run on
/// the thread making those calls. Useful when the host already drives an audio
/// clock, and for deterministic tests.
pub struct ManualPlaybackQueue {
    sample_rate: u32,
    state: Mutex<State>,
    enqueued: Condvar,
    next_id: AtomicU64,
    nice_audio: AtomicBool,
}

impl ManualPlaybackQueue {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            state: Mutex::new(State::default()),
            enqueued: Condvar::new(),
            next_id: AtomicU64::new(1),
            nice_audio: AtomicBool::new(true),
        }
    }

    pub fn nice_audio(&self) -> bool {
        self.nice_audio.load(Ordering::SeqCst)
    }

    /// Number of buffers ever submitted.
    pub fn enqueued_count(&self) -> usize {
        self.state.lock().enqueued
    }

    /// Buffers submitted but not yet started (aborted ones excluded).
    pub fn queued_count(&self) -> usize {
        self.state
            .lock()
            .queue
            .iter()
            .filter(|b| b.state() == PlaybackState::Queued)
            .count()
    }

    /// Wait until at least `count` buffers have ever been submitted.
    pub fn wait_for_enqueued(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.enqueued < count {
            if self.enqueued.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.enqueued >= count
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().current.is_some()
    }

    /// Start the next queued buffer. Fails while another buffer is playing or
    /// when nothing is queued.
    pub fn start_next(&self) -> bool {
        loop {
            let buffer = {
                let mut state = self.state.lock();
                if state.current.is_some() {
                    return false;
                }
                match state.queue.pop_front() {
                    Some(buffer) => buffer,
                    None => return false,
                }
            };
            // Drops samples; only timing matters here.
            buffer.take_samples();
            if buffer.begin() {
                let mut state = self.state.lock();
                state.current = Some(buffer);
                state.position = 0.0;
                return true;
            }
        }
    }

    /// Set how far the playing buffer has progressed, in `[0, 1]`.
    pub fn set_position(&self, fraction: f32) {
        self.state.lock().position = fraction.clamp(0.0, 1.0);
    }

    /// Finish the playing buffer naturally. Returns `false` if nothing is
    /// playing or an abort request is pending (which this delivers instead).
    pub fn complete_current(&self) -> bool {
        let Some(buffer) = self.state.lock().current.take() else {
            return false;
        };
        if buffer.finish() {
            return true;
        }
        self.resolve(&buffer);
        false
    }

    /// Start and immediately complete the next buffer.
    pub fn play_next(&self) -> bool {
        self.start_next() && self.complete_current()
    }

    /// Deliver a pending abort of the playing buffer and drop aborted buffers
    /// from the queue. Returns `true` if an abort was delivered.
    pub fn settle(&self) -> bool {
        let current = {
            let mut state = self.state.lock();
            state.queue.retain(|b| !b.state().is_terminal());
            match &state.current {
                Some(b) if b.state() == PlaybackState::Aborting => state.current.take(),
                _ => None,
            }
        };
        match current {
            Some(buffer) => self.resolve(&buffer),
            None => false,
        }
    }

    fn resolve(&self, buffer: &QueuedBuffer) -> bool {
        let fraction = self.state.lock().position;
        let info = AbortInfo {
            elapsed: buffer.duration().mul_f32(fraction),
            fraction,
        };
        buffer.resolve_abort(info)
    }
}

impl PlaybackQueue for ManualPlaybackQueue {
    fn enqueue(&self, samples: Vec<f32>, callbacks: PlaybackCallbacks) -> Arc<dyn PlaybackHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let buffer = Arc::new(QueuedBuffer::new(id, samples, self.sample_rate, callbacks));
        let mut state = self.state.lock();
        state.enqueued += 1;
        if state.shut_down {
            buffer.abort();
        } else {
            state.queue.push_back(Arc::clone(&buffer));
        }
        self.enqueued.notify_all();
        buffer
    }

    fn set_nice_audio(&self, enabled: bool) {
        self.nice_audio.store(enabled, Ordering::SeqCst);
    }

    fn shutdown(&self) {
        let (queued, current) = {
            let mut state = self.state.lock();
            state.shut_down = true;
            (std::mem::take(&mut state.queue), state.current.clone())
        };
        for buffer in queued {
            buffer.abort();
        }
        if let Some(current) = current {
            current.abort();
            self.settle();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    fn recorder(log: &Arc<PlMutex<Vec<String>>>, tag: &str) -> PlaybackCallbacks {
        let (l1, l2, l3) = (Arc::clone(log), Arc::clone(log), Arc::clone(log));
        let (t1, t2, t3) = (tag.to_string(), tag.to_string(), tag.to_string());
        PlaybackCallbacks {
            on_start: Some(Box::new(move || l1.lock().push(format!("start {t1}")))),
            on_complete: Some(Box::new(move || l2.lock().push(format!("done {t2}")))),
            on_abort: Some(Box::new(move |info| {
                l3.lock().push(format!("abort {t3} {:.2}", info.fraction))
            })),
        }
    }

    #[test]
    fn plays_only_when_driven() {
        let queue = ManualPlaybackQueue::new(24000);
        let log = Arc::new(PlMutex::new(Vec::new()));
        queue.enqueue(vec![0.0; 24], recorder(&log, "a"));
        queue.enqueue(vec![0.0; 24], recorder(&log, "b"));
        assert!(queue.wait_for_enqueued(2, Duration::from_millis(10)));
        assert!(log.lock().is_empty());

        assert!(queue.start_next());
        assert!(!queue.start_next());
        assert!(queue.complete_current());
        assert!(queue.play_next());
        assert!(!queue.play_next());
        assert_eq!(*log.lock(), vec!["start a", "done a", "start b", "done b"]);
    }

    #[test]
    fn abort_is_delivered_on_settle_with_position() {
        let queue = ManualPlaybackQueue::new(24000);
        let log = Arc::new(PlMutex::new(Vec::new()));
        let a = queue.enqueue(vec![0.0; 24000], recorder(&log, "a"));
        let b = queue.enqueue(vec![0.0; 24000], recorder(&log, "b"));

        assert!(queue.start_next());
        queue.set_position(0.25);
        a.abort();
        b.abort();
        assert!(queue.settle());
        assert!(!queue.complete_current());
        assert!(!queue.start_next());
        assert_eq!(*log.lock(), vec!["start a", "abort a 0.25"]);
        assert_eq!(a.state(), PlaybackState::Aborted);
        assert_eq!(b.state(), PlaybackState::Aborted);
    }

    #[test]
    fn complete_current_delivers_a_pending_abort() {
        let queue = ManualPlaybackQueue::new(24000);
        let log = Arc::new(PlMutex::new(Vec::new()));
        let a = queue.enqueue(vec![0.0; 24], recorder(&log, "a"));
        assert!(queue.start_next());
        a.abort();
        assert!(!queue.complete_current());
        assert_eq!(*log.lock(), vec!["start a", "abort a 0.00"]);
    }

    #[test]
    fn wait_for_enqueued_times_out() {
        let queue = ManualPlaybackQueue::new(24000);
        assert!(!queue.wait_for_enqueued(1, Duration::from_millis(5)));
        assert_eq!(queue.enqueued_count(), 0);
        assert_eq!(queue.queued_count(), 0);
    }
}
