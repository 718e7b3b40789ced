use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::events::SpeechEvents;
use super::job::Job;
use crate::playback::PlaybackHandle;

/// One speak request as seen by its caller.
///
/// Exposes the request's own lifecycle events and allows canceling just this
/// request. A handle stays valid after a newer request supersedes it.
pub struct SynthesisHandle {
    job: Arc<Job>,
    text: String,
    ready: Mutex<Vec<Arc<dyn PlaybackHandle>>>,
    events: SpeechEvents,
}

impl SynthesisHandle {
    pub(crate) fn new(job: Arc<Job>, text: impl Into<String>) -> Self {
        Self {
            job,
            text: text.into(),
            ready: Mutex::new(Vec::new()),
            events: SpeechEvents::default(),
        }
    }

    pub fn job(&self) -> &Arc<Job> {
        &self.job
    }

    /// The text this request was made with.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Events scoped to this request. They fire after orchestrator-wide observers.
    pub fn events(&self) -> &SpeechEvents {
        &self.events
    }

    /// Buffers submitted to playback for this request so far.
    pub fn ready_count(&self) -> usize {
        self.ready.lock().len()
    }

    pub fn is_canceled(&self) -> bool {
        self.job.is_canceled()
    }

    /// Cancel the job and abort every submitted buffer.
    ///
    /// A buffer that was audible reports a cancelation; queued ones are dropped.
    pub fn cancel(&self) {
        if self.job.cancel() {
            log::debug!("Canceling job {}", self.job.id());
        }
        let ready: Vec<_> = self.ready.lock().clone();
        for buffer in ready {
            buffer.abort();
        }
    }

    /// Record a submitted buffer.
    ///
    /// The cancellation flag is checked after the buffer is recorded, so a
    /// concurrent [`cancel`](Self::cancel) aborts it either way.
    pub(crate) fn push_ready(&self, buffer: Arc<dyn PlaybackHandle>) {
        self.ready.lock().push(Arc::clone(&buffer));
        if self.job.is_canceled() {
            buffer.abort();
        }
    }
}

impl fmt::Debug for SynthesisHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesisHandle")
            .field("job", &self.job.id())
            .field("text", &self.text)
            .field("ready", &self.ready_count())
            .finish()
    }
}
