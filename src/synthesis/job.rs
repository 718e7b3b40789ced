use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::tokenizer::Token;

/// Callback run once a step's inference has produced audio.
pub type StepCallback = Box<dyn FnOnce(Vec<f32>) + Send + 'static>;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// One bounded chunk of a job, inferred and played back independently.
pub struct Step {
    index: usize,
    tokens: Vec<Token>,
    on_inferred: Mutex<Option<StepCallback>>,
}

impl Step {
    fn new(index: usize, tokens: Vec<Token>) -> Self {
        Self {
            index,
            tokens,
            on_inferred: Mutex::new(None),
        }
    }

    /// Position of this step within its job.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Install the completion callback, replacing any previous one.
    pub fn bind(&self, callback: StepCallback) {
        *self.on_inferred.lock() = Some(callback);
    }

    /// Hand inferred samples to the bound callback. Fires at most once.
    ///
    /// Returns `false` if no callback was bound or it already ran.
    pub fn complete(&self, samples: Vec<f32>) -> bool {
        let callback = self.on_inferred.lock().take();
        match callback {
            Some(cb) => {
                cb(samples);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("index", &self.index)
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

/// The ordered steps of one speak request.
///
/// Owns the cancellation flag and the record of phonemes confirmed spoken.
/// The record only grows, one step at a time in step order, and is written
/// only from the playback callback stream.
pub struct Job {
    id: u64,
    steps: Vec<Arc<Step>>,
    voice: String,
    speed: f32,
    canceled: AtomicBool,
    terminated: AtomicBool,
    certain: Mutex<Vec<char>>,
}

impl Job {
    pub fn new(chunks: Vec<Vec<Token>>, voice: impl Into<String>, speed: f32) -> Self {
        let steps = chunks
            .into_iter()
            .enumerate()
            .map(|(i, tokens)| Arc::new(Step::new(i, tokens)))
            .collect();
        Self {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            steps,
            voice: voice.into(),
            speed,
            canceled: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            certain: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn steps(&self) -> &[Arc<Step>] {
        &self.steps
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn is_last_step(&self, index: usize) -> bool {
        index + 1 == self.steps.len()
    }

    /// All tokens of the job, in step order.
    pub fn tokens(&self) -> Vec<Token> {
        self.steps.iter().flat_map(|s| s.tokens.iter().copied()).collect()
    }

    /// Mark the job canceled. Returns `true` if this call changed the state.
    pub fn cancel(&self) -> bool {
        !self.canceled.swap(true, Ordering::SeqCst)
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Set once a cancelation packet has been produced; no progress follows it.
    pub(crate) fn terminate(&self) -> bool {
        !self.terminated.swap(true, Ordering::SeqCst)
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Snapshot of the phonemes confirmed spoken so far.
    pub fn certain_phonemes(&self) -> Vec<char> {
        self.certain.lock().clone()
    }

    /// Append to the certain record, returning `(before, after)` snapshots.
    pub(crate) fn extend_certain(&self, phonemes: &[char]) -> (Vec<char>, Vec<char>) {
        let mut certain = self.certain.lock();
        let before = certain.clone();
        certain.extend_from_slice(phonemes);
        (before, certain.clone())
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("steps", &self.steps)
            .field("voice", &self.voice)
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn steps_keep_segmentation_order() {
        let job = Job::new(vec![vec![1, 2], vec![3], vec![4, 5]], "af_heart", 1.0);
        let indices: Vec<usize> = job.steps().iter().map(|s| s.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(job.tokens(), vec![1, 2, 3, 4, 5]);
        assert!(job.is_last_step(2));
        assert!(!job.is_last_step(1));
    }

    #[test]
    fn step_callback_fires_at_most_once() {
        let job = Job::new(vec![vec![1]], "af_heart", 1.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        job.steps()[0].bind(Box::new(move |samples| {
            assert_eq!(samples, vec![0.5]);
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(job.steps()[0].complete(vec![0.5]));
        assert!(!job.steps()[0].complete(vec![0.5]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn certain_record_only_grows() {
        let job = Job::new(vec![vec![1], vec![2]], "af_heart", 1.0);
        let (before, after) = job.extend_certain(&['a', 'b']);
        assert!(before.is_empty());
        assert_eq!(after, vec!['a', 'b']);
        let (before, after) = job.extend_certain(&['c']);
        assert_eq!(before, vec!['a', 'b']);
        assert_eq!(after, vec!['a', 'b', 'c']);
        assert_eq!(job.certain_phonemes(), after);
    }

    #[test]
    fn cancel_is_idempotent() {
        let job = Job::new(vec![], "af_heart", 1.0);
        assert!(job.cancel());
        assert!(!job.cancel());
        assert!(job.is_canceled());
    }

    #[test]
    fn job_ids_are_unique() {
        let a = Job::new(vec![], "af_heart", 1.0);
        let b = Job::new(vec![], "af_heart", 1.0);
        assert_ne!(a.id(), b.id());
    }
}
