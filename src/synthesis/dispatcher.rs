use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use super::job::Job;
use super::tokenizer::Token;
use crate::SynthesisError;

/// Runs the acoustic model on one chunk of tokens.
pub trait InferenceBackend: Send + 'static {
    /// Synthesize raw mono samples for `tokens` with the given voice and speed.
    fn infer(&mut self, tokens: &[Token], voice: &str, speed: f32)
        -> Result<Vec<f32>, SynthesisError>;

    /// Longest token chunk the model accepts.
    fn max_tokens(&self) -> usize;

    /// Sample rate of the produced audio.
    fn sample_rate(&self) -> u32;
}

enum Command {
    Run(Arc<Job>),
    Shutdown,
}

/// Serialized inference worker.
///
/// Jobs run strictly in submission order and one step at a time: a step's
/// inference finishes before the next one starts, across jobs too. Steps of a
/// canceled job are skipped. When a step finishes, its bound callback is
/// invoked on the worker thread with the produced samples.
pub struct Dispatcher {
    sender: Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stopping: Arc<AtomicBool>,
    max_tokens: usize,
    sample_rate: u32,
}

impl Dispatcher {
    /// Move `backend` onto a dedicated worker thread.
    pub fn spawn<B: InferenceBackend>(backend: B) -> Result<Self, SynthesisError> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let stopping = Arc::new(AtomicBool::new(false));
        let max_tokens = backend.max_tokens();
        let sample_rate = backend.sample_rate();

        let worker_stopping = Arc::clone(&stopping);
        let worker = std::thread::Builder::new()
            .name("tts-dispatcher".to_string())
            .spawn(move || run_worker(backend, receiver, worker_stopping))?;

        Ok(Self {
            sender,
            worker: Mutex::new(Some(worker)),
            stopping,
            max_tokens,
            sample_rate,
        })
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Queue a job. Its step callbacks must already be bound.
    ///
    /// Returns `false` if the worker has shut down.
    pub fn submit(&self, job: Arc<Job>) -> bool {
        if self.stopping.load(Ordering::SeqCst) {
            return false;
        }
        log::debug!("Queueing job {} ({} steps)", job.id(), job.steps().len());
        self.sender.send(Command::Run(job)).is_ok()
    }

    /// Stop the worker and wait for the step in progress to finish.
    pub fn shutdown(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.sender.send(Command::Shutdown);
        if let Some(worker) = self.worker.lock().take() {
            // Dropped from inside a step callback: the worker exits on its own.
            if worker.thread().id() == std::thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                log::error!("Dispatcher worker panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<B: InferenceBackend>(
    mut backend: B,
    receiver: Receiver<Command>,
    stopping: Arc<AtomicBool>,
) {
    while let Ok(command) = receiver.recv() {
        match command {
            Command::Shutdown => break,
            Command::Run(job) => run_job(&mut backend, &job, &stopping),
        }
    }
    log::debug!("Dispatcher worker stopped");
}

fn run_job<B: InferenceBackend>(backend: &mut B, job: &Job, stopping: &AtomicBool) {
    for step in job.steps() {
        if job.is_canceled() || stopping.load(Ordering::SeqCst) {
            log::debug!(
                "Job {} canceled, skipping {} remaining steps",
                job.id(),
                job.steps().len() - step.index()
            );
            return;
        }

        match backend.infer(step.tokens(), job.voice(), job.speed()) {
            Ok(samples) => {
                log::debug!(
                    "Job {} step {} inferred {} samples",
                    job.id(),
                    step.index(),
                    samples.len()
                );
                step.complete(samples);
            }
            Err(e) => {
                log::error!("Inference failed for job {} step {}: {e}", job.id(), step.index());
                job.cancel();
                return;
            }
        }
    }
}
