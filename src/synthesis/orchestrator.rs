use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::dispatcher::{Dispatcher, InferenceBackend};
use super::events::{Scopes, SpeechEvents};
use super::guess::{
    GuessRequest, LinearEstimator, ProportionalGuesser, SpokenTextGuesser, SpokenTokenEstimator,
};
use super::handle::SynthesisHandle;
use super::job::{Job, StepCallback};
use super::packets::{CancelationPacket, CompletionPacket, ProgressPacket, StartPacket};
use super::segmentation::{truncate, PunctuationSegmentation, SegmentationStrategy};
use super::tokenizer::{Token, Tokenizer};
use crate::config::OrchestratorConfig;
use crate::playback::{AbortInfo, PlaybackCallbacks, PlaybackQueue};
use crate::SynthesisError;

/// Turns speak requests into segmented inference jobs and gap-free playback,
/// and reports what was spoken.
///
/// At most one request is current. Starting a new one cancels the previous
/// request first: its queued steps are skipped, its buffers are aborted, and
/// if one of them was audible a cancelation is reported for it.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use kokoro_speak::{InferenceBackend, OrchestratorConfig, SynthesisError};
/// # use kokoro_speak::{SynthesisOrchestrator, Tokenizer};
/// # use kokoro_speak::playback::{ClockedPlaybackQueue, NullOutput};
/// # fn demo(
/// #     backend: impl InferenceBackend,
/// #     tokenizer: Arc<dyn Tokenizer>,
/// # ) -> Result<(), SynthesisError> {
/// let playback = Arc::new(ClockedPlaybackQueue::new(NullOutput, 24000)?);
/// let config = OrchestratorConfig::default();
/// let tts = SynthesisOrchestrator::new(backend, tokenizer, playback, config)?;
/// tts.events().completed.subscribe(|p| println!("done: {}", p.text));
///
/// let handle = tts.speak_fast("Hello there. How are you?", "af_heart", None)?;
/// handle.events().progressed.subscribe(|p| println!("so far: {}", p.best_guess_text));
/// # Ok(())
/// # }
/// ```
pub struct SynthesisOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    dispatcher: Dispatcher,
    tokenizer: Arc<dyn Tokenizer>,
    playback: Arc<dyn PlaybackQueue>,
    guesser: RwLock<Arc<dyn SpokenTextGuesser>>,
    estimator: RwLock<Arc<dyn SpokenTokenEstimator>>,
    segmentation: PunctuationSegmentation,
    events: SpeechEvents,
    current: Mutex<Option<Arc<SynthesisHandle>>>,
    disposed: AtomicBool,
    speed: f32,
    max_tokens: usize,
}

/// What playback callbacks need to know about their request.
///
/// Holds the handle weakly: a dropped handle loses its request-scoped
/// events, orchestrator-wide observers still hear about the job.
#[derive(Clone)]
struct Request {
    job: Arc<Job>,
    text: Arc<str>,
    handle: Weak<SynthesisHandle>,
}

impl SynthesisOrchestrator {
    /// Move `backend` onto the inference worker and wire it to `playback`.
    pub fn new<B: InferenceBackend>(
        backend: B,
        tokenizer: Arc<dyn Tokenizer>,
        playback: Arc<dyn PlaybackQueue>,
        config: OrchestratorConfig,
    ) -> Result<Self, SynthesisError> {
        let dispatcher = Dispatcher::spawn(backend)?;
        let max_tokens = config.effective_max_tokens(dispatcher.max_tokens());
        playback.set_nice_audio(config.nice_audio);

        log::info!(
            "Synthesizer ready (max {} tokens per chunk, {} Hz)",
            max_tokens,
            dispatcher.sample_rate()
        );

        Ok(Self {
            inner: Arc::new(Inner {
                dispatcher,
                tokenizer,
                playback,
                guesser: RwLock::new(Arc::new(ProportionalGuesser)),
                estimator: RwLock::new(Arc::new(LinearEstimator)),
                segmentation: PunctuationSegmentation::new(config.segmentation),
                events: SpeechEvents::default(),
                current: Mutex::new(None),
                disposed: AtomicBool::new(false),
                speed: config.speed,
                max_tokens,
            }),
        })
    }

    /// Observers for every request made through this orchestrator.
    pub fn events(&self) -> &SpeechEvents {
        &self.inner.events
    }

    /// The request currently speaking, or last spoken.
    pub fn current(&self) -> Option<Arc<SynthesisHandle>> {
        self.inner.current.lock().clone()
    }

    pub fn max_tokens(&self) -> usize {
        self.inner.max_tokens
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.dispatcher.sample_rate()
    }

    pub fn set_guesser(&self, guesser: Arc<dyn SpokenTextGuesser>) {
        *self.inner.guesser.write() = guesser;
    }

    pub fn set_estimator(&self, estimator: Arc<dyn SpokenTokenEstimator>) {
        *self.inner.estimator.write() = estimator;
    }

    /// Forwarded to the playback queue.
    pub fn set_nice_audio(&self, enabled: bool) {
        self.inner.playback.set_nice_audio(enabled);
    }

    /// Speak `text` as a single chunk, truncated to the model limit.
    pub fn speak(&self, text: &str, voice: &str) -> Result<Arc<SynthesisHandle>, SynthesisError> {
        let tokens = self.tokenize(text, voice)?;
        self.speak_phonemes(text, tokens, voice, None)
    }

    /// Speak `text` split into short chunks so playback starts sooner.
    ///
    /// `strategy` defaults to the configured [`PunctuationSegmentation`].
    pub fn speak_fast(
        &self,
        text: &str,
        voice: &str,
        strategy: Option<&dyn SegmentationStrategy>,
    ) -> Result<Arc<SynthesisHandle>, SynthesisError> {
        let tokens = self.tokenize(text, voice)?;
        let strategy = strategy.unwrap_or(&self.inner.segmentation);
        self.speak_phonemes(text, tokens, voice, Some(strategy))
    }

    /// Speak pre-tokenized input. `text` is only used for reporting.
    ///
    /// Without a strategy the tokens form one chunk, truncated to the limit.
    pub fn speak_phonemes(
        &self,
        text: &str,
        tokens: Vec<Token>,
        voice: &str,
        strategy: Option<&dyn SegmentationStrategy>,
    ) -> Result<Arc<SynthesisHandle>, SynthesisError> {
        self.ensure_live()?;
        self.stop_playback();

        let max = self.inner.max_tokens;
        let chunks = match strategy {
            Some(strategy) => strategy.segment(&tokens, max),
            None => {
                let tokens = truncate(tokens, max);
                if tokens.is_empty() {
                    Vec::new()
                } else {
                    vec![tokens]
                }
            }
        };
        Ok(self.inner.begin(text, chunks, voice))
    }

    /// Cancel the current request and abort its playback. Idempotent.
    ///
    /// A Cancelation is reported only if one of the request's buffers was
    /// audible when stopped. Stopping between steps (the last started step
    /// already finished, the next one still inferring or queued) ends the
    /// request after its Progress packets with no terminal packet.
    pub fn stop_playback(&self) {
        let current = self.inner.current.lock().clone();
        if let Some(handle) = current {
            handle.cancel();
        }
    }

    /// Stop playback, release the playback queue, then the inference worker.
    ///
    /// No event fires once this returns, and further requests fail with
    /// [`SynthesisError::Disposed`].
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_playback();
        self.inner.playback.shutdown();
        self.inner.dispatcher.shutdown();
        self.inner.events.clear();
        self.inner.current.lock().take();
        log::info!("Synthesizer disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    fn ensure_live(&self) -> Result<(), SynthesisError> {
        if self.is_disposed() {
            Err(SynthesisError::Disposed)
        } else {
            Ok(())
        }
    }

    fn tokenize(&self, text: &str, voice: &str) -> Result<Vec<Token>, SynthesisError> {
        self.ensure_live()?;
        let tokenizer = &self.inner.tokenizer;
        let tokens = tokenizer.tokenize(text, &tokenizer.language_for(voice))?;
        if tokens.is_empty() {
            log::warn!("No phoneme tokens produced for text: {text:?}");
        }
        Ok(tokens)
    }
}

impl Drop for SynthesisOrchestrator {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Inner {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn guesser(&self) -> Arc<dyn SpokenTextGuesser> {
        Arc::clone(&self.guesser.read())
    }

    fn estimator(&self) -> Arc<dyn SpokenTokenEstimator> {
        Arc::clone(&self.estimator.read())
    }

    /// Create the job and its handle, make it current, and queue it.
    fn begin(
        self: &Arc<Self>,
        text: &str,
        chunks: Vec<Vec<Token>>,
        voice: &str,
    ) -> Arc<SynthesisHandle> {
        let job = Arc::new(Job::new(chunks, voice, self.speed));
        let handle = Arc::new(SynthesisHandle::new(Arc::clone(&job), text));
        let request = Request {
            job: Arc::clone(&job),
            text: Arc::from(text),
            handle: Arc::downgrade(&handle),
        };

        // Bind before submitting so no step can finish unobserved.
        for step in job.steps() {
            step.bind(self.bridge(&request, step.index()));
        }

        {
            // The previous request is canceled before the new one is visible.
            let mut current = self.current.lock();
            if let Some(previous) = current.take() {
                previous.cancel();
            }
            *current = Some(Arc::clone(&handle));
        }

        log::info!(
            "Speaking job {} ({} steps, {} tokens, voice {voice})",
            job.id(),
            job.steps().len(),
            job.steps().iter().map(|s| s.tokens().len()).sum::<usize>()
        );
        if !job.steps().is_empty() && !self.dispatcher.submit(job) {
            log::warn!("Inference worker is gone, request will not play");
        }
        handle
    }

    /// The step callback: forwards inferred audio to playback.
    ///
    /// Steps live inside their job, so the job is only referenced weakly here.
    fn bridge(self: &Arc<Self>, request: &Request, index: usize) -> StepCallback {
        let inner = Arc::downgrade(self);
        let job = Arc::downgrade(&request.job);
        let text = Arc::clone(&request.text);
        let handle = request.handle.clone();
        Box::new(move |samples| {
            let (Some(inner), Some(job)) = (inner.upgrade(), job.upgrade()) else {
                return;
            };
            inner.on_step_inferred(Request { job, text, handle }, index, samples);
        })
    }

    fn on_step_inferred(self: &Arc<Self>, request: Request, index: usize, samples: Vec<f32>) {
        // A live request is always current, so a dropped handle means superseded.
        let handle = request.handle.upgrade();
        if self.is_disposed() || request.job.is_canceled() || handle.is_none() {
            log::debug!(
                "Dropping audio of canceled job {} step {index}",
                request.job.id()
            );
            return;
        }

        let weak = Arc::downgrade(self);
        let callbacks = PlaybackCallbacks {
            on_start: (index == 0).then(|| {
                let (inner, request) = (weak.clone(), request.clone());
                Box::new(move || {
                    if let Some(inner) = inner.upgrade() {
                        inner.on_started(&request);
                    }
                }) as Box<dyn FnOnce() + Send>
            }),
            on_complete: Some({
                let (inner, request) = (weak.clone(), request.clone());
                Box::new(move || {
                    if let Some(inner) = inner.upgrade() {
                        inner.on_step_played(&request, index);
                    }
                })
            }),
            on_abort: Some({
                let (inner, request) = (weak, request);
                Box::new(move |info| {
                    if let Some(inner) = inner.upgrade() {
                        inner.on_step_interrupted(&request, index, info);
                    }
                })
            }),
        };

        let buffer = self.playback.enqueue(samples, callbacks);
        if let Some(handle) = handle {
            handle.push_ready(buffer);
        }
    }

    fn on_started(&self, request: &Request) {
        if self.is_disposed() {
            return;
        }
        let handle = request.handle.upgrade();
        Scopes {
            engine: &self.events.started,
            request: handle.as_ref().map(|h| &h.events().started),
        }
        .emit(|| StartPacket {
            job: Arc::clone(&request.job),
            text: request.text.to_string(),
            phonemes: self.tokenizer.decode(&request.job.tokens()),
        });
    }

    fn on_step_played(&self, request: &Request, index: usize) {
        let job = &request.job;
        if self.is_disposed() || job.is_terminated() {
            return;
        }
        let step = Arc::clone(&job.steps()[index]);
        let phonemes = self.tokenizer.decode(step.tokens());
        let (certain_before, certain) = job.extend_certain(&phonemes);
        let last = job.is_last_step(index);
        log::debug!("Job {} step {index} played", job.id());

        let handle = request.handle.upgrade();
        let scoped = handle.as_ref().map(|h| h.events());

        Scopes {
            engine: &self.events.progressed,
            request: scoped.map(|e| &e.progressed),
        }
        .emit(|| {
            let best_guess_text = if last {
                request.text.to_string()
            } else {
                let all_tokens = job.tokens();
                let all_phonemes = self.tokenizer.decode(&all_tokens);
                self.guesser().guess(&GuessRequest {
                    text: &request.text,
                    all_tokens: &all_tokens,
                    all_phonemes: &all_phonemes,
                    certain_phonemes: &certain_before,
                    segment_phonemes: &phonemes,
                    guessed_phonemes: &phonemes,
                    segment_index: index,
                    cut_fraction: 1.0,
                })
            };
            ProgressPacket {
                job: Arc::clone(job),
                step: Arc::clone(&step),
                best_guess_text,
                step_phonemes: phonemes.clone(),
            }
        });

        if last {
            Scopes {
                engine: &self.events.completed,
                request: scoped.map(|e| &e.completed),
            }
            .emit(|| CompletionPacket {
                job: Arc::clone(job),
                step,
                all_phonemes: certain,
                text: request.text.to_string(),
            });
        }
    }

    fn on_step_interrupted(&self, request: &Request, index: usize, info: AbortInfo) {
        let job = &request.job;
        if self.is_disposed() || !job.terminate() {
            return;
        }
        let step = Arc::clone(&job.steps()[index]);
        let phonemes = self.tokenizer.decode(step.tokens());
        let spoken = self
            .estimator()
            .spoken_tokens(step.tokens().len(), info.elapsed, info.fraction)
            .min(phonemes.len());
        let guessed = phonemes[..spoken].to_vec();
        let (certain, best_guess_all) = job.extend_certain(&guessed);
        log::debug!(
            "Job {} interrupted in step {index} at {:.0}% (~{spoken} of {} tokens)",
            job.id(),
            info.fraction * 100.0,
            phonemes.len()
        );

        let handle = request.handle.upgrade();
        Scopes {
            engine: &self.events.canceled,
            request: handle.as_ref().map(|h| &h.events().canceled),
        }
        .emit(|| {
            let all_tokens = job.tokens();
            let all_phonemes = self.tokenizer.decode(&all_tokens);
            let best_guess_text = self.guesser().guess(&GuessRequest {
                text: &request.text,
                all_tokens: &all_tokens,
                all_phonemes: &all_phonemes,
                certain_phonemes: &certain,
                segment_phonemes: &phonemes,
                guessed_phonemes: &guessed,
                segment_index: index,
                cut_fraction: info.fraction,
            });
            CancelationPacket {
                job: Arc::clone(job),
                step,
                best_guess_text,
                best_guess_all_phonemes: best_guess_all,
                certain_prefix_phonemes: certain,
                guessed_suffix_phonemes: guessed,
            }
        });
    }
}
