//! Speech request orchestration.
//!
//! A request flows through these stages:
//! 1. [`Tokenizer`] turns text into model tokens.
//! 2. A [`SegmentationStrategy`] splits the tokens into the steps of a [`Job`].
//! 3. The [`Dispatcher`] runs each step through an [`InferenceBackend`] on a
//!    single worker thread.
//! 4. Inferred audio is handed to a [`PlaybackQueue`](crate::playback::PlaybackQueue),
//!    whose callbacks drive the [`SpeechEvents`] of the request.

pub mod dispatcher;
pub mod events;
pub mod guess;
pub mod handle;
pub mod job;
pub mod orchestrator;
pub mod packets;
pub mod segmentation;
pub mod tokenizer;

pub use dispatcher::{Dispatcher, InferenceBackend};
pub use events::{ObserverList, SpeechEvents, SubscriptionId};
pub use guess::{
    GuessRequest, LinearEstimator, ProportionalGuesser, SpokenTextGuesser, SpokenTokenEstimator,
};
pub use handle::SynthesisHandle;
pub use job::{Job, Step};
pub use orchestrator::SynthesisOrchestrator;
pub use packets::{CancelationPacket, CompletionPacket, ProgressPacket, StartPacket};
pub use segmentation::{
    PunctuationSegmentation, SegmentationConfig, SegmentationConfigBuilder, SegmentationStrategy,
};
pub use tokenizer::{Token, Tokenizer};
