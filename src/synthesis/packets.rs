//! Immutable payloads describing one lifecycle moment of a job.

use std::sync::Arc;

use super::job::{Job, Step};

/// The first buffer of a job became audible.
#[derive(Debug, Clone)]
pub struct StartPacket {
    pub job: Arc<Job>,
    /// The original request text.
    pub text: String,
    /// Phonemes of the whole job, in step order.
    pub phonemes: Vec<char>,
}

/// A step finished playing in full.
#[derive(Debug, Clone)]
pub struct ProgressPacket {
    pub job: Arc<Job>,
    pub step: Arc<Step>,
    /// Text believed spoken so far. Exact for the final step, guessed otherwise.
    pub best_guess_text: String,
    pub step_phonemes: Vec<char>,
}

/// The final step finished playing in full.
#[derive(Debug, Clone)]
pub struct CompletionPacket {
    pub job: Arc<Job>,
    pub step: Arc<Step>,
    /// Every phoneme of the job, confirmed spoken.
    pub all_phonemes: Vec<char>,
    pub text: String,
}

/// Playback was cut off partway through `step`.
///
/// Confirmed and estimated phonemes are kept apart:
/// `best_guess_all_phonemes == certain_prefix_phonemes ++ guessed_suffix_phonemes`.
#[derive(Debug, Clone)]
pub struct CancelationPacket {
    pub job: Arc<Job>,
    pub step: Arc<Step>,
    pub best_guess_text: String,
    pub best_guess_all_phonemes: Vec<char>,
    /// Phonemes of every step that finished before the cut.
    pub certain_prefix_phonemes: Vec<char>,
    /// Estimated audible part of the interrupted step.
    pub guessed_suffix_phonemes: Vec<char>,
}
