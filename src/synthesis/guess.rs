//! Estimating how much of a request was audibly spoken.

use std::time::Duration;

use super::tokenizer::Token;

/// Everything known about a job at the moment its spoken text is guessed.
#[derive(Debug, Clone, Copy)]
pub struct GuessRequest<'a> {
    /// The original request text.
    pub text: &'a str,
    /// All tokens of the job, in step order.
    pub all_tokens: &'a [Token],
    /// All phonemes of the job, in step order.
    pub all_phonemes: &'a [char],
    /// Phonemes of the steps that finished before this one.
    pub certain_phonemes: &'a [char],
    /// Phonemes of the step being reported.
    pub segment_phonemes: &'a [char],
    /// The part of `segment_phonemes` estimated to have been heard.
    pub guessed_phonemes: &'a [char],
    pub segment_index: usize,
    /// Played fraction of the step, in `[0, 1]`.
    pub cut_fraction: f32,
}

impl GuessRequest<'_> {
    /// Phonemes believed spoken: certain ones plus the guessed part of this step.
    pub fn spoken_len(&self) -> usize {
        self.certain_phonemes.len() + self.guessed_phonemes.len()
    }
}

/// Reconstructs the literal text spoken so far.
pub trait SpokenTextGuesser: Send + Sync {
    fn guess(&self, request: &GuessRequest<'_>) -> String;
}

/// Maps the spoken share of phonemes onto the text, ending on a word boundary.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProportionalGuesser;

impl SpokenTextGuesser for ProportionalGuesser {
    fn guess(&self, request: &GuessRequest<'_>) -> String {
        let total = request.all_phonemes.len();
        let spoken = request.spoken_len();
        if total == 0 || spoken == 0 {
            return String::new();
        }
        if spoken >= total {
            return request.text.to_string();
        }

        let chars: Vec<char> = request.text.chars().collect();
        let mut cut = ((chars.len() * spoken) as f64 / total as f64).round() as usize;
        // Finish the word the cut lands in.
        while cut > 0
            && cut < chars.len()
            && !chars[cut - 1].is_whitespace()
            && !chars[cut].is_whitespace()
        {
            cut += 1;
        }
        chars[..cut.min(chars.len())]
            .iter()
            .collect::<String>()
            .trim_end()
            .to_string()
    }
}

/// Estimates how many tokens of an interrupted step were heard.
pub trait SpokenTokenEstimator: Send + Sync {
    /// Result must not exceed `token_count`.
    fn spoken_tokens(&self, token_count: usize, elapsed: Duration, fraction: f32) -> usize;
}

/// Assumes tokens are spread evenly over the step's audio:
/// `round(token_count * fraction)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearEstimator;

impl SpokenTokenEstimator for LinearEstimator {
    fn spoken_tokens(&self, token_count: usize, _elapsed: Duration, fraction: f32) -> usize {
        let fraction = fraction.clamp(0.0, 1.0) as f64;
        ((token_count as f64 * fraction).round() as usize).min(token_count)
    }
}
