use derive_builder::Builder;
use serde::Deserialize;

use super::tokenizer::Token;

/// Kokoro vocab ids for `; : , . ! ?`.
pub const KOKORO_BREAK_TOKENS: &[Token] = &[1, 2, 3, 4, 5, 6];

/// Kokoro vocab id for a space.
pub const KOKORO_SPACE_TOKEN: Token = 16;

/// Splits a token sequence into ordered chunks of bounded length.
///
/// Every returned chunk must be at most `max_len` tokens long, and the chunks
/// must concatenate back to the input.
pub trait SegmentationStrategy: Send + Sync {
    fn segment(&self, tokens: &[Token], max_len: usize) -> Vec<Vec<Token>>;
}

/// Length bounds and split points for [`PunctuationSegmentation`].
#[derive(Debug, Clone, PartialEq, Builder, Deserialize)]
#[builder(default, setter(into), build_fn(error = "crate::SynthesisError"))]
#[serde(default)]
pub struct SegmentationConfig {
    /// Shortest first segment worth cutting at a break.
    pub min_first_len: usize,
    /// Longest first segment. Kept small so audio starts quickly.
    pub max_first_len: usize,
    /// Longest second segment.
    pub max_second_len: usize,
    /// Shortest segment from the third one on.
    pub min_followup_len: usize,
    /// Tokens after which a cut is preferred (sentence and clause punctuation).
    pub break_tokens: Vec<Token>,
    /// Fallback cut point when no break token is in range.
    pub space_token: Option<Token>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            min_first_len: 10,
            max_first_len: 100,
            max_second_len: 100,
            min_followup_len: 200,
            break_tokens: KOKORO_BREAK_TOKENS.to_vec(),
            space_token: Some(KOKORO_SPACE_TOKEN),
        }
    }
}

/// Segments at punctuation, falling back to spaces, then to a hard cut.
///
/// The first two segments are kept short so playback can begin while the rest
/// is still being synthesized; later segments grow toward the model limit.
#[derive(Debug, Clone, Default)]
pub struct PunctuationSegmentation {
    config: SegmentationConfig,
}

impl PunctuationSegmentation {
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// `(min, max)` length for the segment at `index`, with `max` capped at `max_len`.
    fn bounds(&self, index: usize, max_len: usize) -> (usize, usize) {
        let c = &self.config;
        let (min, max) = match index {
            0 => (c.min_first_len, c.max_first_len),
            1 => (1, c.max_second_len),
            _ => (c.min_followup_len, max_len),
        };
        let max = max.clamp(1, max_len.max(1));
        (min.min(max), max)
    }

    /// Offset (relative to `window` start) just past the preferred cut point.
    fn cut_point(&self, window: &[Token], min: usize) -> usize {
        let last_match = |pred: &dyn Fn(Token) -> bool| {
            window
                .iter()
                .enumerate()
                .rev()
                .find(|&(i, &t)| i + 1 >= min && pred(t))
                .map(|(i, _)| i + 1)
        };

        last_match(&|t| self.config.break_tokens.contains(&t))
            .or_else(|| {
                self.config
                    .space_token
                    .and_then(|space| last_match(&|t| t == space))
            })
            .unwrap_or(window.len())
    }
}

impl SegmentationStrategy for PunctuationSegmentation {
    fn segment(&self, tokens: &[Token], max_len: usize) -> Vec<Vec<Token>> {
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < tokens.len() {
            let (min, max) = self.bounds(chunks.len(), max_len);
            let end = (start + max).min(tokens.len());
            if end == tokens.len() {
                chunks.push(tokens[start..end].to_vec());
                break;
            }

            let split = start + self.cut_point(&tokens[start..end], min);
            chunks.push(tokens[start..split].to_vec());
            start = split;
        }

        chunks
    }
}

/// Clip an unsegmented token sequence to `max_len`.
pub fn truncate(mut tokens: Vec<Token>, max_len: usize) -> Vec<Token> {
    if tokens.len() > max_len {
        log::warn!(
            "Unsegmented input has {} tokens, truncating to {}",
            tokens.len(),
            max_len
        );
        tokens.truncate(max_len);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize, word_len: usize) -> Vec<Token> {
        let mut out = Vec::new();
        for i in 0..n {
            if i > 0 {
                out.push(KOKORO_SPACE_TOKEN);
            }
            out.extend(std::iter::repeat(43).take(word_len));
        }
        out
    }

    #[test]
    fn short_input_is_a_single_chunk() {
        let seg = PunctuationSegmentation::default();
        let tokens = words(3, 4);
        assert_eq!(seg.segment(&tokens, 510), vec![tokens]);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let seg = PunctuationSegmentation::default();
        assert!(seg.segment(&[], 510).is_empty());
    }

    #[test]
    fn prefers_punctuation_over_spaces() {
        let config = SegmentationConfigBuilder::default()
            .min_first_len(2usize)
            .max_first_len(10usize)
            .build()
            .unwrap();
        let seg = PunctuationSegmentation::new(config);
        // "aaa, aaa aaa aaa"
        let tokens = vec![43, 43, 43, 3, 16, 43, 43, 43, 16, 43, 43, 43, 16, 43, 43, 43];
        let chunks = seg.segment(&tokens, 510);
        assert_eq!(chunks[0], vec![43, 43, 43, 3]);
        assert_eq!(chunks.concat(), tokens);
    }

    #[test]
    fn falls_back_to_space_then_hard_cut() {
        let config = SegmentationConfigBuilder::default()
            .min_first_len(1usize)
            .max_first_len(6usize)
            .max_second_len(4usize)
            .build()
            .unwrap();
        let seg = PunctuationSegmentation::new(config);
        let tokens = vec![43, 43, 16, 43, 43, 43, 43, 43, 43, 43, 43];
        let chunks = seg.segment(&tokens, 510);
        assert_eq!(chunks[0], vec![43, 43, 16]);
        assert_eq!(chunks[1], vec![43, 43, 43, 43]);
        assert_eq!(chunks.concat(), tokens);
    }

    #[test]
    fn every_chunk_respects_the_model_limit() {
        let seg = PunctuationSegmentation::default();
        let tokens = words(400, 5);
        let chunks = seg.segment(&tokens, 120);
        assert!(chunks.len() > 3);
        assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= 120));
        assert!(chunks[0].len() <= 100);
        assert_eq!(chunks.concat(), tokens);
    }

    #[test]
    fn truncate_clips_to_limit() {
        assert_eq!(truncate(vec![1, 2, 3, 4], 2), vec![1, 2]);
        assert_eq!(truncate(vec![1, 2], 5), vec![1, 2]);
    }
}
