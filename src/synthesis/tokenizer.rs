use crate::SynthesisError;

/// A token id in the model vocabulary. Each id maps back to one phoneme character.
pub type Token = i64;

/// Character used for token ids that have no entry in the vocabulary.
///
/// Keeps decoding one-to-one so phoneme counts always equal token counts.
pub const UNKNOWN_PHONEME: char = '\u{FFFD}';

/// Converts text into model tokens and tokens back into phoneme characters.
pub trait Tokenizer: Send + Sync {
    /// Tokenize `text` for the given phonemizer language code (e.g. `"en-us"`).
    fn tokenize(&self, text: &str, language: &str) -> Result<Vec<Token>, SynthesisError>;

    /// Display character for a single token id.
    fn token_char(&self, token: Token) -> Option<char>;

    /// Phonemizer language for a voice name.
    fn language_for(&self, _voice: &str) -> String {
        "en-us".to_string()
    }

    /// Decode a token slice into phonemes, one character per token.
    fn decode(&self, tokens: &[Token]) -> Vec<char> {
        tokens
            .iter()
            .map(|&t| self.token_char(t).unwrap_or(UNKNOWN_PHONEME))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ascii;

    impl Tokenizer for Ascii {
        fn tokenize(&self, text: &str, _language: &str) -> Result<Vec<Token>, SynthesisError> {
            Ok(text.chars().map(|c| c as Token).collect())
        }

        fn token_char(&self, token: Token) -> Option<char> {
            u8::try_from(token).ok().filter(u8::is_ascii).map(char::from)
        }
    }

    #[test]
    fn decode_keeps_one_phoneme_per_token() {
        let decoded = Ascii.decode(&[104, 105, 9999]);
        assert_eq!(decoded, vec!['h', 'i', UNKNOWN_PHONEME]);
    }

    #[test]
    fn default_language_is_american_english() {
        assert_eq!(Ascii.language_for("anything"), "en-us");
    }
}
