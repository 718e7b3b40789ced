use std::collections::HashMap;
use std::path::Path;

use super::error::KokoroError;
use crate::synthesis::Token;

/// Kokoro token vocabulary, usable in both directions.
///
/// Every id maps back to exactly one character, which is what lets the
/// orchestrator report phonemes one-to-one with tokens.
#[derive(Debug, Clone)]
pub struct Vocab {
    ids: HashMap<char, Token>,
    chars: HashMap<Token, char>,
}

impl Vocab {
    /// Read the `"vocab"` object of a Kokoro `config.json`.
    pub fn from_config_file(path: &Path) -> Result<Self, KokoroError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_config_json(&content)
    }

    pub fn from_config_json(content: &str) -> Result<Self, KokoroError> {
        let json: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| KokoroError::Config(format!("Failed to parse JSON: {e}")))?;
        let entries = json
            .get("vocab")
            .and_then(|v| v.as_object())
            .ok_or_else(|| KokoroError::Config("Missing 'vocab' object".to_string()))?;

        entries
            .iter()
            .map(|(key, value)| {
                let mut chars = key.chars();
                let (Some(ch), None) = (chars.next(), chars.next()) else {
                    return Err(KokoroError::Config(format!(
                        "vocab keys must be single characters, got {key:?}"
                    )));
                };
                let id = value.as_i64().ok_or_else(|| {
                    KokoroError::Config(format!("Non-integer vocab value for {key:?}"))
                })?;
                Ok((ch, id))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::from_pairs)
    }

    /// The v1.0 vocabulary, used when the model directory ships no config.json.
    pub fn builtin() -> Self {
        Self::from_pairs(BUILTIN.iter().copied())
    }

    fn from_pairs(pairs: impl IntoIterator<Item = (char, Token)>) -> Self {
        let ids: HashMap<char, Token> = pairs.into_iter().collect();
        let chars = ids.iter().map(|(&ch, &id)| (id, ch)).collect();
        Self { ids, chars }
    }

    pub fn id(&self, ch: char) -> Option<Token> {
        self.ids.get(&ch).copied()
    }

    pub fn char_for(&self, id: Token) -> Option<char> {
        self.chars.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Map IPA text to ids, skipping characters the model does not know.
    pub fn encode(&self, ipa: &str) -> Vec<Token> {
        ipa.chars().filter_map(|ch| self.id(ch)).collect()
    }
}

#[rustfmt::skip]
const BUILTIN: &[(char, Token)] = &[
    (';', 1), (':', 2), (',', 3), ('.', 4), ('!', 5), ('?', 6),
    ('—', 9), ('…', 10), ('"', 11), ('(', 12), (')', 13), ('\u{201c}', 14),
    ('\u{201d}', 15), (' ', 16), ('\u{0303}', 17), ('ʣ', 18), ('ʥ', 19), ('ʦ', 20),
    ('ʨ', 21), ('ᵝ', 22), ('ꭧ', 23), ('A', 24), ('I', 25), ('O', 31),
    ('Q', 33), ('S', 35), ('T', 36), ('W', 39), ('Y', 41), ('ᵊ', 42),
    ('a', 43), ('b', 44), ('c', 45), ('d', 46), ('e', 47), ('f', 48),
    ('h', 50), ('i', 51), ('j', 52), ('k', 53), ('l', 54), ('m', 55),
    ('n', 56), ('o', 57), ('p', 58), ('q', 59), ('r', 60), ('s', 61),
    ('t', 62), ('u', 63), ('v', 64), ('w', 65), ('x', 66), ('y', 67),
    ('z', 68), ('ɑ', 69), ('ɐ', 70), ('ɒ', 71), ('æ', 72), ('β', 75),
    ('ɔ', 76), ('ɕ', 77), ('ç', 78), ('ɖ', 80), ('ð', 81), ('ʤ', 82),
    ('ə', 83), ('ɚ', 85), ('ɛ', 86), ('ɜ', 87), ('ɟ', 90), ('ɡ', 92),
    ('ɥ', 99), ('ɨ', 101), ('ɪ', 102), ('ʝ', 103), ('ɯ', 110), ('ɰ', 111),
    ('ŋ', 112), ('ɳ', 113), ('ɲ', 114), ('ɴ', 115), ('ø', 116), ('ɸ', 118),
    ('θ', 119), ('œ', 120), ('ɹ', 123), ('ɾ', 125), ('ɻ', 126), ('ʁ', 128),
    ('ɽ', 129), ('ʂ', 130), ('ʃ', 131), ('ʈ', 132), ('ʧ', 133), ('ʊ', 135),
    ('ʋ', 136), ('ʌ', 138), ('ɣ', 139), ('ɤ', 140), ('χ', 142), ('ʎ', 143),
    ('ʒ', 147), ('ʔ', 148), ('ˈ', 156), ('ˌ', 157), ('ː', 158), ('ʰ', 162),
    ('ʲ', 164), ('↓', 169), ('→', 171), ('↗', 172), ('↘', 173), ('ᵻ', 177),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::segmentation::{KOKORO_BREAK_TOKENS, KOKORO_SPACE_TOKEN};

    #[test]
    fn builtin_ids_decode_back_to_their_characters() {
        let vocab = Vocab::builtin();
        assert_eq!(vocab.id('ə'), Some(83));
        assert_eq!(vocab.char_for(83), Some('ə'));
        assert_eq!(vocab.char_for(0), None);
        assert_eq!(vocab.encode("hə_"), vec![50, 83]);
    }

    #[test]
    fn segmentation_defaults_match_the_builtin_vocab() {
        let vocab = Vocab::builtin();
        let breaks: Vec<Token> = ";:,.!?".chars().filter_map(|c| vocab.id(c)).collect();
        assert_eq!(breaks, KOKORO_BREAK_TOKENS);
        assert_eq!(vocab.id(' '), Some(KOKORO_SPACE_TOKEN));
    }

    #[test]
    fn parses_config_json() {
        let vocab = Vocab::from_config_json(r#"{ "vocab": { "a": 43, ".": 4 } }"#).unwrap();
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.char_for(4), Some('.'));
    }

    #[test]
    fn rejects_multi_character_keys() {
        assert!(matches!(
            Vocab::from_config_json(r#"{ "vocab": { "ab": 1 } }"#),
            Err(KokoroError::Config(_))
        ));
    }
}
