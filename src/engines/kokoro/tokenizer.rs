use super::phonemizer::{phonemize, voice_lang, EspeakConfig};
use super::vocab::Vocab;
use crate::synthesis::{Token, Tokenizer};
use crate::SynthesisError;

/// espeak-ng phonemization against the Kokoro vocabulary.
#[derive(Debug, Clone)]
pub struct KokoroTokenizer {
    vocab: Vocab,
    espeak: EspeakConfig,
}

impl KokoroTokenizer {
    pub fn new(vocab: Vocab, espeak: EspeakConfig) -> Self {
        Self { vocab, espeak }
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }
}

impl Tokenizer for KokoroTokenizer {
    fn tokenize(&self, text: &str, language: &str) -> Result<Vec<Token>, SynthesisError> {
        Ok(phonemize(text, language, &self.vocab, &self.espeak)?)
    }

    fn token_char(&self, token: Token) -> Option<char> {
        self.vocab.char_for(token)
    }

    fn language_for(&self, voice: &str) -> String {
        voice_lang(voice).to_string()
    }
}
