/// Errors raised by the orchestration layer.
///
/// Only request setup can fail synchronously (tokenization, configuration,
/// use after disposal). Inference and playback failures are reported through
/// the dispatcher's log and end the affected job.
#[derive(thiserror::Error, Debug)]
pub enum SynthesisError {
    #[error("Tokenization failed: {0}")]
    Tokenizer(String),
    #[error("Inference backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Synthesizer was disposed")]
    Disposed,
}

impl From<derive_builder::UninitializedFieldError> for SynthesisError {
    fn from(e: derive_builder::UninitializedFieldError) -> Self {
        SynthesisError::Config(e.to_string())
    }
}
