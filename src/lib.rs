//! # kokoro-speak
//!
//! Streaming text-to-speech orchestration on top of the Kokoro engine.
//!
//! ## Features
//!
//! - **Low-latency speech**: text is cut into short first segments so audio
//!   starts while the rest is still being synthesized
//! - **Gap-free playback**: inferred segments play back-to-back in order
//! - **Spoken-text tracking**: start, progress, completion and cancelation
//!   events report which phonemes (and roughly which text) were heard
//! - **Kokoro TTS** (feature `kokoro`): ONNX inference with espeak-ng
//!   phonemization for 9 languages
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! kokoro-speak = { version = "2026.10", features = ["kokoro"] }
//! ```
//!
//! ```ignore
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use kokoro_speak::engines::kokoro::KokoroEngine;
//! use kokoro_speak::playback::{ClockedPlaybackQueue, NullOutput};
//! use kokoro_speak::{OrchestratorConfig, SynthesisEngine};
//!
//! let mut engine = KokoroEngine::new();
//! engine.load_model(&PathBuf::from("models/kokoro"))?;
//!
//! let playback = Arc::new(ClockedPlaybackQueue::new(NullOutput, 24000)?);
//! let tts = engine.orchestrator(playback, OrchestratorConfig::default())?;
//! tts.events().completed.subscribe(|p| println!("said: {}", p.text));
//! tts.speak_fast("Hello, world! How are you today?", "af_heart", None)?;
//! # Ok::<(), kokoro_speak::SynthesisError>(())
//! ```

pub mod config;
pub mod engines;
mod error;
pub mod playback;
pub mod synthesis;

use std::path::Path;

pub use config::{OrchestratorConfig, OrchestratorConfigBuilder};
pub use error::SynthesisError;
pub use synthesis::{
    CancelationPacket, CompletionPacket, InferenceBackend, ProgressPacket, SegmentationStrategy,
    SpeechEvents, StartPacket, SynthesisHandle, SynthesisOrchestrator, Token, Tokenizer,
};

/// The result of a synthesis (text-to-speech) operation.
///
/// Contains raw f32 audio samples and the sample rate of the output audio.
#[derive(Debug)]
pub struct SynthesisResult {
    /// Raw audio samples as f32 values
    pub samples: Vec<f32>,
    /// Sample rate of the audio (24000 for Kokoro)
    pub sample_rate: u32,
}

impl SynthesisResult {
    /// Write the audio to a 32-bit float WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), SynthesisError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Offline, whole-text synthesis.
///
/// For streaming playback with progress events use [`SynthesisOrchestrator`].
pub trait SynthesisEngine {
    /// Parameters for configuring inference behavior (voice, speed, etc.)
    type SynthesisParams;
    /// Parameters for configuring model loading (threads, etc.)
    type ModelParams: Default;

    /// Load a model from the specified path using default parameters.
    fn load_model(&mut self, model_path: &Path) -> Result<(), SynthesisError> {
        self.load_model_with_params(model_path, Self::ModelParams::default())
    }

    fn load_model_with_params(
        &mut self,
        model_path: &Path,
        params: Self::ModelParams,
    ) -> Result<(), SynthesisError>;

    fn unload_model(&mut self);

    /// Synthesize `text` into a single buffer.
    fn synthesize(
        &mut self,
        text: &str,
        params: Option<Self::SynthesisParams>,
    ) -> Result<SynthesisResult, SynthesisError>;

    /// Synthesize `text` and write it to a WAV file.
    fn synthesize_to_file(
        &mut self,
        text: &str,
        wav_path: &Path,
        params: Option<Self::SynthesisParams>,
    ) -> Result<(), SynthesisError> {
        self.synthesize(text, params)?.write_wav(wav_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let result = SynthesisResult {
            samples: vec![0.0, 0.25, -0.25, 0.5],
            sample_rate: 24000,
        };
        result.write_wav(&path).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_format, hound::SampleFormat::Float);
        assert_eq!(reader.len(), 4);
        assert!((result.duration_secs() - 4.0 / 24000.0).abs() < 1e-12);
    }
}
