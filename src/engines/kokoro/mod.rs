//! Kokoro-82M text-to-speech engine.
//!
//! [`KokoroModel`] is an [`InferenceBackend`](crate::InferenceBackend) and
//! [`KokoroTokenizer`] a [`Tokenizer`](crate::Tokenizer), so a loaded model can
//! drive a [`SynthesisOrchestrator`](crate::SynthesisOrchestrator). Text is
//! phonemized with espeak-ng; 9 languages are supported.
//!
//! # System Requirements
//!
//! **espeak-ng** must be installed on your system:
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: Download installer from <https://espeak-ng.org/download>
//!
//! # Model Directory Layout
//!
//! ```text
//! models/kokoro/
//! ├── kokoro-quant-convinteger.onnx   # 8-bit quantized model (88MB, CPU-optimized)
//! └── voices-v1.0.bin                  # Voice data archive (.npz format)
//! ```
//!
//! Download links:
//! - Model: <https://github.com/taylorchu/kokoro-onnx/releases/tag/v0.2.0>
//! - Voices: <https://github.com/thewh1teagle/kokoro-onnx/releases/tag/model-files-v1.0>
//!
//! # Language Support
//!
//! | Voice prefix | Language | espeak-ng code | Notes |
//! |---|---|---|---|
//! | `af_`, `am_` | American English | `en-us` | Full support |
//! | `bf_`, `bm_` | British English | `en-gb` | Full support |
//! | `ef_`, `em_` | Spanish | `es` | Full support |
//! | `ff_` | French | `fr` | Full support |
//! | `hf_`, `hm_` | Hindi | `hi` | Full support |
//! | `if_`, `im_` | Italian | `it` | Full support |
//! | `jf_`, `jm_` | Japanese | `ja` | Functional via espeak-ng CJK |
//! | `pf_`, `pm_` | Brazilian Portuguese | `pt-br` | Full support |
//! | `zf_`, `zm_` | Mandarin Chinese | `cmn` | Functional via espeak-ng CJK |
//!
//! # Voice Naming Convention
//!
//! Voices follow the pattern `{language_prefix}_{name}`, e.g.:
//! - `af_heart`: American English female "heart"
//! - `bf_emma`: British English female "emma"
//! - `jf_alpha`: Japanese female "alpha"
//! - `zf_xiaobei`: Mandarin Chinese female "xiaobei"
//!
//! # Examples
//!
//! ## Offline Synthesis
//!
//! ```rust,no_run
//! use kokoro_speak::{SynthesisEngine, engines::kokoro::{KokoroEngine, KokoroInferenceParams}};
//! use std::path::PathBuf;
//!
//! let mut engine = KokoroEngine::new();
//! engine.load_model(&PathBuf::from("models/kokoro"))?;
//!
//! let params = KokoroInferenceParams {
//!     voice: "bf_emma".to_string(),
//!     speed: 0.9,
//!     ..Default::default()
//! };
//! engine.synthesize_to_file("Hello from British Emma!", &PathBuf::from("out.wav"), Some(params))?;
//! # Ok::<(), kokoro_speak::SynthesisError>(())
//! ```
//!
//! ## Streaming Playback
//!
//! ```rust,no_run
//! use std::path::{Path, PathBuf};
//! use std::sync::Arc;
//! use kokoro_speak::engines::kokoro::KokoroEngine;
//! use kokoro_speak::playback::{ClockedPlaybackQueue, WavRecorder};
//! use kokoro_speak::{OrchestratorConfig, SynthesisEngine};
//!
//! let mut engine = KokoroEngine::new();
//! engine.load_model(&PathBuf::from("models/kokoro"))?;
//!
//! let output = WavRecorder::create(Path::new("heard.wav"), 24000)?;
//! let playback = Arc::new(ClockedPlaybackQueue::new(output, 24000)?);
//! let tts = engine.orchestrator(playback, OrchestratorConfig::default())?;
//!
//! let handle = tts.speak_fast("First sentence. Second one, a bit longer.", "af_heart", None)?;
//! handle.events().progressed.subscribe(|p| println!("heard so far: {}", p.best_guess_text));
//! # Ok::<(), kokoro_speak::SynthesisError>(())
//! ```

mod engine;
mod error;
mod model;
mod phonemizer;
mod tokenizer;
mod vocab;
mod voices;

pub use engine::{KokoroEngine, KokoroInferenceParams, KokoroModelParams};
pub use error::KokoroError;
pub use model::{KokoroModel, MAX_PHONEME_LEN, SAMPLE_RATE};
pub use phonemizer::{voice_lang, EspeakConfig};
pub use tokenizer::KokoroTokenizer;
pub use vocab::Vocab;
pub use voices::{VoiceStore, STYLE_DIM};
