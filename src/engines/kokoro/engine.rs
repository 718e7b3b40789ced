use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::playback::PlaybackQueue;
use crate::synthesis::Tokenizer;
use crate::{
    OrchestratorConfig, SynthesisEngine, SynthesisError, SynthesisOrchestrator, SynthesisResult,
};

use super::error::KokoroError;
use super::model::{KokoroModel, SAMPLE_RATE};
use super::phonemizer::{voice_lang, EspeakConfig};
use super::tokenizer::KokoroTokenizer;

/// Parameters for configuring Kokoro model loading.
#[derive(Debug, Clone, Default)]
pub struct KokoroModelParams {
    /// CPU threads for inference. `None` uses the ORT default.
    pub num_threads: Option<usize>,
    /// Where to cache the Level3-optimized ONNX graph.
    ///
    /// The first load writes it, later loads skip the 5–10 s optimization.
    /// Must be writable; bundled resource directories often are not.
    pub optimized_model_cache_path: Option<PathBuf>,
}

/// Parameters for one offline synthesis call.
#[derive(Debug, Clone)]
pub struct KokoroInferenceParams {
    /// Voice name (e.g. `"af_heart"`, `"bf_emma"`, `"jf_alpha"`).
    pub voice: String,
    /// Speech speed multiplier. Range: 0.5–2.0, default 1.0.
    pub speed: f32,
    /// Override the style vector index. `None` = auto (uses phoneme token count).
    pub style_index: Option<usize>,
}

impl Default for KokoroInferenceParams {
    fn default() -> Self {
        Self {
            voice: "af_heart".to_string(),
            speed: 1.0,
            style_index: None,
        }
    }
}

/// Kokoro text-to-speech engine.
///
/// Loads the model and either synthesizes whole texts offline through
/// [`SynthesisEngine`], or hands the model to a streaming
/// [`SynthesisOrchestrator`] via [`orchestrator`](Self::orchestrator).
///
/// ```rust,no_run
/// use kokoro_speak::engines::kokoro::KokoroEngine;
/// use std::path::PathBuf;
///
/// // Point to a bundled espeak-ng binary and data directory
/// let engine = KokoroEngine::with_espeak(
///     Some(PathBuf::from("/app/resources/espeak-ng/espeak-ng")),
///     Some(PathBuf::from("/app/resources/espeak-ng-data")),
/// );
/// ```
pub struct KokoroEngine {
    model: Option<KokoroModel>,
    espeak: EspeakConfig,
}

impl Default for KokoroEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl KokoroEngine {
    /// Create a new engine that uses `espeak-ng` from PATH.
    pub fn new() -> Self {
        Self::with_espeak(None, None)
    }

    /// Use a bundled espeak-ng. Either path may be `None` for the system default.
    pub fn with_espeak(bin_path: Option<PathBuf>, data_path: Option<PathBuf>) -> Self {
        Self {
            model: None,
            espeak: EspeakConfig { bin_path, data_path },
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// List all available voice names (requires model to be loaded).
    pub fn list_voices(&self) -> Vec<&str> {
        self.model
            .as_ref()
            .map(KokoroModel::list_voices)
            .unwrap_or_default()
    }

    /// Tokenizer matching the loaded model's vocabulary.
    pub fn tokenizer(&self) -> Result<KokoroTokenizer, KokoroError> {
        let model = self.model.as_ref().ok_or(KokoroError::ModelNotLoaded)?;
        Ok(KokoroTokenizer::new(model.vocab().clone(), self.espeak.clone()))
    }

    /// Move the loaded model into a streaming orchestrator.
    ///
    /// The engine is left unloaded; call `load_model` again to synthesize offline.
    pub fn orchestrator(
        &mut self,
        playback: Arc<dyn PlaybackQueue>,
        config: OrchestratorConfig,
    ) -> Result<SynthesisOrchestrator, SynthesisError> {
        let tokenizer: Arc<dyn Tokenizer> = Arc::new(self.tokenizer()?);
        let model = self.model.take().ok_or(KokoroError::ModelNotLoaded)?;
        SynthesisOrchestrator::new(model, tokenizer, playback, config)
    }
}

impl SynthesisEngine for KokoroEngine {
    type SynthesisParams = KokoroInferenceParams;
    type ModelParams = KokoroModelParams;

    fn load_model_with_params(
        &mut self,
        model_path: &Path,
        params: Self::ModelParams,
    ) -> Result<(), SynthesisError> {
        let model = KokoroModel::load(
            model_path,
            params.num_threads,
            params.optimized_model_cache_path.as_deref(),
        )?;
        self.model = Some(model);
        Ok(())
    }

    fn unload_model(&mut self) {
        self.model = None;
    }

    fn synthesize(
        &mut self,
        text: &str,
        params: Option<Self::SynthesisParams>,
    ) -> Result<SynthesisResult, SynthesisError> {
        let p = params.unwrap_or_default();
        let tokenizer = self.tokenizer()?;
        let model = self.model.as_mut().ok_or(KokoroError::ModelNotLoaded)?;
        // Fail before spawning espeak-ng for a voice that cannot be rendered.
        if !model.has_voice(&p.voice) {
            return Err(KokoroError::VoiceNotFound(p.voice).into());
        }

        let ids = tokenizer.tokenize(text, voice_lang(&p.voice))?;
        if ids.is_empty() {
            log::warn!("No phoneme tokens produced for text: {text:?}");
        }
        let samples = model.synthesize_tokens(&ids, &p.voice, p.speed, p.style_index)?;
        Ok(SynthesisResult {
            samples,
            sample_rate: SAMPLE_RATE,
        })
    }
}
