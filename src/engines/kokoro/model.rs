use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayView2};
use ort::execution_providers::CPUExecutionProvider;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use super::error::KokoroError;
use super::vocab::Vocab;
use super::voices::{Style, VoiceStore, STYLE_DIM};
use crate::synthesis::segmentation::{PunctuationSegmentation, SegmentationConfig};
use crate::synthesis::{InferenceBackend, SegmentationStrategy, Token};
use crate::SynthesisError;

/// Maximum number of phoneme tokens per chunk (before padding).
pub const MAX_PHONEME_LEN: usize = 510;

/// Output sample rate from the Kokoro model.
pub const SAMPLE_RATE: u32 = 24000;

/// Crossfade (in samples) used when concatenating chunk audio.
const CHUNK_CROSSFADE_SAMPLES: usize = 240; // 10ms @ 24kHz

/// Loaded Kokoro ONNX session with its voices and vocabulary.
pub struct KokoroModel {
    session: Session,
    voices: VoiceStore,
    vocab: Vocab,
    /// "input_ids" or "tokens", depending on the export.
    tokens_input: String,
    speed_is_int32: bool,
}

impl KokoroModel {
    /// Load the Kokoro model from a directory.
    ///
    /// The directory must contain:
    /// - An `.onnx` file (preferably `kokoro-quant-convinteger.onnx`)
    /// - A `voices-v1.0.bin` voice archive
    /// - Optionally a `config.json` for vocabulary (falls back to the built-in one)
    pub fn load(
        model_dir: &Path,
        num_threads: Option<usize>,
        optimized_cache_path: Option<&Path>,
    ) -> Result<Self, KokoroError> {
        let onnx_path = find_onnx_file(model_dir)?;
        log::info!("Loading Kokoro model from {}", onnx_path.display());

        let session = init_session(&onnx_path, num_threads, optimized_cache_path)?;
        let tokens_input = detect_tokens_input(&session);
        let speed_is_int32 = detect_speed_is_int32(&session);
        log::info!("Detected: tokens_input='{tokens_input}', speed_is_int32={speed_is_int32}");

        let voices_path = model_dir.join("voices-v1.0.bin");
        if !voices_path.exists() {
            return Err(KokoroError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Voice file not found at {}", voices_path.display()),
            )));
        }
        let voices = VoiceStore::load(&voices_path)?;

        let config_path = model_dir.join("config.json");
        let vocab = if config_path.exists() {
            Vocab::from_config_file(&config_path)?
        } else {
            log::warn!("config.json not found, using built-in vocab");
            Vocab::builtin()
        };

        Ok(Self {
            session,
            voices,
            vocab,
            tokens_input,
            speed_is_int32,
        })
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn list_voices(&self) -> Vec<&str> {
        self.voices.list_voices()
    }

    pub fn has_voice(&self, voice: &str) -> bool {
        self.voices.contains(voice)
    }

    /// Synthesize a whole token sequence into one buffer.
    ///
    /// Long input is cut at punctuation into model-sized chunks whose audio is
    /// crossfaded together. All chunks share one style vector so prosody does
    /// not shift at chunk boundaries.
    pub fn synthesize_tokens(
        &mut self,
        ids: &[Token],
        voice: &str,
        speed: f32,
        style_index: Option<usize>,
    ) -> Result<Vec<f32>, KokoroError> {
        let style = *self.voices.style(voice, style_index.unwrap_or(ids.len()))?;
        let chunks = long_form_segmentation().segment(ids, MAX_PHONEME_LEN);
        if chunks.len() > 1 {
            log::debug!("Synthesizing {} tokens in {} chunks", ids.len(), chunks.len());
        }

        let mut combined = Vec::with_capacity(ids.len() * 300);
        for chunk in &chunks {
            let audio = self.run(chunk, &style, speed)?;
            append_with_crossfade(&mut combined, &audio, CHUNK_CROSSFADE_SAMPLES);
        }
        Ok(combined)
    }

    /// One ONNX pass over at most [`MAX_PHONEME_LEN`] tokens.
    fn run(
        &mut self,
        tokens: &[Token],
        style: &Style,
        speed: f32,
    ) -> Result<Vec<f32>, KokoroError> {
        // The model expects a 0 pad on both ends.
        let mut padded = Vec::with_capacity(tokens.len() + 2);
        padded.push(0);
        padded.extend_from_slice(tokens);
        padded.push(0);
        let tokens_arr = Array2::from_shape_vec((1, padded.len()), padded)?;
        let style_view = ArrayView2::from_shape((1, STYLE_DIM), style.as_slice())?;

        let tokens_name = self.tokens_input.as_str();
        let output = if self.speed_is_int32 {
            let speed_arr = ndarray::arr1(&[speed.round() as i32]);
            self.session.run(inputs![
                tokens_name => TensorRef::from_array_view(tokens_arr.view())?,
                "style" => TensorRef::from_array_view(style_view)?,
                "speed" => TensorRef::from_array_view(speed_arr.view())?,
            ])?
        } else {
            let speed_arr = ndarray::arr1(&[speed]);
            self.session.run(inputs![
                tokens_name => TensorRef::from_array_view(tokens_arr.view())?,
                "style" => TensorRef::from_array_view(style_view)?,
                "speed" => TensorRef::from_array_view(speed_arr.view())?,
            ])?
        };

        let (_, waveform) = output
            .iter()
            .next()
            .ok_or_else(|| KokoroError::Ort(ort::Error::new("No output from model")))?;
        let waveform = waveform.try_extract_array::<f32>()?;
        Ok(waveform.iter().copied().collect())
    }
}

impl InferenceBackend for KokoroModel {
    fn infer(
        &mut self,
        tokens: &[Token],
        voice: &str,
        speed: f32,
    ) -> Result<Vec<f32>, SynthesisError> {
        let style = *self.voices.style(voice, tokens.len())?;
        Ok(self.run(tokens, &style, speed)?)
    }

    fn max_tokens(&self) -> usize {
        MAX_PHONEME_LEN
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// Chunks as long as the model allows, cut at the last punctuation in range.
fn long_form_segmentation() -> PunctuationSegmentation {
    PunctuationSegmentation::new(SegmentationConfig {
        min_first_len: 1,
        max_first_len: MAX_PHONEME_LEN,
        max_second_len: MAX_PHONEME_LEN,
        min_followup_len: 1,
        ..SegmentationConfig::default()
    })
}

/// Prefers `kokoro-quant-convinteger.onnx`, then the first `.onnx` file found.
fn find_onnx_file(model_dir: &Path) -> Result<PathBuf, KokoroError> {
    let preferred = model_dir.join("kokoro-quant-convinteger.onnx");
    if preferred.exists() {
        return Ok(preferred);
    }
    for entry in std::fs::read_dir(model_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("onnx") {
            log::info!("Using ONNX file: {}", path.display());
            return Ok(path);
        }
    }
    Err(KokoroError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("No .onnx file found in {}", model_dir.display()),
    )))
}

/// Build the ONNX session, caching the Level3-optimized graph on disk.
///
/// With a cache path, the first load optimizes and writes the graph there and
/// later loads read it back with optimization disabled.
fn init_session(
    onnx_path: &Path,
    num_threads: Option<usize>,
    optimized_cache_path: Option<&Path>,
) -> Result<Session, KokoroError> {
    let cached = optimized_cache_path.filter(|p| p.exists());
    let (load_path, level) = match cached {
        Some(cache) => {
            log::info!("Loading pre-optimized Kokoro graph from {}", cache.display());
            (cache, GraphOptimizationLevel::Disable)
        }
        None => (onnx_path, GraphOptimizationLevel::Level3),
    };

    let mut builder = Session::builder()?
        .with_optimization_level(level)?
        .with_execution_providers([CPUExecutionProvider::default().build()])?
        .with_parallel_execution(true)?;

    if let (None, Some(cache)) = (cached, optimized_cache_path) {
        log::info!("First load: saving optimized graph to {}", cache.display());
        builder = builder.with_optimized_model_path(cache)?;
    }
    if let Some(threads) = num_threads {
        builder = builder
            .with_intra_threads(threads)?
            .with_inter_threads(threads)?;
    }

    Ok(builder.commit_from_file(load_path)?)
}

fn detect_tokens_input(session: &Session) -> String {
    session
        .inputs()
        .iter()
        .map(|input| input.name())
        .find(|name| *name == "input_ids" || *name == "tokens")
        .unwrap_or("input_ids")
        .to_string()
}

/// Most Kokoro exports take an int32 speed; some take float32.
fn detect_speed_is_int32(session: &Session) -> bool {
    session
        .inputs()
        .iter()
        .find(|input| input.name() == "speed")
        .map(|input| format!("{:?}", input.dtype()).to_lowercase().contains("int32"))
        .unwrap_or(true)
}

fn append_with_crossfade(dst: &mut Vec<f32>, src: &[f32], crossfade_samples: usize) {
    let overlap = crossfade_samples.min(dst.len()).min(src.len());
    let start = dst.len() - overlap;
    for (i, (d, s)) in dst[start..].iter_mut().zip(src).enumerate() {
        let t = (i + 1) as f32 / (overlap as f32 + 1.0);
        *d = *d * (1.0 - t) + s * t;
    }
    dst.extend_from_slice(&src[overlap..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossfade_blends_the_overlap() {
        let mut dst = vec![1.0; 4];
        append_with_crossfade(&mut dst, &[0.0; 4], 3);
        assert_eq!(dst.len(), 5);
        assert_eq!(dst[0], 1.0);
        assert!((dst[1] - 0.75).abs() < 1e-6);
        assert!((dst[3] - 0.25).abs() < 1e-6);
        assert_eq!(dst[4], 0.0);
    }

    #[test]
    fn crossfade_into_empty_buffer_copies() {
        let mut dst = Vec::new();
        append_with_crossfade(&mut dst, &[0.5, 0.5], 240);
        assert_eq!(dst, vec![0.5, 0.5]);
    }

    #[test]
    fn long_form_chunks_fill_the_model_limit() {
        let mut ids = vec![43; 700];
        ids[400] = 4;
        let chunks = long_form_segmentation().segment(&ids, MAX_PHONEME_LEN);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 401);
        assert_eq!(chunks.concat(), ids);
    }
}
