use std::path::Path;

use derive_builder::Builder;
use serde::Deserialize;

use crate::synthesis::segmentation::SegmentationConfig;
use crate::SynthesisError;

/// Settings for a [`SynthesisOrchestrator`](crate::SynthesisOrchestrator).
///
/// ```
/// use kokoro_speak::OrchestratorConfigBuilder;
///
/// let config = OrchestratorConfigBuilder::default()
///     .speed(1.2_f32)
///     .nice_audio(false)
///     .build()?;
/// assert_eq!(config.speed, 1.2);
/// # Ok::<(), kokoro_speak::SynthesisError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Builder, Deserialize)]
#[builder(default, setter(into), build_fn(error = "crate::SynthesisError"))]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Speech speed multiplier passed to the model. Range: 0.5–2.0.
    pub speed: f32,
    /// Cap on tokens per chunk. `None` uses the model limit; larger values are
    /// clamped to it.
    pub max_tokens: Option<usize>,
    /// Segmentation used by `speak_fast` when no strategy is given.
    pub segmentation: SegmentationConfig,
    /// Smooth buffer edges during playback.
    pub nice_audio: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            max_tokens: None,
            segmentation: SegmentationConfig::default(),
            nice_audio: true,
        }
    }
}

impl OrchestratorConfig {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, SynthesisError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, SynthesisError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| SynthesisError::Config(format!("Failed to parse JSON: {e}")))?;
        if !(config.speed > 0.0) {
            return Err(SynthesisError::Config(format!(
                "speed must be positive, got {}",
                config.speed
            )));
        }
        Ok(config)
    }

    /// Chunk limit for a model that accepts at most `model_limit` tokens.
    pub fn effective_max_tokens(&self, model_limit: usize) -> usize {
        self.max_tokens
            .map_or(model_limit, |n| n.min(model_limit))
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_json_with_defaults() {
        let config = OrchestratorConfig::from_json_str(
            r#"{ "speed": 0.9, "segmentation": { "max_first_len": 40 } }"#,
        )
        .unwrap();
        assert_eq!(config.speed, 0.9);
        assert!(config.nice_audio);
        assert_eq!(config.segmentation.max_first_len, 40);
        assert_eq!(config.segmentation.min_followup_len, 200);
    }

    #[test]
    fn rejects_non_positive_speed() {
        assert!(matches!(
            OrchestratorConfig::from_json_str(r#"{ "speed": 0 }"#),
            Err(SynthesisError::Config(_))
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(OrchestratorConfig::from_json_str("{ speed").is_err());
    }

    #[test]
    fn max_tokens_is_clamped_to_model_limit() {
        let config = OrchestratorConfigBuilder::default()
            .max_tokens(Some(1000_usize))
            .build()
            .unwrap();
        assert_eq!(config.effective_max_tokens(510), 510);
        assert_eq!(OrchestratorConfig::default().effective_max_tokens(510), 510);
        let small = OrchestratorConfigBuilder::default()
            .max_tokens(Some(64_usize))
            .build()
            .unwrap();
        assert_eq!(small.effective_max_tokens(510), 64);
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speak.json");
        std::fs::write(&path, r#"{ "nice_audio": false }"#).unwrap();
        let config = OrchestratorConfig::from_json_file(&path).unwrap();
        assert!(!config.nice_audio);
        assert_eq!(config.speed, 1.0);
    }
}
