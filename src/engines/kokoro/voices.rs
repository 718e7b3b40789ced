use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::error::KokoroError;

/// Style vector dimension for Kokoro.
pub const STYLE_DIM: usize = 256;

pub type Style = [f32; STYLE_DIM];

/// Style vectors per voice, indexed by token count.
pub struct VoiceStore {
    voices: HashMap<String, Vec<Style>>,
}

impl VoiceStore {
    /// Load every `<voice>.npy` entry of a `.npz` archive such as `voices-v1.0.bin`.
    pub fn load(path: &Path) -> Result<Self, KokoroError> {
        let mut archive = zip::ZipArchive::new(File::open(path)?)
            .map_err(|e| KokoroError::VoiceParse(format!("Failed to open zip archive: {e}")))?;

        let mut voices = HashMap::new();
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| KokoroError::VoiceParse(format!("Zip entry {i}: {e}")))?;
            if entry.is_dir() {
                continue;
            }
            let entry_name = entry.name().to_string();
            let Some(voice) = entry_name.strip_suffix(".npy").filter(|v| !v.is_empty()) else {
                log::debug!("Skipping non-voice entry {entry_name}");
                continue;
            };
            let voice = voice.to_string();

            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            voices.insert(voice, parse_npy(&data, &entry_name)?);
        }

        log::info!("Loaded {} voices", voices.len());
        Ok(Self { voices })
    }

    /// Style for `voice` at `index`, clamped to the last available vector.
    pub fn style(&self, voice: &str, index: usize) -> Result<&Style, KokoroError> {
        self.voices
            .get(voice)
            .and_then(|styles| styles.get(index.min(styles.len().saturating_sub(1))))
            .ok_or_else(|| KokoroError::VoiceNotFound(voice.to_string()))
    }

    pub fn contains(&self, voice: &str) -> bool {
        self.voices.contains_key(voice)
    }

    /// Voice names in sorted order.
    pub fn list_voices(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.voices.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Parse a little-endian float32 `.npy` array of shape `[N, 256]`.
fn parse_npy(data: &[u8], name: &str) -> Result<Vec<Style>, KokoroError> {
    let bad = |msg: String| KokoroError::VoiceParse(format!("{name}: {msg}"));

    if data.len() < 10 || &data[..6] != b"\x93NUMPY" {
        return Err(bad("not a numpy array".to_string()));
    }
    // Version 1.0 header: magic, major, minor, then a u16 header length.
    let header_len = u16::from_le_bytes([data[8], data[9]]) as usize;
    let body = data
        .get(10 + header_len..)
        .ok_or_else(|| bad(format!("header truncated ({} bytes)", data.len())))?;

    const ROW_BYTES: usize = STYLE_DIM * 4;
    if body.len() % ROW_BYTES != 0 {
        return Err(bad(format!(
            "{} data bytes do not form rows of {STYLE_DIM} floats",
            body.len()
        )));
    }

    Ok(body
        .chunks_exact(ROW_BYTES)
        .map(|row| {
            let mut style = [0f32; STYLE_DIM];
            for (value, bytes) in style.iter_mut().zip(row.chunks_exact(4)) {
                *value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            }
            style
        })
        .collect())
}
