use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use super::error::KokoroError;
use super::vocab::Vocab;
use crate::synthesis::Token;

/// Where to find espeak-ng. Unset paths fall back to the system install.
#[derive(Debug, Clone, Default)]
pub struct EspeakConfig {
    /// espeak-ng executable. Defaults to `espeak-ng` on PATH.
    pub bin_path: Option<PathBuf>,
    /// espeak-ng-data directory, for bundled installs.
    pub data_path: Option<PathBuf>,
}

impl EspeakConfig {
    fn command(&self, lang: &str) -> Command {
        let mut cmd = match &self.bin_path {
            Some(bin) => Command::new(bin),
            None => Command::new("espeak-ng"),
        };
        if let Some(data) = &self.data_path {
            cmd.env("ESPEAK_DATA_PATH", data);
        }
        cmd.args(["--ipa", "--stdin", "-q", "-v", lang]);
        cmd
    }

    /// Run espeak-ng over `input`, one IPA line per input line.
    pub fn ipa(&self, input: &str, lang: &str) -> Result<String, KokoroError> {
        let mut child = self
            .command(lang)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => KokoroError::EspeakNotFound,
                _ => KokoroError::Io(e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // Stdin is line oriented: an unterminated last line loses its final phoneme.
            stdin.write_all(input.as_bytes())?;
            if !input.ends_with('\n') {
                stdin.write_all(b"\n")?;
            }
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(KokoroError::PhonemizerFailed(format!(
                "espeak-ng exited with code {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// espeak-ng language for a voice, from its two-letter prefix (`af_heart` → `en-us`).
pub fn voice_lang(voice: &str) -> &'static str {
    match voice.get(..2).unwrap_or_default() {
        "bf" | "bm" => "en-gb",
        "ef" | "em" => "es",
        "ff" => "fr",
        "hf" | "hm" => "hi",
        "if" | "im" => "it",
        "jf" | "jm" => "ja",
        "pf" | "pm" => "pt-br",
        "zf" | "zm" => "cmn",
        _ => "en-us",
    }
}

/// Piece of input text: either words for espeak-ng or a punctuation mark kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Fragment {
    Words(String),
    Mark(char),
}

/// Convert text to Kokoro token ids.
///
/// Punctuation is kept as its own token so it can steer segmentation;
/// everything between marks is phonemized in one espeak-ng call. IPA
/// characters missing from the vocabulary are dropped.
pub fn phonemize(
    text: &str,
    lang: &str,
    vocab: &Vocab,
    espeak: &EspeakConfig,
) -> Result<Vec<Token>, KokoroError> {
    let fragments = split_fragments(text);
    let words: Vec<&str> = fragments
        .iter()
        .filter_map(|f| match f {
            Fragment::Words(w) => Some(w.as_str()),
            Fragment::Mark(_) => None,
        })
        .collect();

    let phonemized = if words.is_empty() {
        Vec::new()
    } else {
        phonemize_lines(&words, lang, vocab, espeak)?
    };
    let mut phonemized = phonemized.into_iter();

    let mut ids = Vec::new();
    for fragment in &fragments {
        match fragment {
            Fragment::Words(_) => ids.extend(phonemized.next().unwrap_or_default()),
            Fragment::Mark(ch) => ids.extend(vocab.id(*ch)),
        }
    }
    Ok(ids)
}

fn phonemize_lines(
    lines: &[&str],
    lang: &str,
    vocab: &Vocab,
    espeak: &EspeakConfig,
) -> Result<Vec<Vec<Token>>, KokoroError> {
    let output = espeak.ipa(&lines.join("\n"), lang)?;
    let ipa: Vec<&str> = output.lines().collect();
    if ipa.len() == lines.len() {
        return Ok(ipa.iter().map(|line| ipa_ids(line, vocab)).collect());
    }

    log::debug!(
        "espeak-ng returned {} lines for {} inputs, phonemizing one by one",
        ipa.len(),
        lines.len()
    );
    lines
        .iter()
        .map(|line| Ok(ipa_ids(&espeak.ipa(line, lang)?, vocab)))
        .collect()
}

fn ipa_ids(ipa: &str, vocab: &Vocab) -> Vec<Token> {
    ipa.lines()
        .map(str::trim)
        .flat_map(|line| vocab.encode(line))
        .collect()
}

fn split_fragments(text: &str) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    let mut words = String::new();

    let flush = |words: &mut String, fragments: &mut Vec<Fragment>| {
        let trimmed = words.trim();
        if !trimmed.is_empty() {
            fragments.push(Fragment::Words(trimmed.to_string()));
        }
        words.clear();
    };

    for (idx, ch) in text.char_indices() {
        if let Some(mark) = boundary_mark(ch) {
            if !joins_digits(text, idx, ch) {
                flush(&mut words, &mut fragments);
                fragments.push(Fragment::Mark(mark));
                continue;
            }
        }
        if ch.is_whitespace() {
            if !words.is_empty() && !words.ends_with(' ') {
                words.push(' ');
            }
        } else {
            words.push(ch);
        }
    }
    flush(&mut words, &mut fragments);
    fragments
}

fn boundary_mark(ch: char) -> Option<char> {
    match ch {
        '.' | '!' | '?' | ',' | ';' | ':' | '—' | '…' | '"' | '(' | ')' | '\u{201c}'
        | '\u{201d}' => Some(ch),
        '\n' | '\r' => Some('.'),
        _ => None,
    }
}

/// `2.0` and `1,000` stay inside the number.
fn joins_digits(text: &str, idx: usize, ch: char) -> bool {
    if ch != '.' && ch != ',' {
        return false;
    }
    let before = text[..idx].chars().next_back();
    let after = text[idx + ch.len_utf8()..].chars().next();
    matches!(
        (before, after),
        (Some(b), Some(a)) if b.is_ascii_digit() && a.is_ascii_digit()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn espeak_available() -> bool {
        Command::new("espeak-ng").arg("--version").output().is_ok()
    }

    #[test]
    fn splits_words_and_marks() {
        assert_eq!(
            split_fragments("Hello, world. Testing!"),
            vec![
                Fragment::Words("Hello".to_string()),
                Fragment::Mark(','),
                Fragment::Words("world".to_string()),
                Fragment::Mark('.'),
                Fragment::Words("Testing".to_string()),
                Fragment::Mark('!'),
            ]
        );
    }

    #[test]
    fn number_separators_stay_inside_words() {
        assert_eq!(
            split_fragments("Version 2.0 reached 1,000 users.\nNext"),
            vec![
                Fragment::Words("Version 2.0 reached 1,000 users".to_string()),
                Fragment::Mark('.'),
                Fragment::Mark('.'),
                Fragment::Words("Next".to_string()),
            ]
        );
    }

    #[test]
    fn voice_prefix_selects_language() {
        assert_eq!(voice_lang("af_heart"), "en-us");
        assert_eq!(voice_lang("bf_emma"), "en-gb");
        assert_eq!(voice_lang("zf_xiaobei"), "cmn");
        assert_eq!(voice_lang("x"), "en-us");
    }

    #[test]
    fn marks_only_input_needs_no_espeak() {
        let vocab = Vocab::builtin();
        let missing = EspeakConfig {
            bin_path: Some(PathBuf::from("/nonexistent/espeak-ng")),
            data_path: None,
        };
        assert_eq!(phonemize("?!", "en-us", &vocab, &missing).unwrap(), vec![6, 5]);
        assert!(matches!(
            phonemize("Hi.", "en-us", &vocab, &missing),
            Err(KokoroError::EspeakNotFound)
        ));
    }

    #[test]
    fn keeps_final_phoneme_of_unterminated_input() {
        if !espeak_available() {
            return;
        }
        let vocab = Vocab::builtin();
        let ids = phonemize("America", "en-us", &vocab, &EspeakConfig::default()).unwrap();
        assert_eq!(ids.last().copied(), vocab.id('ə'));
    }
}
