use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;
use kokoro_speak::engines::kokoro::{KokoroEngine, KokoroModelParams, SAMPLE_RATE};
use kokoro_speak::playback::{ClockedPlaybackQueue, WavRecorder};
use kokoro_speak::{OrchestratorConfig, SynthesisEngine};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut engine = KokoroEngine::new();
    let load_start = Instant::now();
    engine.load_model_with_params(&PathBuf::from("models/kokoro"), KokoroModelParams::default())?;
    println!("Model loaded in {:.2?}", load_start.elapsed());
    println!("Available voices: {:?}", engine.list_voices());

    let config = match std::env::args().nth(1) {
        Some(path) => OrchestratorConfig::from_json_file(Path::new(&path))?,
        None => OrchestratorConfig::default(),
    };

    let recorder = WavRecorder::create(Path::new("output.wav"), SAMPLE_RATE)?;
    let playback = Arc::new(ClockedPlaybackQueue::new(recorder, SAMPLE_RATE)?);
    let tts = engine.orchestrator(playback, config)?;

    let (done_tx, done_rx) = bounded(1);
    let spoken_at = Instant::now();
    tts.events().started.subscribe(move |p| {
        println!(
            "First audio after {:.2?} ({} phonemes queued)",
            spoken_at.elapsed(),
            p.phonemes.len()
        );
    });
    tts.events().progressed.subscribe(|p| {
        println!("[step {}] {}", p.step.index(), p.best_guess_text);
    });
    tts.events().completed.subscribe(move |p| {
        println!("Completed: {}", p.text);
        let _ = done_tx.try_send(());
    });

    let text = "Hello! This is Kokoro, a text to speech model with multilingual support. \
                It supports American English, British English, French, Spanish, \
                Hindi, Italian, Japanese, Mandarin Chinese, and Brazilian Portuguese.";
    let handle = tts.speak_fast(text, "af_heart", None)?;
    println!("Speaking job {} in {} steps", handle.job().id(), handle.job().steps().len());

    if done_rx.recv_timeout(Duration::from_secs(120)).is_err() {
        println!("Timed out, stopping");
        tts.stop_playback();
    }

    tts.dispose();
    println!("Saved to output.wav");
    Ok(())
}
