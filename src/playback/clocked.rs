use std::collections::VecDeque;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use super::buffer::QueuedBuffer;
use super::{
    apply_edge_fade, PlaybackCallbacks, PlaybackHandle, PlaybackQueue, NICE_AUDIO_FADE_SAMPLES,
};
use crate::SynthesisError;

/// Destination for the samples a [`ClockedPlaybackQueue`] plays.
pub trait AudioOutput: Send + 'static {
    /// A buffer starts playing.
    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<(), SynthesisError>;

    /// The buffer passed to the last `play` was cut after `played` samples.
    fn cut(&mut self, _played: usize) -> Result<(), SynthesisError> {
        Ok(())
    }

    /// No more audio will follow.
    fn finish(&mut self) -> Result<(), SynthesisError> {
        Ok(())
    }
}

/// Discards audio. Playback still advances in real time.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

impl AudioOutput for NullOutput {
    fn play(&mut self, _samples: &[f32], _sample_rate: u32) -> Result<(), SynthesisError> {
        Ok(())
    }
}

/// Records exactly what was audible to a 32-bit float mono WAV file.
///
/// Aborted buffers are written only up to the point they were cut.
pub struct WavRecorder {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    pending: Vec<f32>,
}

impl WavRecorder {
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self, SynthesisError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        Ok(Self {
            writer: Some(hound::WavWriter::create(path, spec)?),
            pending: Vec::new(),
        })
    }

    fn flush_pending(&mut self, count: usize) -> Result<(), SynthesisError> {
        let pending = std::mem::take(&mut self.pending);
        if let Some(writer) = self.writer.as_mut() {
            for &sample in &pending[..count.min(pending.len())] {
                writer.write_sample(sample)?;
            }
        }
        Ok(())
    }
}

impl AudioOutput for WavRecorder {
    fn play(&mut self, samples: &[f32], _sample_rate: u32) -> Result<(), SynthesisError> {
        self.flush_pending(usize::MAX)?;
        self.pending = samples.to_vec();
        Ok(())
    }

    fn cut(&mut self, played: usize) -> Result<(), SynthesisError> {
        self.flush_pending(played)
    }

    fn finish(&mut self) -> Result<(), SynthesisError> {
        self.flush_pending(usize::MAX)?;
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

struct Shared {
    queue: Mutex<VecDeque<Arc<QueuedBuffer>>>,
    ready: Condvar,
    current: Mutex<Option<Arc<QueuedBuffer>>>,
    nice_audio: AtomicBool,
    stopping: AtomicBool,
}

/// Plays buffers in real time on a worker thread.
///
/// Each buffer is handed to the [`AudioOutput`] when it starts and is
/// considered playing for its sample duration. All callbacks run on the
/// worker thread.
pub struct ClockedPlaybackQueue {
    shared: Arc<Shared>,
    sample_rate: u32,
    next_id: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ClockedPlaybackQueue {
    pub fn new<O: AudioOutput>(output: O, sample_rate: u32) -> Result<Self, SynthesisError> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            current: Mutex::new(None),
            nice_audio: AtomicBool::new(true),
            stopping: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("tts-playback".to_string())
            .spawn(move || run_player(worker_shared, output, sample_rate))?;

        Ok(Self {
            shared,
            sample_rate,
            next_id: AtomicU64::new(1),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn nice_audio(&self) -> bool {
        self.shared.nice_audio.load(Ordering::SeqCst)
    }
}

impl PlaybackQueue for ClockedPlaybackQueue {
    fn enqueue(&self, samples: Vec<f32>, callbacks: PlaybackCallbacks) -> Arc<dyn PlaybackHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let buffer = Arc::new(QueuedBuffer::new(id, samples, self.sample_rate, callbacks));
        let mut queue = self.shared.queue.lock();
        if self.shared.stopping.load(Ordering::SeqCst) {
            buffer.abort();
        } else {
            queue.push_back(Arc::clone(&buffer));
            self.shared.ready.notify_one();
        }
        buffer
    }

    fn set_nice_audio(&self, enabled: bool) {
        self.shared.nice_audio.store(enabled, Ordering::SeqCst);
    }

    fn shutdown(&self) {
        if self.shared.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        for buffer in self.shared.queue.lock().drain(..) {
            buffer.abort();
        }
        if let Some(current) = self.shared.current.lock().as_ref() {
            current.abort();
        }
        self.shared.ready.notify_all();

        if let Some(worker) = self.worker.lock().take() {
            if worker.thread().id() == std::thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                log::error!("Playback worker panicked");
            }
        }
    }
}

impl Drop for ClockedPlaybackQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn next_buffer(shared: &Shared) -> Option<Arc<QueuedBuffer>> {
    let mut queue = shared.queue.lock();
    loop {
        if shared.stopping.load(Ordering::SeqCst) {
            return None;
        }
        if let Some(buffer) = queue.pop_front() {
            return Some(buffer);
        }
        shared.ready.wait(&mut queue);
    }
}

fn run_player<O: AudioOutput>(shared: Arc<Shared>, mut output: O, sample_rate: u32) {
    while let Some(buffer) = next_buffer(&shared) {
        *shared.current.lock() = Some(Arc::clone(&buffer));
        play_buffer(&shared, &mut output, &buffer, sample_rate);
        *shared.current.lock() = None;
    }

    if let Err(e) = output.finish() {
        log::error!("Failed to finalize audio output: {e}");
    }
    log::debug!("Playback worker stopped");
}

fn play_buffer<O: AudioOutput>(
    shared: &Shared,
    output: &mut O,
    buffer: &QueuedBuffer,
    sample_rate: u32,
) {
    let mut samples = buffer.take_samples();
    if shared.stopping.load(Ordering::SeqCst) {
        buffer.abort();
    }
    if !buffer.begin() {
        return;
    }
    if shared.nice_audio.load(Ordering::SeqCst) {
        apply_edge_fade(&mut samples, NICE_AUDIO_FADE_SAMPLES);
    }
    if let Err(e) = output.play(&samples, sample_rate) {
        log::error!("Audio output rejected buffer {}: {e}", buffer.id());
    }
    log::debug!(
        "Playing buffer {} ({:.2}s)",
        buffer.id(),
        buffer.duration().as_secs_f64()
    );

    let deadline = Instant::now() + buffer.duration();
    if !buffer.wait_until(deadline) && buffer.finish() {
        return;
    }

    let info = buffer.measured_abort();
    let played = (samples.len() as f64 * info.fraction as f64).round() as usize;
    if let Err(e) = output.cut(played) {
        log::error!("Audio output failed to cut buffer {}: {e}", buffer.id());
    }
    buffer.resolve_abort(info);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{AbortInfo, PlaybackState};
    use std::time::Duration;

    fn notify_on_finish(tx: crossbeam_channel::Sender<String>, tag: &str) -> PlaybackCallbacks {
        let (start, done, abort) = (tx.clone(), tx.clone(), tx);
        let (s, d, a) = (format!("start {tag}"), format!("done {tag}"), format!("abort {tag}"));
        PlaybackCallbacks {
            on_start: Some(Box::new(move || {
                let _ = start.send(s);
            })),
            on_complete: Some(Box::new(move || {
                let _ = done.send(d);
            })),
            on_abort: Some(Box::new(move |info: AbortInfo| {
                assert!((0.0..=1.0).contains(&info.fraction));
                let _ = abort.send(a);
            })),
        }
    }

    #[test]
    fn plays_buffers_back_to_back_in_order() {
        let queue = ClockedPlaybackQueue::new(NullOutput, 24000).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let a = queue.enqueue(vec![0.0; 48], notify_on_finish(tx.clone(), "a"));
        let b = queue.enqueue(vec![0.0; 48], notify_on_finish(tx, "b"));

        let events: Vec<String> = (0..4)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(events, vec!["start a", "done a", "start b", "done b"]);
        assert_eq!(a.state(), PlaybackState::Completed);
        assert_eq!(b.state(), PlaybackState::Completed);
    }

    #[test]
    fn abort_interrupts_the_playing_buffer() {
        let queue = ClockedPlaybackQueue::new(NullOutput, 24000).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let long = queue.enqueue(vec![0.0; 24000 * 60], notify_on_finish(tx.clone(), "long"));
        let next = queue.enqueue(vec![0.0; 48], notify_on_finish(tx, "next"));

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "start long");
        next.abort();
        long.abort();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "abort long");
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(next.state(), PlaybackState::Aborted);
    }

    #[test]
    fn wav_recorder_keeps_only_audible_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let mut recorder = WavRecorder::create(&path, 24000).unwrap();
        recorder.play(&[0.5; 10], 24000).unwrap();
        recorder.play(&[0.25; 10], 24000).unwrap();
        recorder.cut(4).unwrap();
        recorder.finish().unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let samples: Vec<f32> = reader.into_samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 14);
        assert_eq!(samples[13], 0.25);
    }

    #[test]
    fn enqueue_after_shutdown_is_aborted() {
        let queue = ClockedPlaybackQueue::new(NullOutput, 24000).unwrap();
        queue.shutdown();
        let handle = queue.enqueue(vec![0.0; 48], PlaybackCallbacks::default());
        assert_eq!(handle.state(), PlaybackState::Aborted);
    }
}
