//! Ordered audio buffer playback.
//!
//! A [`PlaybackQueue`] plays submitted buffers back-to-back in submission
//! order and reports each buffer's lifecycle through [`PlaybackCallbacks`].
//! Every buffer resolves to exactly one terminal outcome: it completes, or it
//! is aborted. All callbacks of a queue are delivered from one serialized
//! driver, so `on_start`, `on_complete` and `on_abort` never race each other.
//!
//! Two queues are provided:
//! - [`ClockedPlaybackQueue`] plays in real time on a worker thread and writes
//!   samples to an [`AudioOutput`].
//! - [`ManualPlaybackQueue`] is advanced explicitly by its owner, for hosts
//!   that run their own audio clock and for deterministic tests.

mod buffer;
mod clocked;
mod manual;

use std::fmt;
use std::time::Duration;

pub use buffer::PlaybackState;
pub use clocked::{AudioOutput, ClockedPlaybackQueue, NullOutput, WavRecorder};
pub use manual::ManualPlaybackQueue;

/// Fade length (in samples) applied at buffer edges when nice audio is on.
pub const NICE_AUDIO_FADE_SAMPLES: usize = 240; // 10ms @ 24kHz

/// How far an aborted buffer got before it was cut off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbortInfo {
    /// Time the buffer had been audible.
    pub elapsed: Duration,
    /// Played fraction of the buffer, in `[0, 1]`.
    pub fraction: f32,
}

/// Lifecycle hooks for one queued buffer.
#[derive(Default)]
pub struct PlaybackCallbacks {
    pub on_start: Option<Box<dyn FnOnce() + Send + 'static>>,
    pub on_complete: Option<Box<dyn FnOnce() + Send + 'static>>,
    /// Only raised for a buffer that had started; a buffer aborted while
    /// still queued is dropped silently.
    pub on_abort: Option<Box<dyn FnOnce(AbortInfo) + Send + 'static>>,
}

impl fmt::Debug for PlaybackCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackCallbacks")
            .field("on_start", &self.on_start.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_abort", &self.on_abort.is_some())
            .finish()
    }
}

/// A buffer submitted to a [`PlaybackQueue`].
pub trait PlaybackHandle: Send + Sync {
    /// Stop this buffer. Idempotent; a no-op once the buffer has completed.
    fn abort(&self);

    fn state(&self) -> PlaybackState;
}

/// Plays sample buffers back-to-back in submission order.
pub trait PlaybackQueue: Send + Sync {
    fn enqueue(
        &self,
        samples: Vec<f32>,
        callbacks: PlaybackCallbacks,
    ) -> std::sync::Arc<dyn PlaybackHandle>;

    /// Toggle edge smoothing of played buffers.
    fn set_nice_audio(&self, enabled: bool);

    /// Abort everything still queued and release the audio output.
    fn shutdown(&self);
}

/// Apply a linear fade-in and fade-out of `fade` samples.
pub(crate) fn apply_edge_fade(samples: &mut [f32], fade: usize) {
    let fade = fade.min(samples.len() / 2);
    let len = samples.len();
    for i in 0..fade {
        let gain = (i + 1) as f32 / (fade as f32 + 1.0);
        samples[i] *= gain;
        samples[len - 1 - i] *= gain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_fade_ramps_both_ends() {
        let mut samples = vec![1.0; 10];
        apply_edge_fade(&mut samples, 3);
        assert_eq!(samples[0], 0.25);
        assert_eq!(samples[2], 0.75);
        assert_eq!(samples[5], 1.0);
        assert_eq!(samples[9], 0.25);
    }

    #[test]
    fn edge_fade_never_overlaps_on_short_buffers() {
        let mut samples = vec![1.0; 3];
        apply_edge_fade(&mut samples, 240);
        assert_eq!(samples, vec![0.5, 1.0, 0.5]);
    }
}
