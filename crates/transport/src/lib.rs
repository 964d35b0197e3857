use std::sync::Arc;

mod clock;
mod model;
mod resample;
mod schedule;

pub use clock::TransportClock;
pub use model::{AudioClip, AudioEffect, EffectKind, Project, Track, TrackId};
pub use resample::resample_audio;
pub use schedule::ClipSchedule;

/// Shared, immutable decoded PCM data.
///
/// `DecodedAudio` stores interleaved `f32` samples in an `Arc<[f32]>`, so
/// cloning only bumps a reference count. One decoded buffer is typically
/// shared between the cache, several playback voices, and the offline
/// renderer at the same time.
///
/// # Examples
///
/// ```
/// use tracklab_transport::DecodedAudio;
///
/// // Stereo audio with 2 frames: [L1, R1, L2, R2]
/// let audio = DecodedAudio::new(vec![0.0, 0.5, 1.0, 0.5], 44100, 2);
/// assert_eq!(audio.frames(), 2);
///
/// let copy = audio.clone(); // cheap
/// assert_eq!(copy.samples()[1], 0.5);
/// ```
#[derive(Clone)]
pub struct DecodedAudio {
    /// Interleaved samples shared between all clones.
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl DecodedAudio {
    /// Create from owned interleaved samples.
    ///
    /// # Panics
    ///
    /// Panics if `channels` is 0 or `samples.len()` is not divisible by
    /// `channels`.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        assert!(channels > 0, "channels must be greater than 0");
        assert_eq!(
            samples.len() % channels as usize,
            0,
            "samples.len() must be divisible by channels"
        );
        Self {
            samples: Arc::from(samples),
            sample_rate,
            channels,
        }
    }

    /// A silent mono buffer of the given duration, used as the decode
    /// fallback so scheduling never has to deal with missing audio.
    pub fn silence(seconds: f64, sample_rate: u32) -> Self {
        let frames = (seconds * sample_rate as f64).ceil() as usize;
        Self::new(vec![0.0; frames], sample_rate, 1)
    }

    /// All interleaved samples. For stereo the layout is [L, R, L, R, ...].
    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel).
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Total number of samples across all channels.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Read one frame, mapping output channels onto source channels the
    /// way the mixer does (mono fans out, extra channels wrap around).
    #[inline]
    pub fn frame_stereo(&self, frame: usize) -> (f32, f32) {
        let channels = self.channels as usize;
        let base = frame * channels;
        if base >= self.samples.len() {
            return (0.0, 0.0);
        }
        let left = self.samples[base];
        let right = self.samples[base + (1 % channels)];
        (left, right)
    }

    /// Maximum absolute sample value across every channel.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |p, s| p.max(s.abs()))
    }

    /// Resample to a target rate. Returns a cheap clone when the rate
    /// already matches.
    pub fn resample(&self, target_sample_rate: u32) -> anyhow::Result<Self> {
        if self.sample_rate == target_sample_rate {
            return Ok(self.clone());
        }
        resample::resample_audio(self, target_sample_rate)
    }
}

impl std::fmt::Debug for DecodedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedAudio")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("duration_secs", &self.duration_secs())
            .finish()
    }
}
