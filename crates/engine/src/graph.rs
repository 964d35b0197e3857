use tracklab_decode::BufferCache;
use tracklab_dsp::{SmoothedParam, pan_gains};
use tracklab_transport::{ClipSchedule, DecodedAudio, Track, TrackId};

use crate::chain::{EffectNode, EffectParam, build_chain};

/// Smoothing for live volume/pan moves.
const PARAM_SMOOTH_SECS: f32 = 0.01;

/// One scheduled clip-playback instance.
pub struct Voice {
    audio: DecodedAudio,
    gain: f32,
    delay_frames: u64,
    position: usize,
    remaining: u64,
}

impl Voice {
    fn new(audio: DecodedAudio, schedule: &ClipSchedule, gain: f32, sample_rate: u32) -> Self {
        let sr = sample_rate as f64;
        let position = (schedule.offset * sr).round() as usize;
        let wanted = (schedule.duration * sr).round() as u64;
        let available = audio.frames().saturating_sub(position) as u64;
        Self {
            audio,
            gain,
            delay_frames: (schedule.delay * sr).round() as u64,
            position,
            remaining: wanted.min(available),
        }
    }

    /// Next stereo frame, or `None` once the voice has played out.
    /// While the start delay runs down the voice yields silence.
    #[inline]
    fn next_frame(&mut self) -> Option<(f32, f32)> {
        if self.remaining == 0 {
            return None;
        }
        if self.delay_frames > 0 {
            self.delay_frames -= 1;
            return Some((0.0, 0.0));
        }
        let (l, r) = self.audio.frame_stereo(self.position);
        self.position += 1;
        self.remaining -= 1;
        Some((l * self.gain, r * self.gain))
    }
}

/// Per-track runtime state: active voices feeding the effect chain,
/// then smoothed gain and pan. Rebuilt wholesale on every `play`; the
/// old graph (voices included) is dropped, so a restart can never leak
/// playback instances from the previous run.
pub struct TrackGraph {
    track_id: TrackId,
    gain: SmoothedParam,
    pan: SmoothedParam,
    chain: Vec<EffectNode>,
    voices: Vec<Voice>,
}

impl TrackGraph {
    /// Assemble the graph for one track, scheduling every clip that is
    /// still relevant at `at_time`. Sources missing from the cache are
    /// skipped (the cache substitutes silence for failed loads, so this
    /// only happens for projects that were never loaded).
    pub fn build(track: &Track, cache: &BufferCache, at_time: f64, sample_rate: u32) -> Self {
        let sr = sample_rate as f32;
        let mut voices = Vec::new();
        for clip in &track.clips {
            let Some(schedule) = ClipSchedule::plan(clip, at_time) else {
                continue;
            };
            let Some(audio) = cache.get(&clip.source) else {
                continue;
            };
            voices.push(Voice::new(audio.clone(), &schedule, clip.gain, sample_rate));
        }

        Self {
            track_id: track.id,
            gain: SmoothedParam::new(track.volume / 100.0, sr, PARAM_SMOOTH_SECS),
            pan: SmoothedParam::new(track.pan / 100.0, sr, PARAM_SMOOTH_SECS),
            chain: build_chain(&track.effects, sample_rate),
            voices,
        }
    }

    pub fn track_id(&self) -> TrackId {
        self.track_id
    }

    /// Effect ids of the built chain, in processing order. The control
    /// thread keeps this layout to route parameter updates by index.
    pub fn chain_effect_ids(&self) -> Vec<String> {
        self.chain.iter().map(|n| n.effect_id.clone()).collect()
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Drop every active voice. The chain keeps running so effect tails
    /// ring out only until the graph itself is replaced.
    pub fn stop_voices(&mut self) {
        self.voices.clear();
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.gain.set_target(volume / 100.0);
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.pan.set_target(pan / 100.0);
    }

    pub fn set_effect_param(&mut self, index: usize, param: EffectParam, value: f32) {
        if let Some(node) = self.chain.get_mut(index) {
            node.processor.set_param(param, value);
        }
    }

    /// Render one stereo frame: sum the voices, run the chain, apply
    /// gain and pan. Finished voices drop out here.
    #[inline]
    pub fn process_frame(&mut self) -> (f32, f32) {
        let mut l = 0.0f32;
        let mut r = 0.0f32;
        self.voices.retain_mut(|voice| match voice.next_frame() {
            Some((vl, vr)) => {
                l += vl;
                r += vr;
                true
            }
            None => false,
        });

        for node in &mut self.chain {
            (l, r) = node.processor.process_frame(l, r);
        }

        let gain = self.gain.next();
        let (pan_l, pan_r) = pan_gains(self.pan.next());
        (l * gain * pan_l, r * gain * pan_r)
    }
}
