use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    Reverb,
    Delay,
    Compressor,
    Eq,
    Distortion,
}

/// An insert effect as configured by the caller. `params` is a free-form
/// name/value map; each effect kind reads the names it knows and falls
/// back to its defaults for the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioEffect {
    pub id: String,
    pub kind: EffectKind,
    pub params: HashMap<String, f32>,
    pub enabled: bool,
}

impl AudioEffect {
    pub fn new(id: impl Into<String>, kind: EffectKind) -> Self {
        Self {
            id: id.into(),
            kind,
            params: HashMap::new(),
            enabled: true,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: f32) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn param(&self, name: &str, default: f32) -> f32 {
        self.params.get(name).copied().unwrap_or(default)
    }
}

/// A time-bounded reference to source audio placed on a track's timeline.
/// `source` is an opaque locator resolved by the caller-supplied
/// `ClipSource`; the engine never interprets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioClip {
    pub id: String,
    pub name: String,
    pub source: String,
    /// Timeline position in seconds, >= 0.
    pub start: f64,
    /// Length in seconds, > 0.
    pub duration: f64,
    /// Per-clip gain, 0.0..=2.0, 1.0 by default.
    pub gain: f32,
    /// Per-clip effects. Carried in the model but not consumed by
    /// playback or export.
    pub effects: Vec<AudioEffect>,
}

impl AudioClip {
    pub fn new(id: impl Into<String>, source: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            source: source.into(),
            start,
            duration,
            gain: 1.0,
            effects: Vec::new(),
        }
    }

    /// Timeline position where this clip ends.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    /// 0..=100, mapped to linear gain 0.0..=1.0.
    pub volume: f32,
    /// -100 (left) ..= 100 (right), mapped to -1.0..=1.0.
    pub pan: f32,
    pub muted: bool,
    pub solo: bool,
    pub effects: Vec<AudioEffect>,
    pub clips: Vec<AudioClip>,
}

impl Track {
    pub fn new(id: TrackId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            volume: 100.0,
            pan: 0.0,
            muted: false,
            solo: false,
            effects: Vec::new(),
            clips: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Beats per minute, 1..=300. Carried for the caller; scheduling
    /// works in seconds.
    pub tempo: u32,
    pub tracks: Vec<Track>,
}

impl Project {
    pub fn new(id: impl Into<String>, name: impl Into<String>, tempo: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tempo: tempo.clamp(1, 300),
            tracks: Vec::new(),
        }
    }

    /// Resolve the solo/mute policy: when any track is soloed, exactly
    /// the soloed tracks play; otherwise every unmuted track plays.
    pub fn playback_tracks(&self) -> Vec<&Track> {
        let soloed: Vec<&Track> = self.tracks.iter().filter(|t| t.solo).collect();
        if !soloed.is_empty() {
            soloed
        } else {
            self.tracks.iter().filter(|t| !t.muted).collect()
        }
    }

    /// Latest clip end across *all* tracks, regardless of mute or solo.
    /// This is the project length the exporter renders to.
    pub fn max_clip_end(&self) -> f64 {
        self.tracks
            .iter()
            .flat_map(|t| t.clips.iter())
            .fold(0.0f64, |max, clip| max.max(clip.end()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_with(id: u32, muted: bool, solo: bool) -> Track {
        let mut track = Track::new(TrackId(id), format!("Track {id}"));
        track.muted = muted;
        track.solo = solo;
        track
    }

    #[test]
    fn playback_set_defaults_to_unmuted() {
        let mut project = Project::new("p1", "Test", 120);
        project.tracks.push(track_with(1, false, false));
        project.tracks.push(track_with(2, true, false));
        project.tracks.push(track_with(3, false, false));

        let ids: Vec<u32> = project.playback_tracks().iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn solo_dominates_mute() {
        let mut project = Project::new("p1", "Test", 120);
        // A soloed track plays even when muted tracks exist, and an
        // unmuted, unsoloed track is excluded.
        project.tracks.push(track_with(1, false, false));
        project.tracks.push(track_with(2, true, true));
        project.tracks.push(track_with(3, false, true));

        let ids: Vec<u32> = project.playback_tracks().iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn max_clip_end_ignores_mute() {
        let mut project = Project::new("p1", "Test", 120);
        let mut t1 = track_with(1, false, false);
        t1.clips.push(AudioClip::new("c1", "a.wav", 0.0, 2.0));
        let mut t2 = track_with(2, true, false);
        t2.clips.push(AudioClip::new("c2", "b.wav", 1.0, 3.0));
        project.tracks.push(t1);
        project.tracks.push(t2);

        // The muted track still extends the project length.
        assert_eq!(project.max_clip_end(), 4.0);
    }

    #[test]
    fn empty_project_has_zero_length() {
        let project = Project::new("p1", "Empty", 90);
        assert_eq!(project.max_clip_end(), 0.0);
        assert!(project.playback_tracks().is_empty());
    }

    #[test]
    fn tempo_is_clamped() {
        assert_eq!(Project::new("p", "n", 0).tempo, 1);
        assert_eq!(Project::new("p", "n", 500).tempo, 300);
        assert_eq!(Project::new("p", "n", 120).tempo, 120);
    }

    #[test]
    fn effect_param_lookup_falls_back() {
        let effect = AudioEffect::new("e1", EffectKind::Delay).with_param("time", 0.75);
        assert_eq!(effect.param("time", 0.5), 0.75);
        assert_eq!(effect.param("feedback", 0.4), 0.4);
    }

    #[test]
    fn project_serde_roundtrip() {
        let mut project = Project::new("p1", "Roundtrip", 128);
        let mut track = track_with(1, false, false);
        track
            .effects
            .push(AudioEffect::new("fx1", EffectKind::Eq).with_param("bass", 6.0));
        let mut clip = AudioClip::new("c1", "take.wav", 0.5, 2.5);
        clip.gain = 1.2;
        track.clips.push(clip);
        project.tracks.push(track);

        let json = serde_json::to_string(&project).expect("serialize");
        let decoded: Project = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(decoded.name, "Roundtrip");
        assert_eq!(decoded.tempo, 128);
        assert_eq!(decoded.tracks.len(), 1);
        assert_eq!(decoded.tracks[0].clips[0].gain, 1.2);
        assert_eq!(decoded.tracks[0].effects[0].param("bass", 0.0), 6.0);
    }
}
