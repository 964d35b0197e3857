use crate::model::AudioClip;

/// How one clip should be started for a playback beginning at a given
/// transport position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipSchedule {
    /// Seconds into the clip's audio where playback begins.
    pub offset: f64,
    /// Seconds from "now" until the clip becomes audible.
    pub delay: f64,
    /// Seconds of audio to play.
    pub duration: f64,
}

impl ClipSchedule {
    /// Plan playback of `clip` for a transport starting at `at_time`.
    /// Returns `None` for clips that end at or before `at_time`.
    pub fn plan(clip: &AudioClip, at_time: f64) -> Option<Self> {
        if at_time >= clip.end() {
            return None;
        }
        let offset = (at_time - clip.start).max(0.0);
        let delay = (clip.start - at_time).max(0.0);
        let duration = clip.duration - offset;
        if duration <= 0.0 {
            return None;
        }
        Some(Self {
            offset,
            delay,
            duration,
        })
    }
}
