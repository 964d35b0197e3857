use tracklab_decode::BufferCache;
use tracklab_dsp::pan_gains;
use tracklab_transport::{DecodedAudio, Project};

use crate::wav::encode_wav;

/// Render the project to a stereo 16-bit WAV, off the real-time path.
///
/// The rendered length is the latest clip end across *all* tracks, so a
/// muted track's clips still pad the tail with silence. Which tracks are
/// audible follows the same solo/mute policy as live playback. Track
/// effect chains are not applied here; the offline path mixes clip gain,
/// track gain and pan only.
///
/// Returns `None` when the project has no clip content at all.
pub fn export_project(project: &Project, cache: &BufferCache) -> Option<Vec<u8>> {
    let max_duration = project.max_clip_end();
    if max_duration <= 0.0 {
        return None;
    }

    let sample_rate = cache.sample_rate();
    let total_frames = (max_duration * sample_rate as f64).ceil() as usize;
    let mut samples = vec![0.0f32; total_frames * 2];

    for track in project.playback_tracks() {
        let track_gain = track.volume / 100.0;
        let (pan_l, pan_r) = pan_gains(track.pan / 100.0);

        for clip in &track.clips {
            let Some(audio) = cache.get(&clip.source) else {
                continue;
            };
            let audio = if audio.sample_rate() != sample_rate {
                match audio.resample(sample_rate) {
                    Ok(audio) => audio,
                    Err(e) => {
                        log::warn!("export: skipping clip '{}': {e}", clip.name);
                        continue;
                    }
                }
            } else {
                audio.clone()
            };

            let start_frame = (clip.start * sample_rate as f64).round() as usize;
            let clip_frames = ((clip.duration * sample_rate as f64) as usize).min(audio.frames());

            for i in 0..clip_frames {
                let frame = start_frame + i;
                if frame >= total_frames {
                    break;
                }
                let (l, r) = audio.frame_stereo(i);
                let gain = clip.gain * track_gain;
                samples[frame * 2] += l * gain * pan_l;
                samples[frame * 2 + 1] += r * gain * pan_r;
            }
        }
    }

    Some(encode_wav(&DecodedAudio::new(samples, sample_rate, 2)))
}
