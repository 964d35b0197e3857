use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracklab_transport::{DecodedAudio, Project};

/// Resolves a clip's opaque source locator to encoded bytes. The
/// surrounding application supplies the implementation for whatever its
/// locators mean (URLs, blob ids); [`FsSource`] covers plain file paths.
pub trait ClipSource {
    fn fetch(&self, locator: &str) -> anyhow::Result<Vec<u8>>;
}

/// Locators are filesystem paths, optionally under a root directory.
pub struct FsSource {
    root: Option<PathBuf>,
}

impl FsSource {
    pub fn new() -> Self {
        Self { root: None }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

impl Default for FsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipSource for FsSource {
    fn fetch(&self, locator: &str) -> anyhow::Result<Vec<u8>> {
        let path = match &self.root {
            Some(root) => root.join(locator),
            None => Path::new(locator).to_path_buf(),
        };
        Ok(fs::read(path)?)
    }
}

/// Decoded buffers keyed by source locator, shared by playback and the
/// offline renderer. Everything in the cache is resampled to one engine
/// rate so the mixers never convert per voice.
pub struct BufferCache {
    entries: HashMap<String, DecodedAudio>,
    sample_rate: u32,
}

impl BufferCache {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            entries: HashMap::new(),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn get(&self, locator: &str) -> Option<&DecodedAudio> {
        self.entries.get(locator)
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.entries.contains_key(locator)
    }

    /// Insert a buffer directly, e.g. a freshly recorded take the caller
    /// is about to place on a track. Resamples to the engine rate.
    pub fn insert(&mut self, locator: impl Into<String>, audio: DecodedAudio) {
        let audio = match audio.resample(self.sample_rate) {
            Ok(audio) => audio,
            Err(e) => {
                log::warn!("failed to resample inserted buffer: {e}");
                audio
            }
        };
        self.entries.insert(locator.into(), audio);
    }

    /// Fetch and decode every clip source in the project that is not
    /// cached yet, one clip at a time. A source that cannot be fetched
    /// or decoded is replaced by one second of silence so scheduling
    /// never has to handle missing audio; the failure is logged, not
    /// surfaced.
    pub fn ensure_loaded(&mut self, project: &Project, source: &dyn ClipSource) {
        for track in &project.tracks {
            for clip in &track.clips {
                if self.entries.contains_key(&clip.source) {
                    continue;
                }
                let audio = match self.load(&clip.source, source) {
                    Ok(audio) => audio,
                    Err(e) => {
                        log::warn!("failed to load clip '{}' from '{}': {e}", clip.name, clip.source);
                        DecodedAudio::silence(1.0, self.sample_rate)
                    }
                };
                self.entries.insert(clip.source.clone(), audio);
            }
        }
    }

    fn load(&self, locator: &str, source: &dyn ClipSource) -> anyhow::Result<DecodedAudio> {
        let bytes = source.fetch(locator)?;
        let audio = crate::decode_bytes(bytes)?;
        audio.resample(self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracklab_transport::{AudioClip, Track, TrackId};

    fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("writer");
        for &s in samples {
            writer.write_sample(s).expect("write");
        }
        writer.finalize().expect("finalize");
    }

    fn project_with_clip(source: &str) -> Project {
        let mut project = Project::new("p1", "Test", 120);
        let mut track = Track::new(TrackId(1), "Track 1");
        track.clips.push(AudioClip::new("c1", source, 0.0, 1.0));
        project.tracks.push(track);
        project
    }

    #[test]
    fn ensure_loaded_decodes_and_caches() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tone.wav");
        write_wav(&path, &[0.5; 4410], 44100);

        let project = project_with_clip(path.to_str().unwrap());
        let mut cache = BufferCache::new(44100);
        cache.ensure_loaded(&project, &FsSource::new());

        let audio = cache.get(path.to_str().unwrap()).expect("cached");
        assert_eq!(audio.sample_rate(), 44100);
        assert_eq!(audio.frames(), 4410);
    }

    #[test]
    fn missing_source_falls_back_to_silence() {
        let project = project_with_clip("/nonexistent/take.wav");
        let mut cache = BufferCache::new(48000);
        cache.ensure_loaded(&project, &FsSource::new());

        let audio = cache.get("/nonexistent/take.wav").expect("fallback cached");
        assert_eq!(audio.channels(), 1);
        assert_eq!(audio.frames(), 48000);
        assert_eq!(audio.peak(), 0.0);
    }

    #[test]
    fn shared_source_is_loaded_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("loop.wav");
        write_wav(&path, &[0.25; 100], 44100);
        let locator = path.to_str().unwrap();

        // Two tracks, three clips, one source.
        let mut project = Project::new("p1", "Test", 120);
        let mut t1 = Track::new(TrackId(1), "A");
        t1.clips.push(AudioClip::new("c1", locator, 0.0, 1.0));
        t1.clips.push(AudioClip::new("c2", locator, 2.0, 1.0));
        let mut t2 = Track::new(TrackId(2), "B");
        t2.clips.push(AudioClip::new("c3", locator, 1.0, 1.0));
        project.tracks.push(t1);
        project.tracks.push(t2);

        let mut cache = BufferCache::new(44100);
        cache.ensure_loaded(&project, &FsSource::new());
        assert_eq!(cache.entries.len(), 1);
    }

    #[test]
    fn ensure_loaded_resamples_to_engine_rate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hi.wav");
        write_wav(&path, &[0.5; 4800], 48000);

        let project = project_with_clip(path.to_str().unwrap());
        let mut cache = BufferCache::new(44100);
        cache.ensure_loaded(&project, &FsSource::new());

        let audio = cache.get(path.to_str().unwrap()).expect("cached");
        assert_eq!(audio.sample_rate(), 44100);
        let expected = (4800.0 * 44100.0 / 48000.0) as i64;
        assert!((audio.frames() as i64 - expected).abs() <= expected / 20);
    }

    #[test]
    fn fs_source_resolves_relative_to_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_wav(&dir.path().join("kick.wav"), &[1.0; 10], 44100);

        let source = FsSource::with_root(dir.path());
        assert!(source.fetch("kick.wav").is_ok());
        assert!(source.fetch("snare.wav").is_err());
    }
}
