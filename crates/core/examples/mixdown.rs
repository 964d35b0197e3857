use std::f32::consts::PI;
use std::path::Path;

use tracklab_core::{
    AudioClip, AudioService, DecodedAudio, FsSource, Project, Track, TrackId, encode_wav,
};

fn tone(frequency: f32, seconds: f32, sample_rate: u32) -> DecodedAudio {
    let frames = (seconds * sample_rate as f32) as usize;
    let samples: Vec<f32> = (0..frames)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            0.4 * (2.0 * PI * frequency * t).sin()
        })
        .collect();
    DecodedAudio::new(samples, sample_rate, 1)
}

fn main() -> anyhow::Result<()> {
    let dir = std::env::temp_dir().join("tracklab-demo");
    std::fs::create_dir_all(&dir)?;

    // Two tones on disk, standing in for caller-provided sources.
    for (name, freq) in [("low.wav", 220.0), ("high.wav", 330.0)] {
        std::fs::write(dir.join(name), encode_wav(&tone(freq, 2.0, 44100)))?;
    }

    let mut project = Project::new("demo", "Demo", 120);
    let mut low = Track::new(TrackId(1), "Low");
    low.pan = -40.0;
    low.clips.push(AudioClip::new("c1", "low.wav", 0.0, 2.0));
    let mut high = Track::new(TrackId(2), "High");
    high.pan = 40.0;
    high.clips.push(AudioClip::new("c2", "high.wav", 1.0, 2.0));
    project.tracks.push(low);
    project.tracks.push(high);

    let mut service = AudioService::new(Box::new(FsSource::with_root(&dir)))?;
    service.load_project(&project);

    let artifact = service
        .export(&project)?
        .expect("project has clip content");
    let out = Path::new("demo-mixdown.wav");
    std::fs::write(out, &artifact)?;
    println!("wrote {} ({} bytes)", out.display(), artifact.len());

    println!("playing 3 seconds...");
    service.play(&project, 0.0);
    std::thread::sleep(std::time::Duration::from_secs(3));
    service.stop()?;
    println!("transport at {:.2}s", service.current_time());

    Ok(())
}
