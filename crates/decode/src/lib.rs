use std::fs;
use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use tracklab_transport::DecodedAudio;

mod cache;

pub use cache::{BufferCache, ClipSource, FsSource};

/// Decode an in-memory encoded artifact (wav, mp3, ogg, flac, ...).
pub fn decode_bytes(bytes: Vec<u8>) -> anyhow::Result<DecodedAudio> {
    decode_source(Box::new(Cursor::new(bytes)), &Hint::new())
}

pub fn decode_file(path: &Path) -> anyhow::Result<DecodedAudio> {
    let file = fs::File::open(path)?;
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    decode_source(Box::new(file), &hint)
}

fn decode_source(source: Box<dyn MediaSource>, hint: &Hint) -> anyhow::Result<DecodedAudio> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe().format(
        hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("no default track"))?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2) as u16;
    let track_id = track.id;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet)?;
        let spec = *decoded.spec();
        let duration = decoded.capacity() as u64;

        let mut sample_buf = SampleBuffer::<f32>::new(duration, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    Ok(DecodedAudio::new(samples, sample_rate, channels))
}
