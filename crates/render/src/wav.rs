use tracklab_transport::DecodedAudio;

/// Serialize decoded audio as a 16-bit PCM RIFF/WAVE file.
///
/// Channel count and sample rate come from the buffer; samples are
/// clamped to [-1, 1] and scaled into the signed 16-bit range
/// (positive by 32767, negative by 32768) in interleaved order.
pub fn encode_wav(audio: &DecodedAudio) -> Vec<u8> {
    let channels = audio.channels() as u32;
    let sample_rate = audio.sample_rate();
    let data_len = (audio.len() * 2) as u32;
    let byte_rate = sample_rate * channels * 2;
    let block_align = (channels * 2) as u16;

    let mut out = Vec::with_capacity(44 + data_len as usize);

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&(channels as u16).to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());

    for &sample in audio.samples() {
        out.extend_from_slice(&sample_to_i16(sample).to_le_bytes());
    }

    out
}

#[inline]
fn sample_to_i16(sample: f32) -> i16 {
    let sample = sample.clamp(-1.0, 1.0);
    if sample < 0.0 {
        (sample * 32768.0) as i16
    } else {
        (sample * 32767.0) as i16
    }
}
