use tracklab_transport::DecodedAudio;

use crate::wav::encode_wav;

/// Peak target of the post-capture normalizer, ~-3 dBFS.
pub const NORMALIZE_TARGET_PEAK: f32 = 0.7079;

/// Boost a finished take up to the target peak.
///
/// Quiet takes are raised so every capture lands at a consistent
/// loudness; the gain is never less than unity, since the real-time
/// limiter already kept the signal out of clipping. Pure silence and
/// undecodable input come back unchanged.
pub fn normalize_wav(bytes: &[u8]) -> Vec<u8> {
    let audio = match tracklab_decode::decode_bytes(bytes.to_vec()) {
        Ok(audio) => audio,
        Err(e) => {
            log::warn!("normalize: could not decode artifact, returning original: {e}");
            return bytes.to_vec();
        }
    };

    let peak = audio.peak();
    if peak == 0.0 {
        return bytes.to_vec();
    }

    let gain = NORMALIZE_TARGET_PEAK / peak;
    if gain <= 1.0 {
        return bytes.to_vec();
    }

    let samples: Vec<f32> = audio.samples().iter().map(|s| s * gain).collect();
    let boosted = DecodedAudio::new(samples, audio.sample_rate(), audio.channels());
    encode_wav(&boosted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_with_peak(peak: f32) -> Vec<u8> {
        let mut samples = vec![0.0f32; 1000];
        samples[100] = peak;
        samples[200] = -peak * 0.5;
        encode_wav(&DecodedAudio::new(samples, 44100, 1))
    }

    fn peak_of(bytes: &[u8]) -> f32 {
        tracklab_decode::decode_bytes(bytes.to_vec())
            .expect("decode")
            .peak()
    }

    #[test]
    fn quiet_take_is_boosted_to_target() {
        let input = wav_with_peak(0.1);
        let output = normalize_wav(&input);
        let peak = peak_of(&output);
        assert!(
            (peak - NORMALIZE_TARGET_PEAK).abs() < 0.01,
            "normalized peak {peak}"
        );
    }

    #[test]
    fn loud_take_is_never_attenuated() {
        let input = wav_with_peak(0.95);
        let output = normalize_wav(&input);
        assert_eq!(output, input);
    }

    #[test]
    fn output_peak_is_never_below_input_peak() {
        for peak in [0.01, 0.2, NORMALIZE_TARGET_PEAK, 0.9] {
            let input = wav_with_peak(peak);
            let out_peak = peak_of(&normalize_wav(&input));
            assert!(
                out_peak >= peak - 1e-3,
                "input peak {peak} attenuated to {out_peak}"
            );
        }
    }

    #[test]
    fn silence_passes_through_unchanged() {
        let input = encode_wav(&DecodedAudio::silence(0.1, 44100));
        let output = normalize_wav(&input);
        assert_eq!(output, input);
    }

    #[test]
    fn undecodable_input_passes_through_unchanged() {
        let garbage = b"this is not a wav file".to_vec();
        assert_eq!(normalize_wav(&garbage), garbage);
    }

    #[test]
    fn normalization_preserves_format() {
        let samples = vec![0.05f32; 200];
        let input = encode_wav(&DecodedAudio::new(samples, 22050, 2));
        let output = normalize_wav(&input);
        let audio = tracklab_decode::decode_bytes(output).expect("decode");
        assert_eq!(audio.sample_rate(), 22050);
        assert_eq!(audio.channels(), 2);
        assert_eq!(audio.frames(), 100);
    }
}
