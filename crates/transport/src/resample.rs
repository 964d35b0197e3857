use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::DecodedAudio;

/// Resample decoded audio to a target rate with sinc interpolation.
///
/// Used when a cached buffer's rate differs from the engine rate, so the
/// mixer can stay a plain frame loop with no per-voice rate conversion.
pub fn resample_audio(audio: &DecodedAudio, target_sample_rate: u32) -> anyhow::Result<DecodedAudio> {
    if audio.sample_rate() == target_sample_rate {
        return Ok(audio.clone());
    }

    let channels = audio.channels() as usize;
    let input_frames = audio.frames();
    if input_frames == 0 {
        return Ok(DecodedAudio::new(
            Vec::new(),
            target_sample_rate,
            audio.channels(),
        ));
    }

    let ratio = target_sample_rate as f64 / audio.sample_rate() as f64;

    // rubato wants non-interleaved input.
    let mut planar = vec![Vec::with_capacity(input_frames); channels];
    for (i, &sample) in audio.samples().iter().enumerate() {
        planar[i % channels].push(sample);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, input_frames, channels)?;
    let output = resampler.process(&planar, None)?;

    let output_frames = output[0].len();
    let mut samples = Vec::with_capacity(output_frames * channels);
    for frame in 0..output_frames {
        for channel in output.iter() {
            samples.push(channel[frame]);
        }
    }

    Ok(DecodedAudio::new(
        samples,
        target_sample_rate,
        audio.channels(),
    ))
}
