use std::f32::consts::FRAC_1_SQRT_2;

use tracklab_dsp::{Biquad, BiquadCoeffs, Compressor, Convolver, FeedbackDelay, SmoothedParam, decaying_noise};
use tracklab_transport::{AudioEffect, EffectKind};

/// Smoothing applied to live parameter changes.
const PARAM_SMOOTH_SECS: f32 = 0.01;

/// Length of the synthetic reverb impulse in seconds.
const REVERB_IR_SECS: f32 = 1.5;

/// Adjustable parameter targets, kept `Copy` so commands carrying them
/// can be dropped on the audio thread without freeing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectParam {
    Mix,
    Time,
    Feedback,
    Bass,
    Mid,
    Treble,
    Threshold,
    Ratio,
    Attack,
    Release,
}

impl EffectParam {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "mix" => Some(Self::Mix),
            "time" => Some(Self::Time),
            "feedback" => Some(Self::Feedback),
            "bass" => Some(Self::Bass),
            "mid" => Some(Self::Mid),
            "treble" => Some(Self::Treble),
            "threshold" => Some(Self::Threshold),
            "ratio" => Some(Self::Ratio),
            "attack" => Some(Self::Attack),
            "release" => Some(Self::Release),
            _ => None,
        }
    }
}

/// Bass/mid/treble EQ: low shelf at 250 Hz, peaking at 1 kHz (Q=1),
/// high shelf at 4 kHz. Gains ramp in dB; coefficients are recomputed
/// only while a ramp is in motion.
pub struct ThreeBandEq {
    sample_rate: f32,
    bass_db: SmoothedParam,
    mid_db: SmoothedParam,
    treble_db: SmoothedParam,
    applied: [f32; 3],
    left: [Biquad; 3],
    right: [Biquad; 3],
}

impl ThreeBandEq {
    const BASS_HZ: f32 = 250.0;
    const MID_HZ: f32 = 1000.0;
    const MID_Q: f32 = 1.0;
    const TREBLE_HZ: f32 = 4000.0;

    pub fn new(sample_rate: f32, bass_db: f32, mid_db: f32, treble_db: f32) -> Self {
        let coeffs = Self::coeffs(sample_rate, [bass_db, mid_db, treble_db]);
        Self {
            sample_rate,
            bass_db: SmoothedParam::new(bass_db, sample_rate, PARAM_SMOOTH_SECS),
            mid_db: SmoothedParam::new(mid_db, sample_rate, PARAM_SMOOTH_SECS),
            treble_db: SmoothedParam::new(treble_db, sample_rate, PARAM_SMOOTH_SECS),
            applied: [bass_db, mid_db, treble_db],
            left: coeffs.map(Biquad::new),
            right: coeffs.map(Biquad::new),
        }
    }

    fn coeffs(sample_rate: f32, gains_db: [f32; 3]) -> [BiquadCoeffs; 3] {
        [
            BiquadCoeffs::low_shelf(Self::BASS_HZ, FRAC_1_SQRT_2, gains_db[0], sample_rate),
            BiquadCoeffs::peaking(Self::MID_HZ, Self::MID_Q, gains_db[1], sample_rate),
            BiquadCoeffs::high_shelf(Self::TREBLE_HZ, FRAC_1_SQRT_2, gains_db[2], sample_rate),
        ]
    }

    pub fn set_bass(&mut self, gain_db: f32) {
        self.bass_db.set_target(gain_db);
    }

    pub fn set_mid(&mut self, gain_db: f32) {
        self.mid_db.set_target(gain_db);
    }

    pub fn set_treble(&mut self, gain_db: f32) {
        self.treble_db.set_target(gain_db);
    }

    #[inline]
    pub fn process_frame(&mut self, input_l: f32, input_r: f32) -> (f32, f32) {
        let gains = [
            self.bass_db.next(),
            self.mid_db.next(),
            self.treble_db.next(),
        ];
        if gains
            .iter()
            .zip(&self.applied)
            .any(|(g, a)| (g - a).abs() > 0.01)
        {
            let coeffs = Self::coeffs(self.sample_rate, gains);
            for (filter, c) in self.left.iter_mut().zip(&coeffs) {
                filter.set_coeffs(*c);
            }
            for (filter, c) in self.right.iter_mut().zip(&coeffs) {
                filter.set_coeffs(*c);
            }
            self.applied = gains;
        }

        let mut l = input_l;
        let mut r = input_r;
        for filter in &mut self.left {
            l = filter.process(l);
        }
        for filter in &mut self.right {
            r = filter.process(r);
        }
        (l, r)
    }
}

pub enum EffectProcessor {
    Reverb { convolver: Convolver, wet: SmoothedParam },
    Delay(FeedbackDelay),
    Eq(ThreeBandEq),
    Compressor(Compressor),
}

impl EffectProcessor {
    #[inline]
    pub fn process_frame(&mut self, input_l: f32, input_r: f32) -> (f32, f32) {
        match self {
            Self::Reverb { convolver, wet } => {
                let (l, r) = convolver.process_frame(input_l, input_r);
                let wet = wet.next();
                (l * wet, r * wet)
            }
            Self::Delay(delay) => delay.process_frame(input_l, input_r),
            Self::Eq(eq) => eq.process_frame(input_l, input_r),
            Self::Compressor(comp) => comp.process_frame(input_l, input_r),
        }
    }

    /// Retarget one parameter. Pairs that do not apply to this effect
    /// kind are no-ops.
    pub fn set_param(&mut self, param: EffectParam, value: f32) {
        match (self, param) {
            (Self::Reverb { wet, .. }, EffectParam::Mix) => wet.set_target(value / 100.0),
            (Self::Delay(delay), EffectParam::Time) => delay.set_time(value),
            (Self::Delay(delay), EffectParam::Feedback) => delay.set_feedback(value),
            (Self::Eq(eq), EffectParam::Bass) => eq.set_bass(value),
            (Self::Eq(eq), EffectParam::Mid) => eq.set_mid(value),
            (Self::Eq(eq), EffectParam::Treble) => eq.set_treble(value),
            (Self::Compressor(comp), EffectParam::Threshold) => comp.set_threshold(value),
            (Self::Compressor(comp), EffectParam::Ratio) => comp.set_ratio(value),
            (Self::Compressor(comp), EffectParam::Attack) => comp.set_attack(value),
            (Self::Compressor(comp), EffectParam::Release) => comp.set_release(value),
            _ => {}
        }
    }
}

/// One entry of a built chain, tagged with the effect it came from so
/// parameter updates can be routed by id.
pub struct EffectNode {
    pub effect_id: String,
    pub kind: EffectKind,
    pub processor: EffectProcessor,
}

/// Build the processing chain for a track's effect list, in order.
///
/// Disabled effects are omitted entirely rather than bypassed in place,
/// so toggling one is silent until the track's graph is rebuilt.
/// Distortion has no processor and contributes nothing.
pub fn build_chain(effects: &[AudioEffect], sample_rate: u32) -> Vec<EffectNode> {
    let sr = sample_rate as f32;
    let mut chain = Vec::new();

    for effect in effects.iter().filter(|e| e.enabled) {
        let processor = match effect.kind {
            EffectKind::Reverb => {
                let ir_len = (REVERB_IR_SECS * sr) as usize;
                let convolver = Convolver::new(&decaying_noise(ir_len), &decaying_noise(ir_len));
                let wet = SmoothedParam::new(effect.param("mix", 50.0) / 100.0, sr, PARAM_SMOOTH_SECS);
                EffectProcessor::Reverb { convolver, wet }
            }
            EffectKind::Delay => EffectProcessor::Delay(FeedbackDelay::new(
                sr,
                effect.param("time", 0.5),
                effect.param("feedback", 0.4),
            )),
            EffectKind::Eq => EffectProcessor::Eq(ThreeBandEq::new(
                sr,
                effect.param("bass", 0.0),
                effect.param("mid", 0.0),
                effect.param("treble", 0.0),
            )),
            EffectKind::Compressor => EffectProcessor::Compressor(Compressor::new(
                sr,
                effect.param("threshold", -24.0),
                effect.param("ratio", 4.0),
                effect.param("attack", 0.01),
                effect.param("release", 0.2),
            )),
            // No construction recipe; the effect exists in the model only.
            EffectKind::Distortion => continue,
        };
        chain.push(EffectNode {
            effect_id: effect.id.clone(),
            kind: effect.kind,
            processor,
        });
    }

    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracklab_transport::AudioEffect;

    #[test]
    fn disabled_effects_are_omitted_entirely() {
        let mut eq = AudioEffect::new("eq1", EffectKind::Eq);
        eq.enabled = false;
        let comp = AudioEffect::new("comp1", EffectKind::Compressor);

        let chain = build_chain(&[eq, comp], 48000);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].effect_id, "comp1");
        assert_eq!(chain[0].kind, EffectKind::Compressor);
    }

    #[test]
    fn distortion_builds_no_processor() {
        let effects = [
            AudioEffect::new("d1", EffectKind::Distortion),
            AudioEffect::new("dl1", EffectKind::Delay),
        ];
        let chain = build_chain(&effects, 48000);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].kind, EffectKind::Delay);
    }

    #[test]
    fn chain_preserves_effect_order() {
        let effects = [
            AudioEffect::new("a", EffectKind::Compressor),
            AudioEffect::new("b", EffectKind::Eq),
            AudioEffect::new("c", EffectKind::Delay),
        ];
        let chain = build_chain(&effects, 48000);
        let ids: Vec<&str> = chain.iter().map(|n| n.effect_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn flat_eq_is_transparent() {
        let effect = AudioEffect::new("eq", EffectKind::Eq);
        let mut chain = build_chain(&[effect], 48000);
        let node = &mut chain[0];

        for i in 0..256 {
            let x = (i as f32 * 0.1).sin() * 0.5;
            let (l, _) = node.processor.process_frame(x, x);
            assert!((l - x).abs() < 1e-3, "frame {i}: {l} vs {x}");
        }
    }

    #[test]
    fn unknown_param_pairs_are_noops() {
        let effect = AudioEffect::new("dl", EffectKind::Delay);
        let mut chain = build_chain(&[effect], 48000);
        // Bass on a delay does nothing and does not panic.
        chain[0].processor.set_param(EffectParam::Bass, 12.0);
    }

    #[test]
    fn param_names_parse_to_targets() {
        assert_eq!(EffectParam::parse("mix"), Some(EffectParam::Mix));
        assert_eq!(EffectParam::parse("feedback"), Some(EffectParam::Feedback));
        assert_eq!(EffectParam::parse("treble"), Some(EffectParam::Treble));
        assert_eq!(EffectParam::parse("release"), Some(EffectParam::Release));
        assert_eq!(EffectParam::parse("wetness"), None);
    }

    #[test]
    fn delay_param_updates_retarget_the_line() {
        let effect = AudioEffect::new("dl", EffectKind::Delay)
            .with_param("time", 0.1)
            .with_param("feedback", 0.0);
        let mut chain = build_chain(&[effect], 1000);

        chain[0].processor.set_param(EffectParam::Feedback, 0.5);
        // An impulse now echoes more than once.
        let (first, _) = chain[0].processor.process_frame(1.0, 1.0);
        assert_eq!(first, 0.0);
        let mut echoes = 0;
        for _ in 0..400 {
            let (l, _) = chain[0].processor.process_frame(0.0, 0.0);
            if l.abs() > 0.05 {
                echoes += 1;
            }
        }
        assert!(echoes >= 2, "expected feedback echoes, saw {echoes}");
    }
}
