use crate::smoothing::SmoothedParam;
use crate::util::{db_to_linear, linear_to_db};

/// Peak envelope follower with separate attack and release times.
#[derive(Debug, Clone, Copy)]
struct EnvelopeFollower {
    attack_coeff: f32,
    release_coeff: f32,
    envelope: f32,
    sample_rate: f32,
}

impl EnvelopeFollower {
    fn new(sample_rate: f32, attack_secs: f32, release_secs: f32) -> Self {
        let mut follower = Self {
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope: 0.0,
            sample_rate,
        };
        follower.set_times(attack_secs, release_secs);
        follower
    }

    fn set_times(&mut self, attack_secs: f32, release_secs: f32) {
        self.attack_coeff = (-1.0 / (attack_secs.max(1e-5) * self.sample_rate)).exp();
        self.release_coeff = (-1.0 / (release_secs.max(1e-5) * self.sample_rate)).exp();
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let level = input.abs();
        let coeff = if level > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = level + coeff * (self.envelope - level);
        self.envelope
    }
}

/// Hard-knee feed-forward compressor. Both channels share one envelope
/// so the stereo image does not wander under gain reduction.
#[derive(Debug, Clone)]
pub struct Compressor {
    threshold_db: SmoothedParam,
    ratio: SmoothedParam,
    attack_secs: f32,
    release_secs: f32,
    envelope: EnvelopeFollower,
}

impl Compressor {
    pub fn new(
        sample_rate: f32,
        threshold_db: f32,
        ratio: f32,
        attack_secs: f32,
        release_secs: f32,
    ) -> Self {
        Self {
            threshold_db: SmoothedParam::new(threshold_db, sample_rate, 0.01),
            ratio: SmoothedParam::new(ratio.max(1.0), sample_rate, 0.01),
            attack_secs,
            release_secs,
            envelope: EnvelopeFollower::new(sample_rate, attack_secs, release_secs),
        }
    }

    /// Brickwall safety limiter: -0.3 dB ceiling, 20:1, 1 ms attack,
    /// 50 ms release.
    pub fn limiter(sample_rate: f32) -> Self {
        Self::new(sample_rate, -0.3, 20.0, 0.001, 0.05)
    }

    pub fn set_threshold(&mut self, threshold_db: f32) {
        self.threshold_db.set_target(threshold_db);
    }

    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio.set_target(ratio.max(1.0));
    }

    pub fn set_attack(&mut self, attack_secs: f32) {
        self.attack_secs = attack_secs;
        self.envelope.set_times(self.attack_secs, self.release_secs);
    }

    pub fn set_release(&mut self, release_secs: f32) {
        self.release_secs = release_secs;
        self.envelope.set_times(self.attack_secs, self.release_secs);
    }

    #[inline]
    fn gain_for(&mut self, level: f32) -> f32 {
        let threshold_db = self.threshold_db.next();
        let ratio = self.ratio.next();
        let level_db = linear_to_db(level);
        let over_db = level_db - threshold_db;
        if over_db <= 0.0 {
            return 1.0;
        }
        let reduction_db = over_db * (1.0 - 1.0 / ratio);
        db_to_linear(-reduction_db)
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let level = self.envelope.process(input);
        input * self.gain_for(level)
    }

    #[inline]
    pub fn process_frame(&mut self, input_l: f32, input_r: f32) -> (f32, f32) {
        let level = self.envelope.process(input_l.abs().max(input_r.abs()));
        let gain = self.gain_for(level);
        (input_l * gain, input_r * gain)
    }
}
