use tracklab_dsp::{Compressor, SmoothedParam, linear_to_db, rms};

/// Fixed analysis block size in samples. The adaptation step runs once
/// per full block, synchronously on the input callback.
pub const ANALYSIS_BLOCK: usize = 2048;

const GATE_THRESHOLD_DB: f32 = -45.0;
/// Gain applied while the gate is closed (-20 dB).
const GATE_FLOOR: f32 = 0.1;

const LEVELER_LOW_DB: f32 = -18.0;
const LEVELER_HIGH_DB: f32 = -6.0;
const LEVELER_MIN_GAIN: f32 = 1.0;
const LEVELER_MAX_GAIN: f32 = 10.0;

const INPUT_GAIN_SMOOTH_SECS: f32 = 0.01;
const GATE_SMOOTH_SECS: f32 = 0.05;
const LEVELER_SMOOTH_SECS: f32 = 0.1;

/// The real-time conditioning applied to the capture input, in strict
/// order: manual gain, noise gate, auto-leveler, brickwall limiter.
///
/// The gate and leveler are driven by a block analysis of the signal
/// *after* the leveler and *before* the limiter, so adaptation reacts
/// to the raw dynamics the limiter is about to tame. The analysis path
/// is control-only; it feeds no audible output.
pub struct ConditioningChain {
    input_gain: SmoothedParam,
    gate: SmoothedParam,
    leveler: SmoothedParam,
    /// Unsmoothed leveler control value the block adaptation walks.
    leveler_gain: f32,
    limiter: Compressor,
    block: Vec<f32>,
    fill: usize,
}

impl ConditioningChain {
    pub fn new(sample_rate: u32) -> Self {
        let sr = sample_rate as f32;
        Self {
            input_gain: SmoothedParam::new(1.0, sr, INPUT_GAIN_SMOOTH_SECS),
            gate: SmoothedParam::new(1.0, sr, GATE_SMOOTH_SECS),
            leveler: SmoothedParam::new(1.0, sr, LEVELER_SMOOTH_SECS),
            leveler_gain: 1.0,
            limiter: Compressor::limiter(sr),
            block: vec![0.0; ANALYSIS_BLOCK],
            fill: 0,
        }
    }

    /// Retarget the manual input gain, ramped over ~10 ms.
    pub fn set_input_gain(&mut self, gain: f32) {
        self.input_gain.set_target(gain.max(0.0));
    }

    /// Condition one mono sample. Allocation-free; runs on the
    /// real-time input thread.
    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        let sample = sample * self.input_gain.next();
        let sample = sample * self.gate.next();
        let sample = sample * self.leveler.next();

        self.block[self.fill] = sample;
        self.fill += 1;
        if self.fill == ANALYSIS_BLOCK {
            self.analyze_block();
            self.fill = 0;
        }

        self.limiter.process(sample)
    }

    /// One adaptation step per full block.
    fn analyze_block(&mut self) {
        let level = rms(&self.block);
        if level <= 0.0 {
            // Silent block: leave both stages where they are.
            return;
        }
        let db = linear_to_db(level);

        // Gate: duck the floor when the block is below the threshold,
        // open fully otherwise.
        self.gate.set_target(if db < GATE_THRESHOLD_DB {
            GATE_FLOOR
        } else {
            1.0
        });

        // Leveler: walk the gain multiplicatively toward the target
        // window, faster the further outside the window the block sits.
        let mut gain = self.leveler_gain;
        if db < LEVELER_LOW_DB {
            let diff = LEVELER_LOW_DB - db;
            gain *= 1.0 + (diff * 0.0015).min(0.05);
        } else if db > LEVELER_HIGH_DB {
            let diff = db - LEVELER_HIGH_DB;
            gain *= 1.0 - (diff * 0.002).min(0.05);
        }
        gain = gain.clamp(LEVELER_MIN_GAIN, LEVELER_MAX_GAIN);
        self.leveler_gain = gain;
        self.leveler.set_target(gain);
    }

    pub fn gate_gain(&self) -> f32 {
        self.gate.current()
    }

    pub fn leveler_gain(&self) -> f32 {
        self.leveler_gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracklab_dsp::db_to_linear;

    const RATE: u32 = 48000;

    /// Push `blocks` full analysis blocks of a constant-level signal.
    fn feed_level(chain: &mut ConditioningChain, level_db: f32, blocks: usize) {
        let amplitude = db_to_linear(level_db);
        for _ in 0..blocks * ANALYSIS_BLOCK {
            chain.process(amplitude);
        }
    }

    #[test]
    fn gate_closes_on_quiet_input() {
        let mut chain = ConditioningChain::new(RATE);
        // -60 dB is well under the -45 dB threshold; after a few
        // 50 ms time constants the gate gain sits at the floor.
        feed_level(&mut chain, -60.0, 20);
        assert!(
            (chain.gate_gain() - GATE_FLOOR).abs() < 0.02,
            "gate gain {}",
            chain.gate_gain()
        );
    }

    #[test]
    fn gate_opens_on_loud_input() {
        let mut chain = ConditioningChain::new(RATE);
        feed_level(&mut chain, -60.0, 20);
        feed_level(&mut chain, 0.0, 20);
        assert!(
            (chain.gate_gain() - 1.0).abs() < 0.02,
            "gate gain {}",
            chain.gate_gain()
        );
    }

    #[test]
    fn leveler_boosts_quiet_signal_toward_window() {
        let mut chain = ConditioningChain::new(RATE);
        feed_level(&mut chain, -30.0, 50);
        assert!(
            chain.leveler_gain() > 1.5,
            "leveler gain {}",
            chain.leveler_gain()
        );
    }

    #[test]
    fn leveler_stays_within_bounds() {
        let mut chain = ConditioningChain::new(RATE);
        // A long stretch far below the window pushes toward the cap.
        feed_level(&mut chain, -60.0, 400);
        assert!(chain.leveler_gain() <= LEVELER_MAX_GAIN);

        // A loud stretch can never pull the gain under unity.
        feed_level(&mut chain, 0.0, 400);
        assert!(chain.leveler_gain() >= LEVELER_MIN_GAIN);
    }

    #[test]
    fn leveler_bounded_for_arbitrary_level_sequences() {
        let mut chain = ConditioningChain::new(RATE);
        let levels = [-70.0, -3.0, -25.0, 0.0, -50.0, -12.0, -90.0, -1.0];
        for _ in 0..10 {
            for &db in &levels {
                feed_level(&mut chain, db, 1);
                let gain = chain.leveler_gain();
                assert!(
                    (LEVELER_MIN_GAIN..=LEVELER_MAX_GAIN).contains(&gain),
                    "leveler gain {gain} out of bounds"
                );
            }
        }
    }

    #[test]
    fn silent_blocks_skip_adaptation() {
        let mut chain = ConditioningChain::new(RATE);
        feed_level(&mut chain, -60.0, 20);
        let gate_before = chain.gate.target();
        let leveler_before = chain.leveler_gain();

        // Pure digital silence must not move either stage.
        for _ in 0..10 * ANALYSIS_BLOCK {
            chain.process(0.0);
        }
        assert_eq!(chain.gate.target(), gate_before);
        assert_eq!(chain.leveler_gain(), leveler_before);
    }

    #[test]
    fn in_window_signal_leaves_leveler_alone() {
        let mut chain = ConditioningChain::new(RATE);
        feed_level(&mut chain, -12.0, 20);
        assert_eq!(chain.leveler_gain(), 1.0);
    }

    #[test]
    fn limiter_caps_hot_output() {
        let mut chain = ConditioningChain::new(RATE);
        chain.set_input_gain(4.0);
        let mut peak = 0.0f32;
        for i in 0..RATE as usize {
            let t = i as f32 / RATE as f32;
            let s = (2.0 * std::f32::consts::PI * 440.0 * t).sin();
            let out = chain.process(s);
            if i > RATE as usize / 2 {
                peak = peak.max(out.abs());
            }
        }
        assert!(peak < 1.1, "limited peak {peak}");
    }

    #[test]
    fn manual_gain_scales_the_chain_input() {
        let mut chain = ConditioningChain::new(RATE);
        chain.set_input_gain(2.0);
        // Let the gain ramp settle.
        let mut last = 0.0;
        for _ in 0..4800 {
            last = chain.process(0.1);
        }
        assert!((last - 0.2).abs() < 0.01, "output {last}");
    }
}
