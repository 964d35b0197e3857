use crate::smoothing::SmoothedParam;

/// Stereo feedback delay line with a smoothed, fractional read position.
///
/// The output is the delayed signal only; the dry path is whatever the
/// caller routes around it. Feedback is written back into the line, so a
/// single line produces the repeating echo tail.
#[derive(Clone, Debug)]
pub struct FeedbackDelay {
    left: Vec<f32>,
    right: Vec<f32>,
    write: usize,
    sample_rate: f32,
    time: SmoothedParam,
    feedback: SmoothedParam,
}

/// Upper bound on the delay time in seconds.
pub const MAX_DELAY_SECS: f32 = 2.0;

impl FeedbackDelay {
    pub fn new(sample_rate: f32, time_secs: f32, feedback: f32) -> Self {
        let sample_rate = sample_rate.max(1.0);
        let capacity = (sample_rate * MAX_DELAY_SECS).ceil() as usize + 1;
        Self {
            left: vec![0.0; capacity],
            right: vec![0.0; capacity],
            write: 0,
            sample_rate,
            time: SmoothedParam::new(time_secs.clamp(0.0, MAX_DELAY_SECS), sample_rate, 0.01),
            feedback: SmoothedParam::new(feedback.clamp(-0.99, 0.99), sample_rate, 0.01),
        }
    }

    pub fn set_time(&mut self, time_secs: f32) {
        self.time.set_target(time_secs.clamp(0.0, MAX_DELAY_SECS));
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback.set_target(feedback.clamp(-0.99, 0.99));
    }

    #[inline]
    fn read(buf: &[f32], write: usize, delay_samples: f32) -> f32 {
        let len = buf.len();
        let whole = delay_samples as usize;
        let frac = delay_samples - whole as f32;
        let idx0 = (write + len - whole % len) % len;
        let idx1 = (idx0 + len - 1) % len;
        buf[idx0] * (1.0 - frac) + buf[idx1] * frac
    }

    #[inline]
    pub fn process_frame(&mut self, input_l: f32, input_r: f32) -> (f32, f32) {
        let len = self.left.len();
        let delay_samples = (self.time.next() * self.sample_rate).clamp(1.0, (len - 1) as f32);
        let feedback = self.feedback.next();

        let wet_l = Self::read(&self.left, self.write, delay_samples);
        let wet_r = Self::read(&self.right, self.write, delay_samples);

        self.left[self.write] = input_l + wet_l * feedback;
        self.right[self.write] = input_r + wet_r * feedback;
        self.write = (self.write + 1) % len;

        (wet_l, wet_r)
    }

    pub fn clear(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
        self.write = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_returns_after_delay_time() {
        let sample_rate = 1000.0;
        let mut delay = FeedbackDelay::new(sample_rate, 0.1, 0.0);

        let mut outputs = Vec::new();
        let (l, _) = delay.process_frame(1.0, 1.0);
        outputs.push(l);
        for _ in 0..200 {
            let (l, _) = delay.process_frame(0.0, 0.0);
            outputs.push(l);
        }

        let peak_at = outputs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().partial_cmp(&b.1.abs()).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        // 0.1 s at 1 kHz = 100 samples.
        assert!(
            (peak_at as i64 - 100).abs() <= 1,
            "echo arrived at {peak_at}"
        );
    }

    #[test]
    fn feedback_produces_second_echo() {
        let sample_rate = 1000.0;
        let mut delay = FeedbackDelay::new(sample_rate, 0.05, 0.5);

        let mut outputs = Vec::new();
        let (l, _) = delay.process_frame(1.0, 1.0);
        outputs.push(l);
        for _ in 0..200 {
            let (l, _) = delay.process_frame(0.0, 0.0);
            outputs.push(l);
        }

        let first = outputs[50];
        let second = outputs[100];
        assert!(first > 0.9, "first echo {first}");
        assert!(
            (second - first * 0.5).abs() < 0.1,
            "second echo {second} vs expected {}",
            first * 0.5
        );
    }

    #[test]
    fn time_is_clamped_to_maximum() {
        let mut delay = FeedbackDelay::new(100.0, 10.0, 0.0);
        delay.set_time(50.0);
        // Does not panic and the echo fits in the buffer.
        for _ in 0..1000 {
            delay.process_frame(0.1, 0.1);
        }
    }
}
