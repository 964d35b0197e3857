use std::f32::consts::FRAC_PI_2;

#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    if db <= -120.0 {
        0.0
    } else {
        10.0f32.powf(db * 0.05)
    }
}

/// Linear amplitude to decibels. Silence maps to -infinity.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    20.0 * linear.log10()
}

/// Root-mean-square level of a block.
pub fn rms(block: &[f32]) -> f32 {
    if block.is_empty() {
        return 0.0;
    }
    let sum: f32 = block.iter().map(|s| s * s).sum();
    (sum / block.len() as f32).sqrt()
}

/// Constant-power pan gains for pan in -1.0 (left) ..= 1.0 (right).
#[inline]
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let angle = ((pan.clamp(-1.0, 1.0) + 1.0) * 0.5) * FRAC_PI_2;
    (angle.cos(), angle.sin())
}
