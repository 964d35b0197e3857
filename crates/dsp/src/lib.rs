pub mod biquad;
pub mod convolver;
pub mod delay;
pub mod dynamics;
pub mod smoothing;
pub mod util;

pub use biquad::{Biquad, BiquadCoeffs};
pub use convolver::{Convolver, decaying_noise};
pub use delay::FeedbackDelay;
pub use dynamics::Compressor;
pub use smoothing::SmoothedParam;
pub use util::{db_to_linear, linear_to_db, pan_gains, rms};
