mod mixdown;
mod normalize;
mod wav;

pub use mixdown::export_project;
pub use normalize::{NORMALIZE_TARGET_PEAK, normalize_wav};
pub use wav::encode_wav;
