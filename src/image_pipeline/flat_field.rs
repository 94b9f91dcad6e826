//! Flat-field correction module
//!
//! Derives a correction profile from a light-source-only reference image and
//! divides target images by it, pixel by pixel and channel by channel.

mod corrector;
mod pixel;
mod profile;


pub use corrector::correct_image;
pub use pixel::correct_sample;
pub use profile::{BandingStats, CorrectionProfile};
