use crate::image_pipeline::tiff::types::MAX_OUTPUT_SAMPLE;

/// Divides `sample` by `strength * multiplier` and clamps the result to the 16-bit range.
///
/// A zero multiplier saturates non-zero samples to the maximum; `0 / 0` yields 0.
#[inline]
pub fn correct_sample(sample: u32, multiplier: f64, strength: f64) -> u16 {
    let corrected = (sample as f64 / (strength * multiplier)).floor();
    if corrected.is_nan() {
        return 0;
    }
    corrected.clamp(0.0, MAX_OUTPUT_SAMPLE as f64) as u16
}
