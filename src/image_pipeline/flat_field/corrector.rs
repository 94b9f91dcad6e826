use rayon::prelude::*;
use tracing::{instrument, warn};

use crate::image_pipeline::common::error::{DebandError, Result};
use crate::image_pipeline::flat_field::pixel::correct_sample;
use crate::image_pipeline::flat_field::profile::CorrectionProfile;
use crate::image_pipeline::tiff::types::{CorrectedRaster, DimensionPolicy, RasterGrid};

/// Applies `profile` to every pixel of `target` that lies inside the profile's extent.
///
/// The output has the target's geometry. With [`DimensionPolicy::Truncate`],
/// pixels beyond the reference's width or height are left at zero.
#[instrument(skip(target, profile), fields(width = target.width, height = target.height))]
pub fn correct_image(
    target: &RasterGrid,
    profile: &CorrectionProfile,
    strength: f64,
    policy: DimensionPolicy,
) -> Result<CorrectedRaster> {
    if target.channels != profile.channels() {
        return Err(DebandError::ChannelMismatch {
            expected: profile.channels(),
            found: target.channels,
        });
    }

    let mismatched = target.width != profile.width() || target.height != profile.height();
    if mismatched {
        match policy {
            DimensionPolicy::Reject => {
                return Err(DebandError::DimensionMismatch {
                    target_width: target.width,
                    target_height: target.height,
                    profile_width: profile.width(),
                    profile_height: profile.height(),
                });
            }
            DimensionPolicy::Truncate => warn!(
                "Target {}x{} differs from reference {}x{}, correcting the overlap only",
                target.width,
                target.height,
                profile.width(),
                profile.height()
            ),
        }
    }

    let channels = target.channels;
    let extent_width = target.width.min(profile.width());
    let extent_height = target.height.min(profile.height());

    let mut output = CorrectedRaster::zeroed(target.width, target.height, channels);
    if output.data.is_empty() {
        return Ok(output);
    }

    output
        .data
        .par_chunks_mut(target.width * channels)
        .take(extent_height)
        .enumerate()
        .for_each(|(y, out_row)| {
            let src_row = target.row(y);
            for channel in 0..channels {
                let multipliers = profile.multiplier_row(channel, y);
                for x in 0..extent_width {
                    let i = x * channels + channel;
                    out_row[i] = correct_sample(src_row[i], multipliers[x], strength);
                }
            }
        });

    Ok(output)
}
