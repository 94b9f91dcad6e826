//! Reference analysis: turns a flat-field image into per-pixel correction multipliers.

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::image_pipeline::common::error::ProfileError;
use crate::image_pipeline::tiff::types::RasterGrid;

/// Per-channel averages and per-pixel multipliers derived from one reference image.
///
/// Built once per batch and only read afterwards, so it can be shared between
/// worker threads behind an `Arc` without locking.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionProfile {
    width: usize,
    height: usize,
    channels: usize,
    channel_average: Vec<f64>,
    /// Planar `[channel][y][x]`
    multipliers: Vec<f64>,
    /// `[channel][x]`, mean multiplier of each column
    column_means: Vec<f64>,
    /// `[channel][y]`, mean multiplier of each row
    row_means: Vec<f64>,
}

/// Extremes of the column and row mean multipliers of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandingStats {
    pub channel: usize,
    pub column_min: f64,
    pub column_max: f64,
    pub row_min: f64,
    pub row_max: f64,
}

impl BandingStats {
    /// Largest relative deviation between the brightest and darkest column or row.
    pub fn spread(&self) -> f64 {
        (self.column_max - self.column_min).max(self.row_max - self.row_min)
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

impl CorrectionProfile {
    /// Derives the profile from a reference (light source only) image.
    ///
    /// Channel sums are accumulated as exact integers; `u64` holds the sum of
    /// more than 4e9 pixels of 32-bit samples, so the average is exact up to the
    /// final division.
    #[instrument(skip(reference), fields(width = reference.width, height = reference.height, channels = reference.channels))]
    pub fn analyze(reference: &RasterGrid) -> Result<Self, ProfileError> {
        let (width, height, channels) = (reference.width, reference.height, reference.channels);
        if width == 0 || height == 0 || channels == 0 {
            return Err(ProfileError::EmptyReference { width, height });
        }

        let sums = reference
            .data
            .par_chunks(width * channels)
            .fold(
                || vec![0u64; channels],
                |mut acc, row| {
                    for pixel in row.chunks_exact(channels) {
                        for (sum, &sample) in acc.iter_mut().zip(pixel) {
                            *sum += sample as u64;
                        }
                    }
                    acc
                },
            )
            .reduce(
                || vec![0u64; channels],
                |mut a, b| {
                    for (x, y) in a.iter_mut().zip(b) {
                        *x += y;
                    }
                    a
                },
            );

        let pixel_count = (width * height) as f64;
        let channel_average: Vec<f64> = sums.iter().map(|&s| s as f64 / pixel_count).collect();

        if let Some(channel) = channel_average.iter().position(|&avg| avg == 0.0) {
            return Err(ProfileError::ZeroChannelAverage { channel });
        }

        let plane_len = width * height;
        let mut multipliers = vec![0f64; plane_len * channels];
        for (channel, plane) in multipliers.chunks_mut(plane_len).enumerate() {
            let average = channel_average[channel];
            plane
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(y, out_row)| {
                    let src_row = reference.row(y);
                    for (x, out) in out_row.iter_mut().enumerate() {
                        *out = src_row[x * channels + channel] as f64 / average;
                    }
                });
        }

        let mut column_means = vec![0f64; channels * width];
        let mut row_means = vec![0f64; channels * height];
        for (channel, plane) in multipliers.chunks(plane_len).enumerate() {
            let columns = &mut column_means[channel * width..(channel + 1) * width];
            let rows = &mut row_means[channel * height..(channel + 1) * height];
            for (y, row) in plane.chunks(width).enumerate() {
                for (x, &m) in row.iter().enumerate() {
                    columns[x] += m;
                }
                rows[y] = row.iter().sum::<f64>() / width as f64;
            }
            for column in columns.iter_mut() {
                *column /= height as f64;
            }
        }

        debug!(averages = ?channel_average, "Reference profile computed");

        Ok(Self {
            width,
            height,
            channels,
            channel_average,
            multipliers,
            column_means,
            row_means,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn channel_average(&self) -> &[f64] {
        &self.channel_average
    }

    /// Multiplier at `(x, y)` for `channel`.
    #[inline]
    pub fn multiplier(&self, x: usize, y: usize, channel: usize) -> f64 {
        self.multipliers[(channel * self.height + y) * self.width + x]
    }

    /// Multipliers of row `y` in `channel`.
    #[inline]
    pub fn multiplier_row(&self, channel: usize, y: usize) -> &[f64] {
        let start = (channel * self.height + y) * self.width;
        &self.multipliers[start..start + self.width]
    }

    /// Mean multiplier of every column of `channel`, left to right.
    pub fn column_profile(&self, channel: usize) -> &[f64] {
        &self.column_means[channel * self.width..(channel + 1) * self.width]
    }

    /// Mean multiplier of every row of `channel`, top to bottom.
    pub fn row_profile(&self, channel: usize) -> &[f64] {
        &self.row_means[channel * self.height..(channel + 1) * self.height]
    }

    pub fn banding_stats(&self) -> Vec<BandingStats> {
        (0..self.channels)
            .map(|channel| {
                let (column_min, column_max) = min_max(self.column_profile(channel));
                let (row_min, row_max) = min_max(self.row_profile(channel));
                BandingStats {
                    channel,
                    column_min,
                    column_max,
                    row_min,
                    row_max,
                }
            })
            .collect()
    }
}
