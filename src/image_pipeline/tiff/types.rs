//! Raster and encoding types shared by the TIFF reader, the flat-field core and the writer

use crate::image_pipeline::common::error::{DebandError, Result};

/// Largest sample value the 16-bit output can hold.
pub const MAX_OUTPUT_SAMPLE: u16 = u16::MAX;

/// Output is always written as unsigned 16-bit samples.
pub const OUTPUT_BITS_PER_SAMPLE: u16 = 16;

/// Default strip size budget, matching the common 8 KiB TIFF recommendation.
pub const DEFAULT_STRIP_BYTES: usize = 8 * 1024;

/// Photometric interpretation carried from a decoded image to its corrected output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Photometric {
    /// Single channel, zero is black
    MinIsBlack,
    /// Three colour channels, optionally followed by alpha
    Rgb,
}

/// Decoded image held by exactly one pipeline stage at a time
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
    /// Samples per pixel
    pub channels: usize,
    /// Chunky samples, `channels` values per pixel, row-major
    pub data: Vec<u32>,
    /// Bit depth of the source samples (8, 16 or 32)
    pub bits_per_sample: u32,
    pub photometric: Photometric,
}

impl RasterGrid {
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<u32>,
        bits_per_sample: u32,
        photometric: Photometric,
    ) -> Result<Self> {
        let expected = width * height * channels;
        if data.len() != expected {
            return Err(DebandError::DecodeError(format!(
                "sample buffer holds {} values, expected {} ({}x{}x{})",
                data.len(),
                expected,
                width,
                height,
                channels
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
            bits_per_sample,
            photometric,
        })
    }

    /// Sample value at `(x, y)` for `channel`.
    #[inline]
    pub fn sample(&self, x: usize, y: usize, channel: usize) -> u32 {
        self.data[(y * self.width + x) * self.channels + channel]
    }

    /// Chunky samples of row `y`.
    #[inline]
    pub fn row(&self, y: usize) -> &[u32] {
        let stride = self.width * self.channels;
        &self.data[y * stride..(y + 1) * stride]
    }
}

/// Corrected 16-bit output. Pixels outside the corrected extent stay zero.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedRaster {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: Vec<u16>,
}

impl CorrectedRaster {
    pub fn zeroed(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0; width * height * channels],
        }
    }

    #[inline]
    pub fn sample(&self, x: usize, y: usize, channel: usize) -> u16 {
        self.data[(y * self.width + x) * self.channels + channel]
    }
}

/// TIFF compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffCompression {
    /// No compression (fastest, largest file)
    None,
    /// LZW compression
    Lzw,
    /// Deflate compression - fast level
    DeflateFast,
    /// Deflate compression - balanced (default)
    DeflateBalanced,
    /// Deflate compression - best compression (slower)
    DeflateBest,
}

/// What to do when a target image and the reference differ in size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionPolicy {
    /// Correct the overlapping extent only; the rest of the output stays zero
    Truncate,
    /// Fail the file
    Reject,
}

/// Everything the encoder needs besides the samples themselves.
///
/// Planar configuration is always chunky and sample format always unsigned
/// integer; both are implied by the 16-bit colour types the writer uses.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeMetadata {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub bits_per_sample: u16,
    pub photometric: Photometric,
    pub rows_per_strip: u32,
    pub compression: TiffCompression,
    pub predictor: Option<u16>,
}

impl EncodeMetadata {
    pub fn for_output(
        width: usize,
        height: usize,
        channels: usize,
        photometric: Photometric,
        config: &DebandConfig,
    ) -> Self {
        Self {
            width,
            height,
            channels,
            bits_per_sample: OUTPUT_BITS_PER_SAMPLE,
            photometric,
            rows_per_strip: rows_per_strip(width, channels, config.strip_bytes),
            compression: config.compression,
            predictor: config.predictor,
        }
    }
}

/// Rows per strip so that one strip stays within `strip_bytes`, never less than one row.
pub fn rows_per_strip(width: usize, channels: usize, strip_bytes: usize) -> u32 {
    let row_bytes = width * channels * (OUTPUT_BITS_PER_SAMPLE as usize / 8);
    if row_bytes == 0 {
        return 1;
    }
    (strip_bytes / row_bytes).clamp(1, u32::MAX as usize) as u32
}

/// Configuration for debanding a single image
#[derive(Debug, Clone)]
pub struct DebandConfig {
    /// Compression method to use
    pub compression: TiffCompression,
    /// Predictor value for compression (typically 2 for horizontal differencing)
    pub predictor: Option<u16>,
    /// Divisor applied on top of each multiplier; 1.0 applies the profile as-is
    pub strength: f64,
    /// Whether to reject images with a zero dimension before correcting
    pub validate_dimensions: bool,
    pub dimension_policy: DimensionPolicy,
    /// Target size of one output strip in bytes
    pub strip_bytes: usize,
}

impl Default for DebandConfig {
    fn default() -> Self {
        Self {
            compression: TiffCompression::DeflateBalanced,
            predictor: None,
            strength: 1.0,
            validate_dimensions: true,
            dimension_policy: DimensionPolicy::Truncate,
            strip_bytes: DEFAULT_STRIP_BYTES,
        }
    }
}

impl DebandConfig {
    pub fn builder() -> DebandConfigBuilder {
        DebandConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.strength.is_finite() || self.strength <= 0.0 {
            return Err(DebandError::InvalidConfig(format!(
                "strength must be a positive number, got {}",
                self.strength
            )));
        }
        if self.strip_bytes == 0 {
            return Err(DebandError::InvalidConfig(
                "strip size must be at least one byte".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for DebandConfig
#[derive(Default)]
pub struct DebandConfigBuilder {
    compression: Option<TiffCompression>,
    predictor: Option<Option<u16>>,
    strength: Option<f64>,
    validate_dimensions: Option<bool>,
    dimension_policy: Option<DimensionPolicy>,
    strip_bytes: Option<usize>,
}

impl DebandConfigBuilder {
    pub fn compression(mut self, compression: TiffCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn predictor(mut self, predictor: Option<u16>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn strength(mut self, strength: f64) -> Self {
        self.strength = Some(strength);
        self
    }

    pub fn validate_dimensions(mut self, validate: bool) -> Self {
        self.validate_dimensions = Some(validate);
        self
    }

    pub fn dimension_policy(mut self, policy: DimensionPolicy) -> Self {
        self.dimension_policy = Some(policy);
        self
    }

    pub fn strip_bytes(mut self, bytes: usize) -> Self {
        self.strip_bytes = Some(bytes);
        self
    }

    pub fn build(self) -> DebandConfig {
        let default = DebandConfig::default();
        DebandConfig {
            compression: self.compression.unwrap_or(default.compression),
            predictor: self.predictor.unwrap_or(default.predictor),
            strength: self.strength.unwrap_or(default.strength),
            validate_dimensions: self
                .validate_dimensions
                .unwrap_or(default.validate_dimensions),
            dimension_policy: self.dimension_policy.unwrap_or(default.dimension_policy),
            strip_bytes: self.strip_bytes.unwrap_or(default.strip_bytes),
        }
    }
}
