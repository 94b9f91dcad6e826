//! TIFF raster reader built on the `tiff` crate.
//!
//! Decodes the first image directory of a TIFF file into a chunky [`RasterGrid`].
//! Unsigned integer samples of 8, 16 and 32 bits are supported for grayscale,
//! RGB and RGBA images; sample values are kept as-is, without rescaling.

use std::io::Cursor;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::ColorType;
use tracing::debug;

use crate::image_pipeline::common::error::{DebandError, Result};
use crate::image_pipeline::tiff::reader::RasterReader;
use crate::image_pipeline::tiff::types::{Photometric, RasterGrid};

/// Film scans routinely exceed the decoder's default buffer limits.
const MAX_DECODE_BYTES: usize = 1024 * 1024 * 1024;

pub struct StandardTiffReader;

impl StandardTiffReader {
    /// Channel count, photometric interpretation and bit depth for a decoded colour type.
    pub(super) fn layout(color_type: ColorType) -> Result<(usize, Photometric, u32)> {
        match color_type {
            ColorType::Gray(bits) => Ok((1, Photometric::MinIsBlack, bits as u32)),
            ColorType::RGB(bits) => Ok((3, Photometric::Rgb, bits as u32)),
            ColorType::RGBA(bits) => Ok((4, Photometric::Rgb, bits as u32)),
            other => Err(DebandError::UnsupportedFormat(format!(
                "colour type {:?}",
                other
            ))),
        }
    }
}

impl RasterReader for StandardTiffReader {
    /// Reads and decodes a TIFF image from a byte array.
    ///
    /// # Returns
    ///
    /// * `Ok(RasterGrid)` - Decoded samples with geometry and photometric interpretation
    /// * `Err(DebandError)` - The bytes are not a readable TIFF, or use an unsupported layout
    fn read_raster(&self, data: &[u8]) -> Result<RasterGrid> {
        debug!("Decoding TIFF image, {} bytes", data.len());

        let mut limits = Limits::default();
        limits.decoding_buffer_size = MAX_DECODE_BYTES;
        limits.ifd_value_size = MAX_DECODE_BYTES;
        limits.intermediate_buffer_size = MAX_DECODE_BYTES;

        let mut decoder = Decoder::new(Cursor::new(data))
            .map_err(|e| DebandError::DecodeError(e.to_string()))?
            .with_limits(limits);

        let (width, height) = decoder
            .dimensions()
            .map_err(|e| DebandError::DecodeError(e.to_string()))?;
        let color_type = decoder
            .colortype()
            .map_err(|e| DebandError::DecodeError(e.to_string()))?;
        let (channels, photometric, bits_per_sample) = Self::layout(color_type)?;

        let samples: Vec<u32> = match decoder
            .read_image()
            .map_err(|e| DebandError::DecodeError(e.to_string()))?
        {
            DecodingResult::U8(buf) => buf.into_iter().map(u32::from).collect(),
            DecodingResult::U16(buf) => buf.into_iter().map(u32::from).collect(),
            DecodingResult::U32(buf) => buf,
            _ => {
                return Err(DebandError::UnsupportedFormat(
                    "only unsigned 8, 16 and 32-bit samples are supported".to_string(),
                ));
            }
        };

        debug!(
            "Decoded image: {}x{}, {} channels, {} bits",
            width, height, channels, bits_per_sample
        );

        RasterGrid::new(
            width as usize,
            height as usize,
            channels,
            samples,
            bits_per_sample,
            photometric,
        )
    }
}
