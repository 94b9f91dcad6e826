use std::io::{Cursor, Seek, Write};

use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::compression::DeflateLevel;
use tiff::encoder::{Compression, TiffEncoder};
use tiff::tags::Predictor;
use tracing::debug;

use crate::image_pipeline::common::error::{DebandError, Result};
use crate::image_pipeline::tiff::types::{
    CorrectedRaster, EncodeMetadata, Photometric, TiffCompression,
};
use crate::image_pipeline::tiff::writer::TiffWriter;

pub struct StandardTiffWriter;

fn encode_as<C, W>(
    encoder: &mut TiffEncoder<W>,
    image: &CorrectedRaster,
    metadata: &EncodeMetadata,
) -> Result<()>
where
    C: ColorType<Inner = u16>,
    W: Write + Seek,
{
    let mut tiff_image = encoder
        .new_image::<C>(metadata.width as u32, metadata.height as u32)
        .map_err(|e| DebandError::EncodeError(e.to_string()))?;
    tiff_image
        .rows_per_strip(metadata.rows_per_strip)
        .map_err(|e| DebandError::EncodeError(e.to_string()))?;
    tiff_image
        .write_data(&image.data)
        .map_err(|e| DebandError::EncodeError(e.to_string()))
}

impl TiffWriter for StandardTiffWriter {
    fn write_tiff(
        &self,
        image: &CorrectedRaster,
        metadata: &EncodeMetadata,
        output: &mut dyn Write,
    ) -> Result<()> {
        debug!(
            "Encoding TIFF image: {}x{}, {} channels, {} rows per strip",
            metadata.width, metadata.height, metadata.channels, metadata.rows_per_strip
        );

        if image.width != metadata.width
            || image.height != metadata.height
            || image.channels != metadata.channels
        {
            return Err(DebandError::EncodeError(format!(
                "raster {}x{}x{} does not match metadata {}x{}x{}",
                image.width,
                image.height,
                image.channels,
                metadata.width,
                metadata.height,
                metadata.channels
            )));
        }

        let mut buffer = Vec::new();

        {
            let compression = match metadata.compression {
                TiffCompression::None => Compression::Uncompressed,
                TiffCompression::Lzw => Compression::Lzw,
                TiffCompression::DeflateFast => Compression::Deflate(DeflateLevel::Fast),
                TiffCompression::DeflateBalanced => Compression::Deflate(DeflateLevel::Balanced),
                TiffCompression::DeflateBest => Compression::Deflate(DeflateLevel::Best),
            };

            let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer))
                .map_err(|e| DebandError::EncodeError(e.to_string()))?
                .with_compression(compression);

            if let Some(predictor_val) = metadata.predictor {
                let predictor = match predictor_val {
                    2 => Predictor::Horizontal,
                    _ => Predictor::None,
                };
                encoder = encoder.with_predictor(predictor);
            }

            match (metadata.photometric, metadata.channels) {
                (Photometric::MinIsBlack, 1) => {
                    encode_as::<colortype::Gray16, _>(&mut encoder, image, metadata)?
                }
                (Photometric::Rgb, 3) => {
                    encode_as::<colortype::RGB16, _>(&mut encoder, image, metadata)?
                }
                (Photometric::Rgb, 4) => {
                    encode_as::<colortype::RGBA16, _>(&mut encoder, image, metadata)?
                }
                (photometric, channels) => {
                    return Err(DebandError::UnsupportedFormat(format!(
                        "{:?} output with {} channels",
                        photometric, channels
                    )));
                }
            }
        }

        output.write_all(&buffer)?;

        debug!("TIFF encoding complete, {} bytes", buffer.len());
        Ok(())
    }
}
