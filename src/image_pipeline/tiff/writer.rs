use std::io::Write;
use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::tiff::types::{CorrectedRaster, EncodeMetadata};

pub trait TiffWriter {
    fn write_tiff(&self, image: &CorrectedRaster, metadata: &EncodeMetadata, output: &mut dyn Write) -> Result<()>;
}
