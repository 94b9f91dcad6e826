//! TIFF reading and writing module
//!
//! This module provides the raster types exchanged between pipeline stages,
//! plus TIFF decoding into and encoding out of those types.

mod reader;
mod writer;
mod standard_tiff_reader;
mod standard_tiff_writer;
pub mod types;

#[cfg(test)]
mod tests;

pub use reader::RasterReader;
pub use writer::TiffWriter;
pub use standard_tiff_reader::StandardTiffReader;
pub use standard_tiff_writer::StandardTiffWriter;
pub use types::{
    CorrectedRaster, DebandConfig, DebandConfigBuilder, DimensionPolicy, EncodeMetadata,
    Photometric, RasterGrid, TiffCompression, rows_per_strip,
};
