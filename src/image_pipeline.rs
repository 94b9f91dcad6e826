//! Image processing pipeline module
//!
//! This module provides flat-field debanding of scanned images: TIFF reading
//! and writing, the correction core, single-file conversion and batch
//! orchestration.

pub mod batch;
pub mod common;
pub mod conversions;
pub mod flat_field;
pub mod tiff;

pub use common::{
    DebandError,
    ProfileError,
    Result,
};

pub use tiff::{
    CorrectedRaster,
    DebandConfig,
    DebandConfigBuilder,
    DimensionPolicy,
    EncodeMetadata,
    Photometric,
    RasterGrid,
    RasterReader,
    StandardTiffReader,
    StandardTiffWriter,
    TiffCompression,
    TiffWriter,
};

pub use flat_field::{
    CorrectionProfile,
    correct_image,
    correct_sample,
};

pub use conversions::DebandPipeline;

pub use batch::{
    BatchConfig,
    BatchPipeline,
    BatchReport,
    OutputNaming,
};
