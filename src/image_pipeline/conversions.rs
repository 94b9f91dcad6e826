//! Pipeline conversions module
//!
//! This module contains the per-file debanding stages and their orchestration
//! for a single image.

mod deband_file;

#[cfg(test)]
mod tests;

pub use deband_file::DebandPipeline;
