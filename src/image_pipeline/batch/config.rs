//! Batch configuration: worker pool sizes, input filtering and output naming

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::image_pipeline::common::error::{DebandError, Result};

/// Decode and encode are I/O bound and get small fixed pools.
pub const DEFAULT_IO_THREADS: usize = 4;

pub const DEFAULT_OUTPUT_SUFFIX: &str = "-debanded";
pub const DEFAULT_OUTPUT_EXTENSION: &str = "tif";

/// How corrected files are named, and how previous outputs are recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNaming {
    /// Appended to the source file stem
    pub suffix: String,
    /// Replaces the source extension
    pub extension: String,
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            extension: DEFAULT_OUTPUT_EXTENSION.to_string(),
        }
    }
}

impl OutputNaming {
    /// `scan.tiff` becomes `scan-debanded.tif` in the same directory.
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        input.with_file_name(format!("{}{}.{}", stem, self.suffix, self.extension))
    }

    pub fn is_output(&self, path: &Path) -> bool {
        path.file_stem()
            .and_then(OsStr::to_str)
            .is_some_and(|stem| stem.ends_with(&self.suffix))
    }
}

/// Configuration for a batch run
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub decode_threads: usize,
    /// `None` sizes the pool to the available processing units
    pub compute_threads: Option<usize>,
    pub encode_threads: usize,
    pub naming: OutputNaming,
    /// Accepted input extensions, compared case-insensitively
    pub extensions: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            decode_threads: DEFAULT_IO_THREADS,
            compute_threads: None,
            encode_threads: DEFAULT_IO_THREADS,
            naming: OutputNaming::default(),
            extensions: vec!["tif".to_string(), "tiff".to_string()],
        }
    }
}

impl BatchConfig {
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder::default()
    }

    pub fn compute_threads(&self) -> usize {
        self.compute_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn accepts_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.decode_threads == 0 || self.encode_threads == 0 || self.compute_threads == Some(0) {
            return Err(DebandError::InvalidConfig(
                "worker pools need at least one thread".to_string(),
            ));
        }
        if self.naming.suffix.is_empty() {
            return Err(DebandError::InvalidConfig(
                "output suffix must not be empty, outputs would overwrite their sources".to_string(),
            ));
        }
        if self.extensions.is_empty() {
            return Err(DebandError::InvalidConfig(
                "no input extensions configured".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for BatchConfig
#[derive(Default)]
pub struct BatchConfigBuilder {
    decode_threads: Option<usize>,
    compute_threads: Option<Option<usize>>,
    encode_threads: Option<usize>,
    naming: Option<OutputNaming>,
    extensions: Option<Vec<String>>,
}

impl BatchConfigBuilder {
    pub fn decode_threads(mut self, threads: usize) -> Self {
        self.decode_threads = Some(threads);
        self
    }

    pub fn compute_threads(mut self, threads: Option<usize>) -> Self {
        self.compute_threads = Some(threads);
        self
    }

    pub fn encode_threads(mut self, threads: usize) -> Self {
        self.encode_threads = Some(threads);
        self
    }

    pub fn output_suffix(mut self, suffix: impl Into<String>) -> Self {
        let naming = self.naming.get_or_insert_with(OutputNaming::default);
        naming.suffix = suffix.into();
        self
    }

    pub fn naming(mut self, naming: OutputNaming) -> Self {
        self.naming = Some(naming);
        self
    }

    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> BatchConfig {
        let default = BatchConfig::default();
        BatchConfig {
            decode_threads: self.decode_threads.unwrap_or(default.decode_threads),
            compute_threads: self.compute_threads.unwrap_or(default.compute_threads),
            encode_threads: self.encode_threads.unwrap_or(default.encode_threads),
            naming: self.naming.unwrap_or(default.naming),
            extensions: self.extensions.unwrap_or(default.extensions),
        }
    }
}
