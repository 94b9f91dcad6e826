use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::image_pipeline::batch::config::BatchConfig;
use crate::image_pipeline::common::error::{DebandError, Result};

/// Lists candidate inputs directly inside `directory`, sorted by path.
///
/// Only regular files with an accepted extension are kept, and files whose
/// stem already carries the output suffix are skipped.
#[instrument(skip(config), fields(directory = %directory.display()))]
pub fn discover_inputs(directory: &Path, config: &BatchConfig) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(directory)
        .map_err(|e| DebandError::InputReadError(format!("{}: {}", directory.display(), e)))?;

    let mut inputs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || !config.accepts_extension(&path) {
            continue;
        }
        if config.naming.is_output(&path) {
            debug!(path = %path.display(), "Skipping previous output");
            continue;
        }
        inputs.push(path);
    }
    inputs.sort();

    debug!("Discovered {} input files", inputs.len());
    Ok(inputs)
}
