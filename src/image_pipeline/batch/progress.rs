use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::image_pipeline::batch::timing::StageTimings;
use crate::image_pipeline::common::error::DebandError;

/// Where a file is in its decode → correct → encode chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStage {
    Discovered,
    Decoding,
    WaitingForProfile,
    Correcting,
    Encoding,
    Written,
    /// Terminal. [`FileFailure::stage`] keeps the stage the file failed in.
    Failed,
}

impl fmt::Display for FileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileStage::Discovered => "discovered",
            FileStage::Decoding => "decoding",
            FileStage::WaitingForProfile => "waiting for profile",
            FileStage::Correcting => "correcting",
            FileStage::Encoding => "encoding",
            FileStage::Written => "written",
            FileStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct FileFailure {
    /// Last stage the file entered before failing
    pub stage: FileStage,
    pub error: DebandError,
}

/// Terminal result of one file.
#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub result: Result<StageTimings, FileFailure>,
}

impl FileOutcome {
    pub fn stage(&self) -> FileStage {
        match self.result {
            Ok(_) => FileStage::Written,
            Err(_) => FileStage::Failed,
        }
    }
}

/// Counts files reaching a terminal stage and logs cumulative progress.
pub struct ProgressTracker {
    total: usize,
    done: usize,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self { total, done: 0 }
    }

    pub fn done(&self) -> usize {
        self.done
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.done as f64 * 100.0 / self.total as f64
        }
    }

    pub fn record(&mut self, outcome: &FileOutcome) {
        self.done += 1;
        let progress = format!("[{}/{}] ({:.1}%)", self.done, self.total, self.percent());
        match &outcome.result {
            Ok(timings) => {
                info!(
                    "{} {} -> {}",
                    progress,
                    outcome.input.display(),
                    outcome.output.display()
                );
                debug!(file = %outcome.input.display(), "{}", timings.summary());
            }
            Err(failure) => error!(
                "{} {} failed while {}: {}",
                progress,
                outcome.input.display(),
                failure.stage,
                failure.error
            ),
        }
    }
}

/// Per-file results of a batch whose reference profile was computed.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub total: usize,
    /// `(input, output)` of every written file
    pub written: Vec<(PathBuf, PathBuf)>,
    pub failed: Vec<(PathBuf, FileFailure)>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn push(&mut self, outcome: FileOutcome) {
        match outcome.result {
            Ok(_) => self.written.push((outcome.input, outcome.output)),
            Err(failure) => self.failed.push((outcome.input, failure)),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.written.len()
    }

    /// Files that never ran to completion because the reference profile was unavailable.
    pub fn cancelled(&self) -> usize {
        self.failed
            .iter()
            .filter(|(_, failure)| matches!(failure.error, DebandError::Cancelled(_)))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.written.len() == self.total
    }

    pub fn log_summary(&self) {
        info!(
            "Batch complete: {} succeeded, {} failed, {} total in {:.2}s",
            self.succeeded(),
            self.failed.len(),
            self.total,
            self.elapsed.as_secs_f64()
        );
        for (input, failure) in &self.failed {
            error!("  {}: {}", input.display(), failure.error);
        }
    }
}
