//! Batch debanding module
//!
//! Runs many files against one shared reference profile, overlapping decode,
//! correction and encoding across files with one worker pool per stage.

mod config;
mod context;
mod discovery;
mod orchestrator;
mod profile_cell;
mod progress;
mod timing;


pub use config::{BatchConfig, BatchConfigBuilder, OutputNaming};
pub use context::PipelineContext;
pub use discovery::discover_inputs;
pub use orchestrator::BatchPipeline;
pub use profile_cell::{PendingProfile, ProfileCell, ProfileOutcome};
pub use progress::{BatchReport, FileFailure, FileOutcome, FileStage, ProgressTracker};
pub use timing::{StageTimings, StepTiming, Timer};
