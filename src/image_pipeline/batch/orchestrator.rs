//! Batch orchestration.
//!
//! The reference is decoded on the decode pool and analysed on the compute pool,
//! once. Each input file runs its own chain: decode (decode pool), wait for the
//! shared profile through [`ProfileCell`], correct (compute pool), encode and
//! write (encode pool). Chains overlap freely; the profile is the only point
//! where they meet.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::time::Instant;

use tracing::{debug, error, info, instrument, trace};

use crate::image_pipeline::{
    batch::{
        config::BatchConfig,
        context::PipelineContext,
        discovery::discover_inputs,
        profile_cell::{PendingProfile, ProfileCell},
        progress::{BatchReport, FileFailure, FileOutcome, FileStage, ProgressTracker},
        timing::{StageTimings, Timer},
    },
    common::error::{DebandError, Result},
    conversions::DebandPipeline,
    flat_field::CorrectionProfile,
    tiff::{
        CorrectedRaster, DebandConfig, EncodeMetadata, RasterGrid, RasterReader,
        StandardTiffReader, StandardTiffWriter, TiffWriter,
    },
};

/// One file's chain state, handed from pool to pool.
///
/// Reports exactly one outcome: explicitly through [`FileTask::finish`], or as a
/// failure when dropped early, e.g. by a panicking stage.
struct FileTask {
    input: PathBuf,
    output: PathBuf,
    stage: FileStage,
    timings: StageTimings,
    outcomes: Option<Sender<FileOutcome>>,
}

impl FileTask {
    fn new(input: PathBuf, output: PathBuf, outcomes: Sender<FileOutcome>) -> Self {
        Self {
            input,
            output,
            stage: FileStage::Discovered,
            timings: StageTimings::new(),
            outcomes: Some(outcomes),
        }
    }

    fn enter(&mut self, stage: FileStage) {
        trace!(file = %self.input.display(), from = %self.stage, to = %stage, "Stage transition");
        self.stage = stage;
    }

    fn send(&mut self, result: Result<()>) {
        let Some(outcomes) = self.outcomes.take() else {
            return;
        };
        let result = match result {
            Ok(()) => Ok(std::mem::take(&mut self.timings)),
            Err(error) => {
                let stage = self.stage;
                self.enter(FileStage::Failed);
                Err(FileFailure { stage, error })
            }
        };
        // the receiver only disappears when the batch itself is gone
        let _ = outcomes.send(FileOutcome {
            input: std::mem::take(&mut self.input),
            output: std::mem::take(&mut self.output),
            result,
        });
    }

    fn finish(mut self, result: Result<()>) {
        self.send(result);
    }
}

impl Drop for FileTask {
    fn drop(&mut self) {
        if self.outcomes.is_some() {
            let stage = self.stage;
            self.send(Err(DebandError::WorkerPool(format!(
                "task stopped while {stage}"
            ))));
        }
    }
}

/// Debands a directory of images against one shared reference profile.
pub struct BatchPipeline<R: RasterReader, W: TiffWriter> {
    stages: Arc<DebandPipeline<R, W>>,
    config: BatchConfig,
}

impl BatchPipeline<StandardTiffReader, StandardTiffWriter> {
    pub fn new(deband_config: DebandConfig, config: BatchConfig) -> Result<Self> {
        Self::with_custom(DebandPipeline::new(deband_config)?, config)
    }
}

impl<R, W> BatchPipeline<R, W>
where
    R: RasterReader + Send + Sync + 'static,
    W: TiffWriter + Send + Sync + 'static,
{
    pub fn with_custom(stages: DebandPipeline<R, W>, config: BatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            stages: Arc::new(stages),
            config,
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Debands every matching file directly inside `directory`.
    pub fn run_directory(&self, reference: &Path, directory: &Path) -> Result<BatchReport> {
        let inputs = discover_inputs(directory, &self.config)?;
        info!(
            "Found {} image files in {}",
            inputs.len(),
            directory.display()
        );
        self.run(reference, inputs)
    }

    /// Debands `inputs` against the profile of `reference`.
    ///
    /// Per-file failures are collected in the report. A failed profile cancels
    /// every file still pending and is returned as the batch error.
    #[instrument(skip(self, reference, inputs), fields(reference = %reference.display(), files = inputs.len()))]
    pub fn run(&self, reference: &Path, inputs: Vec<PathBuf>) -> Result<BatchReport> {
        let (report, profile_error) = self.process(reference, inputs)?;
        if let Some(error) = profile_error {
            error!(
                "Batch aborted after {:.2}s, {} files cancelled: {}",
                report.elapsed.as_secs_f64(),
                report.cancelled(),
                error
            );
            return Err(error);
        }
        report.log_summary();
        Ok(report)
    }

    /// Runs the batch to completion and returns every file's outcome, along with
    /// the profile error when the reference could not be analysed.
    pub(crate) fn process(
        &self,
        reference: &Path,
        inputs: Vec<PathBuf>,
    ) -> Result<(BatchReport, Option<DebandError>)> {
        let started = Instant::now();
        let context = Arc::new(PipelineContext::new(&self.config)?);
        let profile = Arc::new(ProfileCell::new());

        self.spawn_profile(&context, &profile, reference.to_path_buf());

        let (outcomes, results) = mpsc::channel();
        let total = inputs.len();
        let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::with_capacity(total);
        for input in inputs {
            let output = self.config.naming.output_path_for(&input);
            let task = FileTask::new(input, output, outcomes.clone());
            if let Some(owner) = claimed.get(&task.output) {
                let error = DebandError::InvalidConfig(format!(
                    "output {} is already produced from {}",
                    task.output.display(),
                    owner.display()
                ));
                task.finish(Err(error));
                continue;
            }
            claimed.insert(task.output.clone(), task.input.clone());
            self.spawn_file(&context, &profile, task);
        }
        drop(outcomes);

        let mut progress = ProgressTracker::new(total);
        let mut report = BatchReport::new(total);
        for outcome in results.iter() {
            progress.record(&outcome);
            report.push(outcome);
        }

        let profile_result = profile.wait();
        drop(context);
        report.elapsed = started.elapsed();

        let profile_error = profile_result.err().map(|cause| {
            profile
                .take_error()
                .unwrap_or_else(|| DebandError::Cancelled(cause.to_string()))
        });
        Ok((report, profile_error))
    }

    fn spawn_profile(
        &self,
        context: &Arc<PipelineContext>,
        profile: &Arc<ProfileCell>,
        reference: PathBuf,
    ) {
        let stages = self.stages.clone();
        let ctx = context.clone();
        let pending = PendingProfile::new(profile.clone());

        context.decode.spawn(move || {
            let grid = match stages.decode_reference(&reference) {
                Ok(grid) => grid,
                Err(e) => return pending.resolve(Err(e)),
            };
            ctx.compute.spawn(move || {
                let _span = tracing::info_span!("analyze_reference").entered();
                let result = CorrectionProfile::analyze(&grid).map_err(DebandError::from);
                drop(grid);
                if let Ok(profile) = &result {
                    log_profile(profile);
                }
                pending.resolve(result);
            });
        });
    }

    fn spawn_file(&self, context: &Arc<PipelineContext>, profile: &Arc<ProfileCell>, mut task: FileTask) {
        let stages = self.stages.clone();
        let ctx = context.clone();
        let profile = profile.clone();

        context.decode.spawn(move || {
            if let Some(cause) = profile.failure() {
                return task.finish(Err(DebandError::Cancelled(format!(
                    "reference profile unavailable: {cause}"
                ))));
            }

            task.enter(FileStage::Decoding);
            let timer = Timer::start("decode");
            let grid = match stages.decode_file(&task.input) {
                Ok(grid) => grid,
                Err(e) => return task.finish(Err(e)),
            };
            task.timings.record(timer);

            task.enter(FileStage::WaitingForProfile);
            let waiting = Timer::start("wait_for_profile");
            profile.when_ready(move |outcome| {
                task.timings.record(waiting);
                match outcome {
                    Ok(profile) => Self::spawn_correct(ctx, stages, profile, grid, task),
                    Err(cause) => task.finish(Err(DebandError::Cancelled(format!(
                        "reference profile unavailable: {cause}"
                    )))),
                }
            });
        });
    }

    fn spawn_correct(
        ctx: Arc<PipelineContext>,
        stages: Arc<DebandPipeline<R, W>>,
        profile: Arc<CorrectionProfile>,
        grid: RasterGrid,
        mut task: FileTask,
    ) {
        let pool = ctx.clone();
        pool.compute.spawn(move || {
            task.enter(FileStage::Correcting);
            let timer = Timer::start("correct");
            let corrected = stages.correct(&grid, &profile);
            drop(grid);
            task.timings.record(timer);

            match corrected {
                Ok((raster, metadata)) => Self::spawn_encode(ctx, stages, raster, metadata, task),
                Err(e) => task.finish(Err(e)),
            }
        });
    }

    fn spawn_encode(
        ctx: Arc<PipelineContext>,
        stages: Arc<DebandPipeline<R, W>>,
        raster: CorrectedRaster,
        metadata: EncodeMetadata,
        mut task: FileTask,
    ) {
        ctx.encode.spawn(move || {
            task.enter(FileStage::Encoding);
            let timer = Timer::start("encode");
            let result = stages.encode_file(&raster, &metadata, &task.output);
            task.timings.record(timer);
            if result.is_ok() {
                task.enter(FileStage::Written);
            }
            task.finish(result);
        });
    }
}

fn log_profile(profile: &CorrectionProfile) {
    let averages = profile
        .channel_average()
        .iter()
        .map(|avg| format!("{avg:.2}"))
        .collect::<Vec<_>>()
        .join("/");
    info!(
        "Reference {}x{}, average level: {}",
        profile.width(),
        profile.height(),
        averages
    );
    for stats in profile.banding_stats() {
        debug!(
            channel = stats.channel,
            column_min = stats.column_min,
            column_max = stats.column_max,
            row_min = stats.row_min,
            row_max = stats.row_max,
            "Banding spread {:.4}",
            stats.spread()
        );
    }
}
