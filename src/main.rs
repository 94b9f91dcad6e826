use anyhow::{Context, Result, bail};
use clap::Parser;
use flatfield_debander::cli::{self, Cli, Commands};
use flatfield_debander::image_pipeline::{
    BatchPipeline, DebandPipeline, DimensionPolicy, OutputNaming,
};
use flatfield_debander::logger;

use tracing::info;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.log_level());

    match cli.command() {
        Commands::Batch {
            reference,
            directory,
            output,
            suffix,
            strict_dimensions,
            decode_threads,
            compute_threads,
            encode_threads,
        } => {
            let policy = if strict_dimensions {
                DimensionPolicy::Reject
            } else {
                DimensionPolicy::Truncate
            };
            let pipeline = BatchPipeline::new(
                output.deband_config(policy),
                cli::batch_config(suffix, decode_threads, compute_threads, encode_threads),
            )
            .context("invalid configuration")?;

            info!(
                "Debanding {} against {} (strength {})",
                directory.display(),
                reference.display(),
                output.strength
            );

            let report = pipeline
                .run_directory(&reference, &directory)
                .with_context(|| format!("batch aborted, reference {}", reference.display()))?;

            if !report.is_success() {
                bail!(
                    "{} of {} files failed",
                    report.total - report.succeeded(),
                    report.total
                );
            }
            Ok(())
        }
        Commands::Reference {
            reference,
            output,
            encoding,
        } => {
            let output =
                output.unwrap_or_else(|| OutputNaming::default().output_path_for(&reference));
            let pipeline = DebandPipeline::new(encoding.deband_config(DimensionPolicy::Truncate))
                .context("invalid configuration")?;
            let profile = pipeline
                .deband_reference(&reference, &output)
                .with_context(|| format!("failed to deband {}", reference.display()))?;

            info!(
                "Average level: {:?}, written to {}",
                profile.channel_average(),
                output.display()
            );
            Ok(())
        }
    }
}
