use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use std::path::PathBuf;

use crate::image_pipeline::{
    BatchConfig, DebandConfig, DimensionPolicy, TiffCompression,
};

#[derive(Parser)]
#[command(version, about = "Removes light-source banding from scans using a flat-field reference")]
pub struct Cli {
    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Deband every TIFF in a directory against one reference image.
    Batch {
        /// Flat-field image of the light source alone.
        reference: PathBuf,

        /// Directory holding the scans; not searched recursively.
        directory: PathBuf,

        #[command(flatten)]
        output: OutputArgs,

        /// Suffix added to corrected file names; files already carrying it are skipped.
        #[arg(long, default_value = "-debanded", allow_hyphen_values = true)]
        suffix: String,

        /// Fail scans whose size differs from the reference instead of
        /// correcting only the overlapping area.
        #[arg(long)]
        strict_dimensions: bool,

        #[arg(long, default_value_t = 4)]
        decode_threads: usize,

        /// Defaults to the number of available processing units.
        #[arg(long)]
        compute_threads: Option<usize>,

        #[arg(long, default_value_t = 4)]
        encode_threads: usize,
    },
    /// Deband the reference with its own profile, to check it visually.
    Reference {
        /// Flat-field image of the light source alone.
        reference: PathBuf,

        /// Output path. Defaults to the reference name with the `-debanded` suffix.
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        encoding: OutputArgs,
    },
}

#[derive(clap::Args, Clone, Debug)]
pub struct OutputArgs {
    /// How strongly the profile is applied; each multiplier is scaled by this value.
    #[arg(short, long, default_value_t = 1.0)]
    pub strength: f64,

    #[arg(short, long, value_enum, default_value_t = CompressionArg::Deflate)]
    pub compression: CompressionArg,

    /// Use horizontal differencing before compression.
    #[arg(long)]
    pub predictor: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum CompressionArg {
    None,
    Lzw,
    DeflateFast,
    Deflate,
    DeflateBest,
}

impl From<CompressionArg> for TiffCompression {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => TiffCompression::None,
            CompressionArg::Lzw => TiffCompression::Lzw,
            CompressionArg::DeflateFast => TiffCompression::DeflateFast,
            CompressionArg::Deflate => TiffCompression::DeflateBalanced,
            CompressionArg::DeflateBest => TiffCompression::DeflateBest,
        }
    }
}

impl OutputArgs {
    pub fn deband_config(&self, policy: DimensionPolicy) -> DebandConfig {
        DebandConfig::builder()
            .strength(self.strength)
            .compression(self.compression.into())
            .predictor(self.predictor.then_some(2))
            .dimension_policy(policy)
            .build()
    }
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone()
    }

    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

pub fn batch_config(
    suffix: String,
    decode_threads: usize,
    compute_threads: Option<usize>,
    encode_threads: usize,
) -> BatchConfig {
    BatchConfig::builder()
        .output_suffix(suffix)
        .decode_threads(decode_threads)
        .compute_threads(compute_threads)
        .encode_threads(encode_threads)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_arguments() {
        let cli = Cli::parse_from([
            "debander",
            "batch",
            "light.tif",
            "scans",
            "--strength",
            "2",
            "--compression",
            "lzw",
            "--strict-dimensions",
            "--compute-threads",
            "6",
        ]);
        match cli.command() {
            Commands::Batch {
                reference,
                directory,
                output,
                strict_dimensions,
                compute_threads,
                decode_threads,
                ..
            } => {
                assert_eq!(reference, PathBuf::from("light.tif"));
                assert_eq!(directory, PathBuf::from("scans"));
                assert!(strict_dimensions);
                assert_eq!(compute_threads, Some(6));
                assert_eq!(decode_threads, 4);
                let config = output.deband_config(DimensionPolicy::Reject);
                assert_eq!(config.strength, 2.0);
                assert_eq!(config.compression, TiffCompression::Lzw);
                assert_eq!(config.predictor, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.log_level(), "info");
    }

    #[test]
    fn test_reference_arguments() {
        let cli = Cli::parse_from(["debander", "-v", "reference", "light.tif", "--predictor"]);
        match cli.command() {
            Commands::Reference {
                reference,
                output,
                encoding,
            } => {
                assert_eq!(reference, PathBuf::from("light.tif"));
                assert!(output.is_none());
                let config = encoding.deband_config(DimensionPolicy::Truncate);
                assert_eq!(config.predictor, Some(2));
                assert_eq!(config.compression, TiffCompression::DeflateBalanced);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.log_level(), "debug");
    }
}
