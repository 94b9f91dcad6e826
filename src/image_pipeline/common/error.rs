use thiserror::Error;

/// Failures while deriving a correction profile from the reference image.
/// Any of these aborts the whole batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProfileError {
    #[error("Reference image has no pixels: width={width}, height={height}")]
    EmptyReference { width: usize, height: usize },

    #[error("Reference channel {channel} averages to zero, cannot derive multipliers")]
    ZeroChannelAverage { channel: usize },
}

#[derive(Error, Debug)]
pub enum DebandError {
    #[error("Failed to read input file: {0}")]
    InputReadError(String),

    #[error("Failed to write output file: {0}")]
    OutputWriteError(String),

    #[error("Failed to decode TIFF image: {0}")]
    DecodeError(String),

    #[error("Failed to encode TIFF image: {0}")]
    EncodeError(String),

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(usize, usize),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(
        "Target {target_width}x{target_height} does not match reference {profile_width}x{profile_height}"
    )]
    DimensionMismatch {
        target_width: usize,
        target_height: usize,
        profile_width: usize,
        profile_height: usize,
    },

    #[error("Target has {found} channels, reference profile has {expected}")]
    ChannelMismatch { expected: usize, found: usize },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DebandError>;
