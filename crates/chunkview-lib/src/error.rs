use thiserror::Error;

/// Failure to obtain a usable chunk from a data source.
///
/// Every variant is recoverable: the navigator keeps the previous chunk on
/// screen and a retry re-issues the same request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("data source failed: {0}")]
    Source(String),
    #[error("response is missing channel data")]
    MissingData,
    #[error("response has {data} data rows for {labels} channel labels")]
    ChannelMismatch { data: usize, labels: usize },
    #[error("channel {channel} has {len} samples, expected {expected}")]
    RaggedChannels {
        channel: usize,
        len: usize,
        expected: usize,
    },
    #[error("non-finite sample in channel {channel} at index {index}")]
    NonFiniteSample { channel: usize, index: usize },
    #[error("sampling frequency {actual} does not match recording rate {expected}")]
    SampleRateMismatch { expected: f64, actual: f64 },
    #[error("chunk [{start}, {end}) exceeds recording length {total}")]
    OutOfRange {
        start: usize,
        end: usize,
        total: usize,
    },
    #[error("response chunk starts at {actual}, requested {requested}")]
    StartMismatch { requested: usize, actual: usize },
    #[error("response carries {len} samples per channel, requested {requested}")]
    Oversized { len: usize, requested: usize },
    #[error("response contains no samples")]
    EmptyChunk,
    #[error("response stops at {len} of {requested} samples before the end of the recording")]
    Truncated { len: usize, requested: usize },
    #[error("response declares {declared} samples per channel but carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },
}

/// Chunk data arrived intact but cannot be shaped for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("selected channel '{0}' is not present in the chunk")]
    UnknownChannel(String),
    #[error("chunk has no channels")]
    NoChannels,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordingError {
    #[error("sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f64),
    #[error("channel label '{0}' appears more than once")]
    DuplicateChannel(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} cutoff must be a positive finite frequency, got {value}")]
    InvalidCutoff { field: &'static str, value: f64 },
    #[error("smoothing window must be at least 1 sample")]
    ZeroSmoothingWindow,
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },
    #[error("step zoom ratio must exceed 1.0, got {0}")]
    StepRatio(f64),
}
