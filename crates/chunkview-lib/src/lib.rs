//! Windowed navigation over long multichannel recordings: chunk addressing,
//! view windows inside a chunk, a chunk cache, annotations, and the
//! controller that ties them to an asynchronous data source.

pub mod address;
pub mod annotations;
pub mod cache;
pub mod config;
pub mod debounce;
pub mod error;
pub mod io;
pub mod local;
pub mod navigation;
pub mod plot;
pub mod preprocess;
pub mod settings;
pub mod signal;
pub mod source;
pub mod window;
pub mod worker;

pub use address::ChunkAddressSpace;
pub use annotations::{Annotation, AnnotationIndex, AnnotationSet};
pub use cache::{CacheKey, ChunkCache};
pub use config::NavigatorConfig;
pub use error::{ConfigError, ConversionError, FetchError, RecordingError};
pub use navigation::{NavCommand, NavigationController, Outcome, Snapshot};
pub use preprocess::PreprocessingConfig;
pub use signal::*;
pub use source::{DataSource, FetchRequest, FetchResponse};
pub use window::{ViewWindow, WindowLimits};
