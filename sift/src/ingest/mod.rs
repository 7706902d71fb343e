mod normalizer;
mod pipeline;

pub use normalizer::normalize;
pub use pipeline::{IngestItemError, IngestResult, IngestWindow, IngestionPipeline};
