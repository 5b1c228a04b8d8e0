pub mod generator_source;

pub use generator_source::{spawn_source, SourceError, SourceHandle, SourceRunConfig, SourceSummary};
