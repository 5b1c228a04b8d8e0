pub mod event;
pub mod generator;

pub use event::{
    Category, Environment, ErrorInfo, EventRecord, GeoInfo, Level, RequestInfo, ResourceMetrics,
    ServiceInfo,
};
pub use generator::{GenerateError, RecordGenerator, SyntheticGenerator};
