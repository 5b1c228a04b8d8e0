use super::event::{
    Category, Environment, ErrorInfo, EventRecord, GeoInfo, Level, RequestInfo, ResourceMetrics,
    ServiceInfo,
};
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("failed to generate record {index}: {message}")]
    Failed { index: u64, message: String },
}

/// Produces the record at a given position of the stream.
///
/// Implementations must be pure: the same `(index, base)` pair always yields
/// the same record, and calls must be cheap enough to make millions of them.
pub trait RecordGenerator: Send + Sync {
    fn generate(&self, index: u64, base: DateTime<Utc>) -> Result<EventRecord, GenerateError>;
}

impl<F> RecordGenerator for F
where
    F: Fn(u64, DateTime<Utc>) -> Result<EventRecord, GenerateError> + Send + Sync,
{
    fn generate(&self, index: u64, base: DateTime<Utc>) -> Result<EventRecord, GenerateError> {
        self(index, base)
    }
}

const SERVICES: [&str; 6] = ["auth", "checkout", "search", "catalog", "mailer", "gateway"];
const METHODS: [&str; 4] = ["GET", "POST", "PUT", "DELETE"];
const PATHS: [&str; 5] = ["/api/login", "/api/orders", "/api/search", "/api/items", "/health"];
const ERROR_TYPES: [&str; 4] = ["TimeoutError", "ValidationError", "DatabaseError", "AuthError"];
const TAGS: [&str; 6] = ["critical", "customer", "internal", "batch", "mobile", "web"];
const LOCATIONS: [(&str, &str, f64, f64); 5] = [
    ("US", "New York", 40.71, -74.00),
    ("US", "San Francisco", 37.77, -122.42),
    ("DE", "Berlin", 52.52, 13.40),
    ("JP", "Tokyo", 35.68, 139.69),
    ("BR", "Sao Paulo", -23.55, -46.63),
];

/// Default generator: cheap, deterministic records derived from the index.
///
/// Field values cycle through small fixed tables using a hash of the index,
/// so runs are reproducible without any random number source.
#[derive(Debug, Clone, Default)]
pub struct SyntheticGenerator;

impl RecordGenerator for SyntheticGenerator {
    fn generate(&self, index: u64, base: DateTime<Utc>) -> Result<EventRecord, GenerateError> {
        let h = mix(index);
        let pick = |shift: u32, len: usize| ((h >> shift) as usize) % len;

        // Roughly 70% info, 15% debug, 10% warn, 5% error.
        let level = match h % 100 {
            0..=69 => Level::Info,
            70..=84 => Level::Debug,
            85..=94 => Level::Warn,
            _ => Level::Error,
        };

        let service = SERVICES[pick(8, SERVICES.len())];
        let (country, city, latitude, longitude) = LOCATIONS[pick(16, LOCATIONS.len())];
        let status_code = if level == Level::Error { 500 } else { 200 };

        let error = (level == Level::Error).then(|| {
            let error_type = ERROR_TYPES[pick(24, ERROR_TYPES.len())];
            ErrorInfo {
                error_type: error_type.to_string(),
                message: format!("{} in {}", error_type, service),
                stack_trace: None,
            }
        });

        let tag_count = 1 + pick(32, 2);
        let tags = (0..tag_count)
            .map(|i| TAGS[pick(36 + i as u32 * 4, TAGS.len())].to_string())
            .collect();

        Ok(EventRecord {
            id: format!("evt-{:012}", index),
            timestamp: base + Duration::milliseconds(index as i64),
            level,
            category: Category::ALL[pick(40, Category::ALL.len())],
            message: format!("{} request handled by {}", METHODS[pick(44, METHODS.len())], service),
            service: ServiceInfo {
                name: service.to_string(),
                version: format!("1.{}.0", pick(48, 5)),
                environment: Environment::ALL[pick(52, Environment::ALL.len())],
                host: format!("{}-{:02}", service, pick(56, 8)),
            },
            error,
            request: RequestInfo {
                method: METHODS[pick(44, METHODS.len())].to_string(),
                path: PATHS[pick(20, PATHS.len())].to_string(),
                status_code,
                user_agent: "ingestor-synthetic/1.0".to_string(),
            },
            metrics: ResourceMetrics {
                response_time_ms: 5.0 + ((h >> 4) % 2000) as f64,
                cpu_usage: ((h >> 12) % 1000) as f64 / 10.0,
                memory_usage_mb: 64.0 + ((h >> 28) % 4096) as f64,
            },
            geo: GeoInfo {
                country: country.to_string(),
                city: city.to_string(),
                latitude,
                longitude,
            },
            tags,
        })
    }
}

// splitmix64 finalizer
fn mix(index: u64) -> u64 {
    let mut z = index.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
