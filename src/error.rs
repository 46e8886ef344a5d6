use thiserror::Error;

/// The main error type for gridfetch operations.
///
/// Variants carry the offending location (and the cache key where one is
/// involved) so failures are actionable without inspecting internal state.
#[derive(Debug, Error)]
pub enum GridfetchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse location '{input}': {message}")]
    LocationParse { input: String, message: String },

    #[error("Credential error for {location}: {message}")]
    Credential { location: String, message: String },

    #[error("Source unavailable at {location}: {message}")]
    SourceUnavailable { location: String, message: String },

    #[error("Failed to populate cache entry '{key}' for {location}: {message}")]
    CachePopulation {
        location: String,
        key: String,
        message: String,
    },

    #[error("Cache miss for {location} (key '{key}')")]
    CacheMiss { location: String, key: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode {location} as {format}: {message}")]
    FormatParse {
        location: String,
        format: String,
        message: String,
    },

    /// Assertion-style invariant failure: the materialization state of a
    /// loaded dataset does not match what the caller requested. Intended
    /// for test harnesses rather than production recovery.
    #[error("Materialization mismatch (expected in_memory={expected_in_memory}) for variables: {variables:?}")]
    MaterializationMismatch {
        expected_in_memory: bool,
        variables: Vec<String>,
    },
}
