//! Error types shared by every subsystem.

use thiserror::Error;

/// Errors raised while generating or persisting world data.
#[derive(Debug, Error)]
pub enum GenesisError {
    /// A world, vertex, tag or layer could not be found.
    #[error("not found: {0}")]
    NotFound(String),

    /// An operation named a weight channel the graph was not built with.
    #[error("invalid channel '{0}': all channels must be given on creation")]
    InvalidChannel(String),

    /// No route exists, or the route collapsed below two points when trimmed.
    #[error("failed to find valid path: {0}")]
    NoPath(String),

    /// A malformed identifier or name was about to be persisted.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Every error reported by a group of joined workers.
    #[error("{} errors: {}", .0.len(), join_errors(.0))]
    Aggregate(Vec<GenesisError>),
}

pub type Result<T> = std::result::Result<T, GenesisError>;

impl From<serde_json::Error> for GenesisError {
    fn from(e: serde_json::Error) -> Self {
        GenesisError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for GenesisError {
    fn from(e: toml::de::Error) -> Self {
        GenesisError::Serialization(e.to_string())
    }
}

fn join_errors(errors: &[GenesisError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Merge the results of workers that have all finished.
///
/// Every failure is kept: a single error is returned as-is, several are
/// wrapped in [`GenesisError::Aggregate`]. Values are returned in worker order
/// when nothing failed.
pub fn fan_in<T, I>(results: I) -> Result<Vec<T>>
where
    I: IntoIterator<Item = Result<T>>,
{
    let mut values = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(v) => values.push(v),
            Err(GenesisError::Aggregate(nested)) => errors.extend(nested),
            Err(e) => errors.push(e),
        }
    }

    match errors.len() {
        0 => Ok(values),
        1 => Err(errors.remove(0)),
        _ => Err(GenesisError::Aggregate(errors)),
    }
}
