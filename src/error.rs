use thiserror::Error;

/// Failures surfaced by the data pipeline. None of these are retried or
/// swallowed below the command layer.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("no unit reached {threshold} cases")]
    EmptyResult { threshold: i64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type DataResult<T> = Result<T, DataError>;
