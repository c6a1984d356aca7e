use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecompError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dimension '{0}' is not a column of the dataset")]
    MissingDimension(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Segment error: {0}")]
    Segment(String),

    #[error("Decomposition cancelled before week pair {week_before}->{week_after}")]
    Cancelled { week_before: i64, week_after: i64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::error::PolarsError> for DecompError {
    fn from(err: polars::error::PolarsError) -> Self {
        DecompError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DecompError>;
