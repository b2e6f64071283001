use thiserror::Error;

/// Comprehensive error types for data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Required column '{column}' not found in {path}")]
    MissingColumn { column: String, path: String },

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Data validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Insufficient data: {context}")]
    InsufficientData { context: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for data operations
pub type DataResult<T> = Result<T, DataError>;

impl DataError {
    /// Create a parse error with context
    pub fn parse_error<S: Into<String>>(message: S) -> Self {
        DataError::Parse {
            message: message.into(),
        }
    }

    /// Create a validation error with field context
    pub fn validation_error<S: Into<String>>(field: S, message: S) -> Self {
        DataError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a missing-column error naming the offending file
    pub fn missing_column<S: Into<String>>(column: S, path: S) -> Self {
        DataError::MissingColumn {
            column: column.into(),
            path: path.into(),
        }
    }

    /// Create an insufficient-data error with context
    pub fn insufficient_data<S: Into<String>>(context: S) -> Self {
        DataError::InsufficientData {
            context: context.into(),
        }
    }
}
