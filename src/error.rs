use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid dimension: expected {expected}, got {got}")]
    InvalidDimension { expected: usize, got: usize },

    #[error("Expression parse error: {0}")]
    ParseError(String),

    #[error("Encoding is not of the expected form: {0}")]
    StructuralMismatch(String),

    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("Division by zero expression")]
    DivisionByZero,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        Self::ConfigurationInvalid(format!("JSON error: {err}"))
    }
}
