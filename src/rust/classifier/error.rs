use std::io;

use crate::model_manager::ModelError;

/// Represents the different types of errors that can occur in the tree classifier.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// Invalid or unsupported configuration; nothing is built from it
    #[error("Configuration error: {0}")]
    Config(String),
    /// Malformed dialogue act or tree text
    #[error("Parse error: {0}")]
    Parse(String),
    /// Error occurred due to invalid input parameters
    #[error("Validation error: {0}")]
    Validation(String),
    /// A parameter tensor does not fit the network rebuilt from the configuration
    #[error("Shape mismatch for tensor '{tensor}': expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        tensor: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    /// Error occurred while reading or writing a model file
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// The compute thread pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}
