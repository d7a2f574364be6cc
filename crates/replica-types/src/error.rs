use thiserror::Error;

/// Errors produced by type construction and parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid resolution {0:?}: expected \"local\" or \"remote\"")]
    InvalidResolution(String),

    #[error("invalid change action {0:?}: expected \"PUT\" or \"DELETE\"")]
    InvalidAction(String),
}
