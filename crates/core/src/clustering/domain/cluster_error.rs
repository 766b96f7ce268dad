use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClusterError {
    #[error("embedding has {actual} components, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding is empty")]
    EmptyVector,
    #[error("embedding component {index} is not finite")]
    NonFinite { index: usize },
    #[error("tolerance must be a finite non-negative number, got {0}")]
    InvalidTolerance(f64),
}
