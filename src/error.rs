//! Error types for the structural kernels and their containers.

use thiserror::Error;

use crate::simd::KernelVariant;

/// Errors raised while building containers or selecting kernel variants.
///
/// The kernels themselves never fail; their preconditions are checked with
/// debug assertions only.
#[derive(Debug, Error)]
pub enum TrussworkError {
    /// The requested kernel variant cannot run on this host.
    #[error("kernel variant {0} is not supported on this host")]
    UnsupportedVariant(KernelVariant),

    /// The kernel variant was already selected for this process.
    #[error("kernel variant already initialized to {current}, cannot switch to {requested}")]
    AlreadyInitialized {
        current: KernelVariant,
        requested: KernelVariant,
    },

    /// A kernel variant name could not be parsed.
    #[error("unknown kernel variant: {0}")]
    UnknownVariant(String),

    /// Parallel buffers disagree on their length.
    #[error("length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Spring topology violates the perfect-square layout.
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// Index out of bounds.
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(String),

    /// Configuration error.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TrussworkError {
    pub fn invalid_topology(msg: impl Into<String>) -> Self {
        Self::InvalidTopology(msg.into())
    }

    pub fn index_out_of_bounds(msg: impl Into<String>) -> Self {
        Self::IndexOutOfBounds(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, TrussworkError>;
