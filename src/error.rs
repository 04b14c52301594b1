//! Error taxonomy for the FPM reconstruction pipeline
//!
//! Configuration errors are fatal at setup time; shape and numerical errors
//! abort the iteration that produced them with enough context (batch index,
//! layer index) to diagnose the failure without corrupting parameter state.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, FpmError>;

/// Errors produced by the forward model, unrolled network, and training loop
#[derive(Error, Debug)]
pub enum FpmError {
    /// A field, measurement, or kernel array disagrees with the configured grid
    #[error("shape mismatch in {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        got: usize,
    },

    /// Rejected at setup time, before any computation runs
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Non-finite values surfaced in the forward pass, gradient, or loss
    #[error("numerical instability: non-finite values in {context}")]
    NumericalInstability { context: String },

    /// The configured grid/LED/unroll combination cannot be allocated.
    /// Retryable only by reducing the configuration externally.
    #[error("resource exhaustion: {context}; reduce the grid size, batch size, or unroll depth")]
    ResourceExhaustion { context: String },

    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl FpmError {
    /// Attach layer context to an iteration-time error
    pub fn at_layer(self, layer: usize) -> Self {
        self.annotate(&format!("layer {layer}"))
    }

    /// Attach batch context to an iteration-time error
    pub fn at_batch(self, batch: usize) -> Self {
        self.annotate(&format!("batch element {batch}"))
    }

    fn annotate(self, tag: &str) -> Self {
        match self {
            FpmError::NumericalInstability { context } => FpmError::NumericalInstability {
                context: format!("{context} ({tag})"),
            },
            FpmError::ShapeMismatch {
                what,
                expected,
                got,
            } => FpmError::ShapeMismatch {
                what: format!("{what} ({tag})"),
                expected,
                got,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_error_carries_batch_and_layer() {
        let err = FpmError::ShapeMismatch {
            what: "measurement image".into(),
            expected: 16,
            got: 15,
        }
        .at_layer(1)
        .at_batch(3);
        assert_eq!(
            err.to_string(),
            "shape mismatch in measurement image (layer 1) (batch element 3): \
             expected 16, got 15"
        );
    }

    #[test]
    fn test_instability_carries_batch() {
        let err = FpmError::NumericalInstability {
            context: "gradient output".into(),
        }
        .at_batch(0);
        assert!(err.to_string().contains("batch element 0"));
    }

    #[test]
    fn test_configuration_errors_pass_through() {
        let err = FpmError::InvalidConfiguration("bad split".into()).at_batch(2);
        assert_eq!(err.to_string(), "invalid configuration: bad split");
    }
}
