use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CausalError>;

/// Which pipeline stage a method tag was offered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Estimation,
    Refutation,
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodKind::Estimation => f.write_str("estimation"),
            MethodKind::Refutation => f.write_str("refutation"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CausalError {
    // === Identification ===
    #[error(
        "No valid set of covariates satisfies the backdoor criterion for '{treatment}' -> '{outcome}' \
         ({candidates} candidate variables searched)"
    )]
    NoValidAdjustmentSet {
        treatment: String,
        outcome: String,
        candidates: usize,
    },

    // === Method dispatch ===
    #[error("Unsupported {kind} method: '{name}'")]
    UnsupportedMethod { kind: MethodKind, name: String },

    // === Numerics ===
    #[error("Covariance matrix ({dimension}x{dimension}) is singular and cannot be inverted")]
    SingularCovariance { dimension: usize },

    #[error("Insufficient data: {message}")]
    InsufficientData { message: String },

    #[error("Shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    // === Lifecycle ===
    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    // === Dataset ===
    #[error("Column '{name}' not found in dataset")]
    UnknownColumn { name: String },

    #[error("Column '{name}' appears more than once")]
    DuplicateColumn { name: String },

    // === Parameters & collaborators ===
    #[error("Invalid parameter '{parameter}': {message}")]
    InvalidParameter { parameter: String, message: String },

    #[error("Outcome model error: {message}")]
    OutcomeModel { message: String },
}

impl CausalError {
    pub fn unsupported_estimation<S: Into<String>>(name: S) -> Self {
        Self::UnsupportedMethod {
            kind: MethodKind::Estimation,
            name: name.into(),
        }
    }

    pub fn unsupported_refutation<S: Into<String>>(name: S) -> Self {
        Self::UnsupportedMethod {
            kind: MethodKind::Refutation,
            name: name.into(),
        }
    }

    pub fn precondition<S: Into<String>>(message: S) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    pub fn insufficient_data<S: Into<String>>(message: S) -> Self {
        Self::InsufficientData {
            message: message.into(),
        }
    }

    pub fn shape<S: Into<String>>(context: S, expected: usize, found: usize) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected,
            found,
        }
    }

    pub fn invalid_parameter<S1, S2>(parameter: S1, message: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    pub fn outcome_model<S: Into<String>>(message: S) -> Self {
        Self::OutcomeModel {
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NoValidAdjustmentSet { .. } => "NO_VALID_ADJUSTMENT_SET",
            Self::UnsupportedMethod { .. } => "UNSUPPORTED_METHOD",
            Self::SingularCovariance { .. } => "SINGULAR_COVARIANCE",
            Self::InsufficientData { .. } => "INSUFFICIENT_DATA",
            Self::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            Self::Precondition { .. } => "PRECONDITION_FAILED",
            Self::UnknownColumn { .. } => "UNKNOWN_COLUMN",
            Self::DuplicateColumn { .. } => "DUPLICATE_COLUMN",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::OutcomeModel { .. } => "OUTCOME_MODEL_ERROR",
        }
    }

    /// True when the caller can recover by running a missing pipeline step
    /// and retrying. Every other failure needs different inputs.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Precondition { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            CausalError::SingularCovariance { dimension: 2 }.code(),
            "SINGULAR_COVARIANCE"
        );
        assert_eq!(
            CausalError::unsupported_estimation("ols").code(),
            "UNSUPPORTED_METHOD"
        );
        assert_eq!(CausalError::precondition("x").code(), "PRECONDITION_FAILED");
    }

    #[test]
    fn only_precondition_is_recoverable() {
        assert!(CausalError::precondition("perform estimates first").is_recoverable());
        assert!(!CausalError::SingularCovariance { dimension: 1 }.is_recoverable());
        assert!(!CausalError::unsupported_refutation("placebo").is_recoverable());
    }

    #[test]
    fn unsupported_method_message_names_stage() {
        let err = CausalError::unsupported_refutation("placebo_treatment");
        assert_eq!(
            err.to_string(),
            "Unsupported refutation method: 'placebo_treatment'"
        );
    }
}
