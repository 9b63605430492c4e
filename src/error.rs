//! Error types for spline construction and topology editing.

use thiserror::Error;

/// Precondition violations reported by the spline kernel.
///
/// Every variant is raised before any state is mutated. Numerical tolerance failures
/// during knot removal or degree reduction are not errors; they are reported through
/// the return values of those operations.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SplineError {
    /// A malformed argument: negative tolerance, zero multiplicity, wrong tuple length.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An index is outside its admissible range.
    #[error("{name} {index} is out of range (must be less than {bound})")]
    OutOfRange {
        /// What the index addresses.
        name: &'static str,
        /// The offending index.
        index: usize,
        /// Exclusive upper bound.
        bound: usize,
    },

    /// Data does not fit the domain: cardinality mismatch, coordinate outside the
    /// parametric domain, non-positive weight.
    #[error("domain error: {0}")]
    DomainError(String),
}

impl SplineError {
    /// Create an invalid argument error.
    #[must_use]
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// Create a domain error.
    #[must_use]
    pub fn domain(reason: impl Into<String>) -> Self {
        Self::DomainError(reason.into())
    }

    /// Create an out of range error for a parametric dimension.
    #[must_use]
    pub fn dimension_out_of_range(index: usize, bound: usize) -> Self {
        Self::OutOfRange {
            name: "dimension",
            index,
            bound,
        }
    }

    /// Check if this is an invalid argument error.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Check if this is an out of range error.
    #[must_use]
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Self::OutOfRange { .. })
    }

    /// Check if this is a domain error.
    #[must_use]
    pub fn is_domain_error(&self) -> bool {
        matches!(self, Self::DomainError(_))
    }
}

/// Result type for spline operations.
pub type SplineResult<T> = Result<T, SplineError>;

/// Reject negative tolerances.
pub(crate) fn ensure_tolerance<T: crate::misc::FloatingPoint>(tolerance: T) -> SplineResult<()> {
    if tolerance < T::zero() {
        return Err(SplineError::invalid_argument(format!(
            "tolerance must be non-negative, got {}",
            tolerance
        )));
    }
    Ok(())
}
