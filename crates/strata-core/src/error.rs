//! Status taxonomy shared by every fallible HAL call.
//!
//! Every operation in the workspace returns [`Result`], whose error arm is a
//! [`HalError`]. Each variant corresponds to one [`StatusCode`]; the `Ok`
//! status is the `Ok` arm of the result itself.

use std::fmt;
use thiserror::Error;

/// Canonical status codes carried by [`HalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// An argument was malformed or inconsistent with the object it targets.
    InvalidArgument,
    /// An index or byte range fell outside the addressable extent.
    OutOfRange,
    /// The request is well formed but not supported by this implementation.
    Unimplemented,
    /// A wait's deadline elapsed before its condition was satisfied.
    DeadlineExceeded,
    /// Unclassified failure; used for sticky semaphore failures.
    Unknown,
    /// An allocation limit was reached.
    ResourceExhausted,
    /// A requested entity (executable format, symbol) does not exist.
    NotFound,
    /// A backend facility could not be reached (e.g. a library failed to open).
    Unavailable,
    /// The object is not in a state that allows the operation.
    FailedPrecondition,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::Unknown => "UNKNOWN",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::NotFound => "NOT_FOUND",
            Self::Unavailable => "UNAVAILABLE",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
        };
        f.write_str(name)
    }
}

/// Errors produced by HAL operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HalError {
    /// Malformed or inconsistent argument.
    ///
    /// Raised by layout computations (rank/index count mismatches, element
    /// count changing reshapes) and by factories given absent shapes.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Description of the offending argument
        reason: String,
    },

    /// Index or byte range outside the addressable extent.
    #[error("Out of range: {reason}")]
    OutOfRange {
        /// Description of the violated bound
        reason: String,
    },

    /// Operation not supported by this implementation.
    ///
    /// Non-contiguous buffer view ranges report this rather than being
    /// approximated.
    #[error("Unimplemented: {feature}")]
    Unimplemented {
        /// Name of the unsupported feature
        feature: String,
    },

    /// Wait deadline elapsed before the condition held.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// Unclassified failure carrying its cause.
    #[error("Unknown error: {cause}")]
    Unknown {
        /// Description of what failed
        cause: String,
    },

    /// An allocation limit was reached.
    #[error("Resource exhausted: {reason}")]
    ResourceExhausted {
        /// Description of the exhausted resource
        reason: String,
    },

    /// Requested entity does not exist.
    #[error("Not found: {what}")]
    NotFound {
        /// Name of the missing entity
        what: String,
    },

    /// Backend facility could not be reached.
    #[error("Unavailable: {reason}")]
    Unavailable {
        /// Description of the unavailable facility
        reason: String,
    },

    /// Object state forbids the operation.
    #[error("Failed precondition: {reason}")]
    FailedPrecondition {
        /// Description of the unmet precondition
        reason: String,
    },
}

impl HalError {
    /// Create an InvalidArgument error.
    pub fn invalid_argument<S: Into<String>>(reason: S) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create an OutOfRange error.
    pub fn out_of_range<S: Into<String>>(reason: S) -> Self {
        Self::OutOfRange {
            reason: reason.into(),
        }
    }

    /// Create an Unimplemented error for a specific feature.
    pub fn unimplemented<S: Into<String>>(feature: S) -> Self {
        Self::Unimplemented {
            feature: feature.into(),
        }
    }

    /// Create an Unknown error with the given cause.
    pub fn unknown<S: Into<String>>(cause: S) -> Self {
        Self::Unknown {
            cause: cause.into(),
        }
    }

    /// Create a ResourceExhausted error.
    pub fn resource_exhausted<S: Into<String>>(reason: S) -> Self {
        Self::ResourceExhausted {
            reason: reason.into(),
        }
    }

    /// Create a NotFound error.
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create an Unavailable error.
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create a FailedPrecondition error.
    pub fn failed_precondition<S: Into<String>>(reason: S) -> Self {
        Self::FailedPrecondition {
            reason: reason.into(),
        }
    }

    /// Status code of this error.
    pub fn code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument { .. } => StatusCode::InvalidArgument,
            Self::OutOfRange { .. } => StatusCode::OutOfRange,
            Self::Unimplemented { .. } => StatusCode::Unimplemented,
            Self::DeadlineExceeded => StatusCode::DeadlineExceeded,
            Self::Unknown { .. } => StatusCode::Unknown,
            Self::ResourceExhausted { .. } => StatusCode::ResourceExhausted,
            Self::NotFound { .. } => StatusCode::NotFound,
            Self::Unavailable { .. } => StatusCode::Unavailable,
            Self::FailedPrecondition { .. } => StatusCode::FailedPrecondition,
        }
    }

    /// Whether this error is an Unknown failure.
    pub fn is_unknown(&self) -> bool {
        self.code() == StatusCode::Unknown
    }

    /// Whether this error reports an elapsed deadline.
    pub fn is_deadline_exceeded(&self) -> bool {
        self.code() == StatusCode::DeadlineExceeded
    }
}

/// Result type alias for HAL operations.
pub type Result<T> = std::result::Result<T, HalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = HalError::invalid_argument("no shape dimensions specified");
        assert!(matches!(err, HalError::InvalidArgument { .. }));
        assert_eq!(
            err.to_string(),
            "Invalid argument: no shape dimensions specified"
        );

        let err = HalError::out_of_range("index[1] out of bounds: 3 >= 3");
        assert_eq!(err.code(), StatusCode::OutOfRange);
        assert_eq!(err.to_string(), "Out of range: index[1] out of bounds: 3 >= 3");
    }

    #[test]
    fn test_codes_cover_every_variant() {
        let errors = vec![
            (HalError::invalid_argument("a"), StatusCode::InvalidArgument),
            (HalError::out_of_range("b"), StatusCode::OutOfRange),
            (HalError::unimplemented("c"), StatusCode::Unimplemented),
            (HalError::DeadlineExceeded, StatusCode::DeadlineExceeded),
            (HalError::unknown("d"), StatusCode::Unknown),
            (HalError::resource_exhausted("e"), StatusCode::ResourceExhausted),
            (HalError::not_found("f"), StatusCode::NotFound),
            (HalError::unavailable("g"), StatusCode::Unavailable),
            (HalError::failed_precondition("h"), StatusCode::FailedPrecondition),
        ];

        for (err, code) in errors {
            assert_eq!(err.code(), code);
            assert!(!err.to_string().is_empty());
            assert!(!code.to_string().is_empty());
        }
    }

    #[test]
    fn test_predicates() {
        assert!(HalError::unknown("device lost").is_unknown());
        assert!(!HalError::DeadlineExceeded.is_unknown());
        assert!(HalError::DeadlineExceeded.is_deadline_exceeded());
    }
}
