//! Error types for spring construction and retargeting

use thiserror::Error;

/// Result type for spring operations
pub type Result<T, E = SpringError> = std::result::Result<T, E>;

/// Errors reported synchronously by constructors and retarget calls
///
/// Reaching rest is never an error; it is signalled through
/// [`SpringObserver::on_settle`](crate::SpringObserver::on_settle).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpringError {
    /// Mass must be strictly positive and finite
    #[error("spring mass must be positive, got {0}")]
    NonPositiveMass(f64),

    /// A physical parameter is negative or not finite
    #[error("invalid spring parameter `{name}`: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    /// Target or snap value is NaN or infinite
    #[error("spring target must be finite, got {0}")]
    NonFiniteTarget(f64),

    /// A batch retarget named a key the group was not built with
    #[error("unknown animated key `{0}`")]
    UnknownKey(String),
}
