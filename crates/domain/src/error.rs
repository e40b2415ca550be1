//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`GeohubError`]
//! via `#[from]` (or an `into_domain` helper for adapter errors).

/// Base error type shared by every crate in the workspace.
#[derive(Debug, thiserror::Error)]
pub enum GeohubError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// Persistence failure (config file read or write).
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Message bus failure (not connected, publish rejected, ...).
    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A domain invariant was violated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("id must not be empty")]
    EmptyId,

    #[error("name must not be empty")]
    EmptyName,

    #[error("circle radius must be positive, got {0}")]
    NonPositiveRadius(f64),

    #[error("polygon needs at least 3 points, got {0}")]
    TooFewPoints(usize),

    #[error("coordinate out of range: lat={lat}, lng={lng}")]
    CoordinateOutOfRange { lat: f64, lng: f64 },

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("area type must be circle or polygon")]
    UnknownAreaType,

    #[error("action delay must be a finite non-negative number of seconds, got {0}")]
    InvalidDelay(f64),
}

/// A lookup by id found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_not_found_with_kind_and_id() {
        let err = NotFoundError {
            entity: "Rule",
            id: "r1".to_string(),
        };
        assert_eq!(err.to_string(), "Rule r1 not found");
    }

    #[test]
    fn should_convert_validation_error_into_base_error() {
        let err: GeohubError = ValidationError::EmptyName.into();
        assert!(matches!(
            err,
            GeohubError::Validation(ValidationError::EmptyName)
        ));
    }

    #[test]
    fn should_display_too_few_points() {
        assert_eq!(
            ValidationError::TooFewPoints(2).to_string(),
            "polygon needs at least 3 points, got 2"
        );
    }
}
