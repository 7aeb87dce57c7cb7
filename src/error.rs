//! Error taxonomy. Each kind is a distinct, stable tag.
//!
//! Only `Validation` and `RateLimited` are ever surfaced to the caller of
//! `assess`; `Internal` and `Storage` are absorbed into mode degradation so
//! the caller always receives an `AssessmentResult` (see `crate::lib`).

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    OversizePayload,
    NestingTooDeep,
    StringTooLong,
    TooManyEvents,
    Schema,
}

impl ValidationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationKind::OversizePayload => "oversize_payload",
            ValidationKind::NestingTooDeep => "nesting_too_deep",
            ValidationKind::StringTooLong => "string_too_long",
            ValidationKind::TooManyEvents => "too_many_events",
            ValidationKind::Schema => "schema",
        }
    }
}

impl std::fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(ValidationKind),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("internal error in stage {stage}")]
    Internal { stage: &'static str },

    #[error("storage error: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn validation(kind: ValidationKind) -> Self {
        CoreError::Validation(kind)
    }
}
