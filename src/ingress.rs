//! Ingress Guard: request validation and rate limiting,
//! evaluated before anything touches the scoring pipeline.

use crate::error::{CoreError, ValidationKind};
use parking_lot::Mutex;

pub const MAX_PAYLOAD_BYTES: usize = 100 * 1024;
pub const MAX_NESTING_DEPTH: usize = 10;
pub const MAX_STRING_LENGTH: usize = 10_000;
pub const MAX_EVENTS_PER_REQUEST: usize = 100;

pub const BUCKET_CAPACITY: f64 = 100.0;
pub const REFILL_PER_SECOND: f64 = 100.0;

/// Validates a raw request body before it is deserialized into domain types.
pub fn validate_payload(raw: &str, event_count: usize) -> Result<(), CoreError> {
    if raw.len() > MAX_PAYLOAD_BYTES {
        return Err(CoreError::validation(ValidationKind::OversizePayload));
    }
    if event_count > MAX_EVENTS_PER_REQUEST {
        return Err(CoreError::validation(ValidationKind::TooManyEvents));
    }

    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|_| CoreError::validation(ValidationKind::Schema))?;

    if json_depth(&value) > MAX_NESTING_DEPTH {
        return Err(CoreError::validation(ValidationKind::NestingTooDeep));
    }
    if let Some(len) = longest_string(&value) {
        if len > MAX_STRING_LENGTH {
            return Err(CoreError::validation(ValidationKind::StringTooLong));
        }
    }

    Ok(())
}

fn json_depth(value: &serde_json::Value) -> usize {
    match value {
        serde_json::Value::Object(map) => 1 + map.values().map(json_depth).max().unwrap_or(0),
        serde_json::Value::Array(items) => 1 + items.iter().map(json_depth).max().unwrap_or(0),
        _ => 0,
    }
}

fn longest_string(value: &serde_json::Value) -> Option<usize> {
    match value {
        serde_json::Value::String(s) => Some(s.len()),
        serde_json::Value::Object(map) => map.values().filter_map(longest_string).max(),
        serde_json::Value::Array(items) => items.iter().filter_map(longest_string).max(),
        _ => None,
    }
}

struct BucketState {
    tokens: f64,
    last_refill_at: f64,
}

/// Token-bucket rate limiter: capacity 100, refill 100/s, lazily topped up by
/// elapsed wall time on each check rather than a background timer.
pub struct RateLimiter {
    state: Mutex<BucketState>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self { state: Mutex::new(BucketState { tokens: BUCKET_CAPACITY, last_refill_at: 0.0 }) }
    }

    /// `now` is supplied by the caller (seconds, monotonic) to keep this
    /// deterministic under test.
    pub fn check(&self, now: f64) -> Result<(), CoreError> {
        let mut state = self.state.lock();
        let elapsed = (now - state.last_refill_at).max(0.0);
        state.tokens = (state.tokens + elapsed * REFILL_PER_SECOND).min(BUCKET_CAPACITY);
        state.last_refill_at = now;

        if state.tokens < 1.0 {
            let deficit = 1.0 - state.tokens;
            let retry_after_ms = ((deficit / REFILL_PER_SECOND) * 1000.0).ceil() as u64;
            return Err(CoreError::RateLimited { retry_after_ms });
        }

        state.tokens -= 1.0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversize_payload_is_rejected() {
        let raw = format!("{{\"x\": \"{}\"}}", "a".repeat(MAX_PAYLOAD_BYTES));
        let err = validate_payload(&raw, 1).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationKind::OversizePayload)));
    }

    #[test]
    fn too_many_events_is_rejected() {
        let err = validate_payload("{}", MAX_EVENTS_PER_REQUEST + 1).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationKind::TooManyEvents)));
    }

    #[test]
    fn deeply_nested_payload_is_rejected() {
        let mut nested = "1".to_string();
        for _ in 0..(MAX_NESTING_DEPTH + 2) {
            nested = format!("[{nested}]");
        }
        let err = validate_payload(&nested, 1).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationKind::NestingTooDeep)));
    }

    #[test]
    fn malformed_json_is_a_schema_error() {
        let err = validate_payload("not json", 1).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationKind::Schema)));
    }

    #[test]
    fn well_formed_payload_passes() {
        assert!(validate_payload("{\"kind\": \"motion\"}", 1).is_ok());
    }

    #[test]
    fn rate_limiter_allows_burst_up_to_capacity() {
        let limiter = RateLimiter::new();
        for _ in 0..(BUCKET_CAPACITY as usize) {
            assert!(limiter.check(0.0).is_ok());
        }
        assert!(limiter.check(0.0).is_err());
    }

    #[test]
    fn rate_limiter_refills_over_time() {
        let limiter = RateLimiter::new();
        for _ in 0..(BUCKET_CAPACITY as usize) {
            limiter.check(0.0).unwrap();
        }
        assert!(limiter.check(0.0).is_err());
        assert!(limiter.check(1.0).is_ok());
    }
}
