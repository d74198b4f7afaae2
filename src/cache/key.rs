//! Deterministic cache key derivation from request parameters
//!
//! Keys are built as `prefix:<base64 of canonical JSON>` so that two requests
//! with the same parameters always hit the same cache entry regardless of the
//! order the parameters were supplied in.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use tracing::warn;

/// Derives a stable cache key from a prefix and optional request parameters.
///
/// When `params` is `None` the key is the prefix alone. Otherwise the
/// parameters are serialized to canonical JSON (object keys sorted at every
/// nesting level, since `serde_json::Value` maps are ordered) and the base64
/// encoding of that string is appended to the prefix.
///
/// # Arguments
/// * `prefix` - Logical name of the request, e.g. "events"
/// * `params` - Identifying parameters, e.g. a filter struct
pub fn derive_key<P: Serialize>(prefix: &str, params: Option<&P>) -> String {
    let Some(params) = params else {
        return prefix.to_string();
    };

    match serde_json::to_value(params) {
        Ok(value) if value.is_null() => prefix.to_string(),
        Ok(value) => {
            let canonical = value.to_string();
            format!("{}:{}", prefix, STANDARD.encode(canonical))
        }
        Err(err) => {
            warn!(prefix, %err, "failed to serialize cache key params, using prefix only");
            prefix.to_string()
        }
    }
}
