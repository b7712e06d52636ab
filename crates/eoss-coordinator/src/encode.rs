//! Name Encoder (§4.1): derives the canonical `object_name` from a
//! `(filename, version)` pair. Pure, no I/O.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use eoss_common::{EossError, Result};

/// `base64(utf8(filename))`, or `base64(utf8(filename + ":" + salt + ":" + version))`
/// when a version tag is supplied.
pub fn encode(filename: &str, version: Option<&str>, salt: &str) -> String {
    let payload = match version {
        Some(v) => format!("{filename}:{salt}:{v}"),
        None => filename.to_string(),
    };
    STANDARD.encode(payload.as_bytes())
}

/// Inverse of [`encode`]'s base64 step. Callers must not assume the decoded
/// text parses back into a structural `(filename, salt, version)` triple —
/// that's only true when the caller already knows the shape it put in.
pub fn decode(object_name: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(object_name)
        .map_err(|e| EossError::Internal(format!("invalid object name encoding: {e}")))?;
    String::from_utf8(bytes).map_err(|e| EossError::Internal(format!("invalid utf8 in object name: {e}")))
}
