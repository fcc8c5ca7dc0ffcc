//! Opaque pagination cursor.
//!
//! The token is a URL-safe base64 wrapping of a JSON object with
//! alphabetically ordered keys (article_id, score, timestamp). Clients
//! must treat it as an unparsed string; the format is nevertheless an
//! external contract and must stay stable across releases.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Decoded cursor state. `article_id` is the pagination watermark:
/// subsequent pages only contain articles with a strictly greater id.
/// This is an id-based approximation, not a score watermark; it can skip
/// articles whose ids sort below the watermark, but it can never repeat
/// one (see the candidate selector).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub article_id: Uuid,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}

pub fn encode(cursor: &Cursor) -> String {
    // Field order in the struct is already alphabetical, which is what
    // serde_json emits.
    let json = serde_json::to_string(cursor).unwrap_or_default();
    general_purpose::URL_SAFE.encode(json)
}

/// Decode a cursor token. Never fails loudly: any malformed input, from
/// truncated base64 to stale JSON shapes, yields `None` and callers
/// treat that as "no cursor".
pub fn decode(token: &str) -> Option<Cursor> {
    let bytes = general_purpose::URL_SAFE.decode(token.trim()).ok()?;
    let json = String::from_utf8(bytes).ok()?;
    serde_json::from_str(&json).ok()
}
