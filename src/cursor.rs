// 🔖 Cursor codec - opaque keyset pagination tokens
//
// Wire format: URL-safe base64 (no padding) of {"p": page, "s": "field:order", "v": [value, id]}.
// A token is only valid for the page and sort signature it was minted for.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CursorError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortCursor {
    #[serde(rename = "p")]
    pub page: u32,
    #[serde(rename = "s")]
    pub sort: String,
    #[serde(rename = "v")]
    pub values: Vec<Value>,
}

impl SortCursor {
    /// Cursor pointing after the row with `sort_value` / `id`, valid for `page`.
    pub fn new(page: u32, sort: impl Into<String>, sort_value: Value, id: &str) -> Self {
        SortCursor {
            page,
            sort: sort.into(),
            values: vec![sort_value, Value::String(id.to_string())],
        }
    }

    pub fn sort_value(&self) -> Option<&Value> {
        self.values.first()
    }

    pub fn last_id(&self) -> Option<&str> {
        self.values.get(1).and_then(Value::as_str)
    }

    pub fn matches(&self, page: u32, sort: &str) -> bool {
        self.page == page && self.sort == sort
    }

    pub fn encode(&self) -> String {
        // Serializing a struct of strings, numbers and JSON values cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn try_decode(token: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD.decode(token.trim())?;
        let cursor: SortCursor = serde_json::from_slice(&bytes)?;
        if cursor.values.len() != 2 || cursor.last_id().is_none() {
            return Err(CursorError::Arity(cursor.values.len()));
        }
        Ok(cursor)
    }

    /// Decode a token; anything unreadable is simply no cursor.
    pub fn decode(token: &str) -> Option<Self> {
        match Self::try_decode(token) {
            Ok(cursor) => Some(cursor),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring pagination token");
                None
            }
        }
    }
}
