//! Decoding of response bodies into caller types.
//!
//! Collection operations answer with `{"_embedded": {"<key>": [...]}}`,
//! single-resource reads with a bare object. Which shape to expect is decided
//! by the calling repository, never inferred from the body.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::DecodeError;
use crate::request::RawResponse;

/// Top-level envelope key.
pub const EMBEDDED: &str = "_embedded";

impl RawResponse {
    /// True when the body is absent or whitespace only.
    pub fn is_empty(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }

    fn require_body(&self) -> Result<(), DecodeError> {
        if self.is_empty() {
            return Err(DecodeError::EmptyBody {
                status: self.status.as_u16(),
            });
        }
        Ok(())
    }

    /// Decode a bare entity.
    pub fn entity<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        self.require_body()?;
        serde_json::from_slice(&self.body).map_err(DecodeError::Malformed)
    }

    /// Decode the `_embedded.<key>` sequence.
    pub fn embedded<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, DecodeError> {
        self.require_body()?;
        let mut value: Value = serde_json::from_slice(&self.body).map_err(DecodeError::Malformed)?;

        let items = value
            .get_mut(EMBEDDED)
            .and_then(|embedded| embedded.get_mut(key))
            .map(Value::take)
            .ok_or_else(|| DecodeError::MissingKey(format!("{EMBEDDED}.{key}")))?;

        serde_json::from_value(items).map_err(DecodeError::Malformed)
    }

    /// Like [`RawResponse::embedded`], but an empty body yields no items.
    ///
    /// List endpoints answer `204 No Content` when a filter matches nothing.
    pub fn embedded_or_empty<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Vec<T>, DecodeError> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        self.embedded(key)
    }

    /// Accept the response without expecting a payload.
    pub fn discard(self) {
        tracing::trace!(status = %self.status, bytes = self.body.len(), "Discarding response body");
    }
}
