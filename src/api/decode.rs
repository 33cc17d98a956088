//! Response decoding
//!
//! Every Slack Web API response carries the same envelope (`ok`, optional
//! `error`). Decoding keeps the raw body next to the typed value so an
//! `ok: false` answer can be logged verbatim.

use crate::{HarvestError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// The success/error envelope shared by all responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub warning: Option<String>,
}

/// Implemented by every response type
pub trait HasEnvelope {
    fn envelope(&self) -> &Envelope;
}

/// A decoded response plus the body it came from
#[derive(Debug, Clone)]
pub struct Decoded<T> {
    pub value: T,
    pub raw: String,
}

impl<T: HasEnvelope> Decoded<T> {
    pub fn is_ok(&self) -> bool {
        self.value.envelope().ok
    }

    /// API error code, `unknown_error` when Slack sent none
    pub fn error_code(&self) -> &str {
        self.value
            .envelope()
            .error
            .as_deref()
            .unwrap_or("unknown_error")
    }

    /// Converts an `ok: false` answer into `HarvestError::Api`
    pub fn into_result(self, method: &str) -> Result<T> {
        if self.is_ok() {
            return Ok(self.value);
        }
        tracing::warn!(
            method = %method,
            error = %self.error_code(),
            body = %self.raw,
            "Slack API call failed"
        );
        Err(HarvestError::Api {
            method: method.to_string(),
            error: self.error_code().to_string(),
        })
    }
}

/// Decodes a response body
///
/// Malformed JSON is a `HarvestError::Decode`, which the crawler treats as
/// fatal. An `ok: false` body decodes successfully; callers inspect it.
///
/// # Example
///
/// ```
/// use slack_harvest::api::{decode, UserInfoResponse};
///
/// let decoded = decode::<UserInfoResponse>(
///     "users.info",
///     r#"{"ok":false,"error":"user_not_found"}"#.to_string(),
/// )
/// .unwrap();
/// assert!(!decoded.is_ok());
/// assert_eq!(decoded.error_code(), "user_not_found");
/// ```
pub fn decode<T>(method: &str, body: String) -> Result<Decoded<T>>
where
    T: DeserializeOwned + HasEnvelope,
{
    let value = serde_json::from_str(&body).map_err(|source| HarvestError::Decode {
        method: method.to_string(),
        source,
    })?;
    Ok(Decoded { value, raw: body })
}
