//! Error taxonomy for the fill pipeline.
//!
//! Inference failures are classified into the three classes the retry loop
//! and run summary care about: transient (retried with backoff), malformed
//! (the call completed but the payload is unusable; degrade to a raw
//! artifact), and fatal (credential or configuration problems that abort the
//! whole run). Structural mismatches and missing inputs are handled at their
//! call sites as per-record or per-unit skips, not as errors that propagate.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network/timeout/rate-limit class; worth retrying with backoff.
    Transient,
    /// The exchange completed but produced nothing usable; do not retry.
    Malformed,
    /// Credentials or configuration; nothing downstream should be attempted.
    Fatal,
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("inference request timed out after {0:?}")]
    Timeout(Duration),

    #[error("inference endpoint returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("response is not a record list ({reason})")]
    UnparseableResponse { reason: String, raw: String },

    #[error("no API key configured; set SHEETFILL_API_KEY or OPENAI_API_KEY")]
    MissingCredentials,
}

impl InferenceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            InferenceError::Transport(_) | InferenceError::Timeout(_) => ErrorClass::Transient,
            InferenceError::Api { status, .. } => match *status {
                408 | 429 => ErrorClass::Transient,
                status if status >= 500 => ErrorClass::Transient,
                401 | 403 => ErrorClass::Fatal,
                // Remaining 4xx: the request itself was rejected; treat like
                // an unusable exchange and degrade rather than abort the run.
                _ => ErrorClass::Malformed,
            },
            InferenceError::UnparseableResponse { .. } => ErrorClass::Malformed,
            InferenceError::MissingCredentials => ErrorClass::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Category label used in the run summary.
    pub fn category(&self) -> &'static str {
        match self.class() {
            ErrorClass::Transient => "transient",
            ErrorClass::Malformed => "malformed-response",
            ErrorClass::Fatal => "fatal",
        }
    }

    /// The raw response body, when the failure carries one worth persisting.
    pub fn raw_payload(&self) -> Option<&str> {
        match self {
            InferenceError::UnparseableResponse { raw, .. } => Some(raw),
            InferenceError::Api { body, .. } => Some(body),
            _ => None,
        }
    }
}
