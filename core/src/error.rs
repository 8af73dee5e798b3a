//! Error types for the todo API client.
//!
//! # Design
//! `ApiError` describes what went wrong on the wire. `Unauthorized` and
//! `NotFound` get dedicated variants because the controller reacts to them;
//! every other unexpected status lands in `HttpError` with the raw body so
//! the server's `{message}` can still be surfaced. `ClientError` is what the
//! controller returns: the three user-facing failure kinds plus the
//! duplicate-action guard.

use thiserror::Error;

use crate::controller::Operation;
use crate::http::TransportError;
use crate::types::ServerMessage;

/// Errors returned by `ApiClient` parse methods and by the transport.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned 401: missing, invalid, or expired token.
    #[error("unauthorized: {body}")]
    Unauthorized { body: String },

    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server returned any other status the call does not accept.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ApiError {
    /// The `message` field of the server's JSON error body, if there is one.
    pub fn server_message(&self) -> Option<String> {
        let body = match self {
            ApiError::Unauthorized { body } | ApiError::HttpError { body, .. } => body,
            _ => return None,
        };
        serde_json::from_str::<ServerMessage>(body)
            .ok()
            .map(|m| m.message)
            .filter(|m| !m.is_empty())
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

/// Errors returned by `TodoController` operations.
///
/// Every variant has already been reported to the user as a notice by the
/// time it is returned.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Required input was missing; nothing was sent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation needs a session and there is none; nothing was sent.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The same operation is already awaiting a response; nothing was sent.
    #[error("{0:?} is already in flight")]
    InFlight(Operation),

    /// The server rejected the call, or it never completed.
    #[error(transparent)]
    Remote(#[from] ApiError),
}
