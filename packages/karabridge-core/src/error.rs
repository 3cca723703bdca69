//! Centralized error types for the Karabridge core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::translate::CommandError;
use crate::upstream::UpstreamError;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses and logs.
    fn code(&self) -> &'static str;
}

impl ErrorCode for UpstreamError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "upstream_invalid_url",
            Self::WebSocket(_) => "upstream_websocket_failed",
            Self::Protocol(_) => "upstream_protocol_error",
            Self::Closed => "upstream_closed",
        }
    }
}

impl ErrorCode for CommandError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownType(_) => "unknown_type",
            Self::MalformedPayload { .. } => "malformed_payload",
            Self::InvalidNumber { .. } => "invalid_number",
            Self::UnknownTrack(_) => "unknown_track",
        }
    }
}

/// Application-wide error type for the bridge server.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum BridgeError {
    /// The bridge upgrade request carried no channel identifier.
    #[error("Missing channel header: {0}")]
    MissingChannel(String),

    /// Client sent an invalid or malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl BridgeError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingChannel(_) => "missing_channel",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingChannel(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_channel_is_bad_request() {
        let err = BridgeError::MissingChannel("x-karafun-channel".into());
        assert_eq!(err.code(), "missing_channel");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn error_response_carries_code_and_status() {
        let response = BridgeError::InvalidRequest("bad header".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "invalid_request");
        assert_eq!(value["status"], 400);
        assert_eq!(value["message"], "Invalid request: bad header");
    }

    #[test]
    fn upstream_errors_expose_codes() {
        assert_eq!(UpstreamError::Closed.code(), "upstream_closed");
        assert_eq!(
            UpstreamError::InvalidUrl("x".into()).code(),
            "upstream_invalid_url"
        );
    }

    #[test]
    fn command_errors_expose_codes() {
        assert_eq!(CommandError::UnknownTrack(99).code(), "unknown_track");
        assert_eq!(
            CommandError::UnknownType("remote.X".into()).code(),
            "unknown_type"
        );
    }
}
