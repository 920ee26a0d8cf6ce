//! Uniform rejection responses.
//!
//! Every refused request gets the same JSON envelope:
//!
//! ```json
//! {"version": "0.0.1", "datetime": "2026-01-01T00:00:00+00:00", "status": "ERROR", "message": "Invalid client"}
//! ```
//!
//! Only the message of the failing step is surfaced, never the error chain.

use axum::{
    Json,
    body::Body,
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use http::StatusCode;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    version: &'static str,
    datetime: String,
    status: &'static str,
    message: &'a str,
}

/// A refused request: status code plus the message shown to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub message: String,
}

impl Rejection {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 403 with the given message.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        error_response(self.status, &self.message)
    }
}

/// Build the error envelope response.
pub fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    let envelope = ErrorEnvelope {
        version: env!("CARGO_PKG_VERSION"),
        datetime: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        status: "ERROR",
        message,
    };
    (status, Json(envelope)).into_response()
}

#[cfg(test)]
mod tests {
    use crate::rejection::{Rejection, error_response};
    use axum::{body::to_bytes, response::IntoResponse};
    use http::{StatusCode, header::CONTENT_TYPE};

    #[tokio::test]
    async fn envelope_carries_message_and_status() {
        let response = error_response(StatusCode::FORBIDDEN, "Invalid client");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ERROR");
        assert_eq!(json["message"], "Invalid client");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert!(
            chrono::DateTime::parse_from_rfc3339(json["datetime"].as_str().unwrap()).is_ok()
        );
    }

    #[tokio::test]
    async fn rejection_into_response() {
        let response = Rejection::forbidden("No client header provided").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "No client header provided");
    }
}
