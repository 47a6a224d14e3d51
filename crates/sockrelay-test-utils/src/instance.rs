//! Fake instances — axum routers that speak the instance wire contract.
//!
//! Every router accepts `PUT /` with a JSON envelope and answers with a
//! status code and a body. Successful bodies are JSON string literals, the
//! way a real instance encodes its result.

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::put;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The envelope as seen by an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedEnvelope {
    pub url: String,
    pub data: Value,
}

/// Always answer with `status` and `body` encoded as a JSON string.
pub fn respond_with(status: StatusCode, body: impl Into<String>) -> Router {
    let body = body.into();
    Router::new().route(
        "/",
        put(move || {
            let body = body.clone();
            async move { (status, Json(body)) }
        }),
    )
}

/// Always answer `200 OK` with `body` as a JSON string.
pub fn ok(body: impl Into<String>) -> Router {
    respond_with(StatusCode::OK, body)
}

/// Always answer `500` with `body` as a JSON string.
pub fn failing(body: impl Into<String>) -> Router {
    respond_with(StatusCode::INTERNAL_SERVER_ERROR, body)
}

/// Always answer with `status` and `body` sent verbatim (not JSON-encoded).
pub fn raw(status: StatusCode, body: &'static str) -> Router {
    Router::new().route("/", put(move || async move { (status, body) }))
}

/// Answer with the received envelope, re-serialized, as a JSON string.
pub fn echo() -> Router {
    Router::new().route(
        "/",
        put(|Json(envelope): Json<ReceivedEnvelope>| async move {
            let text = serde_json::to_string(&envelope).unwrap_or_default();
            (StatusCode::OK, Json(text))
        }),
    )
}

/// Succeed with `"success_response"` only for a destination ending in
/// `/success` whose payload has `"key": "value"`; otherwise `500` with
/// `"error_response"`.
pub fn success_or_error() -> Router {
    Router::new().route(
        "/",
        put(|Json(envelope): Json<ReceivedEnvelope>| async move {
            let matches = envelope.url.ends_with("/success")
                && envelope.data.get("key").and_then(Value::as_str) == Some("value");
            if matches {
                (StatusCode::OK, Json("success_response".to_string()))
            } else {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json("error_response".to_string()),
                )
            }
        }),
    )
}
