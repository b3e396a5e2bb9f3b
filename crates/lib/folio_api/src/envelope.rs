//! Response envelope shared by every success and error body.
//!
//! ```json
//! { "status": true, "statusCode": 200, "message": "...", "data": { ... } }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub status: bool,
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_params: Option<Vec<&'static str>>,
}

/// A successful handler result rendered inside the envelope.
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    message: String,
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// `200 OK` with `data`.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            data: Some(data),
        }
    }

    /// `201 Created` with `data`.
    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// `200 OK` with `"data": null`.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            status: true,
            status_code: self.status.as_u16(),
            message: self.message,
            error: None,
            data: self.data,
            missing_params: None,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Error body: `status: false`, a machine-readable `error` code, no data.
pub fn error_body(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    missing_params: Option<Vec<&'static str>>,
) -> Response {
    let body: Envelope<()> = Envelope {
        status: false,
        status_code: status.as_u16(),
        message: message.into(),
        error: Some(code),
        data: None,
        missing_params,
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_shape() {
        let body = Envelope {
            status: true,
            status_code: 201,
            message: "created".into(),
            error: None,
            data: Some(serde_json::json!({"id": 1})),
            missing_params: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": true,
                "statusCode": 201,
                "message": "created",
                "data": {"id": 1}
            })
        );
    }

    #[test]
    fn error_envelope_lists_missing_params() {
        let body: Envelope<()> = Envelope {
            status: false,
            status_code: 400,
            message: "Missing required parameters".into(),
            error: Some("missing_params"),
            data: None,
            missing_params: Some(vec!["deviceid"]),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["data"], serde_json::Value::Null);
        assert_eq!(json["missingParams"], serde_json::json!(["deviceid"]));
        assert_eq!(json["error"], "missing_params");
    }
}
