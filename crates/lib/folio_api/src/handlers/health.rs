//! Liveness endpoint.

use crate::envelope::ApiResponse;
use crate::models::HealthResponse;

/// `GET /health`: exempt from both gates.
pub async fn health() -> ApiResponse<HealthResponse> {
    ApiResponse::ok(
        "OK",
        HealthResponse {
            service: env!("CARGO_PKG_NAME"),
            version: folio_core::version(),
        },
    )
}
