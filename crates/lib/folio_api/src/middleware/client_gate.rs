//! Client descriptor gate.
//!
//! Every non-exempt request must carry `isStaging`, `deviceid`, `camefrom`
//! and `appversion` in its body (JSON object or multipart text fields), or in
//! the query string. Requests missing any of them are answered with a single
//! `400` listing every missing name; nothing downstream runs. Accepted
//! requests get a [`ClientDescriptor`] in their extensions and are forwarded
//! with the original body bytes.

use std::collections::HashMap;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::middleware::Next;
use axum::response::Response;
use folio_core::models::auth::{ClientDescriptor, Platform};
use serde_json::Value;
use tracing::{debug, warn};

use crate::AppState;
use crate::error::AppError;
use crate::routes::{GATE_EXEMPT_PREFIXES, GET_HEALTH};

pub const IS_STAGING: &str = "isStaging";
pub const DEVICE_ID: &str = "deviceid";
pub const CAME_FROM: &str = "camefrom";
pub const APP_VERSION: &str = "appversion";

/// Descriptor field names, in the order they are reported.
pub const DESCRIPTOR_FIELDS: [&str; 4] = [IS_STAGING, DEVICE_ID, CAME_FROM, APP_VERSION];

fn is_exempt(path: &str) -> bool {
    path == GET_HEALTH || GATE_EXEMPT_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Axum middleware: validate and attach the client descriptor.
pub async fn require_client(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if is_exempt(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, state.config.body_limit)
        .await
        .map_err(|e| AppError::Validation(format!("Unreadable request body: {e}")))?;

    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let mut fields = if content_type.starts_with("multipart/form-data") {
        multipart_fields(&content_type, bytes.clone()).await
    } else {
        json_fields(&bytes)
    };
    if let Ok(Query(query)) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri) {
        for name in DESCRIPTOR_FIELDS {
            if let Some(value) = query.get(name).filter(|v| !v.is_empty()) {
                fields.entry(name).or_insert_with(|| value.clone());
            }
        }
    }

    let descriptor = descriptor_from_fields(&fields).map_err(|missing| {
        debug!(path = %parts.uri.path(), ?missing, "client descriptor incomplete");
        AppError::MissingParams(missing)
    })?;

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(descriptor);
    Ok(next.run(request).await)
}

/// Build the descriptor, or list every missing field name.
pub fn descriptor_from_fields(
    fields: &HashMap<&'static str, String>,
) -> Result<ClientDescriptor, Vec<&'static str>> {
    let missing: Vec<&'static str> = DESCRIPTOR_FIELDS
        .into_iter()
        .filter(|name| fields.get(name).is_none_or(|v| v.is_empty()))
        .collect();
    if !missing.is_empty() {
        return Err(missing);
    }

    let field = |name: &str| fields.get(name).cloned().unwrap_or_default();
    let came_from = field(CAME_FROM);
    let platform = Platform::from_raw(&came_from);
    if !came_from.eq_ignore_ascii_case(platform.as_str()) {
        debug!(%came_from, "unrecognised platform, treating as android");
    }
    Ok(ClientDescriptor {
        is_staging: field(IS_STAGING) == "true",
        device_id: field(DEVICE_ID),
        platform,
        app_version: field(APP_VERSION),
    })
}

/// Descriptor fields from a JSON object body. Anything that is not an
/// object yields no fields.
fn json_fields(bytes: &Bytes) -> HashMap<&'static str, String> {
    let mut fields = HashMap::new();
    let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(bytes) else {
        return fields;
    };
    for name in DESCRIPTOR_FIELDS {
        let value = match map.get(name) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        fields.insert(name, value);
    }
    fields
}

/// Descriptor fields from the text parts of a multipart body. File parts
/// are skipped; a malformed body yields whatever was read before the error.
async fn multipart_fields(content_type: &str, bytes: Bytes) -> HashMap<&'static str, String> {
    let mut fields = HashMap::new();
    let rebuilt = match Request::builder()
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(bytes))
    {
        Ok(req) => req,
        Err(e) => {
            warn!(error = %e, "could not rebuild multipart request");
            return fields;
        }
    };
    let mut multipart = match Multipart::from_request(rebuilt, &()).await {
        Ok(m) => m,
        Err(e) => {
            debug!(error = %e, "multipart body rejected");
            return fields;
        }
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "malformed multipart body");
                break;
            }
        };
        if field.file_name().is_some() {
            continue;
        }
        let Some(name) = field
            .name()
            .and_then(|n| DESCRIPTOR_FIELDS.into_iter().find(|f| *f == n))
        else {
            continue;
        };
        match field.text().await {
            Ok(text) => {
                fields.insert(name, text);
            }
            Err(e) => {
                debug!(error = %e, field = name, "unreadable multipart field");
                break;
            }
        }
    }
    fields
}
