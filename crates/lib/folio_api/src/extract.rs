//! Request extractors: JSON bodies, access tokens, and session origin.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Request};
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, USER_AGENT};
use axum::http::request::Parts;
use folio_core::models::auth::SessionOrigin;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Fallback header for clients that cannot set `Authorization`.
pub const X_AUTH_TOKEN: &str = "x-auth-token";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Access token from `Authorization: Bearer <token>`, falling back to
/// `x-auth-token`. Empty values count as absent.
pub fn access_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    let fallback = || {
        headers
            .get(X_AUTH_TOKEN)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
    };
    bearer
        .filter(|t| !t.is_empty())
        .or_else(|| fallback().filter(|t| !t.is_empty()))
        .map(str::to_string)
}

/// `Json` whose rejections render as enveloped `400`s.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// JSON body that may be left out entirely. An empty body yields
/// `T::default()` whatever the content type; a non-empty body must parse.
#[derive(Debug, Clone, Default)]
pub struct OptionalJson<T>(pub T);

impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(T::default()));
        }
        serde_json::from_slice(&bytes)
            .map(OptionalJson)
            .map_err(|e| AppError::Validation(format!("Invalid JSON body: {e}")))
    }
}

/// The caller's access token, if any. Never rejects.
#[derive(Debug, Clone)]
pub struct AccessToken(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for AccessToken {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(AccessToken(access_token_from_headers(&parts.headers)))
    }
}

/// Where a request came from: first `x-forwarded-for` hop, else the peer
/// address, plus the user agent. Never rejects.
#[derive(Debug, Clone)]
pub struct Origin(pub SessionOrigin);

impl<S: Send + Sync> FromRequestParts<S> for Origin {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let ip_address = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(Origin(SessionOrigin {
            ip_address,
            user_agent,
        }))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, Request};

    use super::*;

    #[test]
    fn bearer_wins_over_fallback_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(X_AUTH_TOKEN, HeaderValue::from_static("def"));
        assert_eq!(access_token_from_headers(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn fallback_header_and_empty_values() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        headers.insert(X_AUTH_TOKEN, HeaderValue::from_static("def"));
        assert_eq!(access_token_from_headers(&headers).as_deref(), Some("def"));

        assert_eq!(access_token_from_headers(&HeaderMap::new()), None);
    }

    #[derive(Debug, Default, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    struct Body {
        refresh_token: Option<String>,
    }

    async fn optional_json(raw: &'static str) -> Result<Body, AppError> {
        let req = Request::builder()
            .body(axum::body::Body::from(raw))
            .unwrap();
        OptionalJson::<Body>::from_request(req, &())
            .await
            .map(|OptionalJson(body)| body)
    }

    #[tokio::test]
    async fn optional_json_defaults_empty_bodies() {
        assert_eq!(optional_json("").await.unwrap().refresh_token, None);
        assert_eq!(optional_json(" \n").await.unwrap().refresh_token, None);
        assert_eq!(
            optional_json(r#"{"refreshToken":"r1"}"#)
                .await
                .unwrap()
                .refresh_token
                .as_deref(),
            Some("r1")
        );
        assert!(matches!(
            optional_json("{not json").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn origin_prefers_forwarded_for() {
        let req = Request::builder()
            .header(X_FORWARDED_FOR, "198.51.100.4, 10.0.0.1")
            .header(USER_AGENT, "folio-android/2.1")
            .body(())
            .unwrap();
        let (mut parts, ()) = req.into_parts();
        let Origin(origin) = Origin::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(origin.ip_address.as_deref(), Some("198.51.100.4"));
        assert_eq!(origin.user_agent.as_deref(), Some("folio-android/2.1"));
    }

    #[tokio::test]
    async fn origin_falls_back_to_peer_address() {
        let mut req = Request::builder().body(()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 9], 4321))));
        let (mut parts, ()) = req.into_parts();
        let Origin(origin) = Origin::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(origin.ip_address.as_deref(), Some("192.0.2.9"));
        assert_eq!(origin.user_agent, None);
    }
}
