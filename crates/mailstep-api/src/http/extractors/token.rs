//! Callback token extractor.
//!
//! The orchestrator sends its signed token as `Authorization: Bearer <jwt>`.
//! Extraction never fails; a missing or undecodable header yields `None` and
//! the lifecycle handler answers 401 `authentication_failed`.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

pub struct CallbackToken(pub Option<String>);

impl<S> FromRequestParts<S> for CallbackToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(bearer_token(&parts.headers)))
    }
}

/// Token from an `Authorization: Bearer` header; the scheme is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}
