//! Admin session extractor for the Review API.
//!
//! This crate does not implement authentication itself; an out-of-scope
//! reverse proxy or auth middleware is expected to sit in front of the
//! Review API and forward an already-authenticated operator identity in
//! the `X-Melodee-Admin` header (§4.10). `AdminSession` only trusts and
//! extracts that header — it is not a login system.

use super::state::ServerState;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::IntoResponse,
};

#[derive(Debug, Clone)]
pub struct AdminSession {
    pub operator: String,
}

pub const ADMIN_HEADER: &str = "x-melodee-admin";

pub enum SessionExtractionError {
    AccessDenied,
}

impl IntoResponse for SessionExtractionError {
    fn into_response(self) -> axum::response::Response {
        match self {
            SessionExtractionError::AccessDenied => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

impl FromRequestParts<ServerState> for AdminSession {
    type Rejection = SessionExtractionError;

    async fn from_request_parts(parts: &mut Parts, _state: &ServerState) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ADMIN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| AdminSession { operator: s.to_string() })
            .ok_or(SessionExtractionError::AccessDenied)
    }
}
