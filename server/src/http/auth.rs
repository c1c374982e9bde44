//! Admin authentication for mutating routes.

use axum::{
    extract::FromRequestParts,
    http::{header::WWW_AUTHENTICATE, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::headers::{
    authorization::{Basic, Bearer},
    Authorization, HeaderMapExt,
};
use serde_json::json;
use subtle::ConstantTimeEq;

use super::AppState;

const ADMIN_EMAIL_HEADER: &str = "x-admin-email";

/// How admin requests prove who they are.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthPolicy {
    Basic { user: String, password: String },
    Bearer { token: String },
    AdminEmail { email: String },
    /// Everything is allowed. Development only.
    Open,
}

impl std::fmt::Debug for AuthPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print secrets.
        match self {
            Self::Basic { user, .. } => write!(f, "Basic {{ user: {user:?} }}"),
            Self::Bearer { .. } => f.write_str("Bearer"),
            Self::AdminEmail { email } => write!(f, "AdminEmail {{ email: {email:?} }}"),
            Self::Open => f.write_str("Open"),
        }
    }
}

impl AuthPolicy {
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "basic",
            Self::Bearer { .. } => "bearer",
            Self::AdminEmail { .. } => "admin-email",
            Self::Open => "none",
        }
    }

    /// Decide whether the request headers carry valid admin credentials.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let basic = matches!(self, Self::Basic { .. });
        let verdict = match self {
            Self::Open => return Ok(()),
            Self::Basic { user, password } => headers
                .typed_get::<Authorization<Basic>>()
                .map(|auth| eq(auth.username(), user) & eq(auth.password(), password)),
            Self::Bearer { token } => headers
                .typed_get::<Authorization<Bearer>>()
                .map(|auth| eq(auth.token(), token)),
            Self::AdminEmail { email } => headers
                .get(ADMIN_EMAIL_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|given| eq(given.trim(), email)),
        };

        match verdict {
            Some(true) => Ok(()),
            Some(false) => Err(AuthError::Invalid { basic }),
            None => Err(AuthError::Missing { basic }),
        }
    }
}

fn eq(given: &str, expected: &str) -> bool {
    given.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Extractor that only succeeds for authorized admin requests.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin;

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state.auth.authorize(&parts.headers).map(|()| RequireAdmin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    Missing { basic: bool },
    Invalid { basic: bool },
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (basic, message) = match self {
            AuthError::Missing { basic } => (basic, "Missing credentials"),
            AuthError::Invalid { basic } => (basic, "Invalid credentials"),
        };
        let mut resp = (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized", "message": message })),
        )
            .into_response();
        if basic {
            resp.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"admin\""),
            );
        }
        resp
    }
}
