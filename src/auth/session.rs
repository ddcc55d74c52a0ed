use axum::extract::FromRef;
use axum::http::{header::AUTHORIZATION, header::COOKIE, HeaderMap, HeaderValue};
use tracing::debug;
use uuid::Uuid;

use crate::auth::token::TokenKeys;
use crate::state::AppState;

pub const SESSION_COOKIE_NAME: &str = "user_session";

/// Outcome of validating a request's session carrier. Every failure mode
/// (missing cookie, bad signature, expired) collapses to `Anonymous` so the
/// caller cannot tell them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated { user_id: Uuid, token: String },
}

/// Issues, refreshes, validates and clears the session cookie. Stateless:
/// the cookie is a self-contained signed token and the server keeps only the
/// signing secret, so logout removes the client copy and expiry is the only
/// hard boundary.
#[derive(Clone)]
pub struct Sessions {
    keys: TokenKeys,
    cookie_secure: bool,
}

impl FromRef<AppState> for Sessions {
    fn from_ref(state: &AppState) -> Self {
        Self {
            keys: TokenKeys::from_ref(state),
            cookie_secure: state.config.session.cookie_secure,
        }
    }
}

impl Sessions {
    /// Mint a session cookie for a freshly logged-in subject. An empty access
    /// token is a hard precondition failure: an empty value must never be
    /// persisted as a session.
    pub fn create(&self, user_id: Uuid, access_token: &str) -> anyhow::Result<HeaderValue> {
        if access_token.is_empty() {
            anyhow::bail!("refusing to create a session around an empty token");
        }
        let session = self.keys.sign_session(user_id, access_token)?;
        self.cookie(&session, self.keys.session_ttl.as_secs() as i64)
    }

    /// Re-issue the cookie with a fresh expiry, same subject and token.
    /// A missing or garbled carrier is a silent no-op, not an error.
    pub fn refresh(&self, headers: &HeaderMap) -> anyhow::Result<Option<HeaderValue>> {
        let Some(value) = session_cookie(headers) else {
            return Ok(None);
        };
        let claims = match self.keys.verify_session(&value) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "refresh skipped, carrier did not verify");
                return Ok(None);
            }
        };
        let session = self.keys.sign_session(claims.sub, &claims.token)?;
        let cookie = self.cookie(&session, self.keys.session_ttl.as_secs() as i64)?;
        Ok(Some(cookie))
    }

    /// Read-only, side-effect-free check of the carrier.
    pub fn validate(&self, headers: &HeaderMap) -> SessionState {
        let Some(value) = session_cookie(headers) else {
            return SessionState::Anonymous;
        };
        match self.keys.verify_session(&value) {
            Ok(claims) if !claims.token.is_empty() => SessionState::Authenticated {
                user_id: claims.sub,
                token: claims.token,
            },
            _ => SessionState::Anonymous,
        }
    }

    /// Clearing cookie; unconditional, a no-op for clients without one.
    pub fn clear(&self) -> anyhow::Result<HeaderValue> {
        self.cookie("", 0)
    }

    fn cookie(&self, value: &str, max_age: i64) -> anyhow::Result<HeaderValue> {
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        Ok(HeaderValue::from_str(&cookie)?)
    }
}

/// Pull the session token out of the Cookie header, if present.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

/// Pull a bearer token out of the Authorization header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .trim()
        .strip_prefix("Bearer ")
        .or_else(|| value.trim().strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
