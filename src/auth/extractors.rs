use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use crate::auth::session::{bearer_token, SessionState, Sessions};
use crate::auth::token::TokenKeys;
use crate::error::ApiError;

/// Guard for protected routes: resolves the caller's identity from the
/// request's carrier, or rejects before any handler runs.
///
/// Handlers must take the owner id from this extractor and from nowhere else.
/// A client-supplied user id in a path or body is never an identity.
#[derive(Debug)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenKeys: FromRef<S>,
    Sessions: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Server-to-server callers carry the access token directly.
        if let Some(token) = bearer_token(&parts.headers) {
            let keys = TokenKeys::from_ref(state);
            return match keys.verify_access(&token) {
                Ok(claims) => Ok(AuthUser(claims.sub)),
                Err(_) => {
                    warn!("invalid or expired bearer token");
                    Err(ApiError::Unauthorized)
                }
            };
        }

        // Browser callers carry the session cookie.
        let sessions = Sessions::from_ref(state);
        match sessions.validate(&parts.headers) {
            SessionState::Authenticated { user_id, .. } => Ok(AuthUser(user_id)),
            SessionState::Anonymous => Err(ApiError::Unauthorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::http::{header::AUTHORIZATION, header::COOKIE, HeaderValue, Request};

    fn parts_with(name: axum::http::HeaderName, value: String) -> Parts {
        let mut request = Request::builder().body(()).unwrap();
        request
            .headers_mut()
            .insert(name, HeaderValue::from_str(&value).unwrap());
        request.into_parts().0
    }

    #[tokio::test]
    async fn bearer_access_token_resolves_identity() {
        let state = AppState::fake();
        let keys = TokenKeys::from_ref(&state);
        let user_id = Uuid::new_v4();
        let token = keys.sign_access(user_id).unwrap();
        let mut parts = parts_with(AUTHORIZATION, format!("Bearer {token}"));
        let AuthUser(resolved) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("valid bearer should authenticate");
        assert_eq!(resolved, user_id);
    }

    #[tokio::test]
    async fn session_cookie_resolves_identity() {
        let state = AppState::fake();
        let keys = TokenKeys::from_ref(&state);
        let user_id = Uuid::new_v4();
        let access = keys.sign_access(user_id).unwrap();
        let session = keys.sign_session(user_id, &access).unwrap();
        let mut parts = parts_with(COOKIE, format!("user_session={session}"));
        let AuthUser(resolved) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("valid session cookie should authenticate");
        assert_eq!(resolved, user_id);
    }

    #[tokio::test]
    async fn missing_carrier_is_rejected() {
        let state = AppState::fake();
        let mut parts = Request::builder().body(()).unwrap().into_parts().0;
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn session_token_on_bearer_carrier_is_rejected() {
        let state = AppState::fake();
        let keys = TokenKeys::from_ref(&state);
        let user_id = Uuid::new_v4();
        let access = keys.sign_access(user_id).unwrap();
        let session = keys.sign_session(user_id, &access).unwrap();
        let mut parts = parts_with(AUTHORIZATION, format!("Bearer {session}"));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn garbage_bearer_is_rejected() {
        let state = AppState::fake();
        let mut parts = parts_with(AUTHORIZATION, "Bearer nonsense".to_string());
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }
}
