use axum::{
    extract::{FromRef, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, PublicUser, SessionStatus, SignupRequest},
        extractors::AuthUser,
        password::{hash_password, verify_password},
        repo::User,
        session::{SessionState, Sessions},
        token::TokenKeys,
    },
    error::{is_unique_violation, ApiError},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(session))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }

    let hash = hash_password(&payload.password)?;

    // The unique index on email decides duplicate races, not a pre-check.
    let user = match User::create(&state.db, &payload.email, &hash, payload.name.as_deref()).await
    {
        Ok(u) => u,
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %payload.email, "email already registered");
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, email = %user.email, "user signed up");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<LoginResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    // Unknown email and wrong password must be indistinguishable to the
    // caller; only the log tells them apart.
    let Some(user) = User::find_by_email(&state.db, &payload.email).await? else {
        warn!(email = %payload.email, "login unknown email");
        return Err(ApiError::InvalidCredentials);
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let keys = TokenKeys::from_ref(&state);
    let access_token = keys.sign_access(user.id)?;

    let sessions = Sessions::from_ref(&state);
    let cookie = sessions.create(user.id, &access_token)?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((headers, Json(LoginResponse { access_token })))
}

/// Slide the session expiry forward. Tolerates a missing or garbled carrier
/// silently; the client simply keeps whatever it had.
#[instrument(skip(state, headers))]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, HeaderMap), ApiError> {
    let sessions = Sessions::from_ref(&state);
    let mut out = HeaderMap::new();
    if let Some(cookie) = sessions.refresh(&headers)? {
        out.insert(SET_COOKIE, cookie);
    }
    Ok((StatusCode::NO_CONTENT, out))
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> Result<(StatusCode, HeaderMap), ApiError> {
    let sessions = Sessions::from_ref(&state);
    let mut out = HeaderMap::new();
    out.insert(SET_COOKIE, sessions.clear()?);
    Ok((StatusCode::NO_CONTENT, out))
}

/// Session introspection for the frontend; never a 401, the answer is the body.
#[instrument(skip(state, headers))]
pub async fn session(State(state): State<AppState>, headers: HeaderMap) -> Json<SessionStatus> {
    let sessions = Sessions::from_ref(&state);
    match sessions.validate(&headers) {
        SessionState::Authenticated { user_id, .. } => Json(SessionStatus {
            authenticated: true,
            user_id: Some(user_id),
        }),
        SessionState::Anonymous => Json(SessionStatus {
            authenticated: false,
            user_id: None,
        }),
    }
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    // A valid token for a since-deleted user is still not an identity.
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("a.b+c@sub.domain.io"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("missing@tld"));
    }
}
