use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::state::AppState;

/// Distinguishes the bearer access token from the cookie session token so a
/// token captured on one carrier cannot be replayed on the other.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Session,
}

/// Payload of the bearer access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

/// Payload of the session cookie token: the subject plus the access token
/// minted for it at login, under the session's own expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub token: String,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

/// Process-wide signing material, built once from config. Rotating the secret
/// invalidates every outstanding token.
#[derive(Clone)]
pub struct TokenKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub session_ttl: Duration,
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(state: &AppState) -> Self {
        let jwt = &state.config.jwt;
        Self {
            encoding: EncodingKey::from_secret(jwt.secret.as_bytes()),
            decoding: DecodingKey::from_secret(jwt.secret.as_bytes()),
            issuer: jwt.issuer.clone(),
            audience: jwt.audience.clone(),
            access_ttl: Duration::from_secs((jwt.ttl_minutes as u64) * 60),
            session_ttl: Duration::from_secs(
                (state.config.session.ttl_days as u64) * 24 * 60 * 60,
            ),
        }
    }
}

impl TokenKeys {
    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation
    }

    fn timestamps(&self, ttl: Duration) -> (usize, usize) {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        (now.unix_timestamp() as usize, exp.unix_timestamp() as usize)
    }

    pub fn sign_access(&self, user_id: Uuid) -> anyhow::Result<String> {
        let (iat, exp) = self.timestamps(self.access_ttl);
        let claims = AccessClaims {
            sub: user_id,
            iat,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: TokenKind::Access,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "access token signed");
        Ok(token)
    }

    /// Expiry, signature, issuer and audience are all enforced in here; the
    /// caller only sees a single opaque failure.
    pub fn verify_access(&self, token: &str) -> anyhow::Result<AccessClaims> {
        let data = decode::<AccessClaims>(token, &self.decoding, &self.validation())?;
        if data.claims.kind != TokenKind::Access {
            anyhow::bail!("not an access token");
        }
        debug!(user_id = %data.claims.sub, "access token verified");
        Ok(data.claims)
    }

    pub fn sign_session(&self, user_id: Uuid, access_token: &str) -> anyhow::Result<String> {
        let (iat, exp) = self.timestamps(self.session_ttl);
        let claims = SessionClaims {
            sub: user_id,
            token: access_token.to_string(),
            iat,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: TokenKind::Session,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "session token signed");
        Ok(token)
    }

    pub fn verify_session(&self, token: &str) -> anyhow::Result<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation())?;
        if data.claims.kind != TokenKind::Session {
            anyhow::bail!("not a session token");
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> TokenKeys {
        TokenKeys::from_ref(&AppState::fake())
    }

    #[test]
    fn sign_and_verify_access_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_access(user_id).expect("sign access");
        let claims = keys.verify_access(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn sign_and_verify_session_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let access = keys.sign_access(user_id).expect("sign access");
        let session = keys.sign_session(user_id, &access).expect("sign session");
        let claims = keys.verify_session(&session).expect("verify session");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.token, access);
        assert_eq!(claims.kind, TokenKind::Session);
    }

    #[test]
    fn verify_fails_under_different_secret() {
        let keys = make_keys();
        let other = TokenKeys {
            encoding: EncodingKey::from_secret(b"other-secret"),
            decoding: DecodingKey::from_secret(b"other-secret"),
            ..make_keys()
        };
        let token = keys.sign_access(Uuid::new_v4()).expect("sign access");
        assert!(other.verify_access(&token).is_err());
    }

    #[test]
    fn verify_session_rejects_access_token() {
        let keys = make_keys();
        let access = keys.sign_access(Uuid::new_v4()).expect("sign access");
        // An access token has no `token` field, so it cannot decode as a
        // session payload either way.
        assert!(keys.verify_session(&access).is_err());
    }

    #[test]
    fn verify_access_rejects_session_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let access = keys.sign_access(user_id).expect("sign access");
        let session = keys.sign_session(user_id, &access).expect("sign session");
        let err = keys.verify_access(&session).unwrap_err();
        assert!(err.to_string().contains("not an access token"));
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = make_keys();
        let now = OffsetDateTime::now_utc();
        let claims = AccessClaims {
            sub: Uuid::new_v4(),
            iat: (now - TimeDuration::hours(2)).unix_timestamp() as usize,
            exp: (now - TimeDuration::hours(1)).unix_timestamp() as usize,
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
            kind: TokenKind::Access,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).expect("encode");
        assert!(keys.verify_access(&token).is_err());
    }

    #[test]
    fn verify_rejects_tampered_token() {
        let keys = make_keys();
        let token = keys.sign_access(Uuid::new_v4()).expect("sign access");
        let mut bytes = token.into_bytes();
        let mid = bytes.len() / 2;
        bytes[mid] = if bytes[mid] == b'a' { b'b' } else { b'a' };
        let tampered = String::from_utf8(bytes).expect("ascii");
        assert!(keys.verify_access(&tampered).is_err());
    }
}
