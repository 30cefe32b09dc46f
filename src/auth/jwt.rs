//! HS256 bearer tokens.
//!
//! Tokens are self-contained: `{username, role, iat, exp}` signed with the
//! shared secret. Nothing is stored server-side, so a token stays valid until
//! it expires.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::{CredentialStore, Role};
use crate::errors::AuthError;

/// Lifetime of an issued token.
pub const TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::seconds(TOKEN_TTL_SECS),
        }
    }

    /// Checks the password against `credentials` and signs a token for the caller.
    pub fn issue(
        &self,
        credentials: &dyn CredentialStore,
        username: &str,
        password: &str,
    ) -> Result<String, AuthError> {
        let role = credentials.authenticate(username, password)?;
        self.sign(username, role)
    }

    /// Signs a token for an already-authenticated identity.
    pub fn sign(&self, username: &str, role: Role) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            username: username.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AuthError::Signing)
    }

    /// Verifies signature and expiry. The signature is checked first, so a
    /// forged token is `InvalidToken` even when its `exp` is in the past.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }

    /// `verify`, then require `role`.
    pub fn authorize(&self, token: &str, role: Role) -> Result<Claims, AuthError> {
        let claims = self.verify(token)?;
        if claims.role != role {
            return Err(AuthError::Forbidden);
        }
        Ok(claims)
    }
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(AuthError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticCredentials;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret-0123456789abcdef0123456789";

    fn signed_with(secret: &str, claims: &Claims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(role: Role, exp_offset: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            username: "someone".into(),
            role,
            iat: now,
            exp: now + exp_offset,
        }
    }

    #[test]
    fn test_issue_then_verify_roundtrip() {
        let svc = TokenService::new(SECRET);
        let creds = StaticCredentials::demo();

        let token = svc.issue(&creds, "admin_user", "admin123").unwrap();
        let claims = svc.verify(&token).unwrap();
        assert_eq!(claims.username, "admin_user");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_SECS);
    }

    #[test]
    fn test_issue_rejects_bad_password() {
        let svc = TokenService::new(SECRET);
        let creds = StaticCredentials::demo();
        assert!(matches!(
            svc.issue(&creds, "admin_user", "nope"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_expired_token() {
        let svc = TokenService::new(SECRET);
        let token = signed_with(SECRET, &claims(Role::User, -10));
        assert!(matches!(svc.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_foreign_secret_is_invalid() {
        let svc = TokenService::new(SECRET);
        let token = signed_with("another-secret-0123456789abcdef0123", &claims(Role::Admin, 600));
        assert!(matches!(svc.verify(&token), Err(AuthError::InvalidToken)));

        // signature failure wins over expiry
        let stale = signed_with("another-secret-0123456789abcdef0123", &claims(Role::Admin, -600));
        assert!(matches!(svc.verify(&stale), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_tampered_payload_is_invalid() {
        let svc = TokenService::new(SECRET);
        let user_token = svc.sign("normal_user", Role::User).unwrap();
        let admin_token = svc.sign("normal_user", Role::Admin).unwrap();

        // splice the admin payload onto the user signature
        let user_parts: Vec<&str> = user_token.split('.').collect();
        let admin_parts: Vec<&str> = admin_token.split('.').collect();
        let forged = format!("{}.{}.{}", user_parts[0], admin_parts[1], user_parts[2]);
        assert!(matches!(svc.verify(&forged), Err(AuthError::InvalidToken)));
        assert!(matches!(svc.verify("not-a-jwt"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_authorize_by_role() {
        let svc = TokenService::new(SECRET);
        let user = svc.sign("normal_user", Role::User).unwrap();
        let admin = svc.sign("admin_user", Role::Admin).unwrap();

        assert!(matches!(svc.authorize(&user, Role::Admin), Err(AuthError::Forbidden)));
        assert_eq!(svc.authorize(&admin, Role::Admin).unwrap().username, "admin_user");
    }

    #[test]
    fn test_bearer_header() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer(&headers), Err(AuthError::Unauthorized)));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert!(matches!(bearer(&headers), Err(AuthError::Unauthorized)));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer(&headers).unwrap(), "abc.def.ghi");
    }
}
