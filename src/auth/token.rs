//! HS256 access tokens carried in the `access_token` cookie.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::types::ApiError;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: i32,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, ApiError> {
    Hmac::new_from_slice(secret.as_bytes()).map_err(|_| ApiError::Internal)
}

pub fn issue(
    user_id: i32,
    email: &str,
    secret: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        email: email.to_owned(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    claims
        .sign_with_key(&signing_key(secret)?)
        .map_err(|_| ApiError::Internal)
}

/// Checks the signature and expiry of `token`.
pub fn verify(token: &str, secret: &str, now: DateTime<Utc>) -> Result<Claims, ApiError> {
    let claims: Claims = token
        .verify_with_key(&signing_key(secret)?)
        .map_err(|_| ApiError::Unauthorized)?;
    if claims.exp <= now.timestamp() {
        return Err(ApiError::Unauthorized);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "shelf-secret";

    #[test]
    fn issued_token_verifies() {
        let now = Utc::now();
        let token = issue(7, "reader@example.com", SECRET, Duration::minutes(30), now).unwrap();
        let claims = verify(&token, SECRET, now).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.email, "reader@example.com");
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn expired_token_is_rejected() {
        let issued = Utc::now() - Duration::minutes(31);
        let token = issue(7, "reader@example.com", SECRET, Duration::minutes(30), issued).unwrap();
        assert!(matches!(
            verify(&token, SECRET, Utc::now()),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let now = Utc::now();
        let token = issue(7, "reader@example.com", "other", Duration::minutes(30), now).unwrap();
        assert!(matches!(verify(&token, SECRET, now), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            verify("not.a.token", SECRET, Utc::now()),
            Err(ApiError::Unauthorized)
        ));
    }
}
