//! Double-submit CSRF protection.
//!
//! `GET /auth/csrf` stores a random secret in the httpOnly `_csrf` cookie and
//! hands out tokens of the form `salt-hex(HMAC-SHA256(secret, salt))`. Every
//! state-changing route takes a [`CsrfVerified`] guard, which recomputes the
//! MAC from the cookie and the `csrf-token` header.

use hmac::{Hmac, Mac};
use log::warn;
use rand::Rng;
use rocket::http::{Cookie, SameSite, Status};
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};
use sha2::Sha256;

use crate::types::ApiError;

pub const CSRF_SECRET_COOKIE: &str = "_csrf";
pub const CSRF_HEADER: &str = "csrf-token";

const SECRET_BYTES: usize = 18;
const SALT_BYTES: usize = 8;

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill(bytes.as_mut_slice());
    hex::encode(bytes)
}

fn mac(secret: &str, salt: &str) -> Option<Hmac<Sha256>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(salt.as_bytes());
    Some(mac)
}

pub fn new_secret() -> String {
    random_hex(SECRET_BYTES)
}

pub fn secret_cookie(secret: String) -> Cookie<'static> {
    Cookie::build((CSRF_SECRET_COOKIE, secret))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .build()
}

pub fn create_token(secret: &str) -> Result<String, ApiError> {
    let salt = random_hex(SALT_BYTES);
    let mac = mac(secret, &salt).ok_or(ApiError::Internal)?;
    Ok(format!("{}-{}", salt, hex::encode(mac.finalize().into_bytes())))
}

pub fn verify_token(secret: &str, token: &str) -> bool {
    let (salt, signature) = match token.split_once('-') {
        Some(parts) => parts,
        None => return false,
    };
    let signature = match hex::decode(signature) {
        Ok(signature) => signature,
        Err(_) => return false,
    };
    match mac(secret, salt) {
        Some(mac) => mac.verify_slice(&signature).is_ok(),
        None => false,
    }
}

/// Proof that the request carried a valid CSRF token.
pub struct CsrfVerified;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CsrfVerified {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, ApiError> {
        let secret = request.cookies().get(CSRF_SECRET_COOKIE).map(|c| c.value());
        let token = request.headers().get_one(CSRF_HEADER);
        match (secret, token) {
            (Some(secret), Some(token)) if verify_token(secret, token) => {
                Outcome::Success(CsrfVerified)
            }
            _ => {
                warn!("rejected {} {}: invalid csrf token", request.method(), request.uri());
                Outcome::Error((Status::Forbidden, ApiError::Forbidden("invalid csrf token")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_matches_its_secret() {
        let secret = new_secret();
        let token = create_token(&secret).unwrap();
        assert!(verify_token(&secret, &token));
    }

    #[test]
    fn tokens_are_salted() {
        let secret = new_secret();
        assert_ne!(create_token(&secret).unwrap(), create_token(&secret).unwrap());
    }

    #[test]
    fn token_does_not_match_other_secret() {
        let token = create_token(&new_secret()).unwrap();
        assert!(!verify_token(&new_secret(), &token));
    }

    #[test]
    fn tampered_tokens_fail() {
        let secret = new_secret();
        let token = create_token(&secret).unwrap();
        let (salt, signature) = token.split_once('-').unwrap();

        assert!(!verify_token(&secret, &format!("{}0-{}", salt, signature)));
        assert!(!verify_token(&secret, salt));
        assert!(!verify_token(&secret, &format!("{}-zz", salt)));
        assert!(!verify_token(&secret, ""));
    }

    #[test]
    fn secret_cookie_is_http_only() {
        let cookie = secret_cookie("abc".to_owned());
        assert_eq!(cookie.name(), CSRF_SECRET_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
    }
}
