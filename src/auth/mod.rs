use chrono::Utc;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::{insert_into, select};
use log::{info, warn};
use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::db::schema::users;
use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult, Msg, Validate, ValidationError};
use crate::users::models::{NewUser, User};
use crate::users::utils::{username_from_email, validate_email, validate_password};
use crate::utils::now;

pub mod csrf;
pub mod token;

use self::csrf::{CsrfVerified, CSRF_SECRET_COOKIE};
use self::token::ACCESS_TOKEN_COOKIE;

const BAD_CREDENTIALS: &str = "Email or Password incorrect";
const EMAIL_TAKEN: &str = "This email is already taken";

#[derive(Debug, Deserialize)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Validate for Credentials {
    type Error = ValidationError;
    fn validate(self) -> Result<Self, ValidationError> {
        let mut errors = ValidationError::default();
        if let Err(e) = validate_email(&self.email) {
            errors.merge(e);
        }
        if let Err(e) = validate_password(&self.password) {
            errors.merge(e);
        }
        errors.into_result(self)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Csrf {
    csrf_token: String,
}

fn access_cookie(token: String) -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .build()
}

/// The removal cookie must carry the same attributes as the one set at login,
/// or cross-site browsers ignore it and keep the session.
fn expired_access_cookie() -> Cookie<'static> {
    Cookie::build(ACCESS_TOKEN_COOKIE)
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .build()
}

/// Issues a CSRF token, creating the per-session secret on first use.
#[get("/csrf")]
pub fn csrf_token(cookies: &CookieJar<'_>) -> ApiResult<Csrf> {
    let secret = match cookies.get(CSRF_SECRET_COOKIE) {
        Some(cookie) => cookie.value().to_owned(),
        None => {
            let secret = csrf::new_secret();
            cookies.add(csrf::secret_cookie(secret.clone()));
            secret
        }
    };
    Ok(Json(Csrf {
        csrf_token: csrf::create_token(&secret)?,
    }))
}

#[post("/signup", data = "<credentials>")]
pub async fn signup(
    _csrf: CsrfVerified,
    connection: DbConnection,
    credentials: Json<Credentials>,
) -> ApiResult<Msg> {
    let credentials = credentials.validate()?.into_inner();
    connection.run(move |conn| register(credentials, conn)).await
}

fn register(credentials: Credentials, connection: &mut PgConnection) -> ApiResult<Msg> {
    let taken = select(exists(users::table.filter(users::email.eq(&credentials.email))))
        .get_result::<bool>(connection)?;
    if taken {
        return Err(ApiError::Forbidden(EMAIL_TAKEN));
    }

    let created = now();
    let new_user = NewUser {
        created_at: created,
        updated_at: created,
        user_name: username_from_email(&credentials.email),
        hashed_password: User::make_password(&credentials.password)?,
        email: credentials.email,
    };
    match insert_into(users::table).values(&new_user).execute(connection) {
        Ok(_) => {
            info!("signed up {}", new_user.email);
            Ok(Json(Msg::new("ok")))
        }
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            Err(ApiError::Forbidden(EMAIL_TAKEN))
        }
        Err(e) => Err(e.into()),
    }
}

#[post("/login", data = "<credentials>")]
pub async fn login(
    _csrf: CsrfVerified,
    connection: DbConnection,
    config: &State<AppConfig>,
    cookies: &CookieJar<'_>,
    credentials: Json<Credentials>,
) -> ApiResult<Msg> {
    let credentials = credentials.validate()?.into_inner();

    let user = connection
        .run(move |conn| {
            let user = match User::load_by_email(&credentials.email, conn)? {
                Some(user) => user,
                None => return Err(ApiError::Forbidden(BAD_CREDENTIALS)),
            };
            if !user.verify_password(&credentials.password)? {
                warn!("failed login for user {}", user.id);
                return Err(ApiError::Forbidden(BAD_CREDENTIALS));
            }
            Ok(user)
        })
        .await?;

    let token = token::issue(
        user.id,
        &user.email,
        &config.jwt_secret,
        config.token_ttl,
        Utc::now(),
    )?;
    cookies.add(access_cookie(token));
    info!("user {} logged in", user.id);
    Ok(Json(Msg::new("ok")))
}

#[post("/logout")]
pub fn logout(_csrf: CsrfVerified, cookies: &CookieJar<'_>) -> Json<Msg> {
    cookies.remove(expired_access_cookie());
    Json(Msg::new("ok"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.to_owned(),
            password: password.to_owned(),
        }
    }

    #[test]
    fn credentials_collect_every_error() {
        let error = credentials("nope", "short").validate().unwrap_err();
        assert_eq!(error.len(), 2);
        assert!(!error.messages("email").is_empty());
        assert!(!error.messages("password").is_empty());
    }

    #[test]
    fn valid_credentials_pass() {
        assert!(credentials("reader@example.com", "long enough").validate().is_ok());
    }

    #[test]
    fn access_cookie_is_http_only_and_site_wide() {
        let cookie = access_cookie("jwt".to_owned());
        assert_eq!(cookie.name(), ACCESS_TOKEN_COOKIE);
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
    }

    #[test]
    fn expired_access_cookie_matches_the_login_cookie() {
        let login = access_cookie("jwt".to_owned());
        let removal = expired_access_cookie();
        assert_eq!(removal.name(), login.name());
        assert_eq!(removal.path(), login.path());
        assert_eq!(removal.same_site(), Some(SameSite::None));
        assert_eq!(removal.secure(), Some(true));
        assert_eq!(removal.http_only(), Some(true));
    }
}
