use chrono::Utc;
use diesel::prelude::*;
use log::{info, warn};
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};
use rocket::serde::json::Json;

use crate::auth::csrf::CsrfVerified;
use crate::auth::token::{self, ACCESS_TOKEN_COOKIE};
use crate::config::AppConfig;
use crate::db::schema::{books, follows, likes, links, questions};
use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult, Msg, Validate, ValidationError};
use crate::utils::now;

pub mod models;
pub mod utils;

use self::models::{UpdateUser, User, UserWithRelations};
use self::utils::validate_username;

/// Resolves the user named by the `access_token` cookie. Missing, forged or
/// expired tokens fail with 401.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let token = match request.cookies().get(ACCESS_TOKEN_COOKIE) {
            Some(cookie) if !cookie.value().is_empty() => cookie.value().to_owned(),
            _ => return Outcome::Error((Status::Unauthorized, ApiError::Unauthorized)),
        };
        let config = match request.rocket().state::<AppConfig>() {
            Some(config) => config,
            None => return Outcome::Error((Status::InternalServerError, ApiError::Internal)),
        };
        let claims = match token::verify(&token, &config.jwt_secret, Utc::now()) {
            Ok(claims) => claims,
            Err(e) => return Outcome::Error((Status::Unauthorized, e)),
        };

        let connection = match DbConnection::from_request(request).await {
            Outcome::Success(connection) => connection,
            _ => return Outcome::Error((Status::ServiceUnavailable, ApiError::Internal)),
        };
        match connection
            .run(move |conn| User::load_by_id(claims.sub, conn))
            .await
        {
            Ok(user) => Outcome::Success(user),
            Err(ApiError::Diesel(diesel::result::Error::NotFound)) => {
                Outcome::Error((Status::Unauthorized, ApiError::Unauthorized))
            }
            Err(e) => Outcome::Error((Status::InternalServerError, e)),
        }
    }
}

impl Validate for UpdateUser {
    type Error = ValidationError;
    fn validate(self) -> Result<Self, ValidationError> {
        if let Some(name) = &self.user_name {
            validate_username(name)?;
        }
        Ok(self)
    }
}

#[get("/")]
pub async fn current(user: User, connection: DbConnection) -> ApiResult<UserWithRelations> {
    connection
        .run(move |conn| Ok(Json(user.with_relations(conn)?)))
        .await
}

#[get("/<id>")]
pub async fn get(_user: User, connection: DbConnection, id: i32) -> ApiResult<UserWithRelations> {
    connection
        .run(move |conn| {
            let user = User::load_by_id(id, conn)?;
            Ok(Json(user.with_relations(conn)?))
        })
        .await
}

#[patch("/", data = "<changes>")]
pub async fn update(
    _csrf: CsrfVerified,
    user: User,
    connection: DbConnection,
    changes: Json<UpdateUser>,
) -> ApiResult<UserWithRelations> {
    let mut changes = changes.validate()?.into_inner();
    changes.updated_at = Some(now());

    connection
        .run(move |conn| {
            let user = diesel::update(&user)
                .set(&changes)
                .get_result::<User>(conn)?;
            Ok(Json(user.with_relations(conn)?))
        })
        .await
}

/// Deletes the account with everything it owns. Only the account holder may
/// do this.
#[delete("/<id>")]
pub async fn delete(
    _csrf: CsrfVerified,
    user: User,
    connection: DbConnection,
    id: i32,
) -> ApiResult<Msg> {
    if user.id != id {
        warn!("user {} may not delete user {}", user.id, id);
        return Err(ApiError::Forbidden("No permission to delete"));
    }

    connection
        .run(move |conn| conn.transaction::<_, ApiError, _>(|conn| delete_account(&user, conn)))
        .await?;

    info!("deleted account {}", id);
    Ok(Json(Msg::new("Account deleted")))
}

fn delete_account(user: &User, connection: &mut PgConnection) -> Result<(), ApiError> {
    let own_questions = questions::table
        .filter(questions::user_id.eq(user.id))
        .select(questions::id)
        .load::<i32>(connection)?;
    let own_books = books::table
        .filter(books::user_id.eq(user.id))
        .select(books::id)
        .load::<i32>(connection)?;

    diesel::delete(
        likes::table.filter(
            likes::user_id
                .eq(user.id)
                .or(likes::question_id.eq_any(own_questions.clone())),
        ),
    )
    .execute(connection)?;
    diesel::delete(
        links::table.filter(
            links::question_id
                .eq_any(own_questions)
                .or(links::book_id.eq_any(own_books)),
        ),
    )
    .execute(connection)?;
    diesel::delete(
        follows::table.filter(
            follows::follower_id
                .eq(user.id)
                .or(follows::following_id.eq(user.id)),
        ),
    )
    .execute(connection)?;
    diesel::delete(questions::table.filter(questions::user_id.eq(user.id))).execute(connection)?;
    diesel::delete(books::table.filter(books::user_id.eq(user.id))).execute(connection)?;
    diesel::delete(user).execute(connection)?;
    Ok(())
}
