use diesel::insert_into;
use diesel::prelude::*;
use log::warn;
use rocket::http::Status;
use rocket::serde::json::Json;
use serde::Deserialize;

use crate::auth::csrf::CsrfVerified;
use crate::book::models::Book;
use crate::db::schema::questions;
use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult, Msg, Validate, ValidationError};
use crate::users::models::User;
use crate::utils::now;

pub mod models;

use self::models::{Like, Link, NewQuestion, Question, QuestionChanges, QuestionWithRelations};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestion {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_private: bool,
}

impl Validate for CreateQuestion {
    type Error = ValidationError;
    fn validate(self) -> Result<Self, ValidationError> {
        let mut error = ValidationError::default();
        if self.title.trim().is_empty() {
            error.add_error("title", "empty title");
        }
        error.into_result(self)
    }
}

/// Title and privacy are always replaced; a missing description keeps the
/// stored one.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuestion {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_private: bool,
}

impl Validate for UpdateQuestion {
    type Error = ValidationError;
    fn validate(self) -> Result<Self, ValidationError> {
        let mut error = ValidationError::default();
        if self.title.trim().is_empty() {
            error.add_error("title", "empty title");
        }
        error.into_result(self)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkBook {
    pub book_id: i32,
}

async fn relations<F>(connection: DbConnection, load: F) -> ApiResult<Vec<QuestionWithRelations>>
where
    F: FnOnce(&mut PgConnection) -> QueryResult<Vec<Question>> + Send + 'static,
{
    connection
        .run(move |conn| {
            let questions = load(conn)?;
            Ok(Json(Question::with_relations(questions, conn)?))
        })
        .await
}

#[get("/all/profile")]
pub async fn own_profile(user: User, connection: DbConnection) -> ApiResult<Vec<QuestionWithRelations>> {
    relations(connection, move |conn| Question::for_user(user.id, conn)).await
}

#[get("/all/profile/<id>")]
pub async fn profile(
    _user: User,
    connection: DbConnection,
    id: i32,
) -> ApiResult<Vec<QuestionWithRelations>> {
    relations(connection, move |conn| Question::for_user(id, conn)).await
}

#[get("/all/timeline")]
pub async fn timeline(user: User, connection: DbConnection) -> ApiResult<Vec<QuestionWithRelations>> {
    relations(connection, move |conn| Question::timeline(user.id, conn)).await
}

#[get("/all/allusers")]
pub async fn all_users(_user: User, connection: DbConnection) -> ApiResult<Vec<QuestionWithRelations>> {
    relations(connection, Question::public).await
}

#[get("/<id>")]
pub async fn get(user: User, connection: DbConnection, id: i32) -> ApiResult<QuestionWithRelations> {
    connection
        .run(move |conn| {
            let question =
                Question::owned(id, user.id, conn)?.ok_or(diesel::result::Error::NotFound)?;
            Ok(Json(question.into_relations(conn)?))
        })
        .await
}

#[post("/", data = "<question>")]
pub async fn create(
    _csrf: CsrfVerified,
    user: User,
    connection: DbConnection,
    question: Json<CreateQuestion>,
) -> ApiResult<QuestionWithRelations> {
    let draft = question.validate()?.into_inner();
    connection
        .run(move |conn| {
            let created = now();
            let question = insert_into(questions::table)
                .values(&NewQuestion {
                    created_at: created,
                    updated_at: created,
                    user_id: user.id,
                    title: draft.title,
                    description: draft.description,
                    is_private: draft.is_private,
                })
                .get_result::<Question>(conn)?;
            Ok(Json(question.into_relations(conn)?))
        })
        .await
}

#[patch("/<id>", data = "<changes>")]
pub async fn update(
    _csrf: CsrfVerified,
    user: User,
    connection: DbConnection,
    id: i32,
    changes: Json<UpdateQuestion>,
) -> ApiResult<QuestionWithRelations> {
    let edit = changes.validate()?.into_inner();
    connection
        .run(move |conn| {
            match Question::find(id, conn)? {
                Some(question) if question.user_id == user.id => {}
                _ => {
                    warn!("user {} may not update question {}", user.id, id);
                    return Err(ApiError::Forbidden("No permission to update"));
                }
            }

            let question = diesel::update(questions::table.find(id))
                .set(&QuestionChanges {
                    updated_at: now(),
                    title: edit.title,
                    description: edit.description,
                    is_private: edit.is_private,
                })
                .get_result::<Question>(conn)?;
            Ok(Json(question.into_relations(conn)?))
        })
        .await
}

#[patch("/<id>/like")]
pub async fn like(
    _csrf: CsrfVerified,
    user: User,
    connection: DbConnection,
    id: i32,
) -> ApiResult<Msg> {
    connection
        .run(move |conn| {
            let question = Question::find(id, conn)?.ok_or(diesel::result::Error::NotFound)?;
            if Like::toggle(user.id, question.id, conn)? {
                Ok(Json(Msg::new("Liked")))
            } else {
                Ok(Json(Msg::new("Like removed")))
            }
        })
        .await
}

const NOT_FOUND: &str = "Question or Book not found";

/// Both sides of a link must belong to the current user.
fn owned_pair(
    user: &User,
    question_id: i32,
    book_id: i32,
    connection: &mut PgConnection,
) -> QueryResult<Option<(Question, Book)>> {
    let question = Question::owned(question_id, user.id, connection)?;
    let book = Book::owned(book_id, user.id, connection)?;
    Ok(question.zip(book))
}

#[patch("/<id>/link", data = "<target>")]
pub async fn link(
    _csrf: CsrfVerified,
    user: User,
    connection: DbConnection,
    id: i32,
    target: Json<LinkBook>,
) -> ApiResult<Msg> {
    let book_id = target.book_id;
    connection
        .run(move |conn| {
            let (question, book) = match owned_pair(&user, id, book_id, conn)? {
                Some(pair) => pair,
                None => return Ok(Json(Msg::new(NOT_FOUND))),
            };
            if Link::exists(question.id, book.id, conn)? {
                return Ok(Json(Msg::new("Already linked")));
            }
            Link::create(question.id, book.id, conn)?;
            Ok(Json(Msg::new("Linked")))
        })
        .await
}

#[patch("/<id>/unlink", data = "<target>")]
pub async fn unlink(
    _csrf: CsrfVerified,
    user: User,
    connection: DbConnection,
    id: i32,
    target: Json<LinkBook>,
) -> ApiResult<Msg> {
    let book_id = target.book_id;
    connection
        .run(move |conn| {
            let (question, book) = match owned_pair(&user, id, book_id, conn)? {
                Some(pair) => pair,
                None => return Ok(Json(Msg::new(NOT_FOUND))),
            };
            if !Link::exists(question.id, book.id, conn)? {
                return Ok(Json(Msg::new("Not linked, nothing to unlink")));
            }
            Link::remove(question.id, book.id, conn)?;
            Ok(Json(Msg::new("Unlinked")))
        })
        .await
}

#[delete("/<id>")]
pub async fn delete(
    _csrf: CsrfVerified,
    user: User,
    connection: DbConnection,
    id: i32,
) -> Result<Status, ApiError> {
    connection
        .run(move |conn| match Question::find(id, conn)? {
            Some(question) if question.user_id == user.id => {
                Question::delete_with_relations(question.id, conn)?;
                Ok(Status::NoContent)
            }
            _ => {
                warn!("user {} may not delete question {}", user.id, id);
                Err(ApiError::Forbidden("No permission to delete"))
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_requires_a_title() {
        let create: CreateQuestion =
            serde_json::from_value(json!({ "title": "  ", "isPrivate": false })).unwrap();
        let error = create.validate().unwrap_err();
        assert_eq!(error.messages("title"), ["empty title"]);
    }

    #[test]
    fn create_accepts_optional_description() {
        let create: CreateQuestion = serde_json::from_value(json!({
            "title": "Is Ahab mad?",
            "description": "chapter 36",
            "isPrivate": true,
        }))
        .unwrap();
        let create = create.validate().unwrap();
        assert!(create.is_private);
        assert_eq!(create.description.as_deref(), Some("chapter 36"));
    }

    #[test]
    fn update_requires_privacy_flag() {
        assert!(serde_json::from_value::<UpdateQuestion>(json!({ "title": "x" })).is_err());
    }

    #[test]
    fn link_body_uses_camel_case() {
        let link: LinkBook = serde_json::from_value(json!({ "bookId": 12 })).unwrap();
        assert_eq!(link.book_id, 12);
    }
}
