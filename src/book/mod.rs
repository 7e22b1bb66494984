use log::warn;
use rocket::http::Status;
use rocket::serde::json::Json;
use serde::Deserialize;

use crate::auth::csrf::CsrfVerified;
use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult, Validate, ValidationError};
use crate::users::models::User;
use crate::utils::now;

pub mod models;

use self::models::{Book, BookWithRelations, NewBook};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    pub title: String,
    pub google_books_id: String,
    pub isbn: Option<String>,
    pub authors: Option<Vec<String>>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<String>,
    pub img_link: Option<String>,
    pub preview_link: Option<String>,
}

impl Validate for CreateBook {
    type Error = ValidationError;
    fn validate(self) -> Result<Self, ValidationError> {
        let mut error = ValidationError::default();
        if self.title.trim().is_empty() {
            error.add_error("title", "empty title");
        }
        if self.google_books_id.trim().is_empty() {
            error.add_error("googleBooksId", "empty googleBooksId");
        }
        error.into_result(self)
    }
}

impl CreateBook {
    fn into_new_book(self, user_id: i32) -> NewBook {
        let created = now();
        NewBook {
            created_at: created,
            updated_at: created,
            user_id,
            title: self.title,
            google_books_id: self.google_books_id,
            isbn: self.isbn,
            authors: self.authors.unwrap_or_default(),
            publisher: self.publisher,
            published_date: self.published_date,
            page_count: self.page_count,
            img_link: self.img_link,
            preview_link: self.preview_link,
        }
    }
}

#[get("/all/shelf")]
pub async fn own_shelf(user: User, connection: DbConnection) -> ApiResult<Vec<BookWithRelations>> {
    connection
        .run(move |conn| {
            let books = Book::shelf(user.id, conn)?;
            Ok(Json(Book::with_relations(books, conn)?))
        })
        .await
}

#[get("/all/shelf/<id>")]
pub async fn shelf(_user: User, connection: DbConnection, id: i32) -> ApiResult<Vec<BookWithRelations>> {
    connection
        .run(move |conn| {
            let books = Book::shelf(id, conn)?;
            Ok(Json(Book::with_relations(books, conn)?))
        })
        .await
}

#[get("/<id>")]
pub async fn get(user: User, connection: DbConnection, id: i32) -> ApiResult<BookWithRelations> {
    connection
        .run(move |conn| {
            let book = Book::owned(id, user.id, conn)?.ok_or(diesel::result::Error::NotFound)?;
            Ok(Json(book.into_relations(conn)?))
        })
        .await
}

/// Puts a book on the shelf. A book already shelved under the same catalog id
/// is left alone and `null` is returned.
#[post("/", data = "<book>")]
pub async fn create(
    _csrf: CsrfVerified,
    user: User,
    connection: DbConnection,
    book: Json<CreateBook>,
) -> ApiResult<Option<BookWithRelations>> {
    let draft = book.validate()?.into_inner();
    connection
        .run(move |conn| {
            if Book::on_shelf(&draft.google_books_id, user.id, conn)?.is_some() {
                return Ok(Json(None));
            }

            let book = Book::create(&draft.into_new_book(user.id), conn)?;
            Ok(Json(Some(book.into_relations(conn)?)))
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
        .run(move |conn| match Book::find(id, conn)? {
            Some(book) if book.user_id == user.id => {
                Book::delete_with_links(book.id, conn)?;
                Ok(Status::NoContent)
            }
            _ => {
                warn!("user {} may not delete book {}", user.id, id);
                Err(ApiError::Forbidden("No permission to delete"))
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_book(title: &str, google_books_id: &str) -> CreateBook {
        serde_json::from_value(serde_json::json!({
            "title": title,
            "googleBooksId": google_books_id,
        }))
        .unwrap()
    }

    #[test]
    fn title_and_catalog_id_are_required() {
        let error = create_book(" ", "").validate().unwrap_err();
        assert_eq!(error.messages("title"), ["empty title"]);
        assert_eq!(error.messages("googleBooksId"), ["empty googleBooksId"]);
    }

    #[test]
    fn optional_metadata_defaults() {
        let book = create_book("Moby-Dick", "abc123").validate().unwrap();
        let new_book = book.into_new_book(9);
        assert_eq!(new_book.user_id, 9);
        assert!(new_book.authors.is_empty());
        assert_eq!(new_book.isbn, None);
        assert_eq!(new_book.created_at, new_book.updated_at);
    }

    #[test]
    fn camel_case_fields_are_accepted() {
        let book: CreateBook = serde_json::from_value(serde_json::json!({
            "title": "Moby-Dick",
            "googleBooksId": "abc123",
            "authors": ["Herman Melville"],
            "publishedDate": "1851",
            "pageCount": "635",
            "imgLink": "http://img",
        }))
        .unwrap();
        assert_eq!(book.authors, Some(vec!["Herman Melville".to_owned()]));
        assert_eq!(book.published_date.as_deref(), Some("1851"));
        assert_eq!(book.page_count.as_deref(), Some("635"));
    }
}
