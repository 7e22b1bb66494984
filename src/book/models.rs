use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::{delete, insert_into};
use serde::Serialize;

use crate::db::schema::{books, links};
use crate::question::models::Link;
use crate::utils::serialize_date;

#[derive(Debug, Queryable, Identifiable, Serialize, PartialEq)]
#[diesel(table_name = books)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i32,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: NaiveDateTime,
    pub user_id: i32,
    pub title: String,
    pub google_books_id: String,
    pub isbn: Option<String>,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<String>,
    pub img_link: Option<String>,
    pub preview_link: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookWithRelations {
    #[serde(flatten)]
    pub book: Book,
    pub links: Vec<Link>,
}

#[derive(Insertable)]
#[diesel(table_name = books)]
pub struct NewBook {
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub user_id: i32,
    pub title: String,
    pub google_books_id: String,
    pub isbn: Option<String>,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<String>,
    pub img_link: Option<String>,
    pub preview_link: Option<String>,
}

impl Book {
    /// A user's shelf, newest first.
    pub fn shelf(user_id: i32, connection: &mut PgConnection) -> QueryResult<Vec<Book>> {
        books::table
            .filter(books::user_id.eq(user_id))
            .order(books::created_at.desc())
            .load::<Book>(connection)
    }

    pub fn find(id: i32, connection: &mut PgConnection) -> QueryResult<Option<Book>> {
        books::table.find(id).get_result::<Book>(connection).optional()
    }

    pub fn owned(id: i32, user_id: i32, connection: &mut PgConnection) -> QueryResult<Option<Book>> {
        books::table
            .filter(books::id.eq(id))
            .filter(books::user_id.eq(user_id))
            .get_result::<Book>(connection)
            .optional()
    }

    pub fn on_shelf(
        google_books_id: &str,
        user_id: i32,
        connection: &mut PgConnection,
    ) -> QueryResult<Option<Book>> {
        books::table
            .filter(books::google_books_id.eq(google_books_id))
            .filter(books::user_id.eq(user_id))
            .first::<Book>(connection)
            .optional()
    }

    pub fn create(new_book: &NewBook, connection: &mut PgConnection) -> QueryResult<Book> {
        insert_into(books::table)
            .values(new_book)
            .get_result::<Book>(connection)
    }

    pub fn with_relations(
        books: Vec<Book>,
        connection: &mut PgConnection,
    ) -> QueryResult<Vec<BookWithRelations>> {
        let links = Link::belonging_to(&books)
            .load::<Link>(connection)?
            .grouped_by(&books);
        Ok(books
            .into_iter()
            .zip(links)
            .map(|(book, links)| BookWithRelations { book, links })
            .collect())
    }

    pub fn into_relations(self, connection: &mut PgConnection) -> QueryResult<BookWithRelations> {
        let mut loaded = Book::with_relations(vec![self], connection)?;
        loaded.pop().ok_or(diesel::result::Error::NotFound)
    }

    /// Removes the book and every link pointing at it.
    pub fn delete_with_links(id: i32, connection: &mut PgConnection) -> QueryResult<()> {
        connection.transaction(|connection| {
            delete(links::table.filter(links::book_id.eq(id))).execute(connection)?;
            delete(books::table.find(id)).execute(connection)?;
            Ok(())
        })
    }
}
