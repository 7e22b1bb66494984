use chrono::NaiveDateTime;
use diesel::prelude::*;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Params, Pbkdf2};
use serde::{Deserialize, Serialize};

use crate::book::models::Book;
use crate::db::schema::{books, follows, likes, questions, users};
use crate::follow::Follow;
use crate::question::models::{Like, Question};
use crate::types::ApiError;
use crate::utils::serialize_date;

const PASSWORD_ROUNDS: u32 = 600_000;

#[derive(Debug, Queryable, Identifiable, Serialize)]
#[diesel(table_name = users)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: NaiveDateTime,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub user_name: String,
    pub profile_picture: Option<String>,
    pub cover_picture: Option<String>,
}

impl User {
    pub fn make_password(password: &str) -> Result<String, ApiError> {
        hash_password(password, PASSWORD_ROUNDS)
    }

    pub fn verify_password(&self, password_to_verify: &str) -> Result<bool, ApiError> {
        let hash = PasswordHash::new(&self.hashed_password).map_err(|_| ApiError::Internal)?;
        Ok(Pbkdf2
            .verify_password(password_to_verify.as_bytes(), &hash)
            .is_ok())
    }

    pub fn load_by_id(user_id: i32, connection: &mut PgConnection) -> Result<User, ApiError> {
        users::table
            .find(user_id)
            .get_result::<User>(connection)
            .map_err(|e| e.into())
    }

    pub fn load_by_email(email: &str, connection: &mut PgConnection) -> Result<Option<User>, ApiError> {
        users::table
            .filter(users::email.eq(email))
            .get_result::<User>(connection)
            .optional()
            .map_err(|e| e.into())
    }

    /// Gathers everything a profile page shows in one response.
    pub fn with_relations(self, connection: &mut PgConnection) -> Result<UserWithRelations, ApiError> {
        let questions = questions::table
            .filter(questions::user_id.eq(self.id))
            .order(questions::created_at.desc())
            .load::<Question>(connection)?;
        let like_questions = likes::table
            .filter(likes::user_id.eq(self.id))
            .load::<Like>(connection)?;
        let books = books::table
            .filter(books::user_id.eq(self.id))
            .order(books::created_at.desc())
            .load::<Book>(connection)?;
        let followed_by = follows::table
            .filter(follows::following_id.eq(self.id))
            .order((follows::created_at, follows::follower_id))
            .load::<Follow>(connection)?;
        let following = follows::table
            .filter(follows::follower_id.eq(self.id))
            .order((follows::created_at, follows::following_id))
            .load::<Follow>(connection)?;

        Ok(UserWithRelations {
            user: self,
            questions,
            like_questions,
            books,
            followed_by,
            following,
        })
    }
}

/// A salted PBKDF2-SHA256 hash in PHC form. The round count is stored in the
/// string, so hashes made with other counts still verify.
fn hash_password(password: &str, rounds: u32) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let params = Params {
        rounds,
        output_length: 32,
    };
    Pbkdf2
        .hash_password_customized(password.as_bytes(), None, None, params, &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| ApiError::Internal)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithRelations {
    #[serde(flatten)]
    pub user: User,
    pub questions: Vec<Question>,
    pub like_questions: Vec<Like>,
    pub books: Vec<Book>,
    pub followed_by: Vec<Follow>,
    pub following: Vec<Follow>,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub email: String,
    pub hashed_password: String,
    pub user_name: String,
}

#[derive(Debug, Deserialize, AsChangeset)]
#[serde(rename_all = "camelCase")]
#[diesel(table_name = users)]
pub struct UpdateUser {
    pub user_name: Option<String>,
    pub profile_picture: Option<String>,
    pub cover_picture: Option<String>,
    #[serde(skip)]
    pub updated_at: Option<NaiveDateTime>,
}
