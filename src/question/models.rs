use chrono::NaiveDateTime;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::{delete, insert_into, select};
use serde::Serialize;

use crate::book::models::Book;
use crate::db::schema::{follows, likes, links, questions};
use crate::utils::{now, serialize_date};

#[derive(Debug, Queryable, Identifiable, Serialize, PartialEq)]
#[diesel(table_name = questions)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i32,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: NaiveDateTime,
    pub user_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub is_private: bool,
}

#[derive(Debug, Queryable, Identifiable, Associations, Serialize, PartialEq)]
#[diesel(table_name = likes, primary_key(user_id, question_id), belongs_to(Question))]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub user_id: i32,
    pub question_id: i32,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Queryable, Identifiable, Associations, Serialize, PartialEq)]
#[diesel(table_name = links, primary_key(question_id, book_id), belongs_to(Question), belongs_to(Book))]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub question_id: i32,
    pub book_id: i32,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
pub struct QuestionWithRelations {
    #[serde(flatten)]
    pub question: Question,
    pub likes: Vec<Like>,
    pub books: Vec<Link>,
}

#[derive(Insertable)]
#[diesel(table_name = questions)]
pub struct NewQuestion {
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub user_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub is_private: bool,
}

#[derive(AsChangeset)]
#[diesel(table_name = questions)]
pub struct QuestionChanges {
    pub updated_at: NaiveDateTime,
    pub title: String,
    pub description: Option<String>,
    pub is_private: bool,
}

/// Own questions first, then each followed user's questions in follow order.
/// Every source list keeps its own newest-first order; nothing is re-sorted.
pub fn concat_timeline<T>(own: Vec<T>, followed: Vec<Vec<T>>) -> Vec<T> {
    let mut timeline = own;
    for questions in followed {
        timeline.extend(questions);
    }
    timeline
}

impl Question {
    pub fn for_user(user_id: i32, connection: &mut PgConnection) -> QueryResult<Vec<Question>> {
        questions::table
            .filter(questions::user_id.eq(user_id))
            .order(questions::created_at.desc())
            .load::<Question>(connection)
    }

    pub fn public(connection: &mut PgConnection) -> QueryResult<Vec<Question>> {
        questions::table
            .filter(questions::is_private.eq(false))
            .order(questions::created_at.desc())
            .load::<Question>(connection)
    }

    pub fn find(id: i32, connection: &mut PgConnection) -> QueryResult<Option<Question>> {
        questions::table
            .find(id)
            .get_result::<Question>(connection)
            .optional()
    }

    /// The question `id`, but only when `user_id` wrote it.
    pub fn owned(id: i32, user_id: i32, connection: &mut PgConnection) -> QueryResult<Option<Question>> {
        questions::table
            .filter(questions::id.eq(id))
            .filter(questions::user_id.eq(user_id))
            .get_result::<Question>(connection)
            .optional()
    }

    /// Followed users are visited in the order they were followed.
    pub fn timeline(user_id: i32, connection: &mut PgConnection) -> QueryResult<Vec<Question>> {
        let own = Question::for_user(user_id, connection)?;
        let followed_ids = follows::table
            .filter(follows::follower_id.eq(user_id))
            .order((follows::created_at, follows::following_id))
            .select(follows::following_id)
            .load::<i32>(connection)?;

        let mut followed = Vec::with_capacity(followed_ids.len());
        for followed_id in followed_ids {
            followed.push(Question::for_user(followed_id, connection)?);
        }
        Ok(concat_timeline(own, followed))
    }

    pub fn with_relations(
        questions: Vec<Question>,
        connection: &mut PgConnection,
    ) -> QueryResult<Vec<QuestionWithRelations>> {
        let likes = Like::belonging_to(&questions)
            .load::<Like>(connection)?
            .grouped_by(&questions);
        let links = Link::belonging_to(&questions)
            .load::<Link>(connection)?
            .grouped_by(&questions);

        Ok(questions
            .into_iter()
            .zip(likes)
            .zip(links)
            .map(|((question, likes), books)| QuestionWithRelations {
                question,
                likes,
                books,
            })
            .collect())
    }

    pub fn into_relations(self, connection: &mut PgConnection) -> QueryResult<QuestionWithRelations> {
        let mut loaded = Question::with_relations(vec![self], connection)?;
        loaded.pop().ok_or(diesel::result::Error::NotFound)
    }

    /// Removes the question together with its likes and links.
    pub fn delete_with_relations(id: i32, connection: &mut PgConnection) -> QueryResult<()> {
        connection.transaction(|connection| {
            delete(likes::table.filter(likes::question_id.eq(id))).execute(connection)?;
            delete(links::table.filter(links::question_id.eq(id))).execute(connection)?;
            delete(questions::table.find(id)).execute(connection)?;
            Ok(())
        })
    }
}

impl Like {
    /// Likes `question_id` if `user_id` has not yet, otherwise takes the like
    /// back. Returns whether the question is liked afterwards.
    pub fn toggle(user_id: i32, question_id: i32, connection: &mut PgConnection) -> QueryResult<bool> {
        connection.transaction(|connection| {
            let removed = delete(
                likes::table
                    .filter(likes::user_id.eq(user_id))
                    .filter(likes::question_id.eq(question_id)),
            )
            .execute(connection)?;
            if removed > 0 {
                return Ok(false);
            }

            insert_into(likes::table)
                .values((
                    likes::user_id.eq(user_id),
                    likes::question_id.eq(question_id),
                    likes::created_at.eq(now()),
                ))
                .on_conflict((likes::user_id, likes::question_id))
                .do_nothing()
                .execute(connection)?;
            Ok(true)
        })
    }
}

impl Link {
    pub fn exists(question_id: i32, book_id: i32, connection: &mut PgConnection) -> QueryResult<bool> {
        select(exists(
            links::table
                .filter(links::question_id.eq(question_id))
                .filter(links::book_id.eq(book_id)),
        ))
        .get_result::<bool>(connection)
    }

    pub fn create(question_id: i32, book_id: i32, connection: &mut PgConnection) -> QueryResult<usize> {
        insert_into(links::table)
            .values((
                links::question_id.eq(question_id),
                links::book_id.eq(book_id),
                links::created_at.eq(now()),
            ))
            .on_conflict((links::question_id, links::book_id))
            .do_nothing()
            .execute(connection)
    }

    pub fn remove(question_id: i32, book_id: i32, connection: &mut PgConnection) -> QueryResult<usize> {
        delete(
            links::table
                .filter(links::question_id.eq(question_id))
                .filter(links::book_id.eq(book_id)),
        )
        .execute(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::debug_query;
    use diesel::pg::Pg;

    #[test]
    fn timeline_keeps_source_order() {
        let own = vec!["mine-new", "mine-old"];
        let followed = vec![vec!["alice-new", "alice-old"], vec![], vec!["bob"]];
        assert_eq!(
            concat_timeline(own, followed),
            vec!["mine-new", "mine-old", "alice-new", "alice-old", "bob"]
        );
    }

    #[test]
    fn timeline_without_follows_is_own_list() {
        assert_eq!(concat_timeline(vec![3, 2, 1], Vec::new()), vec![3, 2, 1]);
        assert!(concat_timeline::<i32>(Vec::new(), Vec::new()).is_empty());
    }

    fn question(id: i32) -> Question {
        let at = now();
        Question {
            id,
            created_at: at,
            updated_at: at,
            user_id: 2,
            title: "Why does Ishmael go to sea?".to_owned(),
            description: None,
            is_private: false,
        }
    }

    #[test]
    fn likes_and_links_load_by_parent() {
        let questions = vec![question(4), question(5)];
        let likes = debug_query::<Pg, _>(&Like::belonging_to(&questions)).to_string();
        assert!(likes.contains(r#""likes"."question_id" = ANY("#), "{}", likes);
        let links = debug_query::<Pg, _>(&Link::belonging_to(&questions)).to_string();
        assert!(links.contains(r#""links"."question_id" = ANY("#), "{}", links);

        let single = debug_query::<Pg, _>(&Link::belonging_to(&question(4))).to_string();
        assert!(single.contains(r#""links"."question_id" = $1"#), "{}", single);
    }

    #[test]
    fn question_serializes_with_relations_flattened() {
        let at = now();
        let question = QuestionWithRelations {
            question: question(4),
            likes: vec![Like {
                user_id: 3,
                question_id: 4,
                created_at: at,
            }],
            books: Vec::new(),
        };

        let json = serde_json::to_value(&question).unwrap();
        assert_eq!(json["id"], 4);
        assert_eq!(json["userId"], 2);
        assert_eq!(json["isPrivate"], false);
        assert_eq!(json["likes"][0]["userId"], 3);
        assert_eq!(json["books"].as_array().map(Vec::len), Some(0));
    }
}
