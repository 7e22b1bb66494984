use chrono::NaiveDateTime;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::{delete, insert_into, select};
use rocket::serde::json::Json;
use serde::Serialize;

use crate::auth::csrf::CsrfVerified;
use crate::db::schema::follows;
use crate::db::DbConnection;
use crate::types::{ApiResult, Msg};
use crate::users::models::User;
use crate::utils::{now, serialize_date};

#[derive(Debug, Queryable, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Follow {
    pub follower_id: i32,
    pub following_id: i32,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = follows)]
struct NewFollow {
    follower_id: i32,
    following_id: i32,
    created_at: NaiveDateTime,
}

fn is_following(follower: i32, following: i32, connection: &mut PgConnection) -> QueryResult<bool> {
    select(exists(
        follows::table
            .filter(follows::follower_id.eq(follower))
            .filter(follows::following_id.eq(following)),
    ))
    .get_result::<bool>(connection)
}

#[patch("/<id>/follow")]
pub async fn follow(
    _csrf: CsrfVerified,
    current: User,
    connection: DbConnection,
    id: i32,
) -> ApiResult<Msg> {
    if current.id == id {
        return Ok(Json(Msg::new("You cannot follow yourself")));
    }

    connection
        .run(move |conn| {
            let target = User::load_by_id(id, conn)?;
            if is_following(current.id, target.id, conn)? {
                return Ok(Json(Msg::new("Already following")));
            }

            insert_into(follows::table)
                .values(&NewFollow {
                    follower_id: current.id,
                    following_id: target.id,
                    created_at: now(),
                })
                .on_conflict((follows::follower_id, follows::following_id))
                .do_nothing()
                .execute(conn)?;
            Ok(Json(Msg::new("Followed")))
        })
        .await
}

#[patch("/<id>/unfollow")]
pub async fn unfollow(
    _csrf: CsrfVerified,
    current: User,
    connection: DbConnection,
    id: i32,
) -> ApiResult<Msg> {
    if current.id == id {
        return Ok(Json(Msg::new("You cannot unfollow yourself")));
    }

    connection
        .run(move |conn| {
            let target = User::load_by_id(id, conn)?;
            if !is_following(current.id, target.id, conn)? {
                return Ok(Json(Msg::new("Not following, nothing to unfollow")));
            }

            delete(
                follows::table
                    .filter(follows::follower_id.eq(current.id))
                    .filter(follows::following_id.eq(target.id)),
            )
            .execute(conn)?;
            Ok(Json(Msg::new("Unfollowed")))
        })
        .await
}
