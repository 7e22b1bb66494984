#[macro_use]
extern crate rocket;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate lazy_static;

mod auth;
mod book;
mod config;
mod cors;
mod db;
mod errors;
mod follow;
mod question;
mod types;
mod upload;
mod users;
mod utils;


use rocket::data::{Limits, ToByteUnit};
use rocket::http::Status;
use rocket::request::Request;
use rocket::serde::json::{Json, Value};
use rocket::{Build, Rocket};
use serde_json::json;

use config::AppConfig;
use db::Pool;

#[catch(422)]
fn handle_422(_req: &Request) -> Json<Value> {
    Json(json!({
        "errors": {
            "body": ["invalid request body"]
        }
    }))
}

#[catch(404)]
fn not_found(_req: &Request) -> Json<Value> {
    Json(json!({
        "errors": {
            "status": Status::NotFound.to_string()
        }
    }))
}

#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> Json<Value> {
    Json(json!({
        "errors": {
            "status": status.to_string()
        }
    }))
}

fn limits() -> Limits {
    Limits::default()
        .limit("json", 50.mebibytes())
        .limit("data-form", (upload::MAX_IMAGE_SIZE + 64 * 1024).bytes())
        .limit("file", upload::MAX_IMAGE_SIZE.bytes())
}

pub fn app(pool: Pool, config: AppConfig) -> Rocket<Build> {
    let figment = rocket::Config::figment().merge(("limits", limits()));
    let cors = cors::Cors::new(config.cors_origin.clone());

    rocket::custom(figment)
        .manage(pool)
        .manage(config)
        .attach(cors)
        .mount("/", routes![cors::preflight])
        .mount(
            "/auth",
            routes![auth::csrf_token, auth::signup, auth::login, auth::logout],
        )
        .mount(
            "/user",
            routes![
                users::current,
                users::get,
                users::update,
                users::delete,
                follow::follow,
                follow::unfollow,
            ],
        )
        .mount(
            "/book",
            routes![book::own_shelf, book::shelf, book::get, book::create, book::delete],
        )
        .mount(
            "/question",
            routes![
                question::own_profile,
                question::profile,
                question::timeline,
                question::all_users,
                question::get,
                question::create,
                question::update,
                question::like,
                question::link,
                question::unlink,
                question::delete,
            ],
        )
        .mount("/upload", routes![upload::upload])
        .register("/", catchers![not_found, handle_422, default_catcher])
}

#[launch]
fn rocket() -> _ {
    let config = AppConfig::from_env().expect("Failed to load configuration");
    let pool = db::init_pool().expect("Failed to create database pool");
    app(pool, config)
}
