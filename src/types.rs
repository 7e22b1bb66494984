use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::error;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::io::Error as IoError;

use crate::utils::try_respond;

pub trait Validate
where
    Self: Sized,
{
    type Error;
    fn validate(self) -> Result<Self, Self::Error>;
}

#[derive(Debug)]
pub enum ApiError {
    Diesel(DieselError),
    Validation(ValidationError),
    Internal,
    Unauthorized,
    Forbidden(&'static str),
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::Diesel(DieselError::NotFound) => Status::NotFound,
            ApiError::Diesel(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Status::Conflict
            }
            ApiError::Diesel(_) | ApiError::Internal => Status::InternalServerError,
            ApiError::Validation(_) => Status::UnprocessableEntity,
            ApiError::Unauthorized => Status::Unauthorized,
            ApiError::Forbidden(_) => Status::Forbidden,
        }
    }
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> ApiError {
        ApiError::Diesel(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> ApiError {
        ApiError::Validation(err)
    }
}

impl From<IoError> for ApiError {
    fn from(err: IoError) -> ApiError {
        error!("i/o failure: {}", err);
        ApiError::Internal
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize, Default, PartialEq)]
pub struct ValidationError(HashMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        let entry = self.0.entry(key.into()).or_default();
        entry.push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (key, errors) in other.0.into_iter() {
            let entry = self.0.entry(key).or_default();
            entry.extend(errors);
        }
    }

    pub fn empty(&self) -> bool {
        self.len() == 0
    }

    pub fn messages(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `Ok(value)` when no error was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationError> {
        if self.empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let body = match self {
            ApiError::Validation(error) => json!({ "errors": error }),
            ApiError::Forbidden(message) => json!({ "errors": {
                "status": status.to_string(),
                "message": message,
            }}),
            ApiError::Diesel(error) => {
                if status == Status::InternalServerError {
                    error!("database failure: {}", error);
                }
                json!({ "errors": { "status": status.to_string() }})
            }
            ApiError::Unauthorized | ApiError::Internal => {
                json!({ "errors": { "status": status.to_string() }})
            }
        };
        try_respond(req, body, status)
    }
}

impl<T> Validate for Json<T>
where
    T: Validate,
{
    type Error = <T as Validate>::Error;
    fn validate(self) -> Result<Self, Self::Error> {
        let inner = self.into_inner();
        let validated = inner.validate()?;
        Ok(Json(validated))
    }
}

/// Plain message body returned by mutations that have nothing else to report.
#[derive(Debug, Serialize, PartialEq)]
pub struct Msg {
    pub message: String,
}

impl Msg {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Msg {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::DatabaseErrorInformation;

    #[derive(Debug)]
    struct Info;

    impl DatabaseErrorInformation for Info {
        fn message(&self) -> &str {
            "duplicate key value"
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            None
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            None
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    #[test]
    fn merge_keeps_messages_from_both_sides() {
        let mut errors = ValidationError::from("email", "invalid");
        let mut other = ValidationError::from("email", "taken");
        other.add_error("password", "too short");
        errors.merge(other);

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.messages("email"), ["invalid", "taken"]);
        assert_eq!(errors.messages("password"), ["too short"]);
        assert!(errors.messages("title").is_empty());
    }

    #[test]
    fn into_result_depends_on_recorded_errors() {
        assert_eq!(ValidationError::default().into_result(3), Ok(3));
        assert!(ValidationError::from("title", "empty").into_result(3).is_err());
    }

    #[test]
    fn statuses() {
        assert_eq!(ApiError::Diesel(DieselError::NotFound).status(), Status::NotFound);
        assert_eq!(
            ApiError::Diesel(DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                Box::new(Info)
            ))
            .status(),
            Status::Conflict
        );
        assert_eq!(
            ApiError::Diesel(DieselError::RollbackTransaction).status(),
            Status::InternalServerError
        );
        assert_eq!(ApiError::Validation(ValidationError::default()).status(), Status::UnprocessableEntity);
        assert_eq!(ApiError::Unauthorized.status(), Status::Unauthorized);
        assert_eq!(ApiError::Forbidden("no").status(), Status::Forbidden);
    }
}
