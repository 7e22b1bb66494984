use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use serde::Serializer;
use serde_json::Value;

pub fn try_respond(req: &Request<'_>, json: Value, status: Status) -> response::Result<'static> {
    (status, Json(json)).respond_to(req)
}

/// Timestamps are stored without zone and always mean UTC.
pub fn serialize_date<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let date = DateTime::<Utc>::from_naive_utc_and_offset(*date, Utc);
    let s = date.to_rfc3339_opts(SecondsFormat::Millis, true);
    serializer.serialize_str(&s)
}

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Stamp {
        #[serde(serialize_with = "serialize_date")]
        at: NaiveDateTime,
    }

    #[test]
    fn dates_serialize_as_utc_millis() {
        let at = NaiveDate::from_ymd_opt(2023, 4, 5)
            .unwrap()
            .and_hms_milli_opt(6, 7, 8, 9)
            .unwrap();
        let json = serde_json::to_string(&Stamp { at }).unwrap();
        assert_eq!(json, r#"{"at":"2023-04-05T06:07:08.009Z"}"#);
    }
}
