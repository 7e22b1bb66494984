use chrono::Duration;
use dotenv::dotenv;
use std::env;
use std::path::PathBuf;

use crate::errors::{ErrorKind, Result};

const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_UPLOAD_DIR: &str = "public/images";

/// Application settings read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub cors_origin: String,
    pub upload_dir: PathBuf,
}

impl AppConfig {
    pub fn new<S: Into<String>>(jwt_secret: S) -> Self {
        AppConfig {
            jwt_secret: jwt_secret.into(),
            token_ttl: Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
            cors_origin: DEFAULT_CORS_ORIGIN.to_owned(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
        }
    }

    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ErrorKind::MissingSetting("JWT_SECRET"))?;
        if jwt_secret.is_empty() {
            return Err(ErrorKind::MissingSetting("JWT_SECRET").into());
        }

        let mut config = AppConfig::new(jwt_secret);
        config.token_ttl = token_ttl(env::var("JWT_TTL_MINUTES").ok())?;
        if let Ok(origin) = env::var("CORS_ORIGIN") {
            config.cors_origin = origin;
        }
        if let Ok(dir) = env::var("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        Ok(config)
    }
}

fn token_ttl(minutes: Option<String>) -> Result<Duration> {
    match minutes {
        Some(minutes) => Ok(Duration::minutes(minutes.trim().parse::<i64>()?)),
        None => Ok(Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_ttl_defaults_to_thirty_minutes() {
        assert_eq!(token_ttl(None).unwrap(), Duration::minutes(30));
    }

    #[test]
    fn token_ttl_parses_minutes() {
        assert_eq!(token_ttl(Some(" 45 ".to_owned())).unwrap(), Duration::minutes(45));
        assert!(token_ttl(Some("soon".to_owned())).is_err());
    }

    #[test]
    fn new_uses_defaults() {
        let config = AppConfig::new("secret");
        assert_eq!(config.cors_origin, "http://localhost:3000");
        assert_eq!(config.upload_dir, PathBuf::from("public/images"));
    }
}
