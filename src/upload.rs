use chrono::Utc;
use log::info;
use rand::Rng;
use regex::Regex;
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::tokio::fs;
use rocket::State;
use serde::Serialize;

use crate::auth::csrf::CsrfVerified;
use crate::config::AppConfig;
use crate::types::{ApiResult, ValidationError};

/// Largest accepted image, in bytes.
pub const MAX_IMAGE_SIZE: u64 = 50_000_000;

lazy_static! {
    static ref IMAGE_NAME_RE: Regex = Regex::new(r"\.(jpg|jpeg|png)$").unwrap();
}

#[derive(FromForm)]
pub struct Upload<'r> {
    file: TempFile<'r>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Uploaded {
    file_name: String,
}

/// The extension of an accepted image file name.
pub fn image_extension(file_name: &str) -> Option<&str> {
    IMAGE_NAME_RE
        .captures(file_name)
        .and_then(|captures| captures.get(1))
        .map(|ext| ext.as_str())
}

pub fn stored_file_name(stem: &str, extension: &str, millis: i64, nonce: u32) -> String {
    format!("{}-{}-{}.{}", millis, nonce, stem, extension)
}

#[post("/", data = "<form>")]
pub async fn upload(
    _csrf: CsrfVerified,
    config: &State<AppConfig>,
    mut form: Form<Upload<'_>>,
) -> ApiResult<Uploaded> {
    let raw_name = form
        .file
        .raw_name()
        .map(|name| name.dangerous_unsafe_unsanitized_raw().as_str().to_owned())
        .unwrap_or_default();
    let extension = match image_extension(&raw_name) {
        Some(extension) => extension.to_owned(),
        None => return Err(ValidationError::from("file", "Only image files are allowed!").into()),
    };
    let is_image = form
        .file
        .content_type()
        .map(|ct| ct.is_jpeg() || ct.is_png())
        .unwrap_or(false);
    if !is_image {
        return Err(ValidationError::from("file", "Only jpg, jpeg and png images are allowed!").into());
    }

    let stem = form.file.name().unwrap_or("image").to_owned();
    let nonce = rand::thread_rng().gen_range(0..1_000_000_000);
    let file_name = stored_file_name(&stem, &extension, Utc::now().timestamp_millis(), nonce);

    fs::create_dir_all(&config.upload_dir).await?;
    form.file.copy_to(config.upload_dir.join(&file_name)).await?;
    info!("stored upload {} ({} bytes)", file_name, form.file.len());

    Ok(Json(Uploaded { file_name }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_image_extensions() {
        assert_eq!(image_extension("cover.jpg"), Some("jpg"));
        assert_eq!(image_extension("cover.final.jpeg"), Some("jpeg"));
        assert_eq!(image_extension("avatar.png"), Some("png"));
    }

    #[test]
    fn rejects_other_files() {
        assert_eq!(image_extension("cover.gif"), None);
        assert_eq!(image_extension("cover.png.exe"), None);
        assert_eq!(image_extension("png"), None);
        assert_eq!(image_extension("cover.PNG"), None);
    }

    #[test]
    fn stored_name_is_prefixed() {
        assert_eq!(
            stored_file_name("cover", "png", 1_700_000_000_000, 42),
            "1700000000000-42-cover.png"
        );
    }
}
