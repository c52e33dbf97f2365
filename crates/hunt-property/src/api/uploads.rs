use std::path::Path as FsPath;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::post;
use axum::Router;
use serde::Serialize;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

use super::extract::ApiJson;
use super::AppContext;
use crate::error::ApiError;

const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];
const INVALID_FILE: &str = "Invalid file. Allowed: jpg, jpeg, png, gif, webp";

pub(crate) fn router() -> Router<AppContext> {
    // The size cap comes from configuration and is enforced while streaming.
    Router::new().route(
        "/api/upload/image",
        post(upload_image).layer(DefaultBodyLimit::disable()),
    )
}

#[derive(Debug, Serialize)]
pub(crate) struct UploadedImage {
    url: String,
}

/// Lower-cased extension when the name looks like a supported image.
fn image_extension(file_name: &str) -> Option<String> {
    let extension = FsPath::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return None;
    }
    let guessed = mime_guess::from_ext(&extension).first()?;
    (guessed.type_() == mime_guess::mime::IMAGE).then_some(extension)
}

fn too_large(max_bytes: usize) -> ApiError {
    ApiError::bad_request(format!(
        "File too large. Max {}MB",
        max_bytes / (1024 * 1024)
    ))
}

pub(crate) async fn upload_image(
    State(context): State<AppContext>,
    mut multipart: Multipart,
) -> Result<ApiJson<UploadedImage>, ApiError> {
    let max_bytes = context.content.upload_max_bytes;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(err.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let extension = field
            .file_name()
            .and_then(image_extension)
            .ok_or_else(|| ApiError::bad_request(INVALID_FILE))?;

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| ApiError::bad_request(err.body_text()))?
        {
            if bytes.len() + chunk.len() > max_bytes {
                return Err(too_large(max_bytes));
            }
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            return Err(ApiError::bad_request(INVALID_FILE));
        }

        let name = format!("{}.{extension}", Uuid::new_v4().simple());
        let directory = &context.content.uploads_dir;
        fs::create_dir_all(directory).await?;
        fs::write(directory.join(&name), &bytes).await?;
        info!(file = %name, size = bytes.len(), "image uploaded");

        return Ok(ApiJson(UploadedImage {
            url: format!("/uploads/{name}"),
        }));
    }

    Err(ApiError::bad_request("Missing multipart field 'file'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_image_extensions() {
        assert_eq!(image_extension("house.JPG").as_deref(), Some("jpg"));
        assert_eq!(image_extension("plan.webp").as_deref(), Some("webp"));
    }

    #[test]
    fn rejects_other_files() {
        assert_eq!(image_extension("deed.pdf"), None);
        assert_eq!(image_extension("noextension"), None);
        assert_eq!(image_extension("script.svg"), None);
    }

    #[test]
    fn size_error_reports_megabytes() {
        assert_eq!(
            too_large(10 * 1024 * 1024).to_string(),
            "File too large. Max 10MB"
        );
    }
}
