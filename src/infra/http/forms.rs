//! Multipart decoding for the post form.

use axum::http::StatusCode;
use axum_extra::extract::Multipart;
use bytes::Bytes;
use thiserror::Error;
use tracing::warn;

use crate::application::error::HttpError;
use crate::application::posts::PostInput;

const SOURCE: &str = "infra::http::forms";

pub const INVALID_IMAGE_MESSAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// A file picked in the form's image input.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub data: Bytes,
}

#[derive(Debug, Default)]
pub struct PostSubmission {
    pub input: PostInput,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Error)]
pub enum PostFormError {
    #[error("request body exceeds the upload limit")]
    PayloadTooLarge,
    #[error("form data was malformed: {0}")]
    Invalid(String),
}

impl From<PostFormError> for HttpError {
    fn from(err: PostFormError) -> Self {
        match err {
            PostFormError::PayloadTooLarge => HttpError::new(
                SOURCE,
                StatusCode::PAYLOAD_TOO_LARGE,
                "Uploaded file is too large",
                err.to_string(),
            ),
            PostFormError::Invalid(_) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Form data was invalid",
                &err,
            ),
        }
    }
}

/// Collect `text`, `group` and `image` fields. An image input left empty counts as absent.
pub async fn read_post_submission(
    multipart: &mut Multipart,
) -> Result<PostSubmission, PostFormError> {
    let mut submission = PostSubmission::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                let status = err.status();
                warn!(
                    target = SOURCE,
                    status = status.as_u16(),
                    error = %err,
                    "failed to read multipart payload"
                );
                return Err(match status {
                    StatusCode::PAYLOAD_TOO_LARGE => PostFormError::PayloadTooLarge,
                    _ => PostFormError::Invalid(err.to_string()),
                });
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("text") => {
                submission.input.text = field
                    .text()
                    .await
                    .map_err(|err| PostFormError::Invalid(err.to_string()))?;
            }
            Some("group") => {
                submission.input.group = field
                    .text()
                    .await
                    .map_err(|err| PostFormError::Invalid(err.to_string()))?;
            }
            Some("image") => {
                let filename = field
                    .file_name()
                    .map(|value| value.trim().to_string())
                    .unwrap_or_default();
                let data = field.bytes().await.map_err(|err| {
                    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
                        PostFormError::PayloadTooLarge
                    } else {
                        PostFormError::Invalid(err.to_string())
                    }
                })?;
                if !filename.is_empty() && !data.is_empty() {
                    submission.image = Some(ImageUpload { filename, data });
                }
            }
            _ => continue,
        }
    }

    Ok(submission)
}

/// Accept files whose name maps to an `image/*` type and whose header decodes as a raster image.
pub fn check_image(upload: &ImageUpload) -> Result<(), &'static str> {
    let is_image_type = mime_guess::from_path(&upload.filename)
        .first()
        .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE);
    if !is_image_type {
        return Err(INVALID_IMAGE_MESSAGE);
    }

    match imagesize::blob_size(&upload.data) {
        Ok(size) if size.width > 0 && size.height > 0 => Ok(()),
        _ => Err(INVALID_IMAGE_MESSAGE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIF_1X1: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
        0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
    ];

    fn upload(name: &str, data: &'static [u8]) -> ImageUpload {
        ImageUpload {
            filename: name.to_string(),
            data: Bytes::from_static(data),
        }
    }

    #[test]
    fn gif_with_image_extension_is_accepted() {
        assert!(check_image(&upload("small.gif", GIF_1X1)).is_ok());
    }

    #[test]
    fn text_file_is_rejected() {
        assert_eq!(
            check_image(&upload("notes.txt", GIF_1X1)),
            Err(INVALID_IMAGE_MESSAGE)
        );
        assert_eq!(
            check_image(&upload("fake.png", b"definitely not a png")),
            Err(INVALID_IMAGE_MESSAGE)
        );
    }
}
