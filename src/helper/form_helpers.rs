use crate::helper::upload_helpers::{self, UploadedImage};
use crate::routes::errors::AppError;
use actix_multipart::Multipart;
use actix_web::web::BytesMut;
use futures_util::StreamExt;
use std::collections::HashMap;

const TEXT_FIELD_LIMIT: usize = 64 * 1024;

/// A multipart post form, split into its text fields and the optional image.
#[derive(Debug, Default)]
pub struct PostSubmission {
    pub fields: HashMap<String, String>,
    pub image: Option<UploadedImage>,
    /// Why the attached file was refused, reported as a field error.
    pub image_error: Option<String>,
    pub clear_image: bool,
}

/// Reads the whole multipart body. A refused image is recorded rather than
/// failing the request, so the form can be rendered again with the message.
pub async fn collect_post_submission(mut payload: Multipart, max_image_size_mb: u64) -> Result<PostSubmission, AppError> {
    let max_image_bytes = (max_image_size_mb * 1024 * 1024) as usize;
    let mut submission = PostSubmission::default();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| AppError::Upload(e.to_string()))?;
        let field_name = field.content_disposition().get_name().unwrap_or_default().to_string();

        if field_name == "image" {
            let has_file = field
                .content_disposition()
                .get_filename()
                .map_or(false, |name| !name.is_empty());
            let content_type = field.content_type().map(|m| m.essence_str().to_string());

            let mut data = BytesMut::new();
            let mut too_large = false;
            while let Some(chunk) = field.next().await {
                let chunk = chunk.map_err(|e| AppError::Upload(e.to_string()))?;
                if data.len() + chunk.len() > max_image_bytes {
                    too_large = true;
                    continue;
                }
                data.extend_from_slice(&chunk);
            }

            // Browsers send an empty part when no file was chosen.
            if !has_file && data.is_empty() {
                continue;
            }
            if too_large {
                submission.image_error = Some(format!("The image is too large. Maximum size is {}MB.", max_image_size_mb));
                continue;
            }
            match content_type.as_deref().and_then(upload_helpers::image_extension) {
                Some(extension) => {
                    submission.image = Some(UploadedImage { extension, bytes: data.to_vec() });
                }
                None => {
                    log::warn!("Rejected post image with content type {:?}", content_type);
                    submission.image_error = Some(
                        "Upload a valid image. The file you uploaded was either not an image or a corrupted image.".to_string(),
                    );
                }
            }
            continue;
        }

        let mut data = BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::Upload(e.to_string()))?;
            if data.len() + chunk.len() > TEXT_FIELD_LIMIT {
                return Err(AppError::Upload(format!("Field '{}' is too large.", field_name)));
            }
            data.extend_from_slice(&chunk);
        }
        let value = String::from_utf8(data.to_vec())
            .map_err(|_| AppError::Upload("Invalid UTF-8 in form field.".to_string()))?;

        if field_name == "image-clear" {
            submission.clear_image = !value.is_empty();
        } else {
            submission.fields.insert(field_name, value);
        }
    }

    Ok(submission)
}
