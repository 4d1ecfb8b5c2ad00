use crate::routes::errors::AppError;
use actix_web::web;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Sub-directory of the media root holding post illustrations.
pub const POST_IMAGES_DIR: &str = "posts_images";

/// Maps an accepted image MIME type to the extension it is stored under.
/// Anything not listed here is refused.
pub fn image_extension(mime_type: &str) -> Option<&'static str> {
    let map: BTreeMap<&str, &str> = [
        ("image/gif", "gif"),
        ("image/jpeg", "jpg"),
        ("image/png", "png"),
        ("image/webp", "webp"),
    ]
    .iter()
    .cloned()
    .collect();

    map.get(mime_type).cloned()
}

/// An image received with a post form, held in memory until the form validates.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

/// Writes the image under `<media>/posts_images/` and returns its path relative
/// to the media root, which is what the post row stores.
pub async fn store_post_image(media_path: &str, image: UploadedImage) -> Result<String, AppError> {
    let file_name = format!("{}.{}", Uuid::new_v4(), image.extension);
    let relative = format!("{}/{}", POST_IMAGES_DIR, file_name);
    let dir = Path::new(media_path).join(POST_IMAGES_DIR);
    let target = dir.join(&file_name);

    web::block(move || -> std::io::Result<()> {
        fs::create_dir_all(&dir)?;
        fs::write(&target, &image.bytes)
    })
    .await??;

    log::info!("Stored post image '{}'", relative);
    Ok(relative)
}

/// Removes a stored image. A file that is already gone is not an error.
pub async fn remove_post_image(media_path: &str, relative: &str) -> Result<(), AppError> {
    let Some(path) = resolve_stored_image(media_path, relative) else {
        log::warn!("Refusing to remove image outside the media directory: '{}'", relative);
        return Ok(());
    };

    let removed = web::block(move || fs::remove_file(&path)).await?;
    if let Err(err) = removed {
        if err.kind() != std::io::ErrorKind::NotFound {
            return Err(err.into());
        }
    }
    Ok(())
}

// Stored paths are always `posts_images/<file>`; nothing else maps to disk.
fn resolve_stored_image(media_path: &str, relative: &str) -> Option<PathBuf> {
    let file_name = relative.strip_prefix(POST_IMAGES_DIR)?.strip_prefix('/')?;
    if file_name.is_empty() || file_name.contains('/') || file_name.contains('\\') || file_name.starts_with('.') {
        return None;
    }
    Some(Path::new(media_path).join(POST_IMAGES_DIR).join(file_name))
}
