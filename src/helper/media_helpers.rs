use crate::config::UploadConfig;
use actix_multipart::Field;
use actix_web::web;
use futures_util::StreamExt;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Public URL prefix under which `MEDIA_PATH` is served.
pub const MEDIA_URL_PREFIX: &str = "/media";

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("File uploads are currently disabled. No MIME types are configured.")]
    Disabled,
    #[error("Unsupported file type '{0}'.")]
    UnsupportedType(String),
    #[error("File is too large. Maximum size is {0}MB.")]
    TooLarge(u64),
    #[error("Upload stream error: {0}")]
    Stream(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Blocking task failed: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
}

impl MediaError {
    /// Rejections caused by the uploaded file itself (as opposed to server faults).
    pub fn is_rejection(&self) -> bool {
        matches!(self, MediaError::Disabled | MediaError::UnsupportedType(_) | MediaError::TooLarge(_))
    }
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub url: String,
    pub path: PathBuf,
    pub original_filename: String,
    pub size: u64,
}

/// Maps a validated MIME type to a safe file extension. Not configurable.
fn mime_to_safe_extension(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "application/pdf" => Some("pdf"),
        "image/gif" => Some("gif"),
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => None,
        "video/mp4" => Some("mp4"),
        "audio/mpeg" => Some("mp3"),
        _ => None,
    }
}

/// Checks a declared MIME type against the configured allow-list.
pub fn accepted_extension(uploads: &UploadConfig, mime_type: &str) -> Result<&'static str, MediaError> {
    if uploads.allowed_mime_types.is_empty() {
        return Err(MediaError::Disabled);
    }
    if !uploads.allowed_mime_types.iter().any(|allowed| allowed == mime_type) {
        return Err(MediaError::UnsupportedType(mime_type.to_string()));
    }
    mime_to_safe_extension(mime_type).ok_or_else(|| {
        log::error!("Configured MIME type '{}' has no safe extension mapping.", mime_type);
        MediaError::UnsupportedType(mime_type.to_string())
    })
}

/// `<root>/<entity>/ab/cd/<uuid>.<ext>` and its public URL.
fn storage_location(media_root: &Path, entity: &str, file_id: &str, ext: &str) -> (PathBuf, String) {
    let (dir1, dir2) = (&file_id[0..2], &file_id[2..4]);
    let filename = format!("{}.{}", file_id, ext);
    let path = media_root.join(entity).join(dir1).join(dir2).join(&filename);
    let url = format!("{}/{}/{}/{}/{}", MEDIA_URL_PREFIX, entity, dir1, dir2, filename);
    (path, url)
}

/// Streams one multipart file part to disk, enforcing type and size limits.
/// A partially written file is removed when the upload is rejected.
pub async fn store_upload(
    field: &mut Field,
    media_root: &Path,
    entity: &str,
    uploads: &UploadConfig,
) -> Result<StoredFile, MediaError> {
    let content_type = field
        .content_type()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let ext = accepted_extension(uploads, &content_type)?;

    let original_filename = field
        .content_disposition()
        .get_filename()
        .unwrap_or("upload")
        .to_string();

    let file_id = Uuid::new_v4().to_string();
    let (final_path, url) = storage_location(media_root, entity, &file_id, ext);

    if let Some(parent) = final_path.parent() {
        let parent = parent.to_path_buf();
        web::block(move || fs::create_dir_all(parent)).await??;
    }

    let mut file = web::block({
        let path = final_path.clone();
        move || fs::File::create(path)
    })
    .await??;

    let max_bytes = uploads.max_file_size_bytes();
    let mut size: u64 = 0;
    while let Some(chunk) = field.next().await {
        let data = match chunk {
            Ok(data) => data,
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&final_path);
                return Err(MediaError::Stream(e.to_string()));
            }
        };
        size += data.len() as u64;
        if size > max_bytes {
            drop(file);
            let _ = fs::remove_file(&final_path);
            return Err(MediaError::TooLarge(uploads.max_file_size_mb));
        }
        file = web::block(move || file.write_all(&data).map(|_| file)).await??;
    }

    Ok(StoredFile { url, path: final_path, original_filename, size })
}

/// Resolves a stored `/media/...` URL back to its path under `media_root`.
/// Anything else (external URLs, traversal attempts) resolves to `None`.
pub fn url_to_path(media_root: &Path, url: &str) -> Option<PathBuf> {
    let relative = url.strip_prefix(MEDIA_URL_PREFIX)?.strip_prefix('/')?;
    let relative = Path::new(relative);
    if relative.components().all(|c| matches!(c, Component::Normal(_))) {
        Some(media_root.join(relative))
    } else {
        None
    }
}

/// Deletes a stored file. Failures are logged, never propagated: a missing
/// file must not block the database operation that released it.
pub fn remove_stored(media_root: &Path, url: &str) {
    let Some(path) = url_to_path(media_root, url) else {
        return;
    };
    if let Err(e) = fs::remove_file(&path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Could not remove media file '{}': {}", path.display(), e);
        }
    }
}
