use crate::config::UploadConfig;
use crate::helper::media_helpers::{self, MediaError, StoredFile};
use crate::helper::validation_helpers::FieldErrors;
use crate::models::schema::{FieldKind, ResourceSchema};
use actix_multipart::Multipart;
use actix_web::{web, web::BytesMut, HttpResponse};
use futures_util::StreamExt;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;
use url::form_urlencoded;

/// Upper bound for a single non-file multipart field.
const MAX_TEXT_FIELD_BYTES: usize = 512 * 1024;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("Malformed multipart payload: {0}")]
    Multipart(String),
    #[error("Invalid UTF-8 in form field '{0}'.")]
    InvalidUtf8(String),
    #[error("Form field '{0}' is too large.")]
    FieldTooLarge(String),
    #[error(transparent)]
    Media(#[from] MediaError),
}

/// Parses URL-encoded form data from bytes, handling potential UTF-8 errors gracefully.
pub fn parse_form(form_bytes: &web::Bytes) -> Result<HashMap<String, String>, HttpResponse> {
    let body = match String::from_utf8(form_bytes.to_vec()) {
        Ok(s) => s,
        Err(_) => return Err(HttpResponse::BadRequest().body("Invalid UTF-8 in request body.")),
    };
    Ok(form_urlencoded::parse(body.as_bytes()).into_owned().collect())
}

/// Everything a create/update form sent, before validation.
#[derive(Debug, Default)]
pub struct Submission {
    /// `_method` override (`PUT`, `PATCH`), upper-cased.
    pub method_override: Option<String>,
    pub fields: HashMap<String, String>,
    pub files: HashMap<&'static str, StoredFile>,
    /// File fields the user asked to clear (`remove_<field>=1`).
    pub removals: HashSet<&'static str>,
    /// Upload rejections, reported like any other field error.
    pub file_errors: FieldErrors,
}

impl Submission {
    pub fn from_fields<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Submission {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            ..Default::default()
        }
    }

    /// Deletes files written while reading this submission. Called when the
    /// submission is rejected so no orphan uploads stay on disk.
    pub fn discard_files(&self, media_root: &Path) {
        for stored in self.files.values() {
            media_helpers::remove_stored(media_root, &stored.url);
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "on" | "oui")
}

/// Reads a multipart create/update form for `schema`. File parts of file
/// fields are streamed to the media store; unknown fields are ignored.
pub async fn read_submission(
    mut payload: Multipart,
    schema: &'static ResourceSchema,
    media_root: &Path,
    uploads: &UploadConfig,
) -> Result<Submission, FormError> {
    let mut submission = Submission::default();

    while let Some(item) = payload.next().await {
        let mut field = match item {
            Ok(field) => field,
            Err(e) => {
                submission.discard_files(media_root);
                return Err(FormError::Multipart(e.to_string()));
            }
        };
        let name = field.content_disposition().get_name().unwrap_or_default().to_string();
        let has_filename = field.content_disposition().get_filename().is_some();

        if let Some(spec) = schema.field(&name).filter(|f| f.kind == FieldKind::File) {
            if has_filename {
                match media_helpers::store_upload(&mut field, media_root, schema.slug, uploads).await {
                    Ok(stored) => {
                        if let Some(previous) = submission.files.insert(spec.name, stored) {
                            media_helpers::remove_stored(media_root, &previous.url);
                        }
                    }
                    Err(e) if e.is_rejection() => {
                        drain(&mut field).await;
                        submission
                            .file_errors
                            .entry(spec.name.to_string())
                            .or_default()
                            .push(upload_message(spec.label, &e, uploads));
                    }
                    Err(e) => {
                        submission.discard_files(media_root);
                        return Err(e.into());
                    }
                }
                continue;
            }
        }

        let value = match read_text(&mut field, &name).await {
            Ok(value) => value,
            Err(e) => {
                submission.discard_files(media_root);
                return Err(e);
            }
        };

        if name == "_method" {
            submission.method_override = Some(value.trim().to_ascii_uppercase());
        } else if let Some(target) = name.strip_prefix("remove_") {
            if let Some(spec) = schema.field(target).filter(|f| f.kind == FieldKind::File) {
                if is_truthy(&value) {
                    submission.removals.insert(spec.name);
                }
            }
        } else if schema.field(&name).is_some_and(|f| f.kind != FieldKind::File) {
            submission.fields.insert(name, value);
        }
    }

    Ok(submission)
}

async fn read_text(field: &mut actix_multipart::Field, name: &str) -> Result<String, FormError> {
    let mut data = BytesMut::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| FormError::Multipart(e.to_string()))?;
        if data.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
            return Err(FormError::FieldTooLarge(name.to_string()));
        }
        data.extend_from_slice(&chunk);
    }
    String::from_utf8(data.to_vec()).map_err(|_| FormError::InvalidUtf8(name.to_string()))
}

/// Consumes the rest of a rejected part so the stream can move on.
async fn drain(field: &mut actix_multipart::Field) {
    while let Some(chunk) = field.next().await {
        if chunk.is_err() {
            break;
        }
    }
}

fn upload_message(label: &str, error: &MediaError, uploads: &UploadConfig) -> String {
    match error {
        MediaError::TooLarge(mb) => format!("Le fichier {} ne doit pas dépasser {} Mo.", label, mb),
        MediaError::Disabled => "Le téléversement de fichiers est désactivé.".to_string(),
        _ => format!(
            "Le fichier {} doit être de type : {}.",
            label,
            uploads.allowed_mime_types.join(", ")
        ),
    }
}
