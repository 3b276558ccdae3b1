//! Request descriptions for the admin API and classification of its answers.

use crate::helper::listing_helpers::{self, ListingQuery};
use crate::helper::validation_helpers::FieldErrors;
use crate::middleware::{CSRF_HEADER, REQUESTED_WITH_HEADER, XHR_MARKER};
use crate::models::OrderEntry;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

pub const ADMIN_API_BASE: &str = "/admin/api";

/// Shown when the server cannot be reached or answers with something unreadable.
pub const TRANSPORT_FALLBACK: &str = "Une erreur est survenue. Veuillez réessayer.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text(String),
    File { filename: String, content_type: String, bytes: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    None,
    Multipart(Vec<(String, FormPart)>),
    Json(Value),
}

impl RequestBody {
    /// Wire form of the body: content type and bytes. `None` for an empty body.
    pub fn encode(&self, boundary: &str) -> Option<(String, Vec<u8>)> {
        match self {
            RequestBody::None => None,
            RequestBody::Json(value) => Some(("application/json".to_string(), value.to_string().into_bytes())),
            RequestBody::Multipart(parts) => {
                let mut bytes = Vec::new();
                for (name, part) in parts {
                    bytes.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
                    match part {
                        FormPart::Text(value) => {
                            bytes.extend_from_slice(
                                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                            );
                            bytes.extend_from_slice(value.as_bytes());
                        }
                        FormPart::File { filename, content_type, bytes: data } => {
                            bytes.extend_from_slice(
                                format!(
                                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                                    name, filename, content_type
                                )
                                .as_bytes(),
                            );
                            bytes.extend_from_slice(data);
                        }
                    }
                    bytes.extend_from_slice(b"\r\n");
                }
                bytes.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
                Some((format!("multipart/form-data; boundary={}", boundary), bytes))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn text_field(&self, name: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Multipart(parts) => parts.iter().find_map(|(key, part)| match part {
                FormPart::Text(value) if key == name => Some(value.as_str()),
                _ => None,
            }),
            _ => None,
        }
    }
}

/// Builds requests against `/admin/api`. Mutating requests carry the CSRF
/// token and the XHR marker the server-side guard expects.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: String,
    csrf_token: String,
}

impl ApiClient {
    pub fn new(csrf_token: impl Into<String>) -> Self {
        ApiClient { base: ADMIN_API_BASE.to_string(), csrf_token: csrf_token.into() }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn resource_url(&self, slug: &str) -> String {
        format!("{}/{}", self.base, slug)
    }

    fn item_url(&self, slug: &str, id: i64) -> String {
        format!("{}/{}/{}", self.base, slug, id)
    }

    fn read_headers(&self) -> Vec<(&'static str, String)> {
        vec![("Accept", "application/json".to_string()), (REQUESTED_WITH_HEADER, XHR_MARKER.to_string())]
    }

    fn write_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = self.read_headers();
        headers.push((CSRF_HEADER, self.csrf_token.clone()));
        headers
    }

    pub fn list(&self, slug: &str, query: &ListingQuery) -> ApiRequest {
        let query = query.to_query_string();
        let url = if query.is_empty() {
            self.resource_url(slug)
        } else {
            format!("{}?{}", self.resource_url(slug), query)
        };
        ApiRequest { method: HttpMethod::Get, url, headers: self.read_headers(), body: RequestBody::None }
    }

    /// Plain link for a file download; browsers follow it without headers.
    pub fn export_url(&self, slug: &str, query: &ListingQuery, format: &str) -> String {
        listing_helpers::export_url(&self.resource_url(slug), query, format)
    }

    pub fn create(&self, slug: &str, fields: Vec<(String, FormPart)>) -> ApiRequest {
        ApiRequest {
            method: HttpMethod::Post,
            url: self.resource_url(slug),
            headers: self.write_headers(),
            body: RequestBody::Multipart(fields),
        }
    }

    /// Multipart bodies go out as POST with `_method=PUT`.
    pub fn update(&self, slug: &str, id: i64, fields: Vec<(String, FormPart)>) -> ApiRequest {
        let mut parts = vec![("_method".to_string(), FormPart::Text("PUT".to_string()))];
        parts.extend(fields);
        ApiRequest {
            method: HttpMethod::Post,
            url: self.item_url(slug, id),
            headers: self.write_headers(),
            body: RequestBody::Multipart(parts),
        }
    }

    pub fn delete(&self, slug: &str, id: i64) -> ApiRequest {
        ApiRequest {
            method: HttpMethod::Delete,
            url: self.item_url(slug, id),
            headers: self.write_headers(),
            body: RequestBody::None,
        }
    }

    pub fn update_order(&self, slug: &str, orders: &[OrderEntry]) -> ApiRequest {
        ApiRequest {
            method: HttpMethod::Post,
            url: format!("{}/update-order", self.resource_url(slug)),
            headers: self.write_headers(),
            body: RequestBody::Json(json!({ "orders": orders })),
        }
    }

    pub fn toggle(&self, slug: &str, id: i64, action: &str) -> ApiRequest {
        ApiRequest {
            method: HttpMethod::Post,
            url: format!("{}/{}", self.item_url(slug, id), action),
            headers: self.write_headers(),
            body: RequestBody::None,
        }
    }
}

/// Reads the token out of `<meta name="csrf-token" content="...">`.
pub fn csrf_from_meta(html: &str) -> Option<String> {
    static META: OnceLock<Option<Regex>> = OnceLock::new();
    static CONTENT: OnceLock<Option<Regex>> = OnceLock::new();
    let meta = META
        .get_or_init(|| Regex::new(r#"(?i)<meta\s[^>]*name\s*=\s*["']csrf-token["'][^>]*>"#).ok())
        .as_ref()?;
    let content = CONTENT
        .get_or_init(|| Regex::new(r#"(?i)content\s*=\s*["']([^"']*)["']"#).ok())
        .as_ref()?;

    let tag = meta.find(html)?;
    content
        .captures(tag.as_str())
        .and_then(|caps| caps.get(1))
        .map(|token| token.as_str().to_string())
        .filter(|token| !token.is_empty())
}

/// The four ways an admin request can end.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome {
    Success { message: Option<String>, data: Value },
    /// Non-2xx with an `errors` map: shown inline under each field.
    Validation { message: String, errors: FieldErrors },
    /// Non-2xx with only a `message`.
    Business { message: String },
    /// No response, or a non-2xx answer without readable JSON.
    Transport { message: String },
}

impl ApiOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiOutcome::Success { .. })
    }

    /// Text for the error toast; `None` on success.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ApiOutcome::Success { .. } => None,
            ApiOutcome::Validation { message, .. }
            | ApiOutcome::Business { message }
            | ApiOutcome::Transport { message } => Some(message),
        }
    }
}

fn field_errors(value: &Value) -> Option<FieldErrors> {
    let map = value.as_object()?;
    let errors = map
        .iter()
        .map(|(field, messages)| {
            let messages = match messages {
                Value::Array(items) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
                Value::String(message) => vec![message.clone()],
                _ => Vec::new(),
            };
            (field.clone(), messages)
        })
        .collect();
    Some(errors)
}

/// Classifies a response. `status` is `None` when the request never got one.
pub fn classify_response(status: Option<u16>, body: &str) -> ApiOutcome {
    let Some(status) = status else {
        return ApiOutcome::Transport { message: TRANSPORT_FALLBACK.to_string() };
    };
    let json: Option<Value> = serde_json::from_str(body).ok();
    let message = json
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if (200..300).contains(&status) {
        let data = json.as_ref().and_then(|v| v.get("data")).cloned().unwrap_or(Value::Null);
        return ApiOutcome::Success { message, data };
    }

    let Some(json) = json else {
        return ApiOutcome::Transport { message: TRANSPORT_FALLBACK.to_string() };
    };
    if let Some(errors) = json.get("errors").and_then(field_errors) {
        return ApiOutcome::Validation {
            message: message.unwrap_or_else(|| TRANSPORT_FALLBACK.to_string()),
            errors,
        };
    }
    match message {
        Some(message) => ApiOutcome::Business { message },
        None => ApiOutcome::Transport { message: TRANSPORT_FALLBACK.to_string() },
    }
}
