//! The listing contract shared by admin tables and public listings: search,
//! sort, page size, page and column filters, all carried in the URL query.
//!
//! Encoding is canonical (fixed key order, empty and default values dropped),
//! so the same parameters always produce the same URL and decoding that URL
//! gives the parameters back.

use crate::config::ListingConfig;
use crate::models::schema::{FieldKind, ResourceSchema};
use crate::models::SortDirection;
use rusqlite::types::Value as SqlValue;
use std::collections::BTreeMap;
use url::form_urlencoded;

/// Filter labels meaning "no filter". Selecting one clears the parameter.
pub const ALL_LABELS: [&str; 4] = ["tous", "toutes", "all", "*"];

const RESERVED_KEYS: [&str; 7] = ["search", "sort", "direction", "per_page", "page", "export", "_"];

pub fn is_all_label(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || ALL_LABELS.iter().any(|label| label.eq_ignore_ascii_case(value))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingQuery {
    pub search: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<SortDirection>,
    pub per_page: Option<u32>,
    pub page: Option<u32>,
    pub filters: BTreeMap<String, String>,
}

impl ListingQuery {
    /// Decodes a raw query string. Keys other than the reserved ones become filters.
    pub fn parse(query: &str) -> Self {
        let mut listing = ListingQuery::default();
        for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "search" => listing.search = Some(value.into_owned()),
                "sort" => listing.sort = Some(value.into_owned()),
                "direction" => listing.direction = SortDirection::parse(&value),
                "per_page" => listing.per_page = value.trim().parse().ok(),
                "page" => listing.page = value.trim().parse().ok(),
                key if RESERVED_KEYS.contains(&key) => {}
                key => {
                    listing.filters.insert(key.to_string(), value.into_owned());
                }
            }
        }
        listing.normalized()
    }

    /// Drops empty and default values so that equal listings compare equal.
    pub fn normalized(mut self) -> Self {
        self.search = self.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        self.sort = self.sort.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        if self.sort.is_none() {
            self.direction = None;
        }
        self.per_page = self.per_page.filter(|n| *n > 0);
        self.page = self.page.filter(|n| *n > 1);
        self.filters.retain(|_, value| !is_all_label(value));
        self
    }

    pub fn current_page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    pub fn to_query_string(&self) -> String {
        let normalized = self.clone().normalized();
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        if let Some(search) = &normalized.search {
            serializer.append_pair("search", search);
        }
        if let Some(sort) = &normalized.sort {
            serializer.append_pair("sort", sort);
        }
        if let Some(direction) = normalized.direction {
            serializer.append_pair("direction", direction.as_str());
        }
        if let Some(per_page) = normalized.per_page {
            serializer.append_pair("per_page", &per_page.to_string());
        }
        if let Some(page) = normalized.page {
            serializer.append_pair("page", &page.to_string());
        }
        for (key, value) in &normalized.filters {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    /// Applies a patch. Touching search, sort, direction, page size or a
    /// filter sends the listing back to page 1; a page-only patch keeps
    /// everything else as is.
    pub fn merge(&self, patch: &ListingPatch) -> ListingQuery {
        let mut next = self.clone();
        let mut reset_page = false;

        if let Some(search) = &patch.search {
            next.search = search.clone();
            reset_page = true;
        }
        if let Some(sort) = &patch.sort {
            next.sort = sort.clone();
            reset_page = true;
        }
        if let Some(direction) = patch.direction {
            next.direction = Some(direction);
            reset_page = true;
        }
        if let Some(per_page) = patch.per_page {
            next.per_page = Some(per_page);
            reset_page = true;
        }
        for (key, value) in &patch.filters {
            match value {
                Some(value) if !is_all_label(value) => {
                    next.filters.insert(key.clone(), value.clone());
                }
                _ => {
                    next.filters.remove(key);
                }
            }
            reset_page = true;
        }

        if reset_page {
            next.page = None;
        }
        if let Some(page) = patch.page {
            next.page = Some(page);
        }
        next.normalized()
    }

    /// Column header click: same column flips the direction, a new column sorts ascending.
    pub fn toggle_sort(&self, column: &str) -> ListingPatch {
        let direction = match (&self.sort, self.direction) {
            (Some(current), Some(SortDirection::Asc) | None) if current == column => SortDirection::Desc,
            _ => SortDirection::Asc,
        };
        ListingPatch::default().sort(column, direction)
    }

    /// Server side: validates every parameter against the schema and the
    /// configured page-size bounds.
    pub fn resolve(&self, schema: &'static ResourceSchema, limits: &ListingConfig) -> ResolvedListing {
        let (default_sort, default_direction) = schema.default_sort;
        let sort = self
            .sort
            .as_deref()
            .and_then(|requested| sortable_column(schema, requested))
            .unwrap_or(default_sort);
        let direction = if self.sort.is_some() && sort != default_sort || self.direction.is_some() {
            self.direction.unwrap_or_default()
        } else {
            default_direction
        };

        let filters = self
            .filters
            .iter()
            .filter_map(|(key, raw)| {
                let field = schema.field(key).filter(|f| schema.is_filterable(f.name))?;
                filter_value(field.kind, raw).map(|value| (field.name, value))
            })
            .collect();

        ResolvedListing {
            search: self.search.clone(),
            filters,
            sort,
            direction,
            per_page: self.per_page.unwrap_or(limits.default_per_page).clamp(1, limits.max_per_page),
            page: self.current_page().max(1),
        }
    }
}

fn sortable_column(schema: &'static ResourceSchema, requested: &str) -> Option<&'static str> {
    if !schema.is_sortable(requested) {
        return None;
    }
    ["id", "created_at", "updated_at"]
        .into_iter()
        .find(|c| *c == requested)
        .or_else(|| schema.field(requested).map(|f| f.name))
}

fn filter_value(kind: FieldKind, raw: &str) -> Option<SqlValue> {
    let raw = raw.trim();
    match kind {
        FieldKind::Boolean => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "oui" => Some(SqlValue::Integer(1)),
            "0" | "false" | "off" | "non" => Some(SqlValue::Integer(0)),
            _ => None,
        },
        FieldKind::Integer | FieldKind::ForeignKey(_) => raw.parse().ok().map(SqlValue::Integer),
        _ => Some(SqlValue::Text(raw.to_string())),
    }
}

/// A listing whose columns have been checked against a schema; safe to turn into SQL.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedListing {
    pub search: Option<String>,
    pub filters: Vec<(&'static str, SqlValue)>,
    pub sort: &'static str,
    pub direction: SortDirection,
    pub per_page: u32,
    pub page: u32,
}

impl ResolvedListing {
    pub fn offset(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.per_page as u64
    }
}

/// Partial update of a listing. `Some(None)` clears a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPatch {
    pub search: Option<Option<String>>,
    pub sort: Option<Option<String>>,
    pub direction: Option<SortDirection>,
    pub per_page: Option<u32>,
    pub page: Option<u32>,
    pub filters: Vec<(String, Option<String>)>,
}

impl ListingPatch {
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(Some(text.into()));
        self
    }

    pub fn sort(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(Some(column.into()));
        self.direction = Some(direction);
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((key.into(), Some(value.into())));
        self
    }

    pub fn clear_filter(mut self, key: impl Into<String>) -> Self {
        self.filters.push((key.into(), None));
        self
    }
}

fn with_query(base_url: &str, query: &str) -> String {
    if query.is_empty() {
        base_url.to_string()
    } else {
        format!("{}?{}", base_url, query)
    }
}

/// URL of the listing after applying `patch` to `current`.
pub fn visit_url(base_url: &str, current: &ListingQuery, patch: &ListingPatch) -> String {
    with_query(base_url, &current.merge(patch).to_query_string())
}

/// Download URL for the current filter/sort state in `format`. The page is
/// dropped: an export always covers the whole filtered set.
pub fn export_url(base_url: &str, current: &ListingQuery, format: &str) -> String {
    let mut listing = current.clone();
    listing.page = None;
    let mut query = listing.to_query_string();
    let export = form_urlencoded::Serializer::new(String::new())
        .append_pair("export", format)
        .finish();
    if !query.is_empty() {
        query.push('&');
    }
    query.push_str(&export);
    with_query(base_url, &query)
}
