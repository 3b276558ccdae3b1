//! Server-side validation of create/update submissions.
//!
//! Produces either the column values to persist or a field → messages map
//! that the admin forms render under each input.

use crate::helper::form_helpers::Submission;
use crate::helper::sanitization_helpers::{sanitize_rich_text, strip_all_html};
use crate::models::db_operations::resource_db_operations::{self as resource_db, ColumnValues, DbError};
use crate::models::schema::{CrossRule, FieldKind, FieldSpec, ResourceSchema};
use crate::models::{Record, ResponsableProfile};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub type FieldErrors = BTreeMap<String, Vec<String>>;

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

fn is_email(value: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(EMAIL_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}

fn push_error(errors: &mut FieldErrors, field: &str, message: String) {
    errors.entry(field.to_string()).or_default().push(message);
}

pub fn required_message(label: &str) -> String {
    format!("Le champ {} est obligatoire.", label)
}

pub fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "off" | "non" => Some(false),
        "1" | "true" | "on" | "oui" => Some(true),
        _ => None,
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok().filter(|_| parse_datetime(raw).is_some()))
}

pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok())
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M").ok())
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").ok())
}

/// Converts one non-empty raw value according to its field kind.
fn convert(spec: &FieldSpec, raw: &str) -> Result<SqlValue, String> {
    let trimmed = raw.trim();
    match spec.kind {
        FieldKind::Text => {
            let clean = strip_all_html(trimmed);
            match spec.max_len {
                Some(max) if clean.chars().count() > max => Err(format!(
                    "Le champ {} ne doit pas dépasser {} caractères.",
                    spec.label, max
                )),
                _ => Ok(SqlValue::Text(clean)),
            }
        }
        FieldKind::RichText => Ok(SqlValue::Text(sanitize_rich_text(raw))),
        FieldKind::Integer | FieldKind::ForeignKey(_) => trimmed
            .parse::<i64>()
            .map(SqlValue::Integer)
            .map_err(|_| format!("Le champ {} doit être un entier.", spec.label)),
        FieldKind::Decimal => trimmed
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(SqlValue::Real)
            .ok_or_else(|| format!("Le champ {} doit être un nombre.", spec.label)),
        FieldKind::Boolean => parse_boolean(trimmed)
            .map(|b| SqlValue::Integer(b as i64))
            .ok_or_else(|| format!("Le champ {} doit être vrai ou faux.", spec.label)),
        FieldKind::Date => parse_date(trimmed)
            .map(|d| SqlValue::Text(d.format("%Y-%m-%d").to_string()))
            .ok_or_else(|| format!("Le champ {} n'est pas une date valide.", spec.label)),
        FieldKind::DateTime => parse_datetime(trimmed)
            .map(|d| SqlValue::Text(d.format("%Y-%m-%dT%H:%M:%S").to_string()))
            .ok_or_else(|| format!("Le champ {} n'est pas une date valide.", spec.label)),
        FieldKind::Email => {
            if is_email(trimmed) {
                Ok(SqlValue::Text(trimmed.to_lowercase()))
            } else {
                Err(format!("Le champ {} doit être une adresse email valide.", spec.label))
            }
        }
        FieldKind::Responsable => {
            let mut profile: ResponsableProfile = serde_json::from_str(trimmed)
                .map_err(|_| format!("Le champ {} doit être un JSON valide.", spec.label))?;
            profile.nom = strip_all_html(&profile.nom);
            if profile.nom.is_empty() {
                return Err("Le nom du responsable est obligatoire.".to_string());
            }
            profile.fonction = profile.fonction.map(|f| strip_all_html(&f)).filter(|f| !f.is_empty());
            profile.bio = profile.bio.map(|b| strip_all_html(&b)).filter(|b| !b.is_empty());
            serde_json::to_string(&profile)
                .map(SqlValue::Text)
                .map_err(|_| format!("Le champ {} doit être un JSON valide.", spec.label))
        }
        FieldKind::File => Err(format!("Le champ {} doit être un fichier.", spec.label)),
    }
}

fn empty_value(kind: FieldKind) -> SqlValue {
    match kind {
        FieldKind::Boolean => SqlValue::Integer(0),
        _ => SqlValue::Null,
    }
}

/// The field check that needs no database: presence, formats, lengths and
/// cross-field rules. `existing` is the stored record on update.
pub fn validate_fields(
    schema: &ResourceSchema,
    submission: &Submission,
    existing: Option<&Record>,
) -> Result<ColumnValues, FieldErrors> {
    let creating = existing.is_none();
    let mut values: ColumnValues = Vec::new();
    let mut errors = submission.file_errors.clone();

    for spec in schema.fields {
        if errors.contains_key(spec.name) {
            continue;
        }

        if spec.kind == FieldKind::File {
            if let Some(stored) = submission.files.get(spec.name) {
                values.push((spec.name, SqlValue::Text(stored.url.clone())));
            } else if submission.removals.contains(spec.name) {
                if spec.required {
                    push_error(&mut errors, spec.name, required_message(spec.label));
                } else {
                    values.push((spec.name, SqlValue::Null));
                }
            } else if creating && spec.required {
                push_error(&mut errors, spec.name, required_message(spec.label));
            }
            continue;
        }

        match submission.fields.get(spec.name) {
            None => {
                if creating && spec.required {
                    push_error(&mut errors, spec.name, required_message(spec.label));
                }
            }
            Some(raw) if raw.trim().is_empty() => {
                if spec.required {
                    push_error(&mut errors, spec.name, required_message(spec.label));
                } else {
                    values.push((spec.name, empty_value(spec.kind)));
                }
            }
            Some(raw) => match convert(spec, raw) {
                Ok(SqlValue::Text(text)) if text.is_empty() && spec.required => {
                    push_error(&mut errors, spec.name, required_message(spec.label));
                }
                Ok(value) => values.push((spec.name, value)),
                Err(message) => push_error(&mut errors, spec.name, message),
            },
        }
    }

    for rule in schema.rules {
        check_rule(schema, rule, &values, existing, &mut errors);
    }

    if errors.is_empty() {
        Ok(values)
    } else {
        Err(errors)
    }
}

/// Effective value of a date column: the submitted one, else the stored one.
fn effective_date(column: &str, values: &ColumnValues, existing: Option<&Record>) -> Option<NaiveDate> {
    match values.iter().find(|(c, _)| *c == column) {
        Some((_, SqlValue::Text(text))) => parse_date(text),
        Some(_) => None,
        None => existing.and_then(|r| r.date_field(column)),
    }
}

fn check_rule(schema: &ResourceSchema, rule: &CrossRule, values: &ColumnValues, existing: Option<&Record>, errors: &mut FieldErrors) {
    match *rule {
        CrossRule::NotBefore { field, other } => {
            if errors.contains_key(field) || errors.contains_key(other) {
                return;
            }
            if let (Some(end), Some(start)) = (effective_date(field, values, existing), effective_date(other, values, existing)) {
                if end < start {
                    let label = schema.field(field).map_or(field, |f| f.label);
                    let other_label = schema.field(other).map_or(other, |f| f.label);
                    push_error(
                        errors,
                        field,
                        format!("Le champ {} doit être une date postérieure ou égale à {}.", label, other_label),
                    );
                }
            }
        }
    }
}

/// Checks that need the database: foreign keys and unique columns.
pub fn check_references(
    conn: &Connection,
    schema: &ResourceSchema,
    values: &ColumnValues,
    existing_id: Option<i64>,
) -> Result<FieldErrors, DbError> {
    let mut errors = FieldErrors::new();
    for (column, value) in values {
        let Some(spec) = schema.field(column) else { continue };
        if let (FieldKind::ForeignKey(table), SqlValue::Integer(id)) = (spec.kind, value) {
            if !resource_db::exists(conn, table, *id)? {
                push_error(&mut errors, column, format!("Le champ {} sélectionné est invalide.", spec.label));
            }
        }
        if let (true, SqlValue::Text(text)) = (spec.unique, value) {
            if resource_db::is_taken(conn, schema, column, text, existing_id)? {
                push_error(&mut errors, column, format!("La valeur du champ {} est déjà utilisée.", spec.label));
            }
        }
    }
    Ok(errors)
}

/// Full validation: field checks first, then database checks on the values
/// that passed.
pub fn validate(
    conn: &Connection,
    schema: &ResourceSchema,
    submission: &Submission,
    existing: Option<&Record>,
) -> Result<Result<ColumnValues, FieldErrors>, DbError> {
    let values = match validate_fields(schema, submission, existing) {
        Ok(values) => values,
        Err(errors) => return Ok(Err(errors)),
    };
    let errors = check_references(conn, schema, &values, existing.map(|r| r.id))?;
    Ok(if errors.is_empty() { Ok(values) } else { Err(errors) })
}
