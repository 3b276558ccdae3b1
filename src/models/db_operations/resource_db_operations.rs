use crate::helper::listing_helpers::ResolvedListing;
use crate::models::schema::{FieldKind, ResourceSchema, TIMESTAMP_COLUMNS};
use crate::models::{OrderEntry, Page, Record};
use chrono::{SecondsFormat, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Item not found in database: {0}")]
    NotFound(String),
    #[error("Invalid reorder request: {0}")]
    InvalidOrder(String),
}

type DbResult<T> = Result<T, DbError>;

/// Column/value pairs ready to be written. Column names always come from a schema.
pub type ColumnValues = Vec<(&'static str, SqlValue)>;

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn json_from_sql(kind: Option<FieldKind>, value: ValueRef<'_>) -> Value {
    match (kind, value) {
        (_, ValueRef::Null) => Value::Null,
        (Some(FieldKind::Boolean), ValueRef::Integer(i)) => Value::Bool(i != 0),
        (Some(FieldKind::Decimal), ValueRef::Integer(i)) => Number::from_f64(i as f64).map_or(Value::Null, Value::Number),
        (_, ValueRef::Integer(i)) => Value::from(i),
        (_, ValueRef::Real(f)) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        (Some(FieldKind::Responsable), ValueRef::Text(bytes)) => {
            let text = String::from_utf8_lossy(bytes);
            serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.into_owned()))
        }
        (_, ValueRef::Text(bytes)) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        (_, ValueRef::Blob(_)) => Value::Null,
    }
}

/// Maps a row selected with `schema.select_columns()` into a [`Record`].
fn row_to_record(schema: &ResourceSchema, row: &Row<'_>) -> rusqlite::Result<Record> {
    let id: i64 = row.get(0)?;
    let mut fields = Map::new();
    for (i, field) in schema.fields.iter().enumerate() {
        fields.insert(field.name.to_string(), json_from_sql(Some(field.kind), row.get_ref(i + 1)?));
    }
    let offset = schema.fields.len() + 1;
    for (i, column) in TIMESTAMP_COLUMNS.iter().enumerate() {
        fields.insert(column.to_string(), json_from_sql(None, row.get_ref(offset + i)?));
    }
    Ok(Record { id, fields })
}

/// Per-connection setup: foreign keys on, plus `unicode_lower()` for search.
/// SQLite's own `lower()` and `LIKE` only fold ASCII, so "école" would miss "École".
pub fn prepare_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.create_scalar_function(
        "unicode_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            Ok(match ctx.get_raw(0) {
                ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).to_lowercase()),
                ValueRef::Integer(i) => Some(i.to_string()),
                ValueRef::Real(f) => Some(f.to_string()),
                ValueRef::Null | ValueRef::Blob(_) => None,
            })
        },
    )
}

/// Lowercases the search and escapes `%`, `_` and `\` so it matches literally inside LIKE.
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn where_clause(schema: &ResourceSchema, listing: &ResolvedListing) -> (String, Vec<SqlValue>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if let Some(search) = &listing.search {
        let columns: Vec<&str> = schema.searchable_columns().collect();
        if !columns.is_empty() {
            params.push(SqlValue::Text(like_pattern(search)));
            let n = params.len();
            let any = columns
                .iter()
                .map(|c| format!("unicode_lower({}) LIKE ?{} ESCAPE '\\'", c, n))
                .collect::<Vec<_>>()
                .join(" OR ");
            conditions.push(format!("({})", any));
        }
    }

    for (column, value) in &listing.filters {
        params.push(value.clone());
        conditions.push(format!("{} = ?{}", column, params.len()));
    }

    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), params)
    }
}

fn order_clause(listing: &ResolvedListing) -> String {
    format!(" ORDER BY {} {}, id ASC", listing.sort, listing.direction.as_sql())
}

pub fn count(conn: &Connection, schema: &ResourceSchema, listing: &ResolvedListing) -> DbResult<u64> {
    let (where_sql, params) = where_clause(schema, listing);
    let sql = format!("SELECT COUNT(*) FROM {}{}", schema.table, where_sql);
    let total: i64 = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
    Ok(total.max(0) as u64)
}

/// One page of the filtered, sorted listing.
pub fn list_page(conn: &Connection, schema: &ResourceSchema, listing: &ResolvedListing) -> DbResult<Page<Record>> {
    let total = count(conn, schema, listing)?;
    let (where_sql, mut params) = where_clause(schema, listing);
    params.push(SqlValue::Integer(listing.per_page as i64));
    params.push(SqlValue::Integer(listing.offset() as i64));
    let sql = format!(
        "SELECT {} FROM {}{}{} LIMIT ?{} OFFSET ?{}",
        schema.select_columns(),
        schema.table,
        where_sql,
        order_clause(listing),
        params.len() - 1,
        params.len()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| row_to_record(schema, row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(rows, listing.page, listing.per_page, total))
}

/// The whole filtered, sorted listing. Used by unpaginated entities and exports.
pub fn list_all(conn: &Connection, schema: &ResourceSchema, listing: &ResolvedListing) -> DbResult<Vec<Record>> {
    let (where_sql, params) = where_clause(schema, listing);
    let sql = format!(
        "SELECT {} FROM {}{}{}",
        schema.select_columns(),
        schema.table,
        where_sql,
        order_clause(listing)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| row_to_record(schema, row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find(conn: &Connection, schema: &ResourceSchema, id: i64) -> DbResult<Option<Record>> {
    let sql = format!("SELECT {} FROM {} WHERE id = ?1", schema.select_columns(), schema.table);
    Ok(conn.query_row(&sql, [id], |row| row_to_record(schema, row)).optional()?)
}

pub fn exists(conn: &Connection, table: &str, id: i64) -> DbResult<bool> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table);
    Ok(conn.query_row(&sql, [id], |row| row.get(0))?)
}

/// True when another row already holds `value` in a unique column.
pub fn is_taken(conn: &Connection, schema: &ResourceSchema, column: &str, value: &str, except_id: Option<i64>) -> DbResult<bool> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1 AND id != ?2)",
        schema.table, column
    );
    Ok(conn.query_row(&sql, params![value, except_id.unwrap_or(-1)], |row| row.get(0))?)
}

fn next_ordre(conn: &Connection, schema: &ResourceSchema) -> DbResult<i64> {
    let sql = format!("SELECT COALESCE(MAX(ordre), 0) + 1 FROM {}", schema.table);
    Ok(conn.query_row(&sql, [], |row| row.get(0))?)
}

/// Turns the exclusive flag off everywhere except on `keep_id`.
fn enforce_exclusive(conn: &Connection, schema: &ResourceSchema, values: &ColumnValues, keep_id: i64) -> DbResult<()> {
    let Some(toggle) = schema.toggle.filter(|t| t.exclusive) else {
        return Ok(());
    };
    let switched_on = values
        .iter()
        .any(|(column, value)| *column == toggle.column && *value == SqlValue::Integer(1));
    if switched_on {
        let sql = format!("UPDATE {} SET {} = 0, updated_at = ?1 WHERE id != ?2 AND {} = 1", schema.table, toggle.column, toggle.column);
        conn.execute(&sql, params![now_timestamp(), keep_id])?;
    }
    Ok(())
}

pub fn insert(conn: &mut Connection, schema: &ResourceSchema, mut values: ColumnValues) -> DbResult<Record> {
    let tx = conn.transaction()?;

    if schema.has_ordre() && !values.iter().any(|(column, _)| *column == "ordre") {
        values.push(("ordre", SqlValue::Integer(next_ordre(&tx, schema)?)));
    }
    let now = now_timestamp();
    values.push(("created_at", SqlValue::Text(now.clone())));
    values.push(("updated_at", SqlValue::Text(now)));

    let columns: Vec<&str> = values.iter().map(|(column, _)| *column).collect();
    let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        schema.table,
        columns.join(", "),
        placeholders.join(", ")
    );
    tx.execute(&sql, params_from_iter(values.iter().map(|(_, v)| v)))?;
    let id = tx.last_insert_rowid();
    enforce_exclusive(&tx, schema, &values, id)?;

    let record = find(&tx, schema, id)?.ok_or_else(|| DbError::NotFound(format!("{} #{}", schema.slug, id)))?;
    tx.commit()?;
    Ok(record)
}

pub fn update(conn: &mut Connection, schema: &ResourceSchema, id: i64, mut values: ColumnValues) -> DbResult<Record> {
    let tx = conn.transaction()?;

    values.push(("updated_at", SqlValue::Text(now_timestamp())));
    let assignments: Vec<String> = values
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        schema.table,
        assignments.join(", "),
        values.len() + 1
    );
    let mut params: Vec<SqlValue> = values.iter().map(|(_, v)| v.clone()).collect();
    params.push(SqlValue::Integer(id));
    if tx.execute(&sql, params_from_iter(params.iter()))? == 0 {
        return Err(DbError::NotFound(format!("{} #{}", schema.slug, id)));
    }
    enforce_exclusive(&tx, schema, &values, id)?;

    let record = find(&tx, schema, id)?.ok_or_else(|| DbError::NotFound(format!("{} #{}", schema.slug, id)))?;
    tx.commit()?;
    Ok(record)
}

/// Deletes a row and returns it so the caller can release its stored files.
pub fn delete(conn: &Connection, schema: &ResourceSchema, id: i64) -> DbResult<Record> {
    let record = find(conn, schema, id)?.ok_or_else(|| DbError::NotFound(format!("{} #{}", schema.slug, id)))?;
    conn.execute(&format!("DELETE FROM {} WHERE id = ?1", schema.table), [id])?;
    Ok(record)
}

/// Applies a full `{id, ordre}` mapping in one transaction. Either every row
/// is updated or none is.
pub fn update_order(conn: &mut Connection, schema: &ResourceSchema, orders: &[OrderEntry]) -> DbResult<()> {
    if orders.is_empty() {
        return Err(DbError::InvalidOrder("The order list is empty.".to_string()));
    }
    let mut seen = HashSet::new();
    for entry in orders {
        if !seen.insert(entry.id) {
            return Err(DbError::InvalidOrder(format!("Item {} appears more than once.", entry.id)));
        }
        if entry.ordre < 1 {
            return Err(DbError::InvalidOrder(format!("Item {} has an invalid rank {}.", entry.id, entry.ordre)));
        }
    }

    let tx = conn.transaction()?;
    {
        let sql = format!("UPDATE {} SET ordre = ?1, updated_at = ?2 WHERE id = ?3", schema.table);
        let mut stmt = tx.prepare(&sql)?;
        let now = now_timestamp();
        for entry in orders {
            if stmt.execute(params![entry.ordre, now, entry.id])? == 0 {
                // Dropping the transaction rolls back the rows already updated.
                return Err(DbError::NotFound(format!("{} #{}", schema.slug, entry.id)));
            }
        }
    }
    tx.commit()?;
    Ok(())
}

/// Flips a boolean column. For an exclusive flag, switching it on switches it
/// off on every other row inside the same transaction.
pub fn toggle(conn: &mut Connection, schema: &ResourceSchema, id: i64, column: &'static str) -> DbResult<Record> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let sql = format!(
        "UPDATE {} SET {col} = CASE WHEN {col} = 1 THEN 0 ELSE 1 END, updated_at = ?1 WHERE id = ?2",
        schema.table,
        col = column
    );
    if tx.execute(&sql, params![now_timestamp(), id])? == 0 {
        return Err(DbError::NotFound(format!("{} #{}", schema.slug, id)));
    }
    let flipped: i64 = tx.query_row(&format!("SELECT {} FROM {} WHERE id = ?1", column, schema.table), [id], |row| row.get(0))?;
    let values: ColumnValues = vec![(column, SqlValue::Integer(flipped))];
    enforce_exclusive(&tx, schema, &values, id)?;

    let record = find(&tx, schema, id)?.ok_or_else(|| DbError::NotFound(format!("{} #{}", schema.slug, id)))?;
    tx.commit()?;
    Ok(record)
}

pub fn count_rows(conn: &Connection, schema: &ResourceSchema) -> DbResult<i64> {
    Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", schema.table), [], |row| row.get(0))?)
}

pub fn read_setting(conn: &Connection, key: &str) -> DbResult<Option<String>> {
    Ok(conn
        .query_row("SELECT valeur FROM settings WHERE cle = ?1", [key], |row| row.get(0))
        .optional()?)
}

pub fn upsert_setting(conn: &Connection, key: &str, value: &str, groupe: &str) -> DbResult<()> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO settings (cle, valeur, groupe, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(cle) DO UPDATE SET valeur = excluded.valeur, updated_at = excluded.updated_at",
        params![key, value, groupe, now],
    )?;
    Ok(())
}
