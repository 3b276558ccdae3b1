use crate::helper::form_helpers::Submission;
use crate::helper::validation_helpers::{self, FieldErrors};
use crate::models::db_operations::resource_db_operations::{self as resource_db, DbError};
use crate::models::schema::ResourceSchema;
use crate::models::{OrderEntry, Record};
use crate::DbPool;
use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdminHelperError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("The given data was invalid.")]
    Validation(FieldErrors),
    #[error("{0} not found")]
    NotFound(String),
}

pub type PooledConn = r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>;

// Helper to get a connection from the pool
pub fn get_conn(pool: &DbPool) -> Result<PooledConn, AdminHelperError> {
    pool.get().map_err(AdminHelperError::Pool)
}

fn not_found(schema: &ResourceSchema, id: i64) -> AdminHelperError {
    AdminHelperError::NotFound(format!("{} #{}", schema.label, id))
}

/// Stored file URLs of `before` that `after` no longer references.
pub fn released_files(schema: &ResourceSchema, before: &Record, after: Option<&Record>) -> Vec<String> {
    schema
        .file_fields()
        .filter_map(|field| {
            let old = before.str_field(field.name)?;
            let still_used = after.and_then(|r| r.str_field(field.name)) == Some(old);
            (!still_used).then(|| old.to_string())
        })
        .collect()
}

pub fn show_record(conn: &Connection, schema: &ResourceSchema, id: i64) -> Result<Record, AdminHelperError> {
    resource_db::find(conn, schema, id)?.ok_or_else(|| not_found(schema, id))
}

pub fn create_record(conn: &mut Connection, schema: &ResourceSchema, submission: &Submission) -> Result<Record, AdminHelperError> {
    let values = validation_helpers::validate(conn, schema, submission, None)?
        .map_err(AdminHelperError::Validation)?;
    Ok(resource_db::insert(conn, schema, values)?)
}

/// Returns the updated record and the file URLs it released.
pub fn update_record(
    conn: &mut Connection,
    schema: &ResourceSchema,
    id: i64,
    submission: &Submission,
) -> Result<(Record, Vec<String>), AdminHelperError> {
    let existing = show_record(conn, schema, id)?;
    let values = validation_helpers::validate(conn, schema, submission, Some(&existing))?
        .map_err(AdminHelperError::Validation)?;
    let updated = if values.is_empty() {
        existing.clone()
    } else {
        resource_db::update(conn, schema, id, values)?
    };
    let released = released_files(schema, &existing, Some(&updated));
    Ok((updated, released))
}

/// Returns the deleted record and every file URL it held.
pub fn delete_record(conn: &Connection, schema: &ResourceSchema, id: i64) -> Result<(Record, Vec<String>), AdminHelperError> {
    let deleted = match resource_db::delete(conn, schema, id) {
        Err(DbError::NotFound(_)) => return Err(not_found(schema, id)),
        other => other?,
    };
    let released = released_files(schema, &deleted, None);
    Ok((deleted, released))
}

pub fn toggle_record(conn: &mut Connection, schema: &ResourceSchema, id: i64, column: &'static str) -> Result<Record, AdminHelperError> {
    match resource_db::toggle(conn, schema, id, column) {
        Err(DbError::NotFound(_)) => Err(not_found(schema, id)),
        other => Ok(other?),
    }
}

/// Applies a bulk reorder; rejections come back as a validation error on `orders`.
pub fn reorder_records(conn: &mut Connection, schema: &ResourceSchema, orders: &[OrderEntry]) -> Result<(), AdminHelperError> {
    match resource_db::update_order(conn, schema, orders) {
        Ok(()) => Ok(()),
        Err(DbError::InvalidOrder(message)) => Err(order_error(message)),
        Err(DbError::NotFound(what)) => Err(order_error(format!("Élément introuvable : {}.", what))),
        Err(e) => Err(e.into()),
    }
}

fn order_error(message: String) -> AdminHelperError {
    let mut errors = FieldErrors::new();
    errors.insert("orders".to_string(), vec![message]);
    AdminHelperError::Validation(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::media_helpers::StoredFile;
    use crate::models::schema::{ACTUALITES, ADJOINTS, CATEGORIES, SLIDES};
    use crate::setup::db_setup::setup_commune_db;
    use std::path::PathBuf;

    fn conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        resource_db::prepare_connection(&conn).unwrap();
        setup_commune_db(&mut conn).unwrap();
        conn
    }

    fn stored(url: &str) -> StoredFile {
        StoredFile { url: url.to_string(), path: PathBuf::from("/unused"), original_filename: "x.jpg".into(), size: 1 }
    }

    #[test]
    fn unknown_category_is_a_field_error() {
        let mut conn = conn();
        let submission = Submission::from_fields([("titre", "Marché"), ("category_id", "42")]);
        match create_record(&mut conn, &ACTUALITES, &submission) {
            Err(AdminHelperError::Validation(errors)) => {
                assert_eq!(errors["category_id"], vec!["Le champ catégorie sélectionné est invalide.".to_string()]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn duplicate_unique_value_is_rejected_except_on_itself() {
        let mut conn = conn();
        let first = create_record(&mut conn, &CATEGORIES, &Submission::from_fields([("nom", "Culture")])).unwrap();
        assert!(matches!(
            create_record(&mut conn, &CATEGORIES, &Submission::from_fields([("nom", "Culture")])),
            Err(AdminHelperError::Validation(_))
        ));
        assert!(update_record(&mut conn, &CATEGORIES, first.id, &Submission::from_fields([("nom", "Culture")])).is_ok());
    }

    #[test]
    fn replacing_a_file_releases_the_old_one() {
        let mut conn = conn();
        let mut submission = Submission::from_fields([("titre", "Bienvenue")]);
        submission.files.insert("image", stored("/media/slides/aa/bb/old.jpg"));
        let slide = create_record(&mut conn, &SLIDES, &submission).unwrap();

        let (_, released) = update_record(&mut conn, &SLIDES, slide.id, &Submission::from_fields([("titre", "Accueil")])).unwrap();
        assert!(released.is_empty());

        let mut replace = Submission::default();
        replace.files.insert("image", stored("/media/slides/cc/dd/new.jpg"));
        let (updated, released) = update_record(&mut conn, &SLIDES, slide.id, &replace).unwrap();
        assert_eq!(updated.str_field("image"), Some("/media/slides/cc/dd/new.jpg"));
        assert_eq!(released, ["/media/slides/aa/bb/old.jpg"]);

        let (_, released) = delete_record(&conn, &SLIDES, slide.id).unwrap();
        assert_eq!(released, ["/media/slides/cc/dd/new.jpg"]);
        assert!(matches!(delete_record(&conn, &SLIDES, slide.id), Err(AdminHelperError::NotFound(_))));
    }

    #[test]
    fn invalid_reorders_are_validation_errors() {
        let mut conn = conn();
        let adjoint = create_record(&mut conn, &ADJOINTS, &Submission::from_fields([("nom", "Sarr"), ("fonction", "1er adjoint")])).unwrap();
        let missing = [OrderEntry { id: adjoint.id, ordre: 1 }, OrderEntry { id: adjoint.id + 100, ordre: 2 }];
        assert!(matches!(reorder_records(&mut conn, &ADJOINTS, &missing), Err(AdminHelperError::Validation(_))));
        assert!(matches!(reorder_records(&mut conn, &ADJOINTS, &[]), Err(AdminHelperError::Validation(_))));
    }
}
