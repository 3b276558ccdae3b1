use crate::models::db_operations::resource_db_operations::now_timestamp;
use crate::models::schema::RESOURCES;
use rusqlite::{params, Connection, Result as RusqliteResult, Transaction};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Site settings every installation starts with: (key, value, group, label).
pub const DEFAULT_SETTINGS: [(&str, &str, &str, &str); 5] = [
    ("site_name", "Commune", "general", "Nom du site"),
    ("contact_email", "", "contact", "Email de contact"),
    ("contact_phone", "", "contact", "Téléphone"),
    ("address", "", "contact", "Adresse de la mairie"),
    ("footer_text", "", "general", "Texte du pied de page"),
];

pub fn setup_commune_db(conn: &mut Connection) -> Result<(), SetupError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    let tx = conn.transaction()?;
    for schema in RESOURCES.iter() {
        log::info!("Creating '{}' table...", schema.table);
        tx.execute(&schema.create_table_sql(), [])?;
        if schema.has_ordre() {
            tx.execute(
                &format!("CREATE INDEX IF NOT EXISTS idx_{}_ordre ON {} (ordre)", schema.table, schema.table),
                [],
            )?;
        }
    }

    seed_initial_settings(&tx)?;

    tx.commit()?;
    Ok(())
}

fn seed_initial_settings(tx: &Transaction) -> RusqliteResult<()> {
    log::info!("Seeding initial settings...");
    let now = now_timestamp();
    for (key, value, groupe, label) in DEFAULT_SETTINGS {
        tx.execute(
            "INSERT OR IGNORE INTO settings (cle, valeur, groupe, label, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![key, value, groupe, label, now],
        )?;
    }
    Ok(())
}
