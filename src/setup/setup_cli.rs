use clap::{Parser, Subcommand};
use commune_backend::config::Config;
use commune_backend::models::db_operations::resource_db_operations as resource_db;
use commune_backend::models::schema::RESOURCES;
use commune_backend::setup::db_setup;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for initial commune site setup.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    Content {
        #[command(subcommand)]
        action: ContentAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    /// Creates every table and seeds the default settings.
    Setup,
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    List,
    Set {
        #[arg(long)]
        key: String,
        #[arg(long)]
        value: String,
        #[arg(long, default_value = "general")]
        group: String,
    },
}

#[derive(Subcommand, Debug)]
enum ContentAction {
    /// Row count per entity.
    Stats,
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::from_env(&cli.env_file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load or parse configuration: {}", e);
            process::exit(1);
        }
    };

    match &cli.command {
        Commands::Db { action: DbAction::Setup } => setup_database(&config),
        Commands::Settings { action } => match action {
            SettingsAction::List => list_settings(&config),
            SettingsAction::Set { key, value, group } => set_setting(&config, key, value, group),
        },
        Commands::Content { action: ContentAction::Stats } => content_stats(&config),
    }
}

fn setup_database(config: &Config) {
    let db_path = config.database_file();
    if db_path.exists() {
        println!("ℹ️ Database already exists at '{}'. Skipping creation.", db_path.display());
        return;
    }
    println!("\nSetting up commune database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        if let Err(e) = fs::create_dir_all(parent_dir) {
            eprintln!("❌ Could not create database directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::create_dir_all(&config.media_path) {
        eprintln!("❌ Could not create media directory '{}': {}", config.media_path, e);
        return;
    }

    let mut conn = match Connection::open(&db_path) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("❌ Could not create database file: {}", e);
            return;
        }
    };
    match db_setup::setup_commune_db(&mut conn) {
        Ok(_) => println!("✅ Database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up database: {}", e),
    }
}

fn open_existing(config: &Config) -> Option<Connection> {
    let db_path = config.database_file();
    if !db_path.exists() {
        eprintln!("❌ Error: Database not found at '{}'. Please run `setup_cli db setup` first.", db_path.display());
        return None;
    }
    match Connection::open(&db_path) {
        Ok(conn) => Some(conn),
        Err(e) => {
            eprintln!("❌ Error opening database: {}", e);
            None
        }
    }
}

fn list_settings(config: &Config) {
    let Some(conn) = open_existing(config) else { return };
    let mut stmt = match conn.prepare("SELECT groupe, cle, valeur FROM settings ORDER BY groupe, cle") {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Error preparing database query: {}", e);
            return;
        }
    };
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, Option<String>>(0)?.unwrap_or_default(),
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        ))
    });

    println!("Settings:");
    match rows {
        Ok(rows) => {
            for row in rows {
                match row {
                    Ok((groupe, cle, valeur)) => println!("- [{}] {} = {}", groupe, cle, valeur),
                    Err(e) => eprintln!("❌ Invalid settings row: {}", e),
                }
            }
        }
        Err(e) => eprintln!("❌ Error fetching settings: {}", e),
    }
}

fn set_setting(config: &Config, key: &str, value: &str, group: &str) {
    let Some(conn) = open_existing(config) else { return };
    match resource_db::upsert_setting(&conn, key.trim(), value, group.trim()) {
        Ok(_) => println!("✅ Setting '{}' saved.", key.trim()),
        Err(e) => eprintln!("❌ Error saving setting: {}", e),
    }
}

fn content_stats(config: &Config) {
    let Some(conn) = open_existing(config) else { return };
    println!("Content:");
    for schema in RESOURCES.iter() {
        match resource_db::count_rows(&conn, schema) {
            Ok(count) => println!("- {:<16} {:>6}", schema.slug, count),
            Err(e) => eprintln!("❌ Error counting '{}': {}", schema.slug, e),
        }
    }
}
