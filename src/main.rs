use actix_cors::Cors;
use actix_web::{middleware::{DefaultHeaders, Logger}, web, App, HttpServer};
use clap::Parser;
use commune_backend::models::db_operations::resource_db_operations as resource_db;
use commune_backend::{config::Config, helper::site_helpers, routes, AppState};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tera::Tera;

#[derive(Parser, Debug)]
#[command(name = "commune_server", author, version, about = "Starts the commune web server.")]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

fn fatal(message: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("FATAL: {}", message))
}

fn build_cors(allowed_origins: &str) -> Cors {
    let origins: Vec<&str> = allowed_origins.split(',').map(str::trim).filter(|o| !o.is_empty()).collect();
    if origins.contains(&"*") {
        log::warn!("CORS is configured to allow any origin.");
        return Cors::permissive();
    }
    let cors = origins.iter().fold(Cors::default(), |cors, origin| cors.allowed_origin(origin));
    cors.allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
        .allowed_headers(vec![
            actix_web::http::header::ACCEPT,
            actix_web::http::header::CONTENT_TYPE,
            actix_web::http::header::HeaderName::from_static("x-csrf-token"),
            actix_web::http::header::HeaderName::from_static("x-requested-with"),
        ])
        .supports_credentials()
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .map_err(|e| fatal(format!("Failed to load or parse configuration: {}", e)))?;

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    let tera = Tera::new("templates/**/*.html").map_err(|e| fatal(format!("Tera initialization failed: {}", e)))?;

    let db_file = config.database_file();
    if !db_file.exists() {
        return Err(fatal(format!(
            "{} not found. Run 'cargo run --bin setup_cli -- --env-file <path> db setup'",
            db_file.display()
        )));
    }
    fs::create_dir_all(&config.media_path)?;

    let manager = SqliteConnectionManager::file(&db_file).with_init(|conn| resource_db::prepare_connection(conn));
    let pool = Pool::builder()
        .build(manager)
        .map_err(|e| fatal(format!("Failed to create Rusqlite connection pool: {}", e)))?;

    let initial_site = {
        let conn = pool.get().map_err(|e| fatal(format!("Failed to get DB connection for initial setup: {}", e)))?;
        site_helpers::load_site_settings(&conn)
    };
    let app_state = web::Data::new(AppState {
        site: Arc::new(RwLock::new(initial_site)),
    });

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    log::info!("Starting server at http://{}", server_address);

    let config_data = web::Data::new(config.clone());
    let tera_data = web::Data::new(tera);
    let pool_data = web::Data::new(pool);

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&config.allowed_origins))
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("Referrer-Policy", "strict-origin-when-cross-origin")),
            )
            .app_data(config_data.clone())
            .app_data(tera_data.clone())
            .app_data(pool_data.clone())
            .app_data(app_state.clone())
            .service(actix_files::Files::new("/media", &config.media_path))
            .service(actix_files::Files::new("/static", "./static"))
            .configure(routes::config_app)
    })
    .bind(server_address)?
    .run()
    .await
}
