use std::sync::{Arc, RwLock};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
pub type DbPool = Pool<SqliteConnectionManager>;

use helper::site_helpers::SiteSettings;

pub struct AppState {
    /// Cached copy of the `settings` table used by every public page.
    pub site: Arc<RwLock<SiteSettings>>,
}

pub mod config;
pub mod controllers;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod setup;
