use crate::models::db_operations::resource_db_operations::read_setting;
use crate::AppState;
use rusqlite::Connection;
use serde::Serialize;

/// Site-wide values rendered in every public page (header, footer, contact).
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SiteSettings {
    pub site_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub address: String,
    pub footer_text: String,
}

// Takes a direct connection: also called once at startup, before the app is built.
pub fn load_site_settings(conn: &Connection) -> SiteSettings {
    let read = |key: &str| match read_setting(conn, key) {
        Ok(value) => value,
        Err(e) => {
            log::error!("Failed to read setting '{}': {}", key, e);
            None
        }
    };
    let site_name = read("site_name")
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "Commune".to_string());
    SiteSettings {
        site_name,
        contact_email: read("contact_email").unwrap_or_default(),
        contact_phone: read("contact_phone").unwrap_or_default(),
        address: read("address").unwrap_or_default(),
        footer_text: read("footer_text").unwrap_or_default(),
    }
}

/// Re-reads the settings table into the shared cache.
pub fn refresh_site_settings(state: &AppState, conn: &Connection) {
    let fresh = load_site_settings(conn);
    let mut cached = state.site.write().unwrap_or_else(|poisoned| {
        log::error!("RwLock for site settings was poisoned! Overwriting stale data.");
        poisoned.into_inner()
    });
    *cached = fresh;
    log::info!("Site settings cache refreshed.");
}

pub fn current_site_settings(state: &AppState) -> SiteSettings {
    state
        .site
        .read()
        .unwrap_or_else(|poisoned| {
            log::error!("RwLock for site settings was poisoned! Using stale data.");
            poisoned.into_inner()
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::resource_db_operations::upsert_setting;
    use crate::setup::db_setup::setup_commune_db;
    use std::sync::{Arc, RwLock};

    #[test]
    fn settings_are_loaded_and_refreshed() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_commune_db(&mut conn).unwrap();
        let state = AppState { site: Arc::new(RwLock::new(load_site_settings(&conn))) };
        assert_eq!(current_site_settings(&state).site_name, "Commune");

        upsert_setting(&conn, "site_name", "Commune de Gorée", "general").unwrap();
        upsert_setting(&conn, "contact_phone", "+221 33 000 00 00", "contact").unwrap();
        refresh_site_settings(&state, &conn);
        let site = current_site_settings(&state);
        assert_eq!(site.site_name, "Commune de Gorée");
        assert_eq!(site.contact_phone, "+221 33 000 00 00");
    }

    #[test]
    fn blank_site_name_falls_back() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_commune_db(&mut conn).unwrap();
        upsert_setting(&conn, "site_name", "  ", "general").unwrap();
        assert_eq!(load_site_settings(&conn).site_name, "Commune");
    }

    #[test]
    fn unreadable_settings_fall_back_to_defaults() {
        let conn = Connection::open_in_memory().unwrap();
        let site = load_site_settings(&conn);
        assert_eq!(site.site_name, "Commune");
        assert!(site.contact_email.is_empty());
    }
}
