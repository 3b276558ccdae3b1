pub mod admin_api;
pub mod api_error;
pub mod public;

use actix_web::web;

/// Every route of the application: the admin JSON API, the health check and
/// the public site. Media serving is mounted by the binary.
pub fn config_app(cfg: &mut web::ServiceConfig) {
    cfg.configure(admin_api::config_admin_api)
        .configure(public::config_api)
        .configure(public::config_site);
}
