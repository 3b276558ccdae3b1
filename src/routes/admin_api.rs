use crate::config::Config;
use crate::helper::admin_helpers::{self, AdminHelperError};
use crate::helper::export_helpers::{self, ExportFormat};
use crate::helper::form_helpers;
use crate::helper::listing_helpers::ListingQuery;
use crate::helper::media_helpers;
use crate::helper::site_helpers;
use crate::middleware::XhrCsrfGuard;
use crate::models::db_operations::resource_db_operations as resource_db;
use crate::models::schema::{find_resource, ResourceSchema, SETTINGS};
use crate::models::ReorderRequest;
use crate::routes::api_error::{ApiError, ApiResult};
use crate::{AppState, DbPool};
use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use rusqlite::Connection;
use serde_json::json;
use std::path::{Path, PathBuf};
use url::form_urlencoded;

pub fn config_admin_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin/api")
            .wrap(XhrCsrfGuard)
            .app_data(web::JsonConfig::default().error_handler(|err, _| {
                ApiError::BadRequest(format!("Corps JSON invalide : {}.", err)).into()
            }))
            .route("/{entity}", web::get().to(list_resources))
            .route("/{entity}", web::post().to(create_resource))
            // Before `/{entity}/{id}` so the literal segment wins.
            .route("/{entity}/update-order", web::post().to(update_order))
            .route("/{entity}/{id:\\d+}", web::get().to(show_resource))
            .route("/{entity}/{id:\\d+}", web::post().to(update_resource_via_post))
            .route("/{entity}/{id:\\d+}", web::put().to(update_resource))
            .route("/{entity}/{id:\\d+}", web::patch().to(update_resource))
            .route("/{entity}/{id:\\d+}", web::delete().to(delete_resource))
            .route("/{entity}/{id:\\d+}/{action}", web::post().to(toggle_resource)),
    );
}

fn resolve_entity(slug: &str) -> ApiResult<&'static ResourceSchema> {
    find_resource(slug).ok_or_else(|| ApiError::NotFound(format!("Ressource inconnue : {}.", slug)))
}

/// Runs `f` on a pooled connection inside the blocking thread pool.
async fn run_db<F, T>(pool: &web::Data<DbPool>, f: F) -> ApiResult<T>
where
    F: FnOnce(&mut Connection) -> Result<T, AdminHelperError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    let result = web::block(move || {
        let mut conn = admin_helpers::get_conn(&pool)?;
        f(&mut conn)
    })
    .await?;
    result.map_err(ApiError::from)
}

fn remove_files(media_root: &Path, urls: &[String]) {
    for url in urls {
        media_helpers::remove_stored(media_root, url);
    }
}

async fn refresh_settings_if_needed(
    schema: &'static ResourceSchema,
    pool: &web::Data<DbPool>,
    app_state: &web::Data<AppState>,
) -> ApiResult<()> {
    if schema.slug != SETTINGS.slug {
        return Ok(());
    }
    let state = app_state.clone();
    run_db(pool, move |conn| {
        site_helpers::refresh_site_settings(&state, conn);
        Ok(())
    })
    .await
}

async fn list_resources(
    req: HttpRequest,
    path: web::Path<String>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let schema = resolve_entity(&path)?;
    let listing = ListingQuery::parse(req.query_string()).resolve(schema, &config.listing);

    let export = form_urlencoded::parse(req.query_string().as_bytes())
        .find(|(key, _)| *key == "export")
        .map(|(_, value)| value.into_owned());

    if let Some(requested) = export {
        let format = ExportFormat::parse(&requested)
            .ok_or_else(|| ApiError::BadRequest(format!("Format d'export non supporté : {}.", requested)))?;
        let records = run_db(&pool, move |conn| Ok(resource_db::list_all(conn, schema, &listing)?)).await?;
        log::info!("Exporting {} {} rows as {}.", records.len(), schema.slug, format.extension());
        let body = export_helpers::build_csv(schema, &records);
        let disposition = ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(export_helpers::export_filename(schema, format))],
        };
        return Ok(HttpResponse::Ok()
            .content_type(format.content_type())
            .insert_header(disposition)
            .body(body));
    }

    if schema.paginated {
        let page = run_db(&pool, move |conn| Ok(resource_db::list_page(conn, schema, &listing)?)).await?;
        Ok(HttpResponse::Ok().json(page))
    } else {
        let data = run_db(&pool, move |conn| Ok(resource_db::list_all(conn, schema, &listing)?)).await?;
        Ok(HttpResponse::Ok().json(json!({ "data": data })))
    }
}

async fn show_resource(path: web::Path<(String, i64)>, pool: web::Data<DbPool>) -> ApiResult<HttpResponse> {
    let (slug, id) = path.into_inner();
    let schema = resolve_entity(&slug)?;
    let record = run_db(&pool, move |conn| admin_helpers::show_record(conn, schema, id)).await?;
    Ok(HttpResponse::Ok().json(json!({ "data": record })))
}

async fn create_resource(
    path: web::Path<String>,
    payload: Multipart,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    app_state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let schema = resolve_entity(&path)?;
    let media_root = PathBuf::from(&config.media_path);
    let submission = form_helpers::read_submission(payload, schema, &media_root, &config.uploads).await?;
    let uploaded: Vec<String> = submission.files.values().map(|f| f.url.clone()).collect();

    let created = run_db(&pool, move |conn| admin_helpers::create_record(conn, schema, &submission)).await;
    let record = match created {
        Ok(record) => record,
        Err(e) => {
            remove_files(&media_root, &uploaded);
            return Err(e);
        }
    };
    log::info!("Created {} #{}.", schema.slug, record.id);
    refresh_settings_if_needed(schema, &pool, &app_state).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": format!("{} : élément créé avec succès.", schema.label),
        "data": record,
    })))
}

/// Multipart PUT is awkward for browsers, so forms POST with `_method=PUT`.
async fn update_resource_via_post(
    path: web::Path<(String, i64)>,
    payload: Multipart,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    app_state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    apply_update(path, payload, pool, config, app_state, true).await
}

async fn update_resource(
    path: web::Path<(String, i64)>,
    payload: Multipart,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    app_state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    apply_update(path, payload, pool, config, app_state, false).await
}

async fn apply_update(
    path: web::Path<(String, i64)>,
    payload: Multipart,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    app_state: web::Data<AppState>,
    needs_override: bool,
) -> ApiResult<HttpResponse> {
    let (slug, id) = path.into_inner();
    let schema = resolve_entity(&slug)?;
    let media_root = PathBuf::from(&config.media_path);
    let submission = form_helpers::read_submission(payload, schema, &media_root, &config.uploads).await?;

    if needs_override && !matches!(submission.method_override.as_deref(), Some("PUT") | Some("PATCH")) {
        submission.discard_files(&media_root);
        return Err(ApiError::MethodNotAllowed);
    }

    let uploaded: Vec<String> = submission.files.values().map(|f| f.url.clone()).collect();
    let updated = run_db(&pool, move |conn| admin_helpers::update_record(conn, schema, id, &submission)).await;
    let (record, released) = match updated {
        Ok(result) => result,
        Err(e) => {
            remove_files(&media_root, &uploaded);
            return Err(e);
        }
    };
    remove_files(&media_root, &released);
    log::info!("Updated {} #{}.", schema.slug, id);
    refresh_settings_if_needed(schema, &pool, &app_state).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("{} : élément mis à jour avec succès.", schema.label),
        "data": record,
    })))
}

async fn delete_resource(
    path: web::Path<(String, i64)>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    app_state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let (slug, id) = path.into_inner();
    let schema = resolve_entity(&slug)?;
    let (_, released) = run_db(&pool, move |conn| admin_helpers::delete_record(conn, schema, id)).await?;
    remove_files(Path::new(&config.media_path), &released);
    log::info!("Deleted {} #{}.", schema.slug, id);
    refresh_settings_if_needed(schema, &pool, &app_state).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("{} : élément supprimé avec succès.", schema.label),
    })))
}

async fn update_order(
    path: web::Path<String>,
    body: web::Json<ReorderRequest>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> ApiResult<HttpResponse> {
    let schema = resolve_entity(&path)?;
    if !schema.reorderable {
        return Err(ApiError::NotFound(format!("{} ne peut pas être réordonné.", schema.label)));
    }
    let orders = body.into_inner().orders;
    let count = orders.len();
    let listing = ListingQuery::default().resolve(schema, &config.listing);

    let data = run_db(&pool, move |conn| {
        admin_helpers::reorder_records(conn, schema, &orders)?;
        Ok(resource_db::list_all(conn, schema, &listing)?)
    })
    .await?;
    log::info!("Reordered {} {} rows.", count, schema.slug);

    Ok(HttpResponse::Ok().json(json!({
        "message": "Ordre mis à jour avec succès.",
        "data": data,
    })))
}

async fn toggle_resource(path: web::Path<(String, i64, String)>, pool: web::Data<DbPool>) -> ApiResult<HttpResponse> {
    let (slug, id, action) = path.into_inner();
    let schema = resolve_entity(&slug)?;
    let toggle = schema
        .toggle
        .filter(|t| t.action == action)
        .ok_or_else(|| ApiError::NotFound(format!("Action inconnue : {}.", action)))?;

    let record = run_db(&pool, move |conn| admin_helpers::toggle_record(conn, schema, id, toggle.column)).await?;
    let message = if record.bool_field(toggle.column) {
        "Élément activé avec succès."
    } else {
        "Élément désactivé avec succès."
    };
    Ok(HttpResponse::Ok().json(json!({ "message": message, "data": record })))
}
