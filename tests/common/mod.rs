#![allow(dead_code)]

use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use commune_backend::config::{Config, ListingConfig, UploadConfig, WebConfig};
use commune_backend::controllers::api_client::{classify_response, ApiClient, ApiOutcome, ApiRequest, HttpMethod};
use commune_backend::helper::admin_helpers;
use commune_backend::helper::form_helpers::Submission;
use commune_backend::helper::site_helpers;
use commune_backend::models::db_operations::resource_db_operations as resource_db;
use commune_backend::models::schema::ResourceSchema;
use commune_backend::models::Record;
use commune_backend::setup::db_setup::setup_commune_db;
use commune_backend::{routes, AppState, DbPool};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tempfile::TempDir;
use tera::Tera;

pub const CSRF_TOKEN: &str = "test-csrf-token";
pub const CSRF_COOKIE: &str = "XSRF-TOKEN";

/// A fresh database and media root in a temporary directory.
pub struct TestContext {
    pub dir: TempDir,
    pub config: Config,
    pub pool: DbPool,
}

impl TestContext {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let database_path = dir.path().join("db");
        let media_path = dir.path().join("media");
        std::fs::create_dir_all(&database_path).expect("db dir");
        std::fs::create_dir_all(&media_path).expect("media dir");

        let config = Config {
            web: WebConfig { host: "127.0.0.1".into(), port: 0 },
            listing: ListingConfig { default_per_page: 10, max_per_page: 100 },
            uploads: UploadConfig {
                max_file_size_mb: 1,
                allowed_mime_types: vec!["image/png".into(), "image/jpeg".into(), "application/pdf".into()],
            },
            database_path: database_path.to_string_lossy().into_owned(),
            media_path: media_path.to_string_lossy().into_owned(),
            allowed_origins: String::new(),
            log_level: "warn".into(),
            csrf_cookie_name: CSRF_COOKIE.into(),
        };

        let db_file = config.database_file();
        std::fs::create_dir_all(db_file.parent().expect("db parent")).expect("db file dir");
        let mut conn = Connection::open(&db_file).expect("open db");
        setup_commune_db(&mut conn).expect("schema setup");
        drop(conn);

        let manager =
            SqliteConnectionManager::file(&db_file).with_init(|conn| resource_db::prepare_connection(conn));
        let pool = r2d2::Pool::builder().max_size(4).build(manager).expect("pool");

        TestContext { dir, config, pool }
    }

    pub fn media_root(&self) -> PathBuf {
        PathBuf::from(&self.config.media_path)
    }

    pub fn conn(&self) -> admin_helpers::PooledConn {
        self.pool.get().expect("connection")
    }

    /// Inserts a row through the same validation path as the admin API.
    pub fn seed(&self, schema: &'static ResourceSchema, fields: &[(&str, &str)]) -> Record {
        let mut conn = self.conn();
        let submission = Submission::from_fields(fields.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        admin_helpers::create_record(&mut conn, schema, &submission).expect("seed row")
    }
}

pub async fn init_app(
    ctx: &TestContext,
) -> impl Service<actix_http::Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error> {
    let tera = Tera::new("templates/**/*.html").expect("templates");
    let site = site_helpers::load_site_settings(&ctx.conn());
    let state = AppState { site: Arc::new(RwLock::new(site)) };

    test::init_service(
        App::new()
            .app_data(web::Data::new(ctx.config.clone()))
            .app_data(web::Data::new(tera))
            .app_data(web::Data::new(ctx.pool.clone()))
            .app_data(web::Data::new(state))
            .service(actix_files::Files::new("/media", ctx.media_root()))
            .configure(routes::config_app),
    )
    .await
}

pub fn client() -> ApiClient {
    ApiClient::new(CSRF_TOKEN)
}

/// Turns a controller request into a test request, with the CSRF cookie set.
pub fn to_test_request(request: &ApiRequest) -> test::TestRequest {
    let builder = match request.method {
        HttpMethod::Get => test::TestRequest::get(),
        HttpMethod::Post => test::TestRequest::post(),
        HttpMethod::Delete => test::TestRequest::delete(),
    };
    let mut builder = builder.uri(&request.url).cookie(Cookie::new(CSRF_COOKIE, CSRF_TOKEN));
    for (name, value) in &request.headers {
        builder = builder.insert_header((*name, value.as_str()));
    }
    if let Some((content_type, bytes)) = request.body.encode("commune-test-boundary") {
        builder = builder.insert_header(("Content-Type", content_type)).set_payload(bytes);
    }
    builder
}

pub async fn send<S, B>(app: &S, request: &ApiRequest) -> (StatusCode, ApiOutcome, Value)
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let response = test::call_service(app, to_test_request(request).to_request()).await;
    let status = response.status();
    let body = test::read_body(response).await;
    let text = String::from_utf8_lossy(&body).into_owned();
    let json = serde_json::from_str(&text).unwrap_or(Value::Null);
    (status, classify_response(Some(status.as_u16()), &text), json)
}

pub async fn get_html<S, B>(app: &S, uri: &str) -> (StatusCode, String)
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let response = test::call_service(app, test::TestRequest::get().uri(uri).to_request()).await;
    let status = response.status();
    let body = test::read_body(response).await;
    (status, String::from_utf8_lossy(&body).into_owned())
}
