use crate::config::Config;
use crate::helper::admin_helpers::{self, AdminHelperError};
use crate::helper::form_helpers::{self, Submission};
use crate::helper::listing_helpers::{visit_url, ListingPatch, ListingQuery};
use crate::helper::public_helpers;
use crate::helper::site_helpers;
use crate::models::db_operations::resource_db_operations::DbError;
use crate::models::schema::{CONTACTS, JOURNAL, LIEUX, PATRIMOINES};
use crate::models::Notification;
use crate::{AppState, DbPool};
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

const CONTACT_FIELDS: [&str; 5] = ["nom", "email", "telephone", "sujet", "message"];

pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api").route("/is_server_active", web::get().to(is_server_active)));
}

pub fn config_site(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(show_home))
        .route("/actualites", web::get().to(show_actualites))
        .route("/actualites/{id:\\d+}", web::get().to(show_actualite))
        .route("/evenements", web::get().to(show_evenements))
        .route("/directions", web::get().to(show_directions))
        .route("/conseil", web::get().to(show_conseil))
        .route("/patrimoine", web::get().to(show_patrimoine))
        .route("/lieux", web::get().to(show_lieux))
        .route("/journal", web::get().to(show_journal))
        .route("/histoire", web::get().to(show_histoire))
        .route("/contact", web::get().to(show_contact_form))
        .route("/contact", web::post().to(submit_contact_form));
}

async fn is_server_active() -> impl Responder {
    HttpResponse::Ok().body("active")
}

/// Runs a read on a pooled connection off the async workers.
async fn load<F, T>(pool: &web::Data<DbPool>, f: F) -> Result<T, HttpResponse>
where
    F: FnOnce(&Connection) -> Result<T, DbError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    let result = web::block(move || -> Result<T, AdminHelperError> {
        let conn = admin_helpers::get_conn(&pool)?;
        Ok(f(&conn)?)
    })
    .await;
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            log::error!("Failed to load public page data: {}", e);
            Err(HttpResponse::InternalServerError().body("Une erreur est survenue."))
        }
        Err(e) => {
            log::error!("Blocking task failed: {}", e);
            Err(HttpResponse::InternalServerError().body("Une erreur est survenue."))
        }
    }
}

fn base_context(app_state: &AppState, active: &str) -> Context {
    let mut ctx = Context::new();
    ctx.insert("site", &site_helpers::current_site_settings(app_state));
    ctx.insert("active_page", active);
    ctx
}

fn render(tera: &Tera, template: &str, ctx: &Context) -> HttpResponse {
    render_with_status(tera, template, ctx, StatusCode::OK)
}

fn render_with_status(tera: &Tera, template: &str, ctx: &Context, status: StatusCode) -> HttpResponse {
    match tera.render(template, ctx) {
        Ok(rendered) => HttpResponse::build(status).content_type("text/html; charset=utf-8").body(rendered),
        Err(err) => {
            log::error!("Template rendering error in '{}': {}", template, err);
            HttpResponse::InternalServerError().body("Error rendering page.")
        }
    }
}

fn not_found_page(tera: &Tera, app_state: &AppState) -> HttpResponse {
    let ctx = base_context(app_state, "");
    render_with_status(tera, "public/not_found.html", &ctx, StatusCode::NOT_FOUND)
}

async fn show_home(tera: web::Data<Tera>, pool: web::Data<DbPool>, app_state: web::Data<AppState>) -> impl Responder {
    let today = chrono::Local::now().date_naive();
    let home = match load(&pool, move |conn| public_helpers::fetch_home_page(conn, today)).await {
        Ok(home) => home,
        Err(response) => return response,
    };
    let mut ctx = base_context(&app_state, "accueil");
    ctx.insert("slides", &home.slides);
    ctx.insert("message_maire", &home.message_maire);
    ctx.insert("actualites", &home.actualites);
    ctx.insert("evenements", &home.evenements);
    render(&tera, "public/index.html", &ctx)
}

#[derive(Serialize)]
struct FilterLink {
    label: String,
    url: String,
    active: bool,
}

#[derive(Serialize)]
struct PageLinks {
    previous: Option<String>,
    next: Option<String>,
}

async fn show_actualites(
    req: HttpRequest,
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    app_state: web::Data<AppState>,
) -> impl Responder {
    let query = ListingQuery::parse(req.query_string());
    let limits = config.listing.clone();
    let loaded = {
        let query = query.clone();
        load(&pool, move |conn| {
            let page = public_helpers::fetch_actualites_page(conn, &query, &limits)?;
            let categories = public_helpers::fetch_categories(conn)?;
            Ok((page, categories))
        })
        .await
    };
    let (page, categories) = match loaded {
        Ok(loaded) => loaded,
        Err(response) => return response,
    };

    let base = "/actualites";
    let selected = query.filters.get("category_id").cloned();
    let mut filters = vec![FilterLink {
        label: "Toutes".to_string(),
        url: visit_url(base, &query, &ListingPatch::default().clear_filter("category_id")),
        active: selected.is_none(),
    }];
    filters.extend(categories.iter().filter_map(|category| {
        let nom = category.str_field("nom")?;
        let id = category.id.to_string();
        Some(FilterLink {
            label: nom.to_string(),
            url: visit_url(base, &query, &ListingPatch::default().filter("category_id", &id)),
            active: selected.as_deref() == Some(id.as_str()),
        })
    }));
    let links = PageLinks {
        previous: (page.current_page > 1).then(|| visit_url(base, &query, &ListingPatch::default().page(page.current_page - 1))),
        next: (page.current_page < page.last_page)
            .then(|| visit_url(base, &query, &ListingPatch::default().page(page.current_page + 1))),
    };

    let mut ctx = base_context(&app_state, "actualites");
    ctx.insert("page", &page);
    ctx.insert("filters", &filters);
    ctx.insert("links", &links);
    ctx.insert("search", &query.search.clone().unwrap_or_default());
    ctx.insert("category_id", &selected);
    render(&tera, "public/actualites.html", &ctx)
}

async fn show_actualite(
    path: web::Path<i64>,
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    app_state: web::Data<AppState>,
) -> impl Responder {
    let id = path.into_inner();
    match load(&pool, move |conn| public_helpers::fetch_actualite(conn, id)).await {
        Ok(Some(actualite)) => {
            let mut ctx = base_context(&app_state, "actualites");
            ctx.insert("actualite", &actualite);
            render(&tera, "public/actualite.html", &ctx)
        }
        Ok(None) => not_found_page(&tera, &app_state),
        Err(response) => response,
    }
}

async fn show_evenements(tera: web::Data<Tera>, pool: web::Data<DbPool>, app_state: web::Data<AppState>) -> impl Responder {
    let today = chrono::Local::now().date_naive();
    let loaded = load(&pool, move |conn| {
        Ok((
            public_helpers::fetch_upcoming_evenements(conn, today)?,
            public_helpers::fetch_past_evenements(conn, today)?,
        ))
    })
    .await;
    match loaded {
        Ok((upcoming, past)) => {
            let mut ctx = base_context(&app_state, "evenements");
            ctx.insert("upcoming", &upcoming);
            ctx.insert("past", &past);
            render(&tera, "public/evenements.html", &ctx)
        }
        Err(response) => response,
    }
}

async fn show_directions(tera: web::Data<Tera>, pool: web::Data<DbPool>, app_state: web::Data<AppState>) -> impl Responder {
    match load(&pool, public_helpers::fetch_directions).await {
        Ok(directions) => {
            let mut ctx = base_context(&app_state, "directions");
            ctx.insert("directions", &directions);
            render(&tera, "public/directions.html", &ctx)
        }
        Err(response) => response,
    }
}

async fn show_conseil(tera: web::Data<Tera>, pool: web::Data<DbPool>, app_state: web::Data<AppState>) -> impl Responder {
    let loaded = load(&pool, |conn| {
        let maire = public_helpers::fetch_published(conn, &crate::models::schema::MESSAGES_MAIRE)?.into_iter().next();
        Ok((public_helpers::fetch_conseil(conn)?, maire))
    })
    .await;
    match loaded {
        Ok((adjoints, message_maire)) => {
            let mut ctx = base_context(&app_state, "conseil");
            ctx.insert("adjoints", &adjoints);
            ctx.insert("message_maire", &message_maire);
            render(&tera, "public/conseil.html", &ctx)
        }
        Err(response) => response,
    }
}

/// Pages that only list the published rows of one entity.
async fn show_simple_listing(
    tera: &Tera,
    pool: &web::Data<DbPool>,
    app_state: &AppState,
    schema: &'static crate::models::schema::ResourceSchema,
    page_name: &str,
) -> HttpResponse {
    match load(pool, move |conn| public_helpers::fetch_published(conn, schema)).await {
        Ok(items) => {
            let mut ctx = base_context(app_state, page_name);
            ctx.insert("items", &items);
            ctx.insert("title", schema.label);
            render(tera, &format!("public/{}.html", page_name), &ctx)
        }
        Err(response) => response,
    }
}

async fn show_patrimoine(tera: web::Data<Tera>, pool: web::Data<DbPool>, app_state: web::Data<AppState>) -> impl Responder {
    show_simple_listing(&tera, &pool, &app_state, &PATRIMOINES, "patrimoine").await
}

async fn show_lieux(tera: web::Data<Tera>, pool: web::Data<DbPool>, app_state: web::Data<AppState>) -> impl Responder {
    show_simple_listing(&tera, &pool, &app_state, &LIEUX, "lieux").await
}

async fn show_journal(tera: web::Data<Tera>, pool: web::Data<DbPool>, app_state: web::Data<AppState>) -> impl Responder {
    show_simple_listing(&tera, &pool, &app_state, &JOURNAL, "journal").await
}

async fn show_histoire(tera: web::Data<Tera>, pool: web::Data<DbPool>, app_state: web::Data<AppState>) -> impl Responder {
    match load(&pool, |conn| public_helpers::fetch_content_blocks(conn, "histoire")).await {
        Ok(blocks) => {
            let mut ctx = base_context(&app_state, "histoire");
            ctx.insert("blocks", &blocks);
            render(&tera, "public/histoire.html", &ctx)
        }
        Err(response) => response,
    }
}

fn contact_context(app_state: &AppState) -> Context {
    let mut ctx = base_context(app_state, "contact");
    ctx.insert("old", &HashMap::<String, String>::new());
    ctx.insert("errors", &HashMap::<String, Vec<String>>::new());
    ctx
}

async fn show_contact_form(tera: web::Data<Tera>, app_state: web::Data<AppState>) -> impl Responder {
    render(&tera, "public/contact.html", &contact_context(&app_state))
}

/// Stores the message as an unprocessed contact and re-renders the form.
async fn submit_contact_form(
    form: web::Bytes,
    tera: web::Data<Tera>,
    pool: web::Data<DbPool>,
    app_state: web::Data<AppState>,
) -> impl Responder {
    let parsed = match form_helpers::parse_form(&form) {
        Ok(p) => p,
        Err(response) => return response,
    };
    let old: HashMap<String, String> = parsed
        .into_iter()
        .filter(|(key, _)| CONTACT_FIELDS.contains(&key.as_str()))
        .collect();
    let submission = Submission::from_fields(old.clone());

    let pool = pool.clone();
    let result = web::block(move || {
        let mut conn = admin_helpers::get_conn(&pool)?;
        admin_helpers::create_record(&mut conn, &CONTACTS, &submission)
    })
    .await;

    let mut ctx = contact_context(&app_state);
    match result {
        Ok(Ok(contact)) => {
            log::info!("New contact message #{} received.", contact.id);
            ctx.insert("notification", &Notification::success("Votre message a bien été envoyé. Merci !"));
            render(&tera, "public/contact.html", &ctx)
        }
        Ok(Err(AdminHelperError::Validation(errors))) => {
            ctx.insert("old", &old);
            ctx.insert("errors", &errors);
            ctx.insert("notification", &Notification::error("Veuillez corriger les erreurs du formulaire."));
            render_with_status(&tera, "public/contact.html", &ctx, StatusCode::UNPROCESSABLE_ENTITY)
        }
        Ok(Err(e)) => {
            log::error!("Failed to store contact message: {}", e);
            ctx.insert("old", &old);
            ctx.insert("notification", &Notification::error("Une erreur est survenue. Veuillez réessayer."));
            render_with_status(&tera, "public/contact.html", &ctx, StatusCode::INTERNAL_SERVER_ERROR)
        }
        Err(e) => {
            log::error!("Blocking task failed: {}", e);
            HttpResponse::InternalServerError().body("Une erreur est survenue.")
        }
    }
}
