mod common;

use actix_web::http::StatusCode;
use commune_backend::controllers::api_client::{ApiOutcome, FormPart, RequestBody};
use commune_backend::helper::listing_helpers::ListingQuery;
use commune_backend::helper::media_helpers;
use commune_backend::models::schema::{ACTUALITES, CATEGORIES};
use common::{client, init_app, send, TestContext};

fn text(name: &str, value: &str) -> (String, FormPart) {
    (name.to_string(), FormPart::Text(value.to_string()))
}

fn png(name: &str) -> (String, FormPart) {
    (
        name.to_string(),
        FormPart::File {
            filename: "photo.png".into(),
            content_type: "image/png".into(),
            bytes: vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a],
        },
    )
}

#[actix_web::test]
async fn category_lifecycle() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let api = client();

    let (status, outcome, body) =
        send(&app, &api.create("categories", vec![text("nom", "Culture"), text("type", "actualite")])).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(outcome.is_success());
    let id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["nom"], "Culture");

    let (status, _, body) = send(&app, &api.list("categories", &ListingQuery::default())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["nom"], "Culture");

    let (status, _, body) = send(&app, &api.update("categories", id, vec![text("nom", "Culture et loisirs")])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nom"], "Culture et loisirs");
    assert_eq!(body["data"]["type"], "actualite");

    let (status, _, _) = send(&app, &api.delete("categories", id)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, outcome, _) = send(&app, &api.delete("categories", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(matches!(outcome, ApiOutcome::Business { .. }));
}

#[actix_web::test]
async fn missing_required_field_is_a_validation_error() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;

    let (status, outcome, _) = send(&app, &client().create("actualites", vec![text("resume", "Sans titre")])).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    match outcome {
        ApiOutcome::Validation { message, errors } => {
            assert_eq!(message, "Les données fournies sont invalides.");
            assert_eq!(errors["titre"], vec!["Le champ titre est obligatoire.".to_string()]);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[actix_web::test]
async fn unknown_category_and_duplicate_name_are_rejected() {
    let ctx = TestContext::new();
    ctx.seed(&CATEGORIES, &[("nom", "Sport")]);
    let app = init_app(&ctx).await;
    let api = client();

    let (status, _, body) =
        send(&app, &api.create("actualites", vec![text("titre", "Tournoi"), text("category_id", "999")])).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["category_id"][0], "Le champ catégorie sélectionné est invalide.");

    let (status, _, body) = send(&app, &api.create("categories", vec![text("nom", "Sport")])).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["nom"][0], "La valeur du champ nom est déjà utilisée.");
}

#[actix_web::test]
async fn event_cannot_end_before_it_starts() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;

    let (status, _, body) = send(
        &app,
        &client().create(
            "evenements",
            vec![text("titre", "Kermesse"), text("date_debut", "2026-06-10"), text("date_fin", "2026-06-01")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["date_fin"].is_array());
}

#[actix_web::test]
async fn post_update_without_method_override_is_refused() {
    let ctx = TestContext::new();
    let category = ctx.seed(&CATEGORIES, &[("nom", "Santé")]);
    let app = init_app(&ctx).await;

    let mut request = client().create("categories", vec![text("nom", "Autre")]);
    request.url = format!("/admin/api/categories/{}", category.id);
    let (status, _, body) = send(&app, &request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["message"], "Méthode non autorisée.");
}

#[actix_web::test]
async fn unknown_entity_is_not_found() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let (status, _, _) = send(&app, &client().list("inconnus", &ListingQuery::default())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn listing_applies_search_and_page_size() {
    let ctx = TestContext::new();
    for titre in ["Marché de Noël", "Conseil municipal", "Marché du samedi"] {
        ctx.seed(&ACTUALITES, &[("titre", titre)]);
    }
    let app = init_app(&ctx).await;
    let api = client();

    let (_, _, body) = send(&app, &api.list("actualites", &ListingQuery::parse("search=march"))).await;
    assert_eq!(body["total"], 2);

    let (_, _, body) = send(&app, &api.list("actualites", &ListingQuery::parse("per_page=2&sort=titre&direction=asc"))).await;
    assert_eq!(body["per_page"], 2);
    assert_eq!(body["last_page"], 2);
    assert_eq!(body["data"][0]["titre"], "Conseil municipal");

    let (_, _, body) = send(&app, &api.list("actualites", &ListingQuery::parse("per_page=2&sort=titre&page=2"))).await;
    assert_eq!(body["current_page"], 2);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
}

#[actix_web::test]
async fn deleting_a_category_detaches_its_articles() {
    let ctx = TestContext::new();
    let category = ctx.seed(&CATEGORIES, &[("nom", "Travaux")]);
    let category_id = category.id.to_string();
    let article = ctx.seed(&ACTUALITES, &[("titre", "Route fermée"), ("category_id", category_id.as_str())]);
    assert_eq!(article.i64_field("category_id"), Some(category.id));
    let app = init_app(&ctx).await;

    let (status, _, _) = send(&app, &client().delete("categories", category.id)).await;
    assert_eq!(status, StatusCode::OK);

    let mut show = client().list("actualites", &ListingQuery::default());
    show.url = format!("/admin/api/actualites/{}", article.id);
    let (_, _, body) = send(&app, &show).await;
    assert!(body["data"]["category_id"].is_null());
}

#[actix_web::test]
async fn uploaded_image_is_stored_served_and_removed() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let api = client();

    let (status, _, body) = send(&app, &api.create("slides", vec![text("titre", "Bienvenue"), png("image")])).await;
    assert_eq!(status, StatusCode::CREATED);
    let url = body["data"]["image"].as_str().unwrap().to_string();
    assert!(url.starts_with("/media/slides/"));
    let path = media_helpers::url_to_path(&ctx.media_root(), &url).unwrap();
    assert!(path.exists());

    let (status, _) = common::get_html(&app, &url).await;
    assert_eq!(status, StatusCode::OK);

    let id = body["data"]["id"].as_i64().unwrap();
    let (status, _, _) = send(&app, &api.delete("slides", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!path.exists());
}

#[actix_web::test]
async fn replacing_an_image_releases_the_old_file() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let api = client();

    let (_, _, body) = send(&app, &api.create("slides", vec![text("titre", "Accueil"), png("image")])).await;
    let id = body["data"]["id"].as_i64().unwrap();
    let old = media_helpers::url_to_path(&ctx.media_root(), body["data"]["image"].as_str().unwrap()).unwrap();

    let (status, _, body) = send(&app, &api.update("slides", id, vec![png("image")])).await;
    assert_eq!(status, StatusCode::OK);
    let new = media_helpers::url_to_path(&ctx.media_root(), body["data"]["image"].as_str().unwrap()).unwrap();
    assert!(new.exists());
    assert!(!old.exists());
}

#[actix_web::test]
async fn disallowed_file_type_is_reported_on_the_field() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;

    let mut request = client().create("slides", vec![text("titre", "Logo")]);
    if let RequestBody::Multipart(parts) = &mut request.body {
        parts.push((
            "image".into(),
            FormPart::File { filename: "logo.svg".into(), content_type: "image/svg+xml".into(), bytes: b"<svg/>".to_vec() },
        ));
    }
    let (status, _, body) = send(&app, &request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["image"].is_array());
}

#[actix_web::test]
async fn malformed_order_payload_is_a_bad_request() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;

    let mut request = client().update_order("adjoints", &[]);
    request.body = RequestBody::Json(serde_json::json!({ "ordres": "x" }));
    let (status, outcome, _) = send(&app, &request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(matches!(outcome, ApiOutcome::Business { .. }));
}
