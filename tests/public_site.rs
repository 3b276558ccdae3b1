mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use commune_backend::controllers::api_client::FormPart;
use commune_backend::helper::listing_helpers::ListingQuery;
use commune_backend::models::db_operations::resource_db_operations as resource_db;
use commune_backend::models::schema::{ACTUALITES, CATEGORIES, CONTACTS, EVENEMENTS, MESSAGES_MAIRE};
use common::{client, get_html, init_app, send, TestContext};

async fn post_contact<S, B>(app: &S, body: &'static str) -> (StatusCode, String)
where
    S: actix_web::dev::Service<actix_http::Request, Response = actix_web::dev::ServiceResponse<B>, Error = actix_web::Error>,
    B: actix_web::body::MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/contact")
        .insert_header(("Content-Type", "application/x-www-form-urlencoded"))
        .set_payload(body)
        .to_request();
    let response = test::call_service(app, req).await;
    let status = response.status();
    (status, String::from_utf8_lossy(&test::read_body(response).await).into_owned())
}

#[actix_web::test]
async fn health_check_answers() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let (status, body) = get_html(&app, "/api/is_server_active").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "active");
}

#[actix_web::test]
async fn home_page_shows_the_active_mayor_message() {
    let ctx = TestContext::new();
    ctx.seed(&MESSAGES_MAIRE, &[("titre", "Ancien message"), ("contenu", "<p>Hier</p>")]);
    ctx.seed(&MESSAGES_MAIRE, &[("titre", "Le mot du maire"), ("contenu", "<p>Bienvenue</p>"), ("actif", "1")]);
    let app = init_app(&ctx).await;

    let (status, body) = get_html(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Commune"));
    assert!(body.contains("Le mot du maire"));
    assert!(!body.contains("Ancien message"));
}

#[actix_web::test]
async fn unpublished_articles_stay_hidden() {
    let ctx = TestContext::new();
    let visible = ctx.seed(&ACTUALITES, &[("titre", "Inauguration du stade"), ("date_publication", "2026-03-01")]);
    let hidden = ctx.seed(&ACTUALITES, &[("titre", "Brouillon interne"), ("actif", "0")]);
    let app = init_app(&ctx).await;

    let (status, body) = get_html(&app, "/actualites").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Inauguration du stade"));
    assert!(!body.contains("Brouillon interne"));

    // Asking for inactive rows through the query does not reveal them.
    let (_, body) = get_html(&app, "/actualites?actif=0").await;
    assert!(!body.contains("Brouillon interne"));

    let (status, body) = get_html(&app, &format!("/actualites/{}", visible.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Inauguration du stade"));

    let (status, _) = get_html(&app, &format!("/actualites/{}", hidden.id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn category_links_list_articles_attached_by_id() {
    let ctx = TestContext::new();
    let culture = ctx.seed(&CATEGORIES, &[("nom", "Culture"), ("type", "actualite")]);
    let sport = ctx.seed(&CATEGORIES, &[("nom", "Sport"), ("type", "actualite")]);
    let culture_id = culture.id.to_string();
    let sport_id = sport.id.to_string();
    ctx.seed(&ACTUALITES, &[("titre", "Nuit des musées"), ("category_id", culture_id.as_str())]);
    ctx.seed(&ACTUALITES, &[("titre", "Tournoi de lutte"), ("category_id", sport_id.as_str())]);
    let app = init_app(&ctx).await;

    let (_, body) = get_html(&app, "/actualites").await;
    assert!(body.contains(&format!("category_id={}", culture.id)));

    let (status, body) = get_html(&app, &format!("/actualites?category_id={}", culture.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Nuit des musées"));
    assert!(!body.contains("Tournoi de lutte"));
}

#[actix_web::test]
async fn news_search_ignores_accented_case() {
    let ctx = TestContext::new();
    ctx.seed(&ACTUALITES, &[("titre", "École primaire rénovée")]);
    ctx.seed(&ACTUALITES, &[("titre", "Marché hebdomadaire")]);
    let app = init_app(&ctx).await;

    let (status, body) = get_html(&app, "/actualites?search=%C3%A9cole").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("École primaire rénovée"));
    assert!(!body.contains("Marché hebdomadaire"));
}

#[actix_web::test]
async fn agenda_lists_upcoming_and_past_events() {
    let ctx = TestContext::new();
    ctx.seed(&EVENEMENTS, &[("titre", "Festival futur"), ("date_debut", "2099-05-01")]);
    ctx.seed(&EVENEMENTS, &[("titre", "Fête passée"), ("date_debut", "2001-05-01")]);
    let app = init_app(&ctx).await;

    let (status, body) = get_html(&app, "/evenements").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Festival futur"));
    assert!(body.contains("Fête passée"));
}

#[actix_web::test]
async fn static_pages_render() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    for uri in ["/directions", "/conseil", "/patrimoine", "/lieux", "/journal", "/histoire", "/contact"] {
        let (status, _) = get_html(&app, uri).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
    }
}

#[actix_web::test]
async fn contact_form_stores_a_message() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;

    let (status, body) = post_contact(
        &app,
        "nom=Awa+Ndiaye&email=awa%40example.org&sujet=%C3%89tat+civil&message=Bonjour&status=1",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Votre message a bien été envoyé"));

    let conn = ctx.conn();
    assert_eq!(resource_db::count_rows(&conn, &CONTACTS).unwrap(), 1);
    let stored = resource_db::list_all(&conn, &CONTACTS, &ListingQuery::default().resolve(&CONTACTS, &ctx.config.listing)).unwrap();
    assert!(!stored[0].bool_field("status"));
    assert_eq!(stored[0].str_field("sujet"), Some("État civil"));
}

#[actix_web::test]
async fn invalid_contact_form_is_shown_again() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;

    let (status, body) = post_contact(&app, "nom=Awa&email=pas-un-email&sujet=&message=Bonjour").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.contains("Veuillez corriger les erreurs du formulaire."));
    assert!(body.contains("Le champ sujet est obligatoire."));
    assert!(body.contains("value=\"Awa\""));
    assert_eq!(resource_db::count_rows(&ctx.conn(), &CONTACTS).unwrap(), 0);
}

#[actix_web::test]
async fn renaming_the_site_updates_public_pages() {
    let ctx = TestContext::new();
    let app = init_app(&ctx).await;
    let api = client();

    let (_, _, body) = send(&app, &api.list("settings", &ListingQuery::parse("search=site_name"))).await;
    let id = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|row| row["cle"] == "site_name")
        .and_then(|row| row["id"].as_i64())
        .unwrap();

    let (status, _, _) =
        send(&app, &api.update("settings", id, vec![("valeur".into(), FormPart::Text("Ville de Thiès".into()))])).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get_html(&app, "/").await;
    assert!(body.contains("Ville de Thiès"));
}
