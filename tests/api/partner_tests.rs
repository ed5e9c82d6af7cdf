//! Partner API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{assert_error, json_body, TestApp, ADMIN, MAPPER};

const PARTNERS: &str = "/api/v2/partners/";

fn partner_body(name: &str) -> Value {
    json!({
        "name": name,
        "primary_hashtag": "#hot",
        "logo_url": "https://hot.example/logo.png",
        "permalink": "hot",
        "name_1": "Blog",
        "url_1": "https://hot.example/blog",
        "name_2": "Wiki"
    })
}

async fn create(app: &TestApp, body: Value) -> Value {
    let response = app.post_auth(PARTNERS, Some(body), ADMIN).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

#[tokio::test]
async fn test_create_partner_keeps_complete_links() {
    let app = TestApp::new();

    let partner = create(&app, partner_body("HOT")).await;

    assert_eq!(partner["name"], "HOT");
    assert_eq!(
        partner["website_links"],
        json!([{"name": "Blog", "url": "https://hot.example/blog"}])
    );
}

#[tokio::test]
async fn test_create_partner_requires_admin() {
    let app = TestApp::new();

    let response = app.post_auth(PARTNERS, Some(partner_body("HOT")), MAPPER).await;

    assert_error(response, StatusCode::FORBIDDEN, "UserPermissionError").await;
}

#[tokio::test]
async fn test_create_partner_requires_token() {
    let app = TestApp::new();

    let response = app.post_json(PARTNERS, partner_body("HOT")).await;

    assert_error(response, StatusCode::UNAUTHORIZED, "InvalidToken").await;
}

#[tokio::test]
async fn test_duplicate_partner_name() {
    let app = TestApp::new();
    create(&app, partner_body("HOT")).await;

    let mut duplicate = partner_body("HOT");
    duplicate["permalink"] = json!("hot-2");
    let response = app.post_auth(PARTNERS, Some(duplicate), ADMIN).await;

    assert_error(response, StatusCode::BAD_REQUEST, "NameExists").await;
}

#[tokio::test]
async fn test_partner_without_name() {
    let app = TestApp::new();

    let response = app
        .post_auth(PARTNERS, Some(json!({"primary_hashtag": "#hot"})), ADMIN)
        .await;

    assert_error(response, StatusCode::BAD_REQUEST, "NullName").await;
}

#[tokio::test]
async fn test_public_reads() {
    let app = TestApp::new();
    let partner = create(&app, partner_body("HOT")).await;
    let id = partner["id"].as_i64().unwrap();

    let response = app.get(PARTNERS).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["partners"].as_array().unwrap().len(), 1);

    let response = app.get(&format!("{PARTNERS}{id}/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["name"], "HOT");

    let response = app.get(&format!("{PARTNERS}hot/permalink/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["id"], id);
}

#[tokio::test]
async fn test_unknown_partner_is_not_found() {
    let app = TestApp::new();

    let response = app.get(&format!("{PARTNERS}42/")).await;

    assert_error(response, StatusCode::NOT_FOUND, "PartnerNotFound").await;
}

#[tokio::test]
async fn test_update_partner_replaces_links() {
    let app = TestApp::new();
    let partner = create(&app, partner_body("HOT")).await;
    let id = partner["id"].as_i64().unwrap();

    let response = app
        .request_auth(
            "PUT",
            &format!("{PARTNERS}{id}/"),
            Some(json!({"name_3": "Forum", "url_3": "https://hot.example/forum"})),
            ADMIN,
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let updated = json_body(response).await;
    assert_eq!(updated["name"], "HOT");
    assert_eq!(
        updated["website_links"],
        json!([{"name": "Forum", "url": "https://hot.example/forum"}])
    );
}

#[tokio::test]
async fn test_delete_partner() {
    let app = TestApp::new();
    let partner = create(&app, partner_body("HOT")).await;
    let uri = format!("{PARTNERS}{}/", partner["id"]);

    let response = app.request_auth("DELETE", &uri, None, ADMIN).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"Success": "Partner deleted"}));

    let response = app.request_auth("DELETE", &uri, None, ADMIN).await;
    assert_error(response, StatusCode::BAD_REQUEST, "PartnerNotFound").await;
}
