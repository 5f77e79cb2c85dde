use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use stockledger_api::app::services::AppServices;
use stockledger_auth::JwtClaims;
use stockledger_core::{ActorId, LocationId};

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over an in-memory store, on an ephemeral port.
        let app = stockledger_api::app::router_with(AppServices::in_memory(15), SECRET);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(location_id: LocationId) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: ActorId::new(),
        location_id,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn post(
    client: &reqwest::Client,
    srv: &TestServer,
    token: &str,
    path: &str,
    body: Value,
) -> (StatusCode, Value) {
    let res = client
        .post(srv.url(path))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

async fn get(client: &reqwest::Client, srv: &TestServer, token: &str, path: &str) -> (StatusCode, Value) {
    let res = client.get(srv.url(path)).bearer_auth(token).send().await.unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

/// Product + account with `quantity`; returns the account id.
async fn open_account(
    client: &reqwest::Client,
    srv: &TestServer,
    token: &str,
    color: &str,
    quantity: i64,
) -> String {
    let (status, body) = post(
        client,
        srv,
        token,
        "/product/add",
        json!({ "spec_combination": { "color": color, "length": "2m" } }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let product_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = post(
        client,
        srv,
        token,
        "/inventory/add",
        json!({ "product_id": product_id, "quantity": quantity }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["account"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public_and_everything_else_needs_a_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url("/inventory/list")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(srv.url("/inventory/list"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn location_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let location = LocationId::new();

    let (status, body) = get(&client, &srv, &mint_jwt(location), "/whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["location_id"].as_str().unwrap(), location.to_string());
}

#[tokio::test]
async fn duplicate_combination_reports_existing_product() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(LocationId::new());

    let (status, first) = post(
        &client,
        &srv,
        &token,
        "/product/add",
        json!({ "spec_combination": { "color": "red", "length": "2m" } }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["data"]["name"], "red 2m");

    let (status, body) = post(
        &client,
        &srv,
        &token,
        "/product/add",
        json!({ "spec_combination": { "length": "2m", "color": "red" } }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_exists");
    assert_eq!(body["data"]["product_id"], first["data"]["id"]);

    let (status, body) = post(
        &client,
        &srv,
        &token,
        "/product/add",
        json!({ "spec_combination": {} }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_specification");
}

#[tokio::test]
async fn change_rejects_overdraw_and_accepts_string_magnitude() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(LocationId::new());
    let account_id = open_account(&client, &srv, &token, "red", 10).await;

    let (status, body) = post(
        &client,
        &srv,
        &token,
        "/inventory/change",
        json!({ "account_id": account_id, "action": "out", "magnitude": 15 }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["data"]["available"], 10);

    let (status, body) = post(
        &client,
        &srv,
        &token,
        "/inventory/change",
        json!({ "account_id": account_id, "action": "out", "magnitude": "6" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["before"], 10);
    assert_eq!(body["data"]["after"], 4);

    let (status, body) = post(
        &client,
        &srv,
        &token,
        "/inventory/change",
        json!({ "account_id": account_id, "action": "move", "magnitude": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_action");

    let (status, body) = get(&client, &srv, &token, "/inventory/logs?action=out").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["rows"][0]["change_quantity"], -6);
}

#[tokio::test]
async fn malformed_bodies_are_rejected_inside_the_envelope() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(LocationId::new());

    let (status, body) = post(
        &client,
        &srv,
        &token,
        "/inventory/change",
        json!({ "account_id": "not-a-uuid", "action": "in", "magnitude": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("account_id"));

    let res = client
        .post(srv.url("/spec/category/add"))
        .bearer_auth(&token)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn update_takes_account_id_as_id() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(LocationId::new());
    let account_id = open_account(&client, &srv, &token, "blue", 3).await;

    let (status, body) = post(
        &client,
        &srv,
        &token,
        "/inventory/update",
        json!({ "id": account_id, "display_name": "Blue bar", "warning_min": 5 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["display_name"], "Blue bar");
    assert_eq!(body["data"]["quantity"], 3);
}

#[tokio::test]
async fn logs_filter_by_spec_and_paginate() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(LocationId::new());
    open_account(&client, &srv, &token, "red", 3).await;
    open_account(&client, &srv, &token, "blue", 4).await;

    let (status, body) = get(&client, &srv, &token, "/inventory/logs?spec%5Bcolor%5D=blue").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["rows"][0]["after_quantity"], 4);

    let (_, body) = get(&client, &srv, &token, "/inventory/logs?page=1&page_size=1").await;
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["has_more"], true);

    let (status, body) = get(
        &client,
        &srv,
        &token,
        "/inventory/logs?start_date=2024-05-10&end_date=2024-05-01",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn location_isolation_blocks_cross_location_reads_and_writes() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token1 = mint_jwt(LocationId::new());
    let token2 = mint_jwt(LocationId::new());
    let account_id = open_account(&client, &srv, &token1, "red", 10).await;

    let (status, _) = get(&client, &srv, &token2, &format!("/inventory/account/{account_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post(
        &client,
        &srv,
        &token2,
        "/inventory/change",
        json!({ "account_id": account_id, "action": "out", "magnitude": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = get(&client, &srv, &token2, "/inventory/list").await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (_, body) = get(&client, &srv, &token1, &format!("/inventory/account/{account_id}")).await;
    assert_eq!(body["data"]["quantity"], 10);
}

#[tokio::test]
async fn reconciliation_applies_as_proposed_and_confirms_once() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(LocationId::new());
    let account_id = open_account(&client, &srv, &token, "red", 10).await;

    let (status, body) = post(
        &client,
        &srv,
        &token,
        "/inventory/check",
        json!({ "items": [{ "account_id": account_id, "actual_quantity": 7 }] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let task_id = body["data"]["task_id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["task"]["items"][0]["difference"], -3);

    // Stock moves between proposal and confirmation.
    let (status, _) = post(
        &client,
        &srv,
        &token,
        "/inventory/change",
        json!({ "account_id": account_id, "action": "in", "magnitude": 5 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(
        &client,
        &srv,
        &token,
        "/inventory/check/confirm",
        json!({ "task_id": task_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "confirmed");
    assert_eq!(body["data"]["applied"][0]["before"], 15);
    assert_eq!(body["data"]["applied"][0]["after"], 12);

    let (status, body) = post(
        &client,
        &srv,
        &token,
        "/inventory/check/confirm",
        json!({ "task_id": task_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition");

    let (_, body) = get(&client, &srv, &token, "/inventory/logs?action=adjust").await;
    assert_eq!(body["data"]["total"], 1);

    let (status, body) = get(&client, &srv, &token, &format!("/inventory/check/{task_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "confirmed");
}

#[tokio::test]
async fn disabled_category_leaves_spec_list_unless_in_use() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(LocationId::new());

    let (_, color) = post(
        &client,
        &srv,
        &token,
        "/spec/category/add",
        json!({ "code": "color", "name": "Color", "sort_order": 1 }),
    )
    .await;
    let color_id = color["data"]["id"].as_str().unwrap().to_string();
    let (_, finish) = post(
        &client,
        &srv,
        &token,
        "/spec/category/add",
        json!({ "code": "finish", "name": "Finish", "sort_order": 2 }),
    )
    .await;
    let finish_id = finish["data"]["id"].as_str().unwrap().to_string();
    open_account(&client, &srv, &token, "red", 0).await;

    let (status, body) = post(
        &client,
        &srv,
        &token,
        "/spec/category/disable",
        json!({ "id": color_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "referenced_by_product");

    let (status, _) = post(
        &client,
        &srv,
        &token,
        "/spec/category/disable",
        json!({ "id": finish_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(&client, &srv, &token, "/spec/list").await;
    let codes: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["category"]["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["color"]);

    let (_, body) = get(&client, &srv, &token, "/product/list").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}
