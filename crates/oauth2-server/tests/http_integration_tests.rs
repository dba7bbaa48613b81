//! End-to-end tests of the HTTP endpoints using axum's Router.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use oauth2_server::server::routes::{RouterOptions, create_router};
use oauth2_server::{Config, Server, Storage};

use common::*;

const BASE_URL: &str = "https://auth.example.com";

async fn build_test_router(approve_as: Option<&str>, config: Config) -> axum::Router {
    let storage: Arc<dyn Storage> = seeded_storage().await;
    let server = Arc::new(Server::new(storage, config).unwrap());
    create_router(
        server,
        RouterOptions {
            base_url: BASE_URL.to_string(),
            approve_as: approve_as.map(str::to_string),
            ..RouterOptions::default()
        },
    )
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn token_request(params: &[(&str, &str)]) -> Request<Body> {
    Request::post("/token")
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from(serde_urlencoded::to_string(params).unwrap()))
        .unwrap()
}

fn url_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[tokio::test]
async fn test_health() {
    let app = build_test_router(None, Config::for_testing()).await;
    let response = app.oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_metadata() {
    let app = build_test_router(None, Config::for_testing()).await;
    let response = app
        .oneshot(Request::get("/.well-known/oauth-authorization-server").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let metadata = json_body(response).await;
    assert_eq!(metadata["issuer"], BASE_URL);
    assert_eq!(metadata["token_endpoint"], format!("{BASE_URL}/token"));
    assert_eq!(metadata["response_types_supported"], serde_json::json!(["code"]));
}

#[tokio::test]
async fn test_full_http_flow() {
    let app = build_test_router(Some("u1"), Config::for_testing()).await;

    // 1. Authorize (auto-approved)
    let authorize_uri = format!(
        "/authorize?client_id={CLIENT_ID}&redirect_uri={}&response_type=code&state=xyz123&scope={}",
        url_encode(REDIRECT_URI),
        url_encode("read write"),
    );
    let response = app.clone().oneshot(Request::get(&authorize_uri).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = response.headers().get("Location").unwrap().to_str().unwrap();
    let location = url::Url::parse(location).unwrap();
    let params: Vec<(String, String)> = location.query_pairs().into_owned().collect();
    let code = params.iter().find(|(k, _)| k == "code").map(|(_, v)| v.clone()).unwrap();
    assert!(params.contains(&("state".to_string(), "xyz123".to_string())));

    // 2. Exchange the code
    let response = app
        .clone()
        .oneshot(token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("client_id", CLIENT_ID),
            ("client_secret", CLIENT_SECRET),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
    let tokens = json_body(response).await;
    assert_eq!(tokens["token_type"], "bearer");
    assert_eq!(tokens["scope"], "read write");
    let access_token = tokens["access_token"].as_str().unwrap();
    let refresh_token = tokens["refresh_token"].as_str().unwrap();

    // 3. Access the protected resource
    let response = app
        .clone()
        .oneshot(
            Request::get("/resource")
                .header("Authorization", format!("Bearer {access_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let resource = json_body(response).await;
    assert_eq!(resource["client_id"], CLIENT_ID);
    assert_eq!(resource["user_id"], "u1");

    // 4. Refresh with HTTP Basic credentials and a narrower scope
    let response = app
        .clone()
        .oneshot(
            Request::post("/token")
                .header("Content-Type", "application/x-www-form-urlencoded")
                .header("Authorization", "Basic YzE6czE=")
                .body(Body::from(
                    serde_urlencoded::to_string(&[
                        ("grant_type", "refresh_token"),
                        ("refresh_token", refresh_token),
                        ("scope", "read"),
                    ][..])
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["scope"], "read");

    // 5. Replaying the code fails
    let response = app
        .oneshot(token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("client_id", CLIENT_ID),
            ("client_secret", CLIENT_SECRET),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_grant");
}

#[tokio::test]
async fn test_json_token_request() {
    let app = build_test_router(None, Config::for_testing()).await;
    let response = app
        .oneshot(
            Request::post("/token")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({"grant_type": "refresh_token", "refresh_token": "nope",
                                       "client_id": CLIENT_ID, "client_secret": CLIENT_SECRET})
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_grant");
}

#[tokio::test]
async fn test_token_endpoint_rejects_get() {
    let app = build_test_router(None, Config::for_testing()).await;
    let response = app.oneshot(Request::get("/token?grant_type=refresh_token").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers().get("Allow").unwrap(), "POST");
}

#[tokio::test]
async fn test_invalid_client_over_http() {
    let app = build_test_router(None, Config::for_testing()).await;
    let response = app
        .oneshot(token_request(&[("grant_type", "refresh_token"), ("refresh_token", "x"), ("client_id", "ghost")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers().get("WWW-Authenticate").unwrap(), "Basic realm=\"Service\"");
}

#[tokio::test]
async fn test_authorize_without_auto_approval() {
    let app = build_test_router(None, Config::for_testing()).await;
    let uri = format!("/authorize?client_id={CLIENT_ID}&response_type=code&scope=read");
    let response = app.oneshot(Request::get(&uri).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let pending = json_body(response).await;
    assert_eq!(pending["client_id"], CLIENT_ID);
    assert_eq!(pending["response_type"], "code");
    assert_eq!(pending["redirect_uri"], REDIRECT_URI);
    assert_eq!(pending["scope"], "read");
}

#[tokio::test]
async fn test_resource_without_token() {
    let app = build_test_router(None, Config::for_testing()).await;
    let response = app.oneshot(Request::get("/resource").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers().get("WWW-Authenticate").unwrap(), "Bearer realm=\"Service\"");
}
