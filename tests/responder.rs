use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;

use storefront_infra::AppState;
use storefront_infra::config::ResponderConfig;
use storefront_infra::handlers;

async fn spawn(env: &[(&str, &str)]) -> SocketAddr {
    let env: HashMap<String, String> = env
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let config = ResponderConfig::from_lookup(|key| env.get(key).cloned()).unwrap();
    let app = handlers::router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn get(addr: SocketAddr, path: &str) -> (u16, Option<String>, Value) {
    let resp = reqwest::get(format!("http://{addr}{path}")).await.unwrap();
    let status = resp.status().as_u16();
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = resp.json::<Value>().await.unwrap();
    (status, content_type, body)
}

#[tokio::test]
async fn status_paths_answer_ok() {
    let addr = spawn(&[
        ("DB_HOST", "db.internal"),
        ("DB_PORT", "3306"),
        ("DB_NAME", "ecommerce"),
        ("DB_USERNAME", "appuser"),
    ])
    .await;

    for path in ["/", "/api", "/api/health", "/health"] {
        let (status, content_type, body) = get(addr, path).await;
        assert_eq!(status, 200, "{path}");
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(body["status"], "ok");
        assert_eq!(body["message"], "Ecommerce backend placeholder");
        assert_eq!(body["database"]["host"], "db.internal");
        assert_eq!(body["database"]["port"], "3306");
        assert_eq!(body["database"]["name"], "ecommerce");
        assert_eq!(body["database"]["user"], "appuser");
    }
}

#[tokio::test]
async fn unknown_paths_echo_the_path() {
    let addr = spawn(&[]).await;

    for path in ["/nope", "/api/products", "/healthz", "/health/"] {
        let (status, _, body) = get(addr, path).await;
        assert_eq!(status, 404, "{path}");
        assert_eq!(body["status"], "not_found");
        assert_eq!(body["path"], path);
    }
}

#[tokio::test]
async fn query_strings_are_part_of_the_target() {
    let addr = spawn(&[]).await;

    for target in ["/health?x=1", "/nope?a=b", "/api?verbose"] {
        let (status, content_type, body) = get(addr, target).await;
        assert_eq!(status, 404, "{target}");
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(body["status"], "not_found");
        assert_eq!(body["path"], target);
    }
}

#[tokio::test]
async fn non_get_methods_are_refused() {
    let addr = spawn(&[]).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 405);
}

#[tokio::test]
async fn missing_database_env_reports_unset() {
    let addr = spawn(&[("DB_NAME", "ecommerce")]).await;

    let (_, _, body) = get(addr, "/health").await;
    assert_eq!(body["database"]["host"], "unset");
    assert_eq!(body["database"]["port"], "unset");
    assert_eq!(body["database"]["user"], "unset");
    assert_eq!(body["database"]["name"], "ecommerce");
}
