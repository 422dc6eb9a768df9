//! End-to-end tests against a running gateway.

use std::fs;
use std::time::Duration;

use reqwest::StatusCode;
use ssr_gateway::config::Mode;

mod common;

use common::{assert_hardened, client, url};

fn nonce_of(html: &str) -> String {
    let start = html.find("nonce=\"").expect("no nonce attribute") + "nonce=\"".len();
    let end = start + html[start..].find('"').unwrap();
    html[start..end].to_string()
}

#[tokio::test]
async fn proxy_forwards_method_body_and_host() {
    let upstream = common::start_echo_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let handle = common::start_gateway(common::config(dir.path(), upstream.port(), Mode::Development)).await;

    let res = client()
        .post(url(&handle, "/api/v1/comments?post=7"))
        .body("first!")
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert_hardened(&res);
    assert_eq!(res.headers()["content-type"], "application/json");

    let echo: serde_json::Value = res.json().await.unwrap();
    assert_eq!(echo["method"], "POST");
    assert_eq!(echo["target"], "/api/v1/comments?post=7");
    assert_eq!(echo["body"], "first!");
    assert_eq!(echo["host"], handle.local_addr().to_string());

    handle.close().await.unwrap();
}

#[tokio::test]
async fn repeated_query_keys_reach_upstream_untouched() {
    let upstream = common::start_echo_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let handle = common::start_gateway(common::config(dir.path(), upstream.port(), Mode::Development)).await;

    let res = client()
        .get(url(&handle, "/api/v1/posts?sort=asc&page=2&sort=desc"))
        .send()
        .await
        .unwrap();
    let echo: serde_json::Value = res.json().await.unwrap();
    assert_eq!(echo["target"], "/api/v1/posts?sort=asc&page=2&sort=desc");

    handle.close().await.unwrap();
}

#[tokio::test]
async fn upstream_status_is_passed_through() {
    let upstream = common::start_programmable_backend(|_| {
        ("404 Not Found", Vec::new(), r#"{"error":"no_such_post"}"#.to_string())
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let handle = common::start_gateway(common::config(dir.path(), upstream.port(), Mode::Development)).await;

    let res = client().get(url(&handle, "/api/v1/posts/99")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.headers()["content-type"], "application/json");
    assert_eq!(res.text().await.unwrap(), r#"{"error":"no_such_post"}"#);

    handle.close().await.unwrap();
}

#[tokio::test]
async fn unreachable_upstream_returns_error_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let handle =
        common::start_gateway(common::config(dir.path(), common::closed_port(), Mode::Development)).await;

    let res = client().get(url(&handle, "/api/v1/posts")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_hardened(&res);
    assert_eq!(res.headers()["content-type"], "application/json");

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "proxy_error");
    assert!(!body["reason"].as_str().unwrap().is_empty());

    handle.close().await.unwrap();
}

#[tokio::test]
async fn every_page_gets_a_fresh_nonce() {
    let dir = tempfile::tempdir().unwrap();
    let handle =
        common::start_gateway(common::config(dir.path(), common::closed_port(), Mode::Development)).await;
    let client = client();

    let first = client.get(url(&handle, "/")).send().await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_hardened(&first);
    assert_eq!(first.headers()["x-forwarded-for"], "127.0.0.1");
    let first = first.text().await.unwrap();

    let second = client.get(url(&handle, "/")).send().await.unwrap().text().await.unwrap();

    assert_ne!(nonce_of(&first), nonce_of(&second));

    handle.close().await.unwrap();
}

#[tokio::test]
async fn unmatched_post_is_plain_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let handle =
        common::start_gateway(common::config(dir.path(), common::closed_port(), Mode::Development)).await;

    let res = client().post(url(&handle, "/contact")).body("hi").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_hardened(&res);
    assert_eq!(res.text().await.unwrap(), "Sorry, that resource was not found.");

    handle.close().await.unwrap();
}

#[tokio::test]
async fn bundle_files_are_cached_public_files_are_not() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::config(dir.path(), common::closed_port(), Mode::Development);
    fs::write(config.bundle.client_dir.join("main.css"), "body{margin:0}").unwrap();
    fs::write(config.public_dir.join("robots.txt"), "User-agent: *").unwrap();
    let handle = common::start_gateway(config).await;
    let client = client();

    let bundle = client.get(url(&handle, "/client/main.css")).send().await.unwrap();
    assert_eq!(bundle.status(), StatusCode::OK);
    assert_hardened(&bundle);
    assert_eq!(bundle.headers()["cache-control"], "public, max-age=60");
    assert!(bundle.headers()["content-type"].to_str().unwrap().starts_with("text/css"));

    let public = client.get(url(&handle, "/robots.txt")).send().await.unwrap();
    assert_eq!(public.status(), StatusCode::OK);
    assert!(!public.headers().contains_key("cache-control"));
    assert_eq!(public.text().await.unwrap(), "User-agent: *");

    // Missing bundle files fall through to rendering.
    let missing = client.get(url(&handle, "/client/gone.js")).send().await.unwrap();
    assert!(missing.headers()["content-type"].to_str().unwrap().starts_with("text/html"));

    handle.close().await.unwrap();
}

#[tokio::test]
async fn service_worker_is_production_only() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::config(dir.path(), common::closed_port(), Mode::Production);
    let sw = config.bundle.service_worker_path();
    let handle = common::start_gateway(config).await;
    let client = client();

    let missing = client.get(url(&handle, "/sw.js")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_hardened(&missing);
    assert_eq!(missing.text().await.unwrap(), "Sorry, an unexpected error occurred.");

    fs::write(&sw, "self.addEventListener('fetch', () => {});").unwrap();
    let served = client.get(url(&handle, "/sw.js")).send().await.unwrap();
    assert_eq!(served.status(), StatusCode::OK);
    assert!(served.headers()["content-type"].to_str().unwrap().contains("javascript"));
    handle.close().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let config = common::config(dir.path(), common::closed_port(), Mode::Development);
    fs::write(config.bundle.service_worker_path(), "// worker").unwrap();
    let handle = common::start_gateway(config).await;

    let res = client.get(url(&handle, "/sw.js")).send().await.unwrap();
    assert!(res.headers()["content-type"].to_str().unwrap().starts_with("text/html"));
    handle.close().await.unwrap();
}

#[tokio::test]
async fn closed_gateway_refuses_connections() {
    let dir = tempfile::tempdir().unwrap();
    let handle =
        common::start_gateway(common::config(dir.path(), common::closed_port(), Mode::Development)).await;
    let addr = handle.local_addr();

    tokio::time::timeout(Duration::from_secs(5), handle.close())
        .await
        .expect("shutdown timed out")
        .unwrap();

    let result = client().get(format!("http://{addr}/")).send().await;
    assert!(result.is_err());
}
