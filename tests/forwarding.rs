//! Forwarding behavior of the auxiliary listeners against a live primary.

use axum::http::{header, StatusCode};
use portfront::config::ContentTypePolicy;
use portfront::AppContext;
use std::time::{Duration, Instant};

mod common;

use common::{client, free_ports, local_config, recording_app, Recorder, RECIPES_JSON};

/// Primary plus one auxiliary listener; returns (server, recorder, primary port, proxy port).
async fn start_pair(
    policy: ContentTypePolicy,
    upstream_secs: u64,
) -> (portfront::RunningServer, Recorder, u16, u16) {
    let ports = free_ports(2).await;
    let mut config = local_config(ports[0], &ports[1..]);
    config.proxy.content_type = policy;
    config.timeouts.upstream_secs = upstream_secs;

    let recorder = Recorder::default();
    let server = AppContext::new(config, recording_app(recorder.clone()))
        .start()
        .await
        .expect("startup failed");
    assert_eq!(server.running_proxies(), 1);

    (server, recorder, ports[0], ports[1])
}

#[tokio::test]
async fn get_through_proxy_matches_direct_get() {
    let (server, recorder, primary, proxy) = start_pair(ContentTypePolicy::ForceJson, 30).await;
    let client = client();

    let direct = client
        .get(format!("http://127.0.0.1:{}/recipes", primary))
        .send()
        .await
        .unwrap();
    let direct_status = direct.status();
    let direct_body = direct.text().await.unwrap();

    let proxied = client
        .get(format!("http://127.0.0.1:{}/recipes", proxy))
        .header(header::ORIGIN, "http://localhost:5500")
        .send()
        .await
        .unwrap();
    assert_eq!(proxied.status(), direct_status);
    assert_eq!(
        proxied.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5500"
    );
    assert_eq!(proxied.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(proxied.text().await.unwrap(), direct_body);
    assert_eq!(direct_body, RECIPES_JSON);

    assert_eq!(recorder.count(), 2);
    server.stop().await.unwrap();
}

#[tokio::test]
async fn preflight_never_reaches_primary() {
    let (server, recorder, _, proxy) = start_pair(ContentTypePolicy::ForceJson, 30).await;

    let response = client()
        .request(
            reqwest::Method::OPTIONS,
            format!("http://127.0.0.1:{}/recipes/4", proxy),
        )
        .header(header::ORIGIN, "http://localhost:5500")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:5500");
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, PUT, DELETE, OPTIONS"
    );
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type, Authorization"
    );
    assert!(response.bytes().await.unwrap().is_empty());
    assert_eq!(recorder.count(), 0);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn post_body_path_and_query_arrive_intact() {
    let (server, recorder, _, proxy) = start_pair(ContentTypePolicy::ForceJson, 30).await;
    let payload = r#"{"name":"carrot soup","instructions":"boil"}"#;

    let response = client()
        .post(format!("http://127.0.0.1:{}/recipes?term=soup&page=2", proxy))
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::AUTHORIZATION, "Bearer chef-token")
        .body(payload)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.text().await.unwrap(), payload);

    let seen = recorder.last();
    assert_eq!(seen.method, "POST");
    assert_eq!(seen.path, "/recipes");
    assert_eq!(seen.query.as_deref(), Some("term=soup&page=2"));
    assert_eq!(seen.body.as_ref(), payload.as_bytes());
    assert_eq!(seen.content_type.as_deref(), Some("application/json"));
    assert_eq!(seen.authorization.as_deref(), Some("Bearer chef-token"));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn large_body_is_forwarded_byte_for_byte() {
    let (server, recorder, _, proxy) = start_pair(ContentTypePolicy::ForceJson, 30).await;

    // 10 MB JSON string.
    let mut payload = String::with_capacity(10 * 1024 * 1024);
    payload.push('"');
    while payload.len() < 10 * 1024 * 1024 - 1 {
        payload.push_str("abcdefghij");
    }
    payload.truncate(10 * 1024 * 1024 - 1);
    payload.push('"');

    let response = client()
        .put(format!("http://127.0.0.1:{}/recipes/1", proxy))
        .body(payload.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let seen = recorder.last();
    assert_eq!(seen.method, "PUT");
    assert_eq!(seen.body.len(), payload.len());
    assert!(seen.body.as_ref() == payload.as_bytes());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn empty_body_and_error_status_are_relayed() {
    let (server, recorder, _, proxy) = start_pair(ContentTypePolicy::ForceJson, 30).await;

    let response = client()
        .get(format!("http://127.0.0.1:{}/missing", proxy))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.text().await.unwrap(), "no such recipe");

    let response = client()
        .delete(format!("http://127.0.0.1:{}/recipes/1", proxy))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(recorder.last().body.is_empty());
    assert_eq!(recorder.last().method, "DELETE");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn preserve_policy_keeps_client_content_type() {
    let (server, recorder, _, proxy) = start_pair(ContentTypePolicy::Preserve, 30).await;

    client()
        .post(format!("http://127.0.0.1:{}/recipes", proxy))
        .header(header::CONTENT_TYPE, "text/plain")
        .body("plain words")
        .send()
        .await
        .unwrap();

    assert_eq!(recorder.last().content_type.as_deref(), Some("text/plain"));
    server.stop().await.unwrap();
}

#[tokio::test]
async fn slow_primary_yields_gateway_timeout() {
    let (server, _, _, proxy) = start_pair(ContentTypePolicy::ForceJson, 1).await;

    let response = client()
        .get(format!("http://127.0.0.1:{}/slow", proxy))
        .header(header::ORIGIN, "http://localhost:5500")
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5500"
    );
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["upstream"].as_str().unwrap().ends_with("/slow"));

    server.shutdown_handle().trigger();
}

#[tokio::test]
async fn stalled_body_is_cut_off() {
    let (server, recorder, _, proxy) = start_pair(ContentTypePolicy::ForceJson, 1).await;

    let started = Instant::now();
    let response = client()
        .get(format!("http://127.0.0.1:{}/stall", proxy))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .unwrap();

    // The head arrived in time, so the status is relayed as-is.
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.bytes().await.is_err());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(recorder.last().path, "/stall");

    server.shutdown_handle().trigger();
}
