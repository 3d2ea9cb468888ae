use std::net::SocketAddr;

use fileonce::router::create_router;
use fileonce::scheduler::WorkerSettings;
use fileonce::testing::TestHarness;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, redirect::Policy};
use serde_json::json;

async fn spawn_app() -> (SocketAddr, TestHarness) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let harness = TestHarness::new();
    let mut state = harness.app_state();
    state.config.files.max_upload_bytes = 1024;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().unwrap();

    let app = create_router(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, harness)
}

fn client() -> Client {
    Client::builder().redirect(Policy::none()).build().unwrap()
}

fn upload_form(passphrase: &str, expiration: &str) -> Form {
    Form::new()
        .part(
            "attachment",
            Part::bytes(b"quarterly numbers".to_vec())
                .file_name("report.txt")
                .mime_str("text/plain")
                .unwrap(),
        )
        .text("passphrase", passphrase.to_string())
        .text("expiration", expiration.to_string())
}

/// Uploads a file and returns its share id and view id.
async fn upload(base_url: &str, expiration: &str) -> (String, String) {
    let resp = client()
        .post(format!("{}/files/upload", base_url))
        .multipart(upload_form("open sesame", expiration))
        .send()
        .await
        .expect("Failed to upload");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: serde_json::Value = resp.json().await.unwrap();
    let redirect = body["data"]["redirect"].as_str().unwrap();
    let share_id = redirect
        .strip_prefix("/files/share/")
        .expect("redirect to share page")
        .to_string();

    let page = client()
        .get(format!("{}{}", base_url, redirect))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let view_id = page
        .split("/files/view/")
        .nth(1)
        .and_then(|rest| rest.get(..36))
        .expect("view link on share page")
        .to_string();

    (share_id, view_id)
}

#[tokio::test]
async fn test_upload_then_view_redirects_to_signed_url() {
    let (addr, harness) = spawn_app().await;
    let base_url = format!("http://{}", addr);

    let (_share_id, view_id) = upload(&base_url, "7 Days").await;

    let resp = client()
        .post(format!("{}/files/view/{}", base_url, view_id))
        .form(&[("passphrase", "open sesame")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let location = resp.headers()["location"].to_str().unwrap();
    assert!(location.starts_with("memory://"));
    assert!(location.ends_with("ttl=300"));
    assert_eq!(harness.blobs.len(), 1);
}

#[tokio::test]
async fn test_wrong_passphrase_is_rejected() {
    let (addr, _harness) = spawn_app().await;
    let base_url = format!("http://{}", addr);
    let (_share_id, view_id) = upload(&base_url, "1 Hour").await;

    let resp = client()
        .post(format!("{}/files/view/{}", base_url, view_id))
        .json(&json!({ "passphrase": "guess" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["statusText"], "Unauthorized");
    assert_eq!(body["error"]["passphrase"], "Invalid credentials");
}

#[tokio::test]
async fn test_revoke_then_view_is_not_found() {
    let (addr, harness) = spawn_app().await;
    let base_url = format!("http://{}", addr);
    let (share_id, view_id) = upload(&base_url, "3 Days").await;

    let resp = client()
        .post(format!("{}/files/share/{}", base_url, share_id))
        .json(&json!({ "passphrase": "open sesame" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["redirect"], "/files/upload");

    assert!(harness.blobs.is_empty());
    assert!(harness.queue.is_empty());

    let resp = client()
        .post(format!("{}/files/view/{}", base_url, view_id))
        .form(&[("passphrase", "open sesame")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expired_file_is_gone_after_worker_runs() {
    let (addr, harness) = spawn_app().await;
    let base_url = format!("http://{}", addr);
    let (_share_id, view_id) = upload(&base_url, "1 Minute").await;

    harness.clock.advance(time::Duration::minutes(1));
    harness
        .worker(WorkerSettings::default())
        .tick()
        .await
        .unwrap()
        .expect("job due");

    let resp = client()
        .get(format!("{}/files/view/{}", base_url, view_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(harness.blobs.is_empty());
}

#[tokio::test]
async fn test_upload_validation() {
    let (addr, _harness) = spawn_app().await;
    let base_url = format!("http://{}", addr);

    let resp = client()
        .post(format!("{}/files/upload", base_url))
        .multipart(upload_form("open sesame", "2 Weeks"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"]["expiration"].is_string());

    let resp = client()
        .post(format!("{}/files/upload", base_url))
        .multipart(Form::new().text("passphrase", "x").text("expiration", "1 Hour"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["attachment"], "Invalid or missing file");
}

#[tokio::test]
async fn test_unknown_routes_and_ids_are_not_found() {
    let (addr, _harness) = spawn_app().await;
    let base_url = format!("http://{}", addr);

    let resp = client()
        .get(format!("{}/no/such/page", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client()
        .post(format!("{}/files/view/not-a-uuid", base_url))
        .form(&[("passphrase", "x")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_check() {
    let (addr, _harness) = spawn_app().await;

    let resp = client()
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
}
