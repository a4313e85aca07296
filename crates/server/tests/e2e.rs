use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use reqwest::StatusCode as HttpStatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use configs::{AppConfig, MEMORY_DATABASE_URL};
use server::routes::{self, auth::ServerState};
use service::store::MemoryStore;

fn cors() -> CorsLayer { CorsLayer::very_permissive() }

struct TestApp {
    base_url: String,
    state: ServerState,
}

async fn start_server() -> anyhow::Result<TestApp> {
    let root = std::env::temp_dir().join(format!("rating_e2e_{}", Uuid::new_v4()));
    let mut cfg = AppConfig::default();
    cfg.database.url = MEMORY_DATABASE_URL.into();
    cfg.storage.public_dir = root.join("public").display().to_string();
    cfg.storage.upload_dir = root.join("public/uploads/waiters").display().to_string();
    cfg.storage.qr_dir = root.join("public/images/qrcodes").display().to_string();
    cfg.storage.backup_dir = root.join("backup").display().to_string();

    let state = ServerState::new(Arc::new(MemoryStore::new()), cfg);
    let app: Router = routes::build_router(state.clone(), cors());
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    let base_url = format!("http://{}:{}", addr.ip(), addr.port());

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await { eprintln!("server error: {}", e); }
    });

    Ok(TestApp { base_url, state })
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("reqwest client")
}

#[tokio::test]
async fn e2e_public_health() -> anyhow::Result<()> {
    let app = start_server().await?;
    let res = client().get(format!("{}/health", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn e2e_session_cookie_carries_identity() -> anyhow::Result<()> {
    let app = start_server().await?;
    let c = client();

    let res = c.get(format!("{}/auth/me", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::SEE_OTHER);

    let res = c
        .post(format!("{}/auth/register", app.base_url))
        .json(&json!({"username": "frank", "password": "longenough"}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);

    let res = c
        .post(format!("{}/auth/login", app.base_url))
        .json(&json!({"username": "frank", "password": "longenough"}))
        .send()
        .await?;
    assert_eq!(res.status(), HttpStatusCode::OK);

    let me: Value = c.get(format!("{}/auth/me", app.base_url)).send().await?.json().await?;
    assert_eq!(me["username"], "frank");
    assert_eq!(me["role"], "normal");
    Ok(())
}

#[tokio::test]
async fn e2e_rate_restaurant_once() -> anyhow::Result<()> {
    let app = start_server().await?;
    let c = client();
    let restaurant = app.state.restaurants.create("Bistro A").await?;

    c.post(format!("{}/auth/register", app.base_url))
        .json(&json!({"username": "gina", "password": "longenough"}))
        .send()
        .await?;
    c.post(format!("{}/auth/login", app.base_url))
        .json(&json!({"username": "gina", "password": "longenough"}))
        .send()
        .await?;

    let url = |score: u8| format!("{}/restaurants/{}/rate/{}", app.base_url, restaurant.id, score);
    let first: Value = c.post(url(80)).send().await?.json().await?;
    assert_eq!(first["outcome"], "inserted");
    assert_eq!(first["average"], "80 / 100");

    let res = c.post(url(60)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::CONFLICT);
    let err: Value = res.json().await?;
    assert_eq!(err["error"], "you have already rated this restaurant");

    let list: Value = c.get(format!("{}/", app.base_url)).send().await?.json().await?;
    assert_eq!(list[0]["name"], "Bistro A");
    assert_eq!(list[0]["average"], "80 / 100");
    Ok(())
}
