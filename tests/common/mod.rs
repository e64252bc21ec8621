#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tempfile::TempDir;

use slotpost::config::{Config, parse_slots};
use slotpost::state::{AppState, SharedState};
use slotpost::transport::{ChatTarget, DeliveryError, Transport};

/// A queue database in its own temporary directory.
pub struct TestStore {
    pub pool: SqlitePool,
    pub dir: TempDir,
}

impl TestStore {
    pub fn url(&self) -> String {
        format!("sqlite://{}", self.dir.path().join("queue.db").display())
    }
}

pub async fn store() -> TestStore {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("queue.db").display());
    let pool = slotpost::db::connect(&url)
        .await
        .expect("Failed to open test queue store");
    TestStore { pool, dir }
}

pub fn test_config() -> Config {
    Config {
        bot_token: "123456:test-token".to_string(),
        target: ChatTarget::Handle("@test_channel".to_string()),
        timezone: chrono_tz::Europe::Belgrade,
        slots: parse_slots("10:00,13:00,16:00,19:00,22:00").unwrap(),
        database_url: "sqlite::memory:".to_string(),
        http_addr: None,
        api_token: None,
        poll_timeout_secs: 25,
        log_level: "warn".to_string(),
    }
}

pub fn state(pool: SqlitePool, config: Config) -> SharedState {
    Arc::new(AppState { pool, config })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub method: &'static str,
    pub target: ChatTarget,
    pub payload: String,
    pub caption: Option<String>,
}

/// Transport double: records every call and answers from a script
/// (successful once the script runs out).
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<Sent>>,
    script: Mutex<VecDeque<Result<(), DeliveryError>>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(results: Vec<Result<(), DeliveryError>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            ..Self::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    async fn record(
        &self,
        method: &'static str,
        target: &ChatTarget,
        payload: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().unwrap().push(Sent {
            method,
            target: target.clone(),
            payload: payload.to_string(),
            caption: caption.map(str::to_string),
        });
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_text(&self, target: &ChatTarget, text: &str) -> Result<(), DeliveryError> {
        self.record("send_text", target, text, None).await
    }

    async fn send_photo(
        &self,
        target: &ChatTarget,
        content_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        self.record("send_photo", target, content_ref, caption).await
    }

    async fn send_video(
        &self,
        target: &ChatTarget,
        content_ref: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        self.record("send_video", target, content_ref, caption).await
    }
}

/// A running admin API instance backed by a temporary store.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: SqlitePool,
    pub client: Client,
    pub store: TestStore,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (Value, StatusCode) {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: &Value) -> (Value, StatusCode) {
        let mut req = self.client.post(self.url(path)).json(body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> (Value, StatusCode) {
        let mut req = self.client.delete(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.expect("delete request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }
}

/// Spawn the admin API on a random port.
pub async fn spawn_app(config: Config) -> TestApp {
    let store = store().await;
    let pool = store.pool.clone();
    let app = slotpost::build_app(state(pool.clone(), config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    TestApp {
        addr,
        pool,
        client: Client::new(),
        store,
    }
}
