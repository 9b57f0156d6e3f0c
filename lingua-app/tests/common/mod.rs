use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use lingua_app::api::{routes::AppState, server::router};
use lingua_core::{repo::memory::MemoryRepo, FixedClock};
use serde_json::Value;
use std::sync::Arc;

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap()
}

pub fn create_test_app() -> (Router, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(start()));
    let state = AppState {
        repo: Arc::new(MemoryRepo::new()),
        clock: clock.clone(),
        max_attempts: 3,
    };
    (router(state), clock)
}

pub fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut b = Request::builder().method(method).uri(uri);
    if let Some(u) = user {
        b = b.header("x-user-id", u);
    }
    match body {
        Some(v) => b
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => b.body(Body::empty()).unwrap(),
    }
}

pub async fn json_body(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
