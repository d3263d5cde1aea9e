use axum::{
    Router,
    body::{Body, to_bytes},
    extract::ConnectInfo,
    http::Request,
    response::Response,
};
use serde_json::Value;

use db::test_utils::setup_test_db;
use util::{config::AppConfig, state::AppState};

/// Builds a router over a fresh in-memory database.
pub async fn make_test_app() -> (Router, AppState) {
    AppConfig::set_jwt_secret("test-secret");

    let db = setup_test_db().await;
    let state = AppState::new(db);
    let app = Router::new().nest("/api", api::routes::routes(state.clone()));
    (app, state)
}

/// Bearer header value for a signed-in user.
pub fn bearer(user_id: i64, admin: bool) -> String {
    let (token, _) = api::auth::generate_jwt(user_id, admin);
    format!("Bearer {token}")
}

/// Attaches a `ConnectInfo<SocketAddr>` to a request, standing in for the
/// connection info the real server provides.
pub fn with_connect_info(mut req: Request<Body>, ip: [u8; 4]) -> Request<Body> {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::from(ip)), 43210);
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

pub async fn response_json(response: Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Issuance body for a 60-minute lecture whose UTC start is
/// `start_in_minutes` from now. The wall clock is pinned to 12:00-13:00 and
/// the session's UTC offset absorbs the difference, so tests never trip over
/// a midnight rollover.
pub fn session_body(start_in_minutes: i64, capacity: i32) -> Value {
    use chrono::{Duration, Utc};

    let start_utc = Utc::now() + Duration::minutes(start_in_minutes);
    let date = start_utc.date_naive();
    let wall_start = date.and_hms_opt(12, 0, 0).unwrap();
    let offset_minutes = (wall_start - start_utc.naive_utc()).num_minutes();

    serde_json::json!({
        "unit_name": "Software Engineering",
        "unit_code": "COS301",
        "date": date.format("%Y-%m-%d").to_string(),
        "start_time": "12:00",
        "end_time": "13:00",
        "venue": "IT 4-1",
        "capacity": capacity,
        "utc_offset_minutes": offset_minutes,
    })
}

pub fn post_json(uri: &str, auth: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Authorization", auth)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn put_json(uri: &str, auth: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("Authorization", auth)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_req(uri: &str, auth: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("Authorization", auth)
        .body(Body::empty())
        .unwrap()
}

pub fn delete_req(uri: &str, auth: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("Authorization", auth)
        .body(Body::empty())
        .unwrap()
}
