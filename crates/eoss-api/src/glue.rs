//! Per-request bookkeeping shared by every route: a request ID, latency
//! measurement, the access log line, and the `X-EOSS-Request-ID` response
//! header (§4.6).

use std::net::SocketAddr;
use std::time::Instant;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-eoss-request-id";

pub async fn request_glue(req: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let client_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string());

    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let mut response = next.run(req).await;
    let latency_ms = start.elapsed().as_millis();
    let status = response.status().as_u16();

    response.headers_mut().insert(
        REQUEST_ID_HEADER,
        HeaderValue::from_str(&request_id).unwrap_or_else(|_| HeaderValue::from_static("-")),
    );

    info!(
        target: "access_log",
        "{} {} {} {} {} {} {}",
        request_id, latency_ms, client_ip, method, path, status, user_agent
    );

    response
}
