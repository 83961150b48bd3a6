//! The `/metrics` scrape endpoint, served over plain HTTP alongside the
//! UDP/TCP listeners. Mirrors `lite/src/handlers/mod.rs`'s tiny `axum`
//! router: a `/ping` liveness check plus a `/metrics` route returning
//! `metrics::gather()`'s Prometheus text exposition.

use std::net::SocketAddr;

async fn metrics() -> impl axum::response::IntoResponse {
    let body = crate::metrics::gather();
    ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

async fn ping() -> &'static str {
    "pong"
}

fn router() -> axum::Router {
    axum::Router::new()
        .route("/ping", axum::routing::get(ping))
        .route("/metrics", axum::routing::get(metrics))
}

pub async fn run(addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router()).await
}
