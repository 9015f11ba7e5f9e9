//! Liveness/readiness endpoint over plain HTTP/1.

use crate::readiness::ReadinessState;
use eyre::Context;
use http::{Method, StatusCode, header};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub async fn bind(host: &str, port: u16) -> eyre::Result<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .with_context(|| format!("bind health endpoint to {host}:{port}"))
}

/// Serves health checks on `listener` until the task is dropped.
pub async fn serve(listener: TcpListener, readiness: Arc<ReadinessState>) -> eyre::Result<()> {
    let addr = listener.local_addr().context("get health endpoint address")?;
    tracing::info!(%addr, "health endpoint listening");
    loop {
        let (conn, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "health endpoint accept failed");
                continue;
            }
        };
        let readiness = Arc::clone(&readiness);
        tokio::spawn(serve_connection(conn, peer, readiness));
    }
}

async fn serve_connection(
    conn: tokio::net::TcpStream,
    peer: SocketAddr,
    readiness: Arc<ReadinessState>,
) {
    let conn = hyper_util::rt::TokioIo::new(conn);
    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
        let response = route(&req, &readiness);
        async move { Ok::<_, Infallible>(response) }
    });
    if let Err(e) = hyper::server::conn::http1::Builder::new()
        .serve_connection(conn, service)
        .await
    {
        tracing::debug!(%peer, error = %e, "health connection ended with error");
    }
}

/// Answers one health request.
///
/// `/healthz` and `/` always return 200 while the process is alive; whether the bot can
/// actually add videos is the `ready` field, not the status code.
pub fn route<B>(req: &Request<B>, readiness: &ReadinessState) -> Response<Full<Bytes>> {
    if !matches!(req.uri().path(), "/healthz" | "/") {
        return plain(StatusCode::NOT_FOUND, "not found");
    }
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return plain(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    }

    let body = serde_json::json!({
        "status": "ok",
        "ready": readiness.is_ready(),
        "uptime_s": readiness.uptime().as_secs(),
        "failures": readiness.failures(),
    });
    let mut response = Response::new(Full::from(body.to_string()));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}

fn plain(status: StatusCode, message: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::from(message));
    *response.status_mut() = status;
    response
}
