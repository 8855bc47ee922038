//! HTTP transport boundary.
//!
//! The protocol accepts exactly `POST /`. Anything else never reaches the
//! parser: it is answered with an empty 404 (no protocol envelope) and
//! recorded on the security audit channel with remote address, method,
//! target, and body.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::error::ServiceError;
use crate::protocol::{peek_fingerprint, RequestHandler};

/// Bind `addr` and serve signing requests until the task is cancelled.
pub async fn run(addr: SocketAddr, handler: Arc<RequestHandler>) -> Result<(), ServiceError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServiceError::transport(e.to_string()))?;
    info!(%addr, "Listening for signing requests");

    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "Accept failed");
                continue;
            }
        };
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| {
                let handler = Arc::clone(&handler);
                async move {
                    Ok::<_, std::convert::Infallible>(route(req, &handler, remote).await)
                }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!(error = %e, %remote, "Connection closed with error");
            }
        });
    }
}

/// Route one request: `POST /` goes to the protocol handler, everything
/// else is rejected at this boundary.
pub async fn route<B>(
    req: Request<B>,
    handler: &RequestHandler,
    remote: SocketAddr,
) -> Response<Full<Bytes>>
where
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, %remote, "Failed to read request body");
            Bytes::new()
        }
    };

    if method == Method::POST && path == "/" {
        let response = handler.handle_to_json(&body).await;
        info!(
            target: "security",
            remote = %remote,
            method = %method,
            path = %path,
            fingerprint = peek_fingerprint(&body).as_deref().unwrap_or("-"),
            "Served signing request"
        );
        json_response(response)
    } else {
        warn!(
            target: "security",
            remote = %remote,
            method = %method,
            path = %path,
            body = %String::from_utf8_lossy(&body),
            "Rejected request outside POST /"
        );
        let mut response = Response::new(Full::new(Bytes::new()));
        *response.status_mut() = StatusCode::NOT_FOUND;
        response
    }
}

fn json_response(body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
