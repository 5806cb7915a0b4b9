//! Thin hyper transport over [`dispatch`]: accepts connections, reads one
//! request's method/path/query/body, hands them to the pure dispatcher, and
//! writes back its JSON response.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use appmetrics::Registry;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1::Builder as Http1Builder;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::warn;

use crate::dispatch::{dispatch, Method};
use crate::error::BuildError;

/// The default mount point for the HTTP surface.
pub const DEFAULT_ROOT: &str = "/_app-metrics";

/// Serves the registry's HTTP surface over a bound TCP listener, mounted at
/// `root`, until the returned future is dropped.
pub struct HttpExporter {
    registry: Arc<Registry>,
    root: String,
    listener: TcpListener,
}

impl HttpExporter {
    /// Binds `addr` and mounts the registry's HTTP surface at `root`.
    pub async fn bind(
        registry: Arc<Registry>,
        addr: SocketAddr,
        root: impl Into<String>,
    ) -> Result<Self, BuildError> {
        let listener =
            TcpListener::bind(addr).await.map_err(|source| BuildError::Bind { addr, source })?;
        Ok(Self { registry, root: root.into(), listener })
    }

    /// The address this exporter is actually listening on (useful when
    /// binding to port 0 in tests).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever, serving each with its own spawned task.
    pub async fn serve(self) -> ! {
        loop {
            let (stream, _) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = ?e, "error accepting connection");
                    continue;
                }
            };
            let registry = self.registry.clone();
            let root = self.root.clone();
            let service = service_fn(move |req: Request<Incoming>| {
                let registry = registry.clone();
                let root = root.clone();
                async move { Ok::<_, Infallible>(handle(&registry, &root, req).await) }
            });

            tokio::spawn(async move {
                if let Err(err) =
                    Http1Builder::new().serve_connection(TokioIo::new(stream), service).await
                {
                    warn!(error = ?err, "error serving connection");
                }
            });
        }
    }
}

async fn handle(registry: &Arc<Registry>, root: &str, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let method = match *req.method() {
        hyper::Method::GET => Method::Get,
        hyper::Method::PUT => Method::Put,
        hyper::Method::POST => Method::Post,
        hyper::Method::DELETE => Method::Delete,
        _ => Method::Other,
    };

    let path = req.uri().path().strip_prefix(root).unwrap_or(req.uri().path()).to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    let body = match req.into_body().collect().await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            if bytes.is_empty() {
                None
            } else {
                Some(bytes)
            }
        }
        Err(e) => {
            warn!(error = ?e, "error reading request body");
            None
        }
    };

    let result = dispatch(registry, method, &path, &query, body.as_deref());
    let status =
        StatusCode::from_u16(result.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let payload = serde_json::to_vec(&result.body).unwrap_or_else(|_| b"null".to_vec());

    let mut response = Response::new(Full::new(Bytes::from(payload)));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
