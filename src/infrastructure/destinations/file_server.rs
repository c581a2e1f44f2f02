//! Read-only HTTP server for a filesystem destination.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use axum::Router;
use axum::extract::Request;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::domain::errors::DestinationError;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
const VIDEO_CACHE_CONTROL: &str = "public, max-age=31536000";
const DEFAULT_CACHE_CONTROL: &str = "public, max-age=3600";

/// Builds the router serving files under `root`.
///
/// Only GET and HEAD are answered and directory paths are never listed.
pub fn file_router(root: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(root).append_index_html_on_directories(false))
        .layer(middleware::from_fn(file_headers))
}

async fn file_headers(request: Request, next: Next) -> Response {
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let path = request.uri().path().to_owned();
    if path != "/" && path.ends_with('/') {
        return StatusCode::NOT_FOUND.into_response();
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    if path.ends_with(".mp4") {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(VIDEO_CACHE_CONTROL));
    } else {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(DEFAULT_CACHE_CONTROL));
    }
    response
}

/// Running file server with graceful shutdown.
pub struct FileServer {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl FileServer {
    /// Binds `addr` and starts serving `root` in the background.
    ///
    /// # Errors
    /// Returns error if the address cannot be bound.
    pub async fn start(addr: &str, root: &Path) -> Result<Self, DestinationError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| DestinationError::config(format!("binding file server to {addr}: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| DestinationError::storage(e.to_string()))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let router = file_router(root);

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "File server stopped with error");
            }
        });

        info!(addr = %addr, "File server listening");
        Ok(Self {
            addr,
            shutdown_tx,
            handle,
        })
    }

    /// Returns the bound address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops accepting connections and waits for in-flight requests.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, self.handle).await.is_err() {
            warn!(addr = %self.addr, "File server did not shut down in time");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use tower::ServiceExt;

    fn request(method: Method, uri: &str) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn served_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc.mp4"), b"video").unwrap();
        std::fs::write(dir.path().join("abc.png"), b"image").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_mp4_headers() {
        let dir = served_dir();
        let response = file_router(dir.path())
            .oneshot(request(Method::GET, "/abc.mp4"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "video/mp4");
        assert_eq!(response.headers()[CACHE_CONTROL], VIDEO_CACHE_CONTROL);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(body.as_ref(), b"video");
    }

    #[tokio::test]
    async fn test_other_files_get_short_cache() {
        let dir = served_dir();
        let response = file_router(dir.path())
            .oneshot(request(Method::HEAD, "/abc.png"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CACHE_CONTROL], DEFAULT_CACHE_CONTROL);
    }

    #[tokio::test]
    async fn test_directory_paths_are_hidden() {
        let dir = served_dir();
        let response = file_router(dir.path())
            .oneshot(request(Method::GET, "/sub/"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_writes_are_rejected() {
        let dir = served_dir();
        let response = file_router(dir.path())
            .oneshot(request(Method::PUT, "/abc.png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_server_start_and_shutdown() {
        let dir = served_dir();
        let server = FileServer::start("127.0.0.1:0", dir.path()).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
        server.shutdown().await;
    }
}
