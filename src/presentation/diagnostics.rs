//! Diagnostic page: submit a link, see what the reuploader makes of it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::use_cases::Reuploader;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Permalink shown on the page, with a preview hint.
pub struct PreviewLink {
    url: String,
}

impl PreviewLink {
    fn extension(&self) -> Option<String> {
        let path = self.url.split(['?', '#']).next().unwrap_or_default();
        path.rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    /// Returns true if the link should render as a video player.
    #[must_use]
    pub fn is_video(&self) -> bool {
        self.extension().as_deref() == Some("mp4")
    }

    /// Returns true if the link should render as an image.
    #[must_use]
    pub fn is_image(&self) -> bool {
        matches!(
            self.extension().as_deref(),
            Some("jpg" | "jpeg" | "png" | "gif")
        )
    }
}

#[derive(Template)]
#[template(path = "diagnostics.html", escape = "html")]
struct DiagnosticsPage {
    input: String,
    links: Vec<PreviewLink>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct DiagnosticsForm {
    #[serde(default)]
    input: String,
}

/// Builds the router answering the diagnostic page.
pub fn diagnostics_router(reuploader: Arc<Reuploader>) -> Router {
    Router::new()
        .route("/", get(show_form).post(run_reupload))
        .with_state(reuploader)
}

async fn show_form() -> Response {
    render(&DiagnosticsPage {
        input: String::new(),
        links: Vec::new(),
        error: None,
    })
}

async fn run_reupload(
    State(reuploader): State<Arc<Reuploader>>,
    Form(form): Form<DiagnosticsForm>,
) -> Response {
    let input = form.input.trim().to_string();
    info!(url = %input, "Diagnostic reupload requested");

    let page = match reuploader.reupload(&input).await {
        Ok(urls) => DiagnosticsPage {
            input,
            links: urls.into_iter().map(|url| PreviewLink { url }).collect(),
            error: None,
        },
        Err(e) => {
            warn!(url = %input, error = %e, "Diagnostic reupload failed");
            DiagnosticsPage {
                input,
                links: Vec::new(),
                error: Some(e.to_string()),
            }
        }
    };
    render(&page)
}

fn render(page: &DiagnosticsPage) -> Response {
    match page.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render diagnostic page");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Running diagnostic server with graceful shutdown.
pub struct DiagnosticsServer {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl DiagnosticsServer {
    /// Binds `addr` and serves the diagnostic page in the background.
    ///
    /// # Errors
    /// Returns error if the address cannot be bound.
    pub async fn start(addr: SocketAddr, reuploader: Arc<Reuploader>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let router = diagnostics_router(reuploader);

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "Diagnostic server stopped with error");
            }
        });

        info!(addr = %addr, "Diagnostic page listening");
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

    /// Stops the server and waits for in-flight requests.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, self.handle).await.is_err() {
            warn!(addr = %self.addr, "Diagnostic server did not shut down in time");
        }
    }
}
