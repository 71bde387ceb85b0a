//! HTTP surface: the landing page and the `/image` endpoint.
//!
//! | Method | Path     | Result                                            |
//! |--------|----------|---------------------------------------------------|
//! | GET    | `/`      | landing page                                      |
//! | POST   | `/image` | PNG attachment, or plain-text error (400/422/500) |
//!
//! `/image` reads the form fields `url`, `file` and `idx` from either a
//! multipart or a url-encoded body.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Form, FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use url::Url;

use crate::acquire::{self, Fetcher, ImageSource};
use crate::compositor::Compositor;
use crate::error::{Error, ErrorKind, Result};
use crate::geometry::MaskGeometry;
use crate::overlays::{self, OverlayLibrary};
use crate::pool::WorkerPool;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Filename offered to the browser for the finished icon.
pub const DOWNLOAD_NAME: &str = "afdicon.png";

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Rewriting proxy remote images are fetched through.
    ///
    /// Off by default: `None` fetches every URL directly. Set it to route
    /// fetches through a hotlink-workaround endpoint, which then sees every
    /// requested URL.
    pub proxy: Option<Url>,
    /// Query parameter the proxy expects the target URL in.
    pub proxy_param: String,
    /// Directory with `1.png` .. `9.png`; `None` uses the embedded overlays.
    pub overlay_dir: Option<PathBuf>,
    /// Compositing worker threads; 0 means one per CPU.
    pub workers: usize,
    /// Largest accepted request body, and largest remote image fetched.
    pub max_upload_bytes: usize,
    /// Notch geometry.
    pub geometry: MaskGeometry,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            proxy: None,
            proxy_param: "url".to_string(),
            overlay_dir: None,
            workers: 0,
            max_upload_bytes: acquire::DEFAULT_MAX_BYTES,
            geometry: MaskGeometry::NOTCH,
        }
    }
}

/// Shared, read-only state handed to every request.
#[derive(Debug, Clone)]
pub struct AppState {
    overlays: Arc<OverlayLibrary>,
    fetcher: Fetcher,
    pool: WorkerPool,
    compositor: Compositor,
}

impl AppState {
    /// Assemble state from its parts.
    #[must_use]
    pub fn new(
        overlays: Arc<OverlayLibrary>,
        fetcher: Fetcher,
        pool: WorkerPool,
        compositor: Compositor,
    ) -> Self {
        Self {
            overlays,
            fetcher,
            pool,
            compositor,
        }
    }

    /// Load overlays, start the worker pool and build the HTTP client.
    ///
    /// # Errors
    ///
    /// Fails if an overlay is missing or corrupt, or the pool or client
    /// cannot be created.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let overlays = match &config.overlay_dir {
            Some(dir) => OverlayLibrary::from_dir(dir)?,
            None => OverlayLibrary::embedded()?,
        };
        Ok(Self::new(
            Arc::new(overlays),
            Fetcher::new(config.proxy.clone(), config.proxy_param.clone())?
                .with_max_bytes(config.max_upload_bytes),
            WorkerPool::new(config.workers)?,
            Compositor::new(config.geometry),
        ))
    }
}

/// Build the application router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/image", post(make_icon))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Load everything, bind, and serve until Ctrl-C.
///
/// # Errors
///
/// Fails on startup errors (see [`AppState::from_config`]) or if the
/// address cannot be bound.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let state = AppState::from_config(&config)?;
    let listener = TcpListener::bind(config.bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        workers = state.pool.threads(),
        overlays = state.overlays.len(),
        proxy = config.proxy.as_ref().map_or("none (direct fetch)", Url::as_str),
        max_bytes = state.fetcher.max_bytes(),
        "listening"
    );
    run(listener, router(state, config.max_upload_bytes)).await
}

/// Serve `app` on an already bound listener until Ctrl-C.
///
/// # Errors
///
/// Returns [`Error::Io`] if the accept loop fails.
pub async fn run(listener: TcpListener, app: Router) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Fields of the `/image` form.
#[derive(Debug, Default)]
struct ImageForm {
    url: Option<String>,
    file: Option<Vec<u8>>,
    idx: Option<String>,
}

async fn make_icon(State(state): State<AppState>, req: Request) -> Response {
    let form = match read_form(req).await {
        Ok(form) => form,
        Err(rejection) => return rejection,
    };

    let started = Instant::now();
    match render(&state, form).await {
        Ok(png) => {
            tracing::info!(
                bytes = png.len(),
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "served icon"
            );
            (
                [
                    (header::CONTENT_TYPE, "image/png".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{DOWNLOAD_NAME}\""),
                    ),
                ],
                png,
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn render(state: &AppState, form: ImageForm) -> Result<Vec<u8>> {
    let idx = overlays::parse_index(form.idx.as_deref())?;
    let source = ImageSource {
        upload: form.file,
        url: form.url,
    };
    let image = acquire::acquire(&state.fetcher, &state.pool, source).await?;
    tracing::debug!(idx, width = image.width(), height = image.height(), "acquired image");

    let library = Arc::clone(&state.overlays);
    let compositor = state.compositor;
    state
        .pool
        .run(move || {
            let overlay = library.get(idx).ok_or(Error::OverlayMissing(idx))?;
            compositor.render_png(&image, Some(overlay))
        })
        .await?
}

async fn read_form(req: Request) -> std::result::Result<ImageForm, Response> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(mut fields) = Form::<HashMap<String, String>>::from_request(req, &())
            .await
            .map_err(IntoResponse::into_response)?;
        return Ok(ImageForm {
            url: fields.remove("url"),
            file: None,
            idx: fields.remove("idx"),
        });
    }
    if !content_type.starts_with("multipart/form-data") {
        // No form at all: every field is absent.
        return Ok(ImageForm::default());
    }

    let mut multipart = Multipart::from_request(req, &())
        .await
        .map_err(IntoResponse::into_response)?;
    let mut form = ImageForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(IntoResponse::into_response)?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("url") => form.url = Some(field.text().await.map_err(IntoResponse::into_response)?),
            Some("idx") => form.idx = Some(field.text().await.map_err(IntoResponse::into_response)?),
            Some("file") => {
                let bytes = field.bytes().await.map_err(IntoResponse::into_response)?;
                form.file = Some(bytes.to_vec());
            }
            _ => {}
        }
    }
    Ok(form)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::Input | ErrorKind::Shape => StatusCode::BAD_REQUEST,
            ErrorKind::Acquisition => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            return (status, "internal server error").into_response();
        }

        tracing::info!(status = status.as_u16(), error = %self, "request rejected");
        (status, self.to_string()).into_response()
    }
}
