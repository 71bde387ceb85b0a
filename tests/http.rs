#![cfg(feature = "server")]

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;

use afdicon::acquire::Fetcher;
use afdicon::pool::WorkerPool;
use afdicon::server::{self, AppState};
use afdicon::{Compositor, OverlayLibrary};
use axum::extract::Query;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use reqwest::multipart::{Form, Part};
use tokio::net::TcpListener;

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

fn square_jpeg() -> Vec<u8> {
    let img = RgbImage::from_pixel(512, 512, Rgb([200, 30, 30]));
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([20, 40, 60, 255]));
    encode(DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

fn image_response(bytes: Vec<u8>, mime: &'static str) -> axum::response::Response {
    ([(header::CONTENT_TYPE, mime)], bytes).into_response()
}

async fn proxied(Query(params): Query<HashMap<String, String>>) -> axum::response::Response {
    match params.get("url") {
        Some(target) if target.ends_with("/square.jpg") => {
            image_response(square_jpeg(), "image/jpeg")
        }
        _ => (StatusCode::NOT_FOUND, "proxy: unknown target").into_response(),
    }
}

/// Stand-in for remote image hosts and the rewriting proxy.
fn upstream() -> Router {
    Router::new()
        .route("/square.jpg", get(|| async { image_response(square_jpeg(), "image/jpeg") }))
        .route("/wide.png", get(|| async { image_response(png(300, 500), "image/png") }))
        .route("/text", get(|| async { "just some text" }))
        .route("/huge.png", get(|| async { image_response(vec![0u8; 64 * 1024], "image/png") }))
        .route(
            "/missing",
            get(|| async { (StatusCode::NOT_FOUND, "no such image here") }),
        )
        .route("/proxy", get(proxied))
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        server::run(listener, app).await.unwrap();
    });
    addr
}

struct Harness {
    app: SocketAddr,
    upstream: SocketAddr,
    client: reqwest::Client,
}

impl Harness {
    async fn start() -> Self {
        Self::start_with_proxy(false).await
    }

    async fn start_with_proxy(use_proxy: bool) -> Self {
        Self::start_with(use_proxy, 20 * 1024 * 1024).await
    }

    async fn start_with(use_proxy: bool, max_fetch_bytes: usize) -> Self {
        let upstream = spawn(upstream()).await;
        let proxy = use_proxy
            .then(|| url::Url::parse(&format!("http://{upstream}/proxy")).unwrap());
        let state = AppState::new(
            Arc::new(OverlayLibrary::embedded().unwrap()),
            Fetcher::new(proxy, "url")
                .unwrap()
                .with_max_bytes(max_fetch_bytes),
            WorkerPool::new(2).unwrap(),
            Compositor::default(),
        );
        let app = spawn(server::router(state, 20 * 1024 * 1024)).await;
        Self {
            app,
            upstream,
            client: reqwest::Client::new(),
        }
    }

    fn upstream_url(&self, path: &str) -> String {
        format!("http://{}{path}", self.upstream)
    }

    async fn post(&self, form: Form) -> reqwest::Response {
        self.client
            .post(format!("http://{}/image", self.app))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn landing_page_is_served() {
    let h = Harness::start().await;
    let resp = h
        .client
        .get(format!("http://{}/", h.app))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text().await.unwrap().contains("<form"));
}

#[tokio::test]
async fn square_url_returns_png_attachment() {
    let h = Harness::start().await;
    let form = Form::new().text("url", h.upstream_url("/square.jpg"));
    let resp = h.post(form).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"afdicon.png\""
    );

    let bytes = resp.bytes().await.unwrap();
    let icon = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!(icon.dimensions(), (512, 512));
    assert_eq!(icon.get_pixel(0, 0)[3], 255);
    // Bottom-right corner is notched and then filled by overlay 1.
    assert_eq!(icon.get_pixel(511, 511)[3], 255);
    assert_ne!(&icon.get_pixel(511, 511).0[..3], &icon.get_pixel(0, 0).0[..3]);
}

#[tokio::test]
async fn non_square_image_is_bad_request_with_dimensions() {
    let h = Harness::start().await;
    let form = Form::new().text("url", h.upstream_url("/wide.png"));
    let resp = h.post(form).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = resp.text().await.unwrap();
    assert!(body.contains("300"), "{body}");
    assert!(body.contains("500"), "{body}");
}

#[tokio::test]
async fn missing_url_and_file_is_bad_request() {
    let h = Harness::start().await;
    let resp = h.post(Form::new().text("idx", "2")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(resp.text().await.unwrap().contains("must provide"));

    let resp = h
        .client
        .post(format!("http://{}/image", h.app))
        .form(&[("idx", "1")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn out_of_range_index_is_bad_request() {
    let h = Harness::start().await;
    let form = Form::new()
        .text("url", h.upstream_url("/square.jpg"))
        .text("idx", "15");
    let resp = h.post(form).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(resp.text().await.unwrap().contains("15"));
}

#[tokio::test]
async fn upstream_404_is_unprocessable_with_url() {
    let h = Harness::start().await;
    let url = h.upstream_url("/missing");
    let resp = h.post(Form::new().text("url", url.clone())).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = resp.text().await.unwrap();
    assert!(body.contains(&url), "{body}");
    assert!(body.contains("no such image here"), "{body}");
}

#[tokio::test]
async fn undecodable_download_is_unprocessable() {
    let h = Harness::start().await;
    let resp = h.post(Form::new().text("url", h.upstream_url("/text"))).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn oversized_download_is_unprocessable() {
    let h = Harness::start_with(false, 4 * 1024).await;
    let url = h.upstream_url("/huge.png");
    let resp = h.post(Form::new().text("url", url.clone())).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = resp.text().await.unwrap();
    assert!(body.contains(&url), "{body}");
    assert!(body.contains("larger than 4096 bytes"), "{body}");
}

#[tokio::test]
async fn uploaded_file_wins_over_url() {
    let h = Harness::start().await;
    let form = Form::new()
        .text("url", h.upstream_url("/missing"))
        .text("idx", "3")
        .part("file", Part::bytes(png(64, 64)).file_name("avatar.png"));
    let resp = h.post(form).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let icon = image::load_from_memory(&resp.bytes().await.unwrap()).unwrap();
    assert_eq!((icon.width(), icon.height()), (64, 64));
}

#[tokio::test]
async fn garbage_upload_falls_back_to_url() {
    let h = Harness::start().await;
    let form = Form::new()
        .text("url", h.upstream_url("/square.jpg"))
        .part("file", Part::bytes(b"not an image".to_vec()).file_name("x.png"));
    let resp = h.post(form).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let icon = image::load_from_memory(&resp.bytes().await.unwrap()).unwrap();
    assert_eq!((icon.width(), icon.height()), (512, 512));
}

#[tokio::test]
async fn fetches_go_through_configured_proxy() {
    let h = Harness::start_with_proxy(true).await;
    // Unresolvable host: only reachable through the proxy.
    let form = Form::new().text("url", "http://images.invalid/square.jpg");
    let resp = h.post(form).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let form = Form::new().text("url", "http://images.invalid/other.jpg");
    let resp = h.post(form).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = resp.text().await.unwrap();
    assert!(body.contains("http://images.invalid/other.jpg"), "{body}");
}

#[tokio::test]
async fn identical_requests_give_identical_png() {
    let h = Harness::start().await;
    let mut bodies = Vec::new();
    for _ in 0..2 {
        let form = Form::new()
            .text("url", h.upstream_url("/square.jpg"))
            .text("idx", "7");
        bodies.push(h.post(form).await.bytes().await.unwrap());
    }
    assert_eq!(bodies[0], bodies[1]);
}

#[tokio::test]
async fn bodyless_post_is_bad_request() {
    let h = Harness::start().await;
    let resp = h
        .client
        .post(format!("http://{}/image", h.app))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
