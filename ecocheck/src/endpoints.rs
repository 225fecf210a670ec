//! Endpoints of HTTP server.
//!
use std::{convert::Infallible, sync::Arc};

use axum::{
    body::StreamBody,
    http::header,
    response::{Html, IntoResponse},
    routing::{get, post},
    Extension, Json, Router,
};
use common::ui::UiSnapshot;
use futures::{future, stream, StreamExt};
use tokio::sync::Mutex;
use tokio_stream::wrappers::BroadcastStream;

use crate::{session::Session, ui::UiBinder};

pub type SharedSession = Arc<Mutex<Session>>;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Build the router serving the page, its state and the control buttons.
pub fn router(session: SharedSession, ui: Arc<UiBinder>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthcheck", get(healthcheck))
        .route("/state", get(state))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/flip", post(flip))
        .route("/canvas", get(canvas_stream))
        .layer(Extension(session))
        .layer(Extension(ui))
}

/// Health check endpoint.
pub async fn healthcheck() -> &'static str {
    "healthy"
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn state(Extension(ui): Extension<Arc<UiBinder>>) -> Json<UiSnapshot> {
    Json(ui.snapshot())
}

// Failures of the handlers below are shown through the status line of the snapshot.

pub async fn start(Extension(session): Extension<SharedSession>) -> Json<UiSnapshot> {
    let mut session = session.lock().await;
    session.start().await.ok();
    Json(session.ui().snapshot())
}

pub async fn stop(Extension(session): Extension<SharedSession>) -> Json<UiSnapshot> {
    let mut session = session.lock().await;
    session.stop().await;
    Json(session.ui().snapshot())
}

pub async fn flip(Extension(session): Extension<SharedSession>) -> Json<UiSnapshot> {
    let mut session = session.lock().await;
    session.flip().await.ok();
    Json(session.ui().snapshot())
}

/// Canvas as a multipart JPEG stream, starting with the current picture.
pub async fn canvas_stream(Extension(ui): Extension<Arc<UiBinder>>) -> impl IntoResponse {
    log::info!("Canvas stream requested");
    let (latest, rx) = ui.subscribe_canvas();

    // Viewers that fall behind skip frames.
    let frames = BroadcastStream::new(rx).filter_map(|item| future::ready(item.ok()));
    let stream = stream::once(future::ready(latest))
        .chain(frames)
        .map(Ok::<_, Infallible>);

    // Set body and headers for multipart streaming
    let body = StreamBody::new(stream);
    let headers = [(
        header::CONTENT_TYPE,
        "multipart/x-mixed-replace; boundary=frame",
    )];

    (headers, body)
}
