mod pages;

use std::convert::Infallible;

use axum::{
    Router,
    body::{Body, Bytes},
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

use crate::{
    pipeline::FrameHub,
    session::{SessionHandle, StartRequest},
};

const DASHBOARD_ROWS: usize = 30;
const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
    pub hub: FrameHub,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/workout", get(workout))
        .route("/start_test", post(start_test))
        .route("/video_feed", get(video_feed))
        .route("/results", get(results))
        .route("/dashboard", get(dashboard))
        .route("/status", get(status))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(pages::INDEX)
}

async fn workout() -> Html<&'static str> {
    Html(pages::WORKOUT)
}

// Malformed JSON gets the same 400 as invalid values.
async fn start_test(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let request = match serde_json::from_slice::<StartRequest>(&body) {
        Ok(request) => request,
        Err(err) => {
            log::debug!("rejected start request body: {err}");
            return invalid_params();
        }
    };

    match state.session.start(&request) {
        Ok(_) => (StatusCode::OK, Json(json!({ "ok": true }))),
        Err(err) => {
            log::debug!("rejected start request: {err}");
            invalid_params()
        }
    }
}

fn invalid_params() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "ok": false, "error": "invalid params" })),
    )
}

async fn video_feed(State(state): State<AppState>) -> impl IntoResponse {
    let rx = state.hub.subscribe();
    log::info!("video client connected ({} watching)", state.hub.subscriber_count());

    let parts = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(jpeg) if jpeg.is_empty() => return None,
                Ok(jpeg) => return Some((Ok::<_, Infallible>(multipart_part(&jpeg)), rx)),
                Err(RecvError::Lagged(skipped)) => {
                    log::debug!("video client lagging, skipped {skipped} frames");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    (
        [
            (header::CONTENT_TYPE, STREAM_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(parts),
    )
}

fn multipart_part(jpeg: &[u8]) -> Bytes {
    let mut part = Vec::with_capacity(jpeg.len() + 48);
    part.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}

async fn results(State(state): State<AppState>) -> Response {
    match state.session.last_result() {
        Some(result) => Html(pages::results(&result)).into_response(),
        None => Redirect::to("/").into_response(),
    }
}

async fn dashboard(State(state): State<AppState>) -> Response {
    let session = state.session.clone();
    let rows = tokio::task::spawn_blocking(move || session.history(DASHBOARD_ROWS)).await;

    match rows {
        Ok(Ok(rows)) => Html(pages::dashboard(&rows)).into_response(),
        Ok(Err(err)) => {
            log::error!("failed to read workout history: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(err) => {
            log::error!("history reader panicked: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.snapshot())
}
