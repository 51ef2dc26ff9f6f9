use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode as AxumStatus,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tokio::sync::Mutex;

use shared::{domain::CharacterId, error::ErrorCode, protocol::TimelineEvent};

use super::*;

#[derive(Clone, Copy)]
enum Mode {
    Ok,
    Missing,
    Failing,
}

#[derive(Clone)]
struct SourceServer {
    mode: Mode,
    fetches: Arc<Mutex<u32>>,
    resets: Arc<Mutex<u32>>,
}

async fn spawn_source_server(mode: Mode) -> (String, SourceServer) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");

    let state = SourceServer {
        mode,
        fetches: Arc::new(Mutex::new(0)),
        resets: Arc::new(Mutex::new(0)),
    };
    let app = Router::new()
        .route("/sessions/:key", get(get_session))
        .route("/sessions/:key/reset", post(post_reset))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), state)
}

async fn get_session(
    Path(key): Path<String>,
    State(state): State<SourceServer>,
) -> axum::response::Response {
    *state.fetches.lock().await += 1;
    match state.mode {
        Mode::Ok => Json(serde_json::json!({
            "session_key": key,
            "title": "The Lighthouse",
            "characters": [
                {"id": 1, "name": "Mara", "profile_photo_url": "https://cdn.example/mara.png"}
            ],
            "events": [
                {"type": "show-story-prologue", "lines": ["long ago"]},
                {"type": "character-dialogue", "character_id": 1, "messages": ["who's there?"]},
                {"type": "weather-report", "inside": "rain"}
            ]
        }))
        .into_response(),
        Mode::Missing => (
            AxumStatus::NOT_FOUND,
            Json(ApiError::new(ErrorCode::NotFound, "no such session")),
        )
            .into_response(),
        Mode::Failing => (
            AxumStatus::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(
                ErrorCode::Internal,
                "story generator unavailable",
            )),
        )
            .into_response(),
    }
}

async fn post_reset(
    Path(_key): Path<String>,
    State(state): State<SourceServer>,
) -> axum::response::Response {
    *state.resets.lock().await += 1;
    match state.mode {
        Mode::Missing => (
            AxumStatus::NOT_FOUND,
            Json(ApiError::new(ErrorCode::NotFound, "no such session")),
        )
            .into_response(),
        _ => AxumStatus::NO_CONTENT.into_response(),
    }
}

#[tokio::test]
async fn fetches_and_decodes_a_session() {
    let (base, server) = spawn_source_server(Mode::Ok).await;
    let source = HttpDataSource::new(&base);

    let session = source
        .fetch_session(&SessionKey("k7".into()))
        .await
        .unwrap();

    assert_eq!(session.session_key, SessionKey("k7".into()));
    assert_eq!(session.title, "The Lighthouse");
    assert_eq!(session.events.len(), 3);
    assert_eq!(session.events[2], TimelineEvent::Unknown);
    assert_eq!(session.character(CharacterId(1)).unwrap().name, "Mara");
    assert_eq!(*server.fetches.lock().await, 1);
}

#[tokio::test]
async fn a_missing_session_maps_to_not_found() {
    let (base, _server) = spawn_source_server(Mode::Missing).await;
    let source = HttpDataSource::new(&base);

    let err = source
        .fetch_session(&SessionKey("gone".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::NotFound(key) if key.0 == "gone"));
}

#[tokio::test]
async fn a_server_failure_carries_the_error_body() {
    let (base, _server) = spawn_source_server(Mode::Failing).await;
    let source = HttpDataSource::new(&base);

    let err = source
        .fetch_session(&SessionKey("k7".into()))
        .await
        .unwrap_err();
    match err {
        QueryError::Rejected { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "story generator unavailable");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn reset_posts_the_mutation() {
    let (base, server) = spawn_source_server(Mode::Ok).await;
    let source = HttpDataSource::new(&base);

    source.reset_session(&SessionKey("k7".into())).await.unwrap();

    assert_eq!(*server.resets.lock().await, 1);
    assert_eq!(*server.fetches.lock().await, 0);
}

#[tokio::test]
async fn reset_on_a_missing_session_maps_to_not_found() {
    let (base, _server) = spawn_source_server(Mode::Missing).await;
    let source = HttpDataSource::new(&base);

    let err = source
        .reset_session(&SessionKey("gone".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::NotFound(_)));
}
