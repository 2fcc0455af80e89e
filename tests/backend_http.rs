//! HttpBackendClient against an in-process axum server.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use course_companion::adapters::backend::HttpBackendClient;
use course_companion::domain::{Attachment, DomainError};
use course_companion::ports::BackendPort;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct UploadedPart {
    field: String,
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct Recorded {
    uploads: Mutex<Vec<(String, Vec<UploadedPart>)>>,
    deleted: Mutex<Vec<(String, String)>>,
    renamed: Mutex<Vec<(String, String, String)>>,
    limits: Mutex<Vec<String>>,
}

type AppState = Arc<Recorded>;

async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "service": "rag"}))
}

async fn collection_status(Path(course_id): Path<String>) -> impl IntoResponse {
    if course_id == "missing" {
        return (StatusCode::NOT_FOUND, "").into_response();
    }
    Json(json!({
        "exists": true,
        "document_count": 12,
        "collection_name": format!("course_{}", course_id)
    }))
    .into_response()
}

async fn list_chats(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    state
        .limits
        .lock()
        .unwrap()
        .push(params.get("limit").cloned().unwrap_or_default());
    let chats = json!([
        {"session_id": "s1", "title": "Exam prep", "updated_at": "2024-03-01T10:00:00Z", "message_count": 4},
        {"session_id": "s2"}
    ]);
    if course_id == "bare" {
        Json(chats)
    } else {
        Json(json!({ "chats": chats }))
    }
}

async fn get_chat(Path((_course_id, session_id)): Path<(String, String)>) -> impl IntoResponse {
    if session_id == "missing" {
        return (StatusCode::NOT_FOUND, "Chat not found").into_response();
    }
    Json(json!({
        "session_id": session_id,
        "title": "Exam prep",
        "messages": [
            {"role": "user", "content": "When is the midterm?"},
            {"role": "assistant", "content": "Week 8."}
        ]
    }))
    .into_response()
}

async fn delete_chat(
    State(state): State<AppState>,
    Path((course_id, session_id)): Path<(String, String)>,
) -> StatusCode {
    state.deleted.lock().unwrap().push((course_id, session_id));
    StatusCode::NO_CONTENT
}

async fn rename_chat(
    State(state): State<AppState>,
    Path((course_id, session_id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let title = body["title"].as_str().unwrap_or_default().to_string();
    state
        .renamed
        .lock()
        .unwrap()
        .push((course_id, session_id, title));
    Json(json!({"ok": true}))
}

async fn upload(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let course_id = params.get("course_id").cloned().unwrap_or_default();
    if course_id == "fail" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "vector store offline").into_response();
    }
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.unwrap().to_vec();
        parts.push(UploadedPart {
            field: field_name,
            file_name,
            content_type,
            bytes,
        });
    }
    let count = parts.len();
    state.uploads.lock().unwrap().push((course_id.clone(), parts));
    Json(json!({
        "message": format!("Uploaded {} files", count),
        "uploaded": count,
        "failed": [],
        "course_id": course_id
    }))
    .into_response()
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn start_backend() -> (HttpBackendClient, AppState) {
    let state = AppState::default();
    let router = Router::new()
        .route("/", get(health))
        .route("/collections/:course_id/status", get(collection_status))
        .route("/chats/:course_id", get(list_chats))
        .route("/chats/:course_id/:session_id", get(get_chat).delete(delete_chat))
        .route("/chats/:course_id/:session_id/title", patch(rename_chat))
        .route("/upload_pdfs", post(upload))
        .with_state(Arc::clone(&state));
    let addr = serve(router).await;
    let client = HttpBackendClient::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap();
    (client, state)
}

#[tokio::test]
async fn test_health_check_ok() {
    let (client, _) = start_backend().await;
    assert!(client.health_check().await);
}

#[tokio::test]
async fn test_health_check_false_when_unreachable_or_degraded() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = HttpBackendClient::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    assert!(!client.health_check().await);

    let degraded = Router::new().route("/", get(|| async { Json(json!({"status": "degraded"})) }));
    let addr = serve(degraded).await;
    let client = HttpBackendClient::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    assert!(!client.health_check().await);
}

#[tokio::test]
async fn test_collection_status_keeps_unknown_fields() {
    let (client, _) = start_backend().await;
    let status = client.collection_status("7").await.unwrap();
    assert_eq!(status.exists, Some(true));
    assert_eq!(status.document_count, Some(12));
    assert_eq!(status.extra["collection_name"], "course_7");
}

#[tokio::test]
async fn test_http_error_with_empty_body_uses_reason() {
    let (client, _) = start_backend().await;
    match client.collection_status("missing").await {
        Err(DomainError::Http { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "Not Found");
        }
        other => panic!("expected Http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_list_chats_wrapped_and_bare() {
    let (client, state) = start_backend().await;
    let wrapped = client.list_chats("7", 20).await.unwrap();
    let bare = client.list_chats("bare", 5).await.unwrap();
    assert_eq!(wrapped, bare);
    assert_eq!(wrapped.len(), 2);
    assert_eq!(wrapped[0].title, "Exam prep");
    assert_eq!(wrapped[0].message_count, 4);
    assert_eq!(wrapped[1].session_id, "s2");
    assert_eq!(wrapped[1].title, "");
    assert_eq!(*state.limits.lock().unwrap(), ["20", "5"]);
}

#[tokio::test]
async fn test_get_chat_and_not_found() {
    let (client, _) = start_backend().await;
    let detail = client.get_chat("7", "s1").await.unwrap();
    assert_eq!(detail.session_id, "s1");
    assert_eq!(detail.messages.len(), 2);
    assert_eq!(detail.messages[1].role, "assistant");

    match client.get_chat("7", "missing").await {
        Err(DomainError::Http { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "Chat not found");
        }
        other => panic!("expected Http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_and_rename_chat() {
    let (client, state) = start_backend().await;
    client.delete_chat("7", "s1").await.unwrap();
    client.rename_chat("7", "s2", "Final review").await.unwrap();
    assert_eq!(
        *state.deleted.lock().unwrap(),
        [("7".to_string(), "s1".to_string())]
    );
    assert_eq!(
        *state.renamed.lock().unwrap(),
        [(
            "7".to_string(),
            "s2".to_string(),
            "Final review".to_string()
        )]
    );
}

#[tokio::test]
async fn test_upload_sends_one_files_part_per_attachment() {
    let (client, state) = start_backend().await;
    let attachments = vec![
        Attachment {
            file_name: "syllabus.pdf".into(),
            mime_type: "application/pdf".into(),
            bytes: b"%PDF-1.4".to_vec(),
        },
        Attachment {
            file_name: "notes.md".into(),
            mime_type: "text/markdown".into(),
            bytes: b"# Week 1".to_vec(),
        },
    ];
    let receipt = client.upload_materials("42", attachments).await.unwrap();
    assert_eq!(receipt.message.as_deref(), Some("Uploaded 2 files"));
    assert_eq!(receipt.uploaded, 2);
    assert!(receipt.failed.is_empty());
    assert_eq!(receipt.extra["course_id"], "42");

    let uploads = state.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    let (course_id, parts) = &uploads[0];
    assert_eq!(course_id, "42");
    assert!(parts.iter().all(|p| p.field == "files"));
    assert_eq!(parts[0].file_name.as_deref(), Some("syllabus.pdf"));
    assert_eq!(parts[0].content_type.as_deref(), Some("application/pdf"));
    assert_eq!(parts[0].bytes, b"%PDF-1.4");
    assert_eq!(parts[1].file_name.as_deref(), Some("notes.md"));
}

#[tokio::test]
async fn test_upload_failure_maps_status() {
    let (client, state) = start_backend().await;
    let attachments = vec![Attachment {
        file_name: "a.pdf".into(),
        mime_type: "application/pdf".into(),
        bytes: vec![1, 2, 3],
    }];
    match client.upload_materials("fail", attachments).await {
        Err(DomainError::Http { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "Internal Server Error");
        }
        other => panic!("expected Http error, got {:?}", other),
    }
    assert!(state.uploads.lock().unwrap().is_empty());
}
