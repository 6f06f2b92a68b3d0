use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_macros::debug_handler;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use std::sync::Arc;

use crate::{
    blob::{Attachment, URL_PREFIX},
    dto::{NoteForm, NoteResponse, SearchParams},
    service::{NoteService, NoteServiceError, NoteSubmission},
};

#[derive(OpenApi)]
#[openapi(
    paths(list_notes, create_note, get_note, update_note, delete_note),
    components(schemas(NoteResponse, NoteForm)),
    tags(
        (name = "notes", description = "Notes management API")
    )
)]
pub struct ApiDoc;

/// Notes API, attachment downloads and the OpenAPI UI.
pub fn router(
    service: Arc<NoteService>,
    upload_dir: &std::path::Path,
    max_upload_bytes: usize,
) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/notes", get(list_notes).post(create_note))
        .route("/notes/", get(list_notes).post(create_note))
        .route(
            "/notes/{id}",
            get(get_note).put(update_note).delete(delete_note),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .with_state(service)
        .nest_service(URL_PREFIX, ServeDir::new(upload_dir))
}

async fn root() -> Response {
    (StatusCode::OK, "Hello world!").into_response()
}

fn failure(action: &str, e: &NoteServiceError) -> Response {
    tracing::error!("failed to {action}: {e}");

    match e {
        NoteServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "Note not found").into_response(),
        NoteServiceError::Validation(msg) => {
            (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()).into_response()
        }
        NoteServiceError::Storage(_) | NoteServiceError::Blob(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to {action}"),
        )
            .into_response(),
    }
}

/// Collects the note form. A file part without a file name is what browsers
/// send when nothing was picked, so it counts as no file.
async fn read_submission(mut multipart: Multipart) -> Result<NoteSubmission, MultipartError> {
    let mut submission = NoteSubmission::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("title") => submission.title = Some(field.text().await?),
            Some("content") => submission.content = Some(field.text().await?),
            Some("reminder_at") => submission.reminder_at = Some(field.text().await?),
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                if !file_name.is_empty() {
                    submission.file = Some(Attachment {
                        file_name,
                        data: data.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok(submission)
}

fn bad_form(e: &MultipartError) -> Response {
    tracing::warn!("rejected note form: {e}");
    (e.status(), e.body_text()).into_response()
}

#[utoipa::path(
    get,
    path = "/notes/",
    params(SearchParams),
    responses(
        (status = 200, description = "Notes, optionally filtered by phrase", body = Vec<NoteResponse>),
        (status = 500, description = "Internal server error")
    ),
    tag = "notes"
)]
#[debug_handler]
pub async fn list_notes(
    State(service): State<Arc<NoteService>>,
    Query(params): Query<SearchParams>,
) -> Response {
    match service.list_notes(params.q.as_deref()).await {
        Ok(notes) => (StatusCode::OK, Json(notes)).into_response(),
        Err(e) => failure("get notes", &e),
    }
}

#[utoipa::path(
    post,
    path = "/notes/",
    request_body(content = NoteForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Note created successfully", body = NoteResponse),
        (status = 400, description = "Malformed multipart body"),
        (status = 422, description = "Missing field or invalid reminder"),
        (status = 500, description = "Internal server error")
    ),
    tag = "notes"
)]
#[debug_handler]
pub async fn create_note(State(service): State<Arc<NoteService>>, multipart: Multipart) -> Response {
    let submission = match read_submission(multipart).await {
        Ok(submission) => submission,
        Err(e) => return bad_form(&e),
    };

    match service.create_note(submission).await {
        Ok(note) => (StatusCode::CREATED, Json(note)).into_response(),
        Err(e) => failure("create note", &e),
    }
}

#[utoipa::path(
    get,
    path = "/notes/{id}",
    params(
        ("id" = i64, Path, description = "Note ID")
    ),
    responses(
        (status = 200, description = "Note found", body = NoteResponse),
        (status = 404, description = "Note not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "notes"
)]
#[debug_handler]
pub async fn get_note(State(service): State<Arc<NoteService>>, Path(id): Path<i64>) -> Response {
    match service.get_note(id).await {
        Ok(note) => (StatusCode::OK, Json(note)).into_response(),
        Err(e) => failure("get note", &e),
    }
}

#[utoipa::path(
    put,
    path = "/notes/{id}",
    params(
        ("id" = i64, Path, description = "Note ID")
    ),
    request_body(content = NoteForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Note updated successfully", body = NoteResponse),
        (status = 400, description = "Malformed multipart body"),
        (status = 404, description = "Note not found"),
        (status = 422, description = "Missing field or invalid reminder"),
        (status = 500, description = "Internal server error")
    ),
    tag = "notes"
)]
#[debug_handler]
pub async fn update_note(
    State(service): State<Arc<NoteService>>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Response {
    let submission = match read_submission(multipart).await {
        Ok(submission) => submission,
        Err(e) => return bad_form(&e),
    };

    match service.update_note(id, submission).await {
        Ok(note) => (StatusCode::OK, Json(note)).into_response(),
        Err(e) => failure("update note", &e),
    }
}

#[utoipa::path(
    delete,
    path = "/notes/{id}",
    params(
        ("id" = i64, Path, description = "Note ID")
    ),
    responses(
        (status = 204, description = "Note deleted successfully"),
        (status = 404, description = "Note not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "notes"
)]
#[debug_handler]
pub async fn delete_note(State(service): State<Arc<NoteService>>, Path(id): Path<i64>) -> Response {
    match service.delete_note(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => failure("delete note", &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{blob::BlobStore, repository::MemoryNoteRepository};

    use axum::{
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "note-form-boundary";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a [u8]),
    }

    fn app() -> (Router, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let service = Arc::new(NoteService::new(
            Arc::new(MemoryNoteRepository::new()),
            BlobStore::new(dir.path()),
        ));
        (router(service, dir.path(), 1024 * 1024), dir)
    }

    fn form_request(method: &str, uri: &str, parts: &[Part<'_>]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File(file_name, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = send(app, request).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn create_then_list_and_download_attachment() {
        let (app, _dir) = app();

        let (status, note) = send_json(
            &app,
            form_request(
                "POST",
                "/notes/",
                &[
                    Part::Text("title", "Shopping"),
                    Part::Text("content", "Buy milk"),
                    Part::Text("reminder_at", "2025-08-11T14:30"),
                    Part::File("a.png", b"png bytes"),
                ],
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        let id = note["id"].as_i64().unwrap();
        assert_eq!(note["title"], "Shopping");
        assert_eq!(note["reminder_at"], "2025-08-11T14:30:00");
        assert_eq!(note["file_url"], format!("/uploads/{id}.png"));
        assert!(note["created_at"].is_string());

        let (status, listed) = send_json(&app, empty_request("GET", "/notes/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["content"], "Buy milk");

        let (status, bytes) = send(&app, empty_request("GET", &format!("/uploads/{id}.png"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, b"png bytes");
    }

    #[tokio::test]
    async fn search_query_filters_notes() {
        let (app, _dir) = app();
        for (title, content) in [("Shopping", "Buy milk"), ("FOOTBALL", "schedule")] {
            let (status, _) = send(
                &app,
                form_request(
                    "POST",
                    "/notes",
                    &[Part::Text("title", title), Part::Text("content", content)],
                ),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, found) = send_json(&app, empty_request("GET", "/notes/?q=foo")).await;
        assert_eq!(status, StatusCode::OK);
        let found = found.as_array().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["title"], "FOOTBALL");

        let (_, none) = send_json(&app, empty_request("GET", "/notes/?q=absent")).await;
        assert_eq!(none, Value::Array(Vec::new()));
    }

    #[tokio::test]
    async fn invalid_forms_are_rejected() {
        let (app, _dir) = app();

        let (status, _) = send(
            &app,
            form_request("POST", "/notes/", &[Part::Text("content", "no title")]),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(
            &app,
            form_request(
                "POST",
                "/notes/",
                &[
                    Part::Text("title", "t"),
                    Part::Text("content", "c"),
                    Part::Text("reminder_at", "soon"),
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (_, listed) = send_json(&app, empty_request("GET", "/notes/")).await;
        assert_eq!(listed, Value::Array(Vec::new()));
    }

    #[tokio::test]
    async fn update_handles_reminder_and_missing_notes() {
        let (app, _dir) = app();
        let (_, note) = send_json(
            &app,
            form_request(
                "POST",
                "/notes/",
                &[
                    Part::Text("title", "t"),
                    Part::Text("content", "c"),
                    Part::Text("reminder_at", "2025-08-11T14:30"),
                ],
            ),
        )
        .await;
        let uri = format!("/notes/{}", note["id"]);

        let (status, kept) = send_json(
            &app,
            form_request(
                "PUT",
                &uri,
                &[Part::Text("title", "t2"), Part::Text("content", "c2")],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(kept["title"], "t2");
        assert_eq!(kept["reminder_at"], "2025-08-11T14:30:00");
        assert_eq!(kept["created_at"], note["created_at"]);

        let (_, cleared) = send_json(
            &app,
            form_request(
                "PUT",
                &uri,
                &[
                    Part::Text("title", "t2"),
                    Part::Text("content", "c2"),
                    Part::Text("reminder_at", ""),
                ],
            ),
        )
        .await;
        assert_eq!(cleared["reminder_at"], Value::Null);

        let (status, _) = send(
            &app,
            form_request(
                "PUT",
                "/notes/999",
                &[Part::Text("title", "t"), Part::Text("content", "c")],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_file_part_is_ignored() {
        let (app, dir) = app();
        let (status, note) = send_json(
            &app,
            form_request(
                "POST",
                "/notes/",
                &[
                    Part::Text("title", "t"),
                    Part::Text("content", "c"),
                    Part::File("", b""),
                ],
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(note["file_url"], Value::Null);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn delete_removes_note_once() {
        let (app, _dir) = app();
        let (_, note) = send_json(
            &app,
            form_request(
                "POST",
                "/notes/",
                &[Part::Text("title", "t"), Part::Text("content", "c")],
            ),
        )
        .await;
        let uri = format!("/notes/{}", note["id"]);

        let (status, body) = send(&app, empty_request("DELETE", &uri)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());

        let (status, _) = send(&app, empty_request("DELETE", &uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, empty_request("GET", &uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
