//! Remote store client
//!
//! Thin async wrapper over the board backend's REST collections. Each
//! operation is a single request/response exchange; no local state lives
//! here.
//!
//! Routes:
//! - GET/POST `/notes`, PUT/DELETE `/notes/{id}`, PATCH `/notes/{id}/pin`
//! - GET/POST `/connections`, DELETE `/connections/{id}`

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ApiError, ApiResult, EntityKind};
use crate::models::{Connection, ConnectionDraft, Note, NoteDraft};

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the board backend's REST API
pub struct BoardApi {
    client: Client,
    base_url: String,
}

impl BoardApi {
    /// Create a client against the given base endpoint, e.g.
    /// `http://localhost:5000/api`
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("noteboard/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ==================== Notes ====================

    /// Fetch all notes, in backend order
    pub async fn fetch_notes(&self) -> ApiResult<Vec<Note>> {
        debug!("GET /notes");
        let resp = self.client.get(self.url("/notes")).send().await?;
        decode(resp, EntityKind::Note, "*").await
    }

    /// Create a note; the returned entity carries the assigned id
    pub async fn create_note(&self, draft: &NoteDraft) -> ApiResult<Note> {
        debug!(title = %draft.title, "POST /notes");
        let resp = self
            .client
            .post(self.url("/notes"))
            .json(draft)
            .send()
            .await?;
        decode(resp, EntityKind::Note, "*").await
    }

    /// Replace a note's fields; the body must be fully populated
    pub async fn update_note(&self, id: &str, body: &NoteDraft) -> ApiResult<Note> {
        debug!(id, "PUT /notes/{{id}}");
        let resp = self
            .client
            .put(self.url(&format!("/notes/{id}")))
            .json(body)
            .send()
            .await?;
        decode(resp, EntityKind::Note, id).await
    }

    /// Delete a note by id
    pub async fn delete_note(&self, id: &str) -> ApiResult<()> {
        debug!(id, "DELETE /notes/{{id}}");
        let resp = self
            .client
            .delete(self.url(&format!("/notes/{id}")))
            .send()
            .await?;
        expect_success(resp, EntityKind::Note, id).await
    }

    /// Toggle a note's pinned flag
    pub async fn toggle_pin(&self, id: &str) -> ApiResult<Note> {
        debug!(id, "PATCH /notes/{{id}}/pin");
        let resp = self
            .client
            .patch(self.url(&format!("/notes/{id}/pin")))
            .send()
            .await?;
        decode(resp, EntityKind::Note, id).await
    }

    // ==================== Connections ====================

    /// Fetch all connections, in backend order
    pub async fn fetch_connections(&self) -> ApiResult<Vec<Connection>> {
        debug!("GET /connections");
        let resp = self.client.get(self.url("/connections")).send().await?;
        decode(resp, EntityKind::Connection, "*").await
    }

    /// Create a connection between two notes
    pub async fn create_connection(&self, draft: &ConnectionDraft) -> ApiResult<Connection> {
        debug!(source = %draft.source, target = %draft.target, "POST /connections");
        let resp = self
            .client
            .post(self.url("/connections"))
            .json(draft)
            .send()
            .await?;
        decode(resp, EntityKind::Connection, "*").await
    }

    /// Delete a connection by id
    pub async fn delete_connection(&self, id: &str) -> ApiResult<()> {
        debug!(id, "DELETE /connections/{{id}}");
        let resp = self
            .client
            .delete(self.url(&format!("/connections/{id}")))
            .send()
            .await?;
        expect_success(resp, EntityKind::Connection, id).await
    }
}

/// Decode a JSON body, classifying non-success statuses
async fn decode<T: DeserializeOwned>(resp: Response, kind: EntityKind, id: &str) -> ApiResult<T> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp.json().await?)
    } else {
        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, kind, id, body))
    }
}

/// Discard the body, classifying non-success statuses
async fn expect_success(resp: Response, kind: EntityKind, id: &str) -> ApiResult<()> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, kind, id, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::{DELETE, GET, PATCH, POST, PUT};
    use httpmock::MockServer;
    use serde_json::json;

    #[tokio::test]
    async fn test_fetch_notes_preserves_backend_order() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/notes");
            then.status(200).json_body(json!([
                { "_id": "n2", "title": "Second" },
                { "_id": "n1", "title": "First" }
            ]));
        });

        let api = BoardApi::new(server.base_url()).unwrap();
        let notes = api.fetch_notes().await.unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].id, "n2");
        assert_eq!(notes[1].id, "n1");
    }

    #[tokio::test]
    async fn test_create_note_returns_assigned_id() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/notes")
                .header("content-type", "application/json")
                .body_contains("\"title\":\"New Note\"");
            then.status(201).json_body(json!({
                "_id": "n1",
                "title": "New Note",
                "content": "hello",
                "position": { "x": 150.0, "y": 150.0 }
            }));
        });

        let api = BoardApi::new(server.base_url()).unwrap();
        let mut draft = NoteDraft::new("New Note").at(150.0, 150.0);
        draft.content = "hello".to_string();
        let note = api.create_note(&draft).await.unwrap();

        mock.assert();
        assert_eq!(note.id, "n1");
        assert_eq!(note.content, "hello");
        assert_eq!(note.position.x, 150.0);
    }

    #[tokio::test]
    async fn test_create_note_validation_rejection() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/notes");
            then.status(400).body("title is required");
        });

        let api = BoardApi::new(server.base_url()).unwrap();
        let err = api.create_note(&NoteDraft::default()).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
        assert!(err.to_string().contains("title is required"));
    }

    #[tokio::test]
    async fn test_update_note_roundtrip() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/notes/n1")
                .body_contains("\"content\":\"edited\"");
            then.status(200).json_body(json!({
                "_id": "n1",
                "title": "Untitled",
                "content": "edited"
            }));
        });

        let api = BoardApi::new(server.base_url()).unwrap();
        let body = crate::models::NotePatch {
            content: Some("edited".to_string()),
            ..Default::default()
        }
        .normalize();
        let note = api.update_note("n1", &body).await.unwrap();

        mock.assert();
        assert_eq!(note.content, "edited");
    }

    #[tokio::test]
    async fn test_update_unknown_note_is_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT).path("/notes/ghost");
            then.status(404).body("no such note");
        });

        let api = BoardApi::new(server.base_url()).unwrap();
        let err = api
            .update_note("ghost", &NoteDraft::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_note() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/notes/n1");
            then.status(204);
        });

        let api = BoardApi::new(server.base_url()).unwrap();
        api.delete_note("n1").await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_delete_absent_note_is_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/notes/gone");
            then.status(404);
        });

        let api = BoardApi::new(server.base_url()).unwrap();
        let err = api.delete_note("gone").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_toggle_pin() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PATCH).path("/notes/n1/pin");
            then.status(200)
                .json_body(json!({ "_id": "n1", "isPinned": true }));
        });

        let api = BoardApi::new(server.base_url()).unwrap();
        let note = api.toggle_pin("n1").await.unwrap();
        assert!(note.is_pinned);
    }

    #[tokio::test]
    async fn test_connection_create_and_delete() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/connections")
                .body_contains("\"source\":\"a\"");
            then.status(201)
                .json_body(json!({ "_id": "c1", "source": "a", "target": "b" }));
        });
        server.mock(|when, then| {
            when.method(DELETE).path("/connections/c1");
            then.status(204);
        });

        let api = BoardApi::new(server.base_url()).unwrap();
        let conn = api
            .create_connection(&ConnectionDraft::new("a", "b"))
            .await
            .unwrap();
        assert_eq!(conn.id, "c1");
        api.delete_connection("c1").await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_error_is_classified() {
        // Nothing is listening on this port
        let api = BoardApi::new("http://127.0.0.1:1").unwrap();
        let err = api.fetch_notes().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
