//! Client-side entity store
//!
//! The authoritative local snapshot of notes and connections for the
//! running client, plus the loading/error flags the presentation layer
//! reads. The backend stays the durable source of truth; this is a cache
//! reconciled against REST responses and pushed channel events.
//!
//! Mutations are optimistic-by-completion: local state changes only
//! after the remote call resolves. A failed call records a readable
//! error string and leaves the prior snapshot intact.
//!
//! Both mutation paths (completed REST calls and inbound channel events)
//! feed the same idempotent `apply` merge, keyed by entity id. That
//! makes receiving an echo of this client's own change harmless: the
//! merge replaces the identical entity instead of duplicating it.

use std::sync::Arc;

use tracing::debug;

use crate::api::BoardApi;
use crate::channel::BoardEvent;
use crate::error::{ApiError, ApiResult};
use crate::models::{Connection, ConnectionDraft, Note, NoteDraft, NotePatch};

/// Local snapshot of the board
pub struct BoardStore {
    api: Arc<BoardApi>,
    notes: Vec<Note>,
    connections: Vec<Connection>,
    loading: bool,
    error: Option<String>,
}

impl BoardStore {
    pub fn new(api: Arc<BoardApi>) -> Self {
        Self {
            api,
            notes: Vec::new(),
            connections: Vec::new(),
            loading: false,
            error: None,
        }
    }

    /// The REST client backing this store
    pub fn api(&self) -> Arc<BoardApi> {
        Arc::clone(&self.api)
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// The most recent operation failure, cleared by the next success
    pub fn last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Mark the store as loading while an external fetch is in flight
    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Replace both collections after an externally driven fetch
    pub fn install(&mut self, notes: Vec<Note>, connections: Vec<Connection>) {
        self.notes = notes;
        self.connections = connections;
        self.loading = false;
        self.error = None;
    }

    // ==================== Fetch ====================

    /// Replace the local notes collection with the backend's
    ///
    /// On failure the prior collection is left untouched
    /// (stale-but-consistent).
    pub async fn fetch_notes(&mut self) -> ApiResult<()> {
        self.loading = true;
        let result = self.api.fetch_notes().await;
        self.loading = false;
        match result {
            Ok(notes) => {
                self.notes = notes;
                self.error = None;
                Ok(())
            }
            Err(e) => self.record(e),
        }
    }

    /// Replace the local connections collection with the backend's
    pub async fn fetch_connections(&mut self) -> ApiResult<()> {
        self.loading = true;
        let result = self.api.fetch_connections().await;
        self.loading = false;
        match result {
            Ok(connections) => {
                self.connections = connections;
                self.error = None;
                Ok(())
            }
            Err(e) => self.record(e),
        }
    }

    // ==================== Notes ====================

    /// Persist a new note, then add the returned entity locally
    pub async fn add_note(&mut self, draft: &NoteDraft) -> ApiResult<Note> {
        self.loading = true;
        let result = self.api.create_note(draft).await;
        self.loading = false;
        match result {
            Ok(note) => {
                self.error = None;
                self.apply(BoardEvent::NoteAdded(note.clone()));
                Ok(note)
            }
            Err(e) => self.record(e),
        }
    }

    /// Normalize the patch, persist it, then replace the local entity
    ///
    /// The returned entity is trusted over any local lookup; when the id
    /// is unknown locally the collection is left as-is.
    pub async fn update_note(&mut self, id: &str, patch: NotePatch) -> ApiResult<Note> {
        let body = patch.normalize();
        self.loading = true;
        let result = self.api.update_note(id, &body).await;
        self.loading = false;
        match result {
            Ok(note) => {
                self.error = None;
                self.apply(BoardEvent::NoteUpdated(note.clone()));
                Ok(note)
            }
            Err(e) => self.record(e),
        }
    }

    /// Toggle the pinned flag remotely, then replace the local entity
    pub async fn toggle_pin(&mut self, id: &str) -> ApiResult<Note> {
        self.loading = true;
        let result = self.api.toggle_pin(id).await;
        self.loading = false;
        match result {
            Ok(note) => {
                self.error = None;
                self.apply(BoardEvent::NoteUpdated(note.clone()));
                Ok(note)
            }
            Err(e) => self.record(e),
        }
    }

    /// Delete a note remotely, then remove it and every connection that
    /// references it
    ///
    /// A missing note on the backend counts as success so repeated and
    /// cascaded deletes stay idempotent. The local cascade duplicates the
    /// server-side one deliberately.
    pub async fn delete_note(&mut self, id: &str) -> ApiResult<()> {
        self.loading = true;
        let result = self.api.delete_note(id).await;
        self.loading = false;
        match result {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(id, "note already deleted remotely");
            }
            Err(e) => return self.record(e),
        }
        self.error = None;
        self.apply(BoardEvent::NoteDeleted(id.to_string()));
        Ok(())
    }

    // ==================== Connections ====================

    /// Persist a new connection, then add the returned entity locally
    pub async fn add_connection(&mut self, draft: &ConnectionDraft) -> ApiResult<Connection> {
        self.loading = true;
        let result = self.api.create_connection(draft).await;
        self.loading = false;
        match result {
            Ok(conn) => {
                self.error = None;
                self.apply(BoardEvent::ConnectionAdded(conn.clone()));
                Ok(conn)
            }
            Err(e) => self.record(e),
        }
    }

    /// Delete a connection remotely, then remove it locally
    pub async fn delete_connection(&mut self, id: &str) -> ApiResult<()> {
        self.loading = true;
        let result = self.api.delete_connection(id).await;
        self.loading = false;
        match result {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(id, "connection already deleted remotely");
            }
            Err(e) => return self.record(e),
        }
        self.error = None;
        self.apply(BoardEvent::ConnectionDeleted(id.to_string()));
        Ok(())
    }

    // ==================== Merge ====================

    /// Apply one change to the local collections
    ///
    /// The single consumer for both producers: completed REST calls and
    /// inbound channel events. Merge is by id and idempotent; removal of
    /// an id that is already gone is a no-op, and adding an id that is
    /// already present replaces it.
    pub fn apply(&mut self, change: BoardEvent) {
        match change {
            BoardEvent::NoteAdded(note) => {
                if let Some(existing) = self.notes.iter_mut().find(|n| n.id == note.id) {
                    *existing = note;
                } else {
                    self.notes.push(note);
                }
            }
            BoardEvent::NoteUpdated(note) => {
                if let Some(existing) = self.notes.iter_mut().find(|n| n.id == note.id) {
                    *existing = note;
                }
            }
            BoardEvent::NoteDeleted(id) => {
                self.notes.retain(|n| n.id != id);
                // Cascade: drop every connection touching the note
                self.connections.retain(|c| !c.touches(&id));
            }
            BoardEvent::ConnectionAdded(conn) => {
                if let Some(existing) = self.connections.iter_mut().find(|c| c.id == conn.id) {
                    *existing = conn;
                } else {
                    self.connections.push(conn);
                }
            }
            BoardEvent::ConnectionDeleted(id) => {
                self.connections.retain(|c| c.id != id);
            }
        }
    }

    fn record<T>(&mut self, e: ApiError) -> ApiResult<T> {
        self.error = Some(e.to_string());
        Err(e)
    }

    /// Record a failure raised outside the store's own operations
    pub(crate) fn record_failure(&mut self, e: &ApiError) {
        self.error = Some(e.to_string());
    }
}
