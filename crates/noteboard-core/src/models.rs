//! Data models for the noteboard canvas
//!
//! Notes and connections as the backend stores them. Wire field names are
//! camelCase with Mongo-style `_id` identifiers, matching the board
//! backend's collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_title() -> String {
    "Untitled".to_string()
}

fn default_background_color() -> String {
    "#ffffff".to_string()
}

fn default_font_size() -> i64 {
    16
}

/// Canvas coordinates for a note
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self { x: 100.0, y: 100.0 }
    }
}

/// Visual styling for a note
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Styling {
    #[serde(default = "default_background_color")]
    pub background_color: String,
    #[serde(default = "default_font_size")]
    pub font_size: i64,
}

impl Default for Styling {
    fn default() -> Self {
        Self {
            background_color: default_background_color(),
            font_size: default_font_size(),
        }
    }
}

/// A note on the board, as persisted by the backend
///
/// The id is assigned by the backend on creation and never changes.
/// Every other field carries a serde default so a sparse backend payload
/// still deserializes into a fully populated note (position in
/// particular is always present locally).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub styling: Styling,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_pinned: bool,
    /// Backend-managed timestamps; absent on payloads from older servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A note draft sent on creation, before the backend assigns an id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub position: Position,
    pub styling: Styling,
    pub image_url: String,
    pub tags: Vec<String>,
    pub is_pinned: bool,
}

impl NoteDraft {
    /// Create a draft with the given title and every other field defaulted
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Place the draft at specific canvas coordinates
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }
}

impl Default for NoteDraft {
    fn default() -> Self {
        Self {
            title: default_title(),
            content: String::new(),
            position: Position::default(),
            styling: Styling::default(),
            image_url: String::new(),
            tags: Vec::new(),
            is_pinned: false,
        }
    }
}

/// Partial styling input for an update
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StylingPatch {
    pub background_color: Option<String>,
    pub font_size: Option<i64>,
}

/// Partial note input for an update
///
/// The backend expects a fully populated body on PUT, so a patch is
/// normalized before it goes on the wire: every absent field is replaced
/// with its default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub position: Option<Position>,
    pub styling: Option<StylingPatch>,
    pub image_url: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_pinned: Option<bool>,
}

impl NotePatch {
    /// Produce the fully defaulted update body
    pub fn normalize(self) -> NoteDraft {
        let styling = self.styling.unwrap_or_default();
        NoteDraft {
            title: self.title.unwrap_or_else(default_title),
            content: self.content.unwrap_or_default(),
            position: self.position.unwrap_or_default(),
            styling: Styling {
                background_color: styling
                    .background_color
                    .unwrap_or_else(default_background_color),
                font_size: styling.font_size.unwrap_or_else(default_font_size),
            },
            image_url: self.image_url.unwrap_or_default(),
            tags: self.tags.unwrap_or_default(),
            is_pinned: self.is_pinned.unwrap_or(false),
        }
    }

    /// Build a patch that keeps every field of an existing note
    ///
    /// Callers that only want to change one field start from this so the
    /// normalized body does not reset the rest to defaults.
    pub fn from_note(note: &Note) -> Self {
        Self {
            title: Some(note.title.clone()),
            content: Some(note.content.clone()),
            position: Some(note.position),
            styling: Some(StylingPatch {
                background_color: Some(note.styling.background_color.clone()),
                font_size: Some(note.styling.font_size),
            }),
            image_url: Some(note.image_url.clone()),
            tags: Some(note.tags.clone()),
            is_pinned: Some(note.is_pinned),
        }
    }
}

/// An arrow between two notes
///
/// Connections are immutable after creation; label or endpoint edits are
/// a delete followed by a new create.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(rename = "_id")]
    pub id: String,
    /// Source note id
    pub source: String,
    /// Target note id
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default)]
    pub label: String,
}

impl Connection {
    /// Whether this connection references the given note id at either end
    pub fn touches(&self, note_id: &str) -> bool {
        self.source == note_id || self.target == note_id
    }
}

/// A connection draft sent on creation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDraft {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default)]
    pub label: String,
}

impl ConnectionDraft {
    /// Create a draft between two note ids
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            ..Default::default()
        }
    }
}
