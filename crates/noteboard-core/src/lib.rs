//! Noteboard Sync Core
//!
//! Real-time synchronization core for a collaborative note board. Each
//! client keeps an in-memory snapshot of notes and connections consistent
//! with a REST-backed source of truth and a push-based event channel.
//!
//! # Architecture
//!
//! - REST is the source of truth: every local mutation persists there
//!   first and reaches local state only after the call resolves
//! - The event channel carries other clients' changes back as pushed
//!   events, applied directly to the local collections
//! - Both paths converge on one idempotent merge-by-id apply function
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let api = Arc::new(BoardApi::new(&config.api_url)?);
//! let store = Arc::new(Mutex::new(BoardStore::new(api)));
//! let channel = Arc::new(EventChannel::spawn(ChannelConfig::new(&config.socket_url)));
//!
//! channel.connect().await;
//! let controller = SyncController::start(store.clone(), channel.clone()).await?;
//! ```
//!
//! # Modules
//!
//! - `api`: remote store client (REST CRUD for notes and connections)
//! - `channel`: persistent event channel with reconnection policy
//! - `store`: client-side entity store (the local cache)
//! - `controller`: wires channel events into store mutations
//! - `models`: notes, connections, drafts, and patches
//! - `config`: application configuration
//! - `error`: error taxonomy

pub mod api;
pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod store;

pub use api::BoardApi;
pub use channel::{
    BoardEvent, ChannelConfig, ChannelSignal, ChannelStatus, EventChannel, EventKind,
    SubscriptionId,
};
pub use config::Config;
pub use controller::SyncController;
pub use error::{ApiError, ApiResult, EntityKind};
pub use models::{
    Connection, ConnectionDraft, Note, NoteDraft, NotePatch, Position, Styling, StylingPatch,
};
pub use store::BoardStore;
