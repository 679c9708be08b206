//! Synchronization controller
//!
//! Wires the entity store to the event channel: an initial full fetch of
//! both collections, then five subscriptions that feed inbound events
//! into the store's `apply` merge. Inbound events never trigger a
//! re-fetch or a REST call; they mutate the local collections directly.
//!
//! Locally-originated mutations take the store's REST path only and the
//! backend rebroadcasts them to other clients. If this client receives
//! an echo of its own change, the merge-by-id apply makes it a no-op.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::channel::{EventChannel, EventKind, SubscriptionId};
use crate::error::ApiResult;
use crate::store::BoardStore;

/// Reconciles REST-driven local mutations with channel-driven remote ones
pub struct SyncController {
    channel: Arc<EventChannel>,
    subscriptions: Vec<(EventKind, SubscriptionId)>,
}

impl SyncController {
    /// Load the board and start applying inbound events
    ///
    /// Both collections are fetched in parallel; the store stays in its
    /// loading state until both resolve. If either fetch fails the error
    /// is returned so the caller can surface a retry affordance instead
    /// of rendering a partial board.
    pub async fn start(
        store: Arc<Mutex<BoardStore>>,
        channel: Arc<EventChannel>,
    ) -> ApiResult<Self> {
        let api = {
            let mut guard = store.lock().await;
            guard.set_loading(true);
            guard.api()
        };

        match tokio::try_join!(api.fetch_notes(), api.fetch_connections()) {
            Ok((notes, connections)) => {
                info!(
                    notes = notes.len(),
                    connections = connections.len(),
                    "initial board load complete"
                );
                store.lock().await.install(notes, connections);
            }
            Err(e) => {
                let mut guard = store.lock().await;
                guard.set_loading(false);
                guard.record_failure(&e);
                return Err(e);
            }
        }

        // One consumer for both producers: inbound events are handed off
        // to this task and applied in arrival order.
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut subscriptions = Vec::with_capacity(EventKind::ALL.len());
        for kind in EventKind::ALL {
            let tx = tx.clone();
            let id = channel.subscribe(kind, move |event| {
                // Hand off immediately; channel handlers must not block
                let _ = tx.send(event.clone());
            });
            subscriptions.push((kind, id));
        }
        drop(tx);

        let apply_store = Arc::clone(&store);
        tokio::spawn(async move {
            // Ends once every subscription holding a sender is removed
            while let Some(event) = rx.recv().await {
                debug!(event = event.kind().name(), "applying remote change");
                apply_store.lock().await.apply(event);
            }
        });

        Ok(Self {
            channel,
            subscriptions,
        })
    }

    /// Deregister this controller's handlers
    ///
    /// Only our own subscriptions are removed; the shared channel stays
    /// up for other consumers.
    pub fn stop(self) {
        for (kind, id) in &self.subscriptions {
            self.channel.unsubscribe(*kind, *id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::BoardApi;
    use crate::channel::{BoardEvent, ChannelConfig, ChannelSignal};
    use crate::models::Note;
    use futures_util::{SinkExt, StreamExt};
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use serde_json::json;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::Message;

    fn channel_config(url: String) -> ChannelConfig {
        ChannelConfig {
            url,
            handshake_timeout: Duration::from_millis(500),
            reconnect_attempts: 5,
            reconnect_delay: Duration::from_millis(10),
        }
    }

    fn store_for(server: &MockServer) -> Arc<Mutex<BoardStore>> {
        Arc::new(Mutex::new(BoardStore::new(Arc::new(
            BoardApi::new(server.base_url()).unwrap(),
        ))))
    }

    fn mock_board(server: &MockServer, notes: serde_json::Value) {
        server.mock(|when, then| {
            when.method(GET).path("/notes");
            then.status(200).json_body(notes);
        });
        server.mock(|when, then| {
            when.method(GET).path("/connections");
            then.status(200).json_body(json!([]));
        });
    }

    #[tokio::test]
    async fn test_initial_load_failure_surfaces_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/notes");
            then.status(500).body("backend down");
        });
        server.mock(|when, then| {
            when.method(GET).path("/connections");
            then.status(200).json_body(json!([]));
        });

        let store = store_for(&server);
        let channel = Arc::new(EventChannel::spawn(channel_config(
            "ws://127.0.0.1:1".to_string(),
        )));

        let result = SyncController::start(Arc::clone(&store), channel).await;
        assert!(result.is_err());

        let guard = store.lock().await;
        assert!(!guard.is_loading());
        assert!(guard.last_error().is_some());
        assert!(guard.notes().is_empty());
    }

    #[tokio::test]
    async fn test_inbound_events_mutate_store_directly() {
        let server = MockServer::start();
        mock_board(&server, json!([{ "_id": "k1", "title": "Existing" }]));

        // WebSocket server: after the join frame, broadcast one
        // note-added and one note-deleted
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let _join = ws.next().await.unwrap().unwrap();

            let added = json!({
                "event": "note-added",
                "data": { "_id": "n1", "content": "New Note",
                          "position": { "x": 150.0, "y": 150.0 } }
            });
            ws.send(Message::Text(added.to_string())).await.unwrap();

            let deleted = json!({ "event": "note-deleted", "data": "k1" });
            ws.send(Message::Text(deleted.to_string())).await.unwrap();

            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let store = store_for(&server);
        let channel = Arc::new(EventChannel::spawn(channel_config(format!(
            "ws://{}",
            addr
        ))));
        let mut signals = channel.take_signals().unwrap();

        let controller = SyncController::start(Arc::clone(&store), Arc::clone(&channel))
            .await
            .unwrap();
        assert_eq!(store.lock().await.notes().len(), 1);

        channel.connect().await;
        let signal = tokio::time::timeout(Duration::from_secs(5), signals.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(signal, ChannelSignal::Connected);

        // note-added n1 arrives, then note-deleted k1: net length 1,
        // containing exactly the pushed entity
        for _ in 0..200 {
            let guard = store.lock().await;
            if guard.notes().len() == 1 && guard.notes()[0].id == "n1" {
                break;
            }
            drop(guard);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let guard = store.lock().await;
        assert_eq!(guard.notes().len(), 1);
        let stored = &guard.notes()[0];
        assert_eq!(stored.id, "n1");
        assert_eq!(stored.content, "New Note");
        assert_eq!(stored.position.x, 150.0);
        drop(guard);

        controller.stop();
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn test_echo_of_own_change_is_not_duplicated() {
        let server = MockServer::start();
        mock_board(&server, json!([{ "_id": "n1", "title": "Mine" }]));

        let store = store_for(&server);
        let channel = Arc::new(EventChannel::spawn(channel_config(
            "ws://127.0.0.1:1".to_string(),
        )));
        let controller = SyncController::start(Arc::clone(&store), Arc::clone(&channel))
            .await
            .unwrap();

        // Simulate the backend echoing this client's own note back
        let echo: Note = serde_json::from_value(json!({ "_id": "n1", "title": "Mine" })).unwrap();
        store.lock().await.apply(BoardEvent::NoteAdded(echo));

        let guard = store.lock().await;
        assert_eq!(guard.notes().len(), 1);
        assert_eq!(guard.notes()[0].title, "Mine");
        drop(guard);

        controller.stop();
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn test_stop_removes_only_own_subscriptions() {
        let server = MockServer::start();
        mock_board(&server, json!([]));

        let store = store_for(&server);
        let channel = Arc::new(EventChannel::spawn(channel_config(
            "ws://127.0.0.1:1".to_string(),
        )));

        // Another consumer shares the channel
        let other = channel.subscribe(EventKind::NoteAdded, |_| {});

        let controller = SyncController::start(Arc::clone(&store), Arc::clone(&channel))
            .await
            .unwrap();
        controller.stop();

        // The other consumer can still deregister itself; the channel
        // task is still alive and answering status queries
        channel.unsubscribe(EventKind::NoteAdded, other);
        assert!(!channel.is_connected());
        channel.shutdown().await;
    }
}
