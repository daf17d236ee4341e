//! In-memory collaborators.

use super::{CollaboratorError, EventStore, Redactor, StateQuery};
use async_trait::async_trait;
use roomlog_core::StateSet;
use roomlog_types::{EventId, RoomEvent, RoomId};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Event store backed by a map.
///
/// Clones share the same storage.
#[derive(Debug, Default, Clone)]
pub struct MemoryEventStore {
    inner: Arc<Mutex<MemoryEventStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryEventStoreInner {
    events: HashMap<EventId, RoomEvent>,
    fail_next: Option<String>,
}

impl MemoryEventStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.events.len()
    }

    /// Whether nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.events.is_empty()
    }

    /// Remove an event, as if local storage lost it.
    pub async fn forget(&self, event_id: &EventId) -> Option<RoomEvent> {
        self.inner.lock().await.events.remove(event_id)
    }

    /// Cause the next operation to fail with the given error.
    pub async fn fail_next(&self, error: &str) {
        self.inner.lock().await.fail_next = Some(error.to_string());
    }
}

impl MemoryEventStoreInner {
    fn check(&mut self) -> Result<(), CollaboratorError> {
        match self.fail_next.take() {
            Some(error) => Err(CollaboratorError::Unavailable(error)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn store_events(&self, events: Vec<RoomEvent>) -> Result<(), CollaboratorError> {
        let mut inner = self.inner.lock().await;
        inner.check()?;
        for event in events {
            inner.events.entry(event.event_id.clone()).or_insert(event);
        }
        Ok(())
    }

    async fn get_event(&self, event_id: &EventId) -> Result<Option<RoomEvent>, CollaboratorError> {
        let mut inner = self.inner.lock().await;
        inner.check()?;
        Ok(inner.events.get(event_id).cloned())
    }

    async fn replace_event(&self, event: RoomEvent) -> Result<(), CollaboratorError> {
        let mut inner = self.inner.lock().await;
        inner.check()?;
        match inner.events.get_mut(&event.event_id) {
            Some(stored) => {
                *stored = event;
                Ok(())
            }
            None => Err(CollaboratorError::NotFound(event.event_id.to_string())),
        }
    }
}

/// State query answering from state sets registered per room.
///
/// Clones share the same state.
#[derive(Debug, Default, Clone)]
pub struct MemoryStateQuery {
    inner: Arc<Mutex<MemoryStateQueryInner>>,
}

#[derive(Debug, Default)]
struct MemoryStateQueryInner {
    rooms: HashMap<RoomId, StateSet>,
    queries: usize,
}

impl MemoryStateQuery {
    /// Create a state query that knows no rooms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the state returned for a room.
    pub async fn set_state(&self, room_id: RoomId, state: StateSet) {
        self.inner.lock().await.rooms.insert(room_id, state);
    }

    /// Number of queries served.
    pub async fn query_count(&self) -> usize {
        self.inner.lock().await.queries
    }
}

#[async_trait]
impl StateQuery for MemoryStateQuery {
    async fn current_state(
        &self,
        room_id: &RoomId,
        _latest_event_ids: &[EventId],
    ) -> Result<StateSet, CollaboratorError> {
        let mut inner = self.inner.lock().await;
        inner.queries += 1;
        inner
            .rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(room_id.to_string()))
    }
}

/// Redactor that keeps only the content keys that survive redaction for
/// the event's type.
#[derive(Debug, Default, Clone, Copy)]
pub struct StripContent;

fn preserved_keys(event_type: &str) -> &'static [&'static str] {
    match event_type {
        "m.room.member" => &["membership"],
        "m.room.create" => &["creator"],
        "m.room.join_rules" => &["join_rule"],
        "m.room.history_visibility" => &["history_visibility"],
        "m.room.power_levels" => &[
            "ban",
            "events",
            "events_default",
            "kick",
            "redact",
            "state_default",
            "users",
            "users_default",
        ],
        _ => &[],
    }
}

#[async_trait]
impl Redactor for StripContent {
    async fn redact(&self, mut event: RoomEvent) -> Result<RoomEvent, CollaboratorError> {
        let keep = preserved_keys(&event.event_type);
        let content: Map<String, Value> = match event.content {
            Value::Object(map) => map
                .into_iter()
                .filter(|(key, _)| keep.contains(&key.as_str()))
                .collect(),
            _ => Map::new(),
        };
        event.content = Value::Object(content);
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomlog_types::Unsigned;
    use serde_json::json;

    fn event(id: &str, event_type: &str, content: Value) -> RoomEvent {
        RoomEvent {
            event_id: id.into(),
            room_id: "!room:example.org".into(),
            sender: "@alice:example.org".into(),
            event_type: event_type.into(),
            state_key: None,
            content,
            redacts: None,
            prev_events: vec![],
            origin_server_ts: 0,
            unsigned: Unsigned::default(),
        }
    }

    #[tokio::test]
    async fn store_does_not_overwrite() {
        let store = MemoryEventStore::new();
        store
            .store_events(vec![event("$a", "m.room.message", json!({"body": "one"}))])
            .await
            .unwrap();
        store
            .store_events(vec![event("$a", "m.room.message", json!({"body": "two"}))])
            .await
            .unwrap();
        let stored = store.get_event(&"$a".into()).await.unwrap().unwrap();
        assert_eq!(stored.content, json!({"body": "one"}));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn replace_requires_existing_event() {
        let store = MemoryEventStore::new();
        let err = store
            .replace_event(event("$a", "m.room.message", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::NotFound(_)));
    }

    #[tokio::test]
    async fn injected_failure_is_consumed() {
        let store = MemoryEventStore::new();
        store.fail_next("disk full").await;
        assert!(store.get_event(&"$a".into()).await.is_err());
        assert!(store.get_event(&"$a".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn state_query_counts_queries() {
        let query = MemoryStateQuery::new();
        let room = RoomId::from("!room:example.org");
        assert!(query.current_state(&room, &[]).await.is_err());

        let state: StateSet = [EventId::from("$create")].into_iter().collect();
        query.set_state(room.clone(), state.clone()).await;
        assert_eq!(query.current_state(&room, &[]).await.unwrap(), state);
        assert_eq!(query.query_count().await, 2);
    }

    #[tokio::test]
    async fn strip_content_keeps_preserved_keys() {
        let member = event(
            "$m",
            "m.room.member",
            json!({"membership": "join", "displayname": "Alice"}),
        );
        let redacted = StripContent.redact(member).await.unwrap();
        assert_eq!(redacted.content, json!({"membership": "join"}));

        let message = event("$x", "m.room.message", json!({"body": "secret"}));
        let redacted = StripContent.redact(message).await.unwrap();
        assert_eq!(redacted.content, json!({}));
        assert_eq!(redacted.event_id.as_str(), "$x");
    }
}
