//! Append-only event log with per-consumer cursors

use super::EventKind;
use crate::error::{FleetError, FleetResult};
use crate::ids::validate_id;
use crate::team::TeamScope;
use chrono::{DateTime, Utc};
use fleet_store::StoreExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// One row of `events.jsonl`
///
/// Rows are kept loosely typed so that events written by newer or older
/// versions survive a round trip; use [`Event::kind`] for the typed view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub ts: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Event {
    /// Typed payload, `None` for unknown or malformed types
    pub fn kind(&self) -> Option<EventKind> {
        let mut object = self.payload.clone();
        object.insert("type".to_string(), Value::String(self.event_type.clone()));
        serde_json::from_value(Value::Object(object)).ok()
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(Value::as_str)
    }
}

/// Query over the log
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Only these types; empty means all
    pub types: Vec<String>,
    /// Explicit lower bound, takes precedence over the consumer cursor
    pub since_id: Option<u64>,
    /// Named consumer whose cursor is read and advanced
    pub consumer: Option<String>,
    pub limit: Option<usize>,
}

impl EventFilter {
    pub fn for_consumer(consumer: impl Into<String>) -> Self {
        Self {
            consumer: Some(consumer.into()),
            ..Default::default()
        }
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    fn matches(&self, event: &Event) -> bool {
        self.types.is_empty() || self.types.iter().any(|t| t == &event.event_type)
    }
}

/// Event log of one team
pub struct EventLog<'a> {
    scope: &'a TeamScope<'a>,
}

impl<'a> EventLog<'a> {
    pub fn new(scope: &'a TeamScope<'a>) -> Self {
        Self { scope }
    }

    /// Allocate the next id under the sequence lock and append the event
    pub fn emit(&self, kind: EventKind) -> FleetResult<Event> {
        let Value::Object(mut payload) = serde_json::to_value(&kind)? else {
            return Err(FleetError::other("event payload is not an object"));
        };
        let event_type = match payload.remove("type") {
            Some(Value::String(t)) => t,
            _ => return Err(FleetError::other("event payload has no type")),
        };

        let store = self.scope.store();
        let paths = self.scope.paths();
        self.scope.update_runtime(|runtime| {
            if runtime.event_seq == 0 {
                // Runtime lost or reset: never hand out ids already in the log.
                runtime.event_seq = self.last_id();
            }
            runtime.event_seq += 1;

            let event = Event {
                id: runtime.event_seq,
                ts: self.scope.now(),
                event_type,
                payload,
            };
            store.append_json(&paths.events(), &event)?;
            debug!("Emitted {} #{} for team {}", event.event_type, event.id, self.scope.id());
            Ok(event)
        })
    }

    /// Every event still in the log, oldest first
    pub fn all(&self) -> Vec<Event> {
        self.scope.store().read_jsonl(&self.scope.paths().events())
    }

    /// The last `n` events
    pub fn tail(&self, n: usize) -> Vec<Event> {
        let mut events = self.all();
        let skip = events.len().saturating_sub(n);
        events.drain(..skip);
        events
    }

    fn last_id(&self) -> u64 {
        self.all().iter().map(|e| e.id).max().unwrap_or(0)
    }

    /// Events after `since_id` or the consumer cursor; advances the cursor to the max id returned
    pub fn check(&self, filter: &EventFilter) -> FleetResult<Vec<Event>> {
        if let Some(consumer) = &filter.consumer {
            validate_id("consumer", consumer)?;
        }

        let since = match (filter.since_id, &filter.consumer) {
            (Some(id), _) => id,
            (None, Some(consumer)) => self.cursor(consumer),
            (None, None) => 0,
        };

        let mut events: Vec<Event> = self
            .all()
            .into_iter()
            .filter(|e| e.id > since && filter.matches(e))
            .collect();
        if let Some(limit) = filter.limit {
            events.truncate(limit);
        }

        if let Some(consumer) = &filter.consumer {
            if let Some(max) = events.iter().map(|e| e.id).max() {
                self.set_cursor(consumer, max)?;
            }
        }
        Ok(events)
    }

    /// Stored position of a consumer; unreadable cursors count as 0
    pub fn cursor(&self, consumer: &str) -> u64 {
        let key = self.scope.paths().cursor(consumer);
        match self.scope.store().read(&key) {
            Ok(Some(raw)) => raw.trim().parse().unwrap_or_else(|_| {
                warn!("Unparseable cursor {}: {:?}", key, raw);
                0
            }),
            Ok(None) => 0,
            Err(e) => {
                warn!("Unreadable cursor {}: {}", key, e);
                0
            }
        }
    }

    pub fn set_cursor(&self, consumer: &str, id: u64) -> FleetResult<()> {
        validate_id("consumer", consumer)?;
        self.scope
            .store()
            .write_atomic(&self.scope.paths().cursor(consumer), &id.to_string())?;
        Ok(())
    }

    /// Keep only the newest `keep` rows; returns how many were dropped
    pub fn compact(&self, keep: usize) -> FleetResult<usize> {
        let store = self.scope.store();
        let key = self.scope.paths().events();
        store.with_lock(&self.scope.paths().runtime_lock(), || {
            let lines = store.read_lines(&key)?;
            if lines.len() <= keep {
                return Ok(0);
            }
            let dropped = lines.len() - keep;
            store.rewrite_lines(&key, &lines[dropped..])?;
            debug!("Compacted {} events for team {}", dropped, self.scope.id());
            Ok::<_, FleetError>(dropped)
        })
    }

    /// Events emitted at or after `since`
    pub fn since_time(&self, since: DateTime<Utc>) -> Vec<Event> {
        self.all().into_iter().filter(|e| e.ts >= since).collect()
    }
}
