use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::utils::error::TopicaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Error,
    Open,
    Close,
    Reconnect,
    NewTopic,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Error => "error",
            EventKind::Open => "open",
            EventKind::Close => "close",
            EventKind::Reconnect => "reconnect",
            EventKind::NewTopic => "newtopic",
        }
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(EventKind::Error),
            "open" => Ok(EventKind::Open),
            "close" => Ok(EventKind::Close),
            "reconnect" => Ok(EventKind::Reconnect),
            "newtopic" => Ok(EventKind::NewTopic),
            other => Err(format!("unknown event `{other}`")),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lifecycle or discovery notification handed to event listeners.
#[derive(Debug, Clone)]
pub enum Event {
    Error(Arc<TopicaError>),
    Open,
    Close,
    Reconnect,
    NewTopic { topics: Vec<String> },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Error(_) => EventKind::Error,
            Event::Open => EventKind::Open,
            Event::Close => EventKind::Close,
            Event::Reconnect => EventKind::Reconnect,
            Event::NewTopic { .. } => EventKind::NewTopic,
        }
    }
}

pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Listeners per event kind, called in registration order.
#[derive(Default)]
pub struct EventRegistry {
    listeners: HashMap<EventKind, Vec<EventCallback>>,
}

impl EventRegistry {
    /// Adds a listener and returns how many the kind now has.
    pub fn register(&mut self, kind: EventKind, callback: EventCallback) -> usize {
        let listeners = self.listeners.entry(kind).or_default();
        listeners.push(callback);
        listeners.len()
    }

    pub fn listeners(&self, kind: EventKind) -> Vec<EventCallback> {
        self.listeners.get(&kind).cloned().unwrap_or_default()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<_, _> = self
            .listeners
            .iter()
            .map(|(kind, listeners)| (kind.name(), listeners.len()))
            .collect();
        f.debug_struct("EventRegistry")
            .field("listeners", &counts)
            .finish()
    }
}
