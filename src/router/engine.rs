//! Router engine
//!
//! Per-connection bookkeeping for everything that waits on inbound data
//! frames:
//! - pending `get` callbacks, one per exact topic path
//! - subscriptions, one per topic path prefix
//! - the topic state cache (last value per path)
//!
//! Concurrency and usage notes:
//! - The API is synchronous and meant to sit behind a lock owned by one
//!   client. `route` only computes a [`Delivery`]; callers release the lock
//!   before calling [`Delivery::deliver`] so callbacks can re-enter the client.
//! - Pending gets are bounded in time by `expire_pending`, driven from a
//!   periodic sweep task, and flushed by `drain_pending` when the connection
//!   closes.

use std::collections::HashMap;
use std::fmt;

use crate::codec::{DataFrame, Value};
use crate::router::cache::CachedValue;
use crate::router::subscription::{Subscription, SubscriptionCallback};
use crate::utils::error::TopicaError;

/// Callback resolving a single `get`.
pub type GetCallback = Box<dyn FnOnce(Result<Value, TopicaError>) + Send>;

pub struct PendingGet {
    pub callback: GetCallback,
    /// Unix milliseconds at which the request was sent.
    pub issued_at: i64,
    pub ticket: u64,
}

/// Identifies one registration of a pending get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetTicket {
    pub id: u64,
    /// An older pending callback for the same path was dropped.
    pub replaced: bool,
}

impl fmt::Debug for PendingGet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingGet")
            .field("issued_at", &self.issued_at)
            .field("ticket", &self.ticket)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct Router {
    pending: HashMap<String, PendingGet>,
    subscriptions: HashMap<String, Subscription>,
    state: HashMap<String, CachedValue>,
    next_ticket: u64,
}

/// Everything one inbound frame has to be handed to.
pub struct Delivery {
    pub path: String,
    pub value: Value,
    pub get: Option<GetCallback>,
    pub subscribers: Vec<SubscriptionCallback>,
}

impl Delivery {
    /// Runs the get callback first, then the subscription fan-out.
    pub fn deliver(self) {
        if let Some(callback) = self.get {
            callback(Ok(self.value.clone()));
        }
        for callback in &self.subscribers {
            callback(&self.path, &self.value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.get.is_none() && self.subscribers.is_empty()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the callback for the next data frame on `path`.
    /// A replaced older callback is dropped without being called.
    pub fn register_get(&mut self, path: &str, callback: GetCallback, issued_at: i64) -> GetTicket {
        self.next_ticket += 1;
        let id = self.next_ticket;
        let replaced = self
            .pending
            .insert(
                path.to_string(),
                PendingGet {
                    callback,
                    issued_at,
                    ticket: id,
                },
            )
            .is_some();
        GetTicket { id, replaced }
    }

    /// Forgets the pending get registered under `ticket` without calling it.
    /// A newer get on the same path is left alone.
    pub fn cancel_get(&mut self, path: &str, ticket: u64) -> bool {
        if self.pending.get(path).is_some_and(|p| p.ticket == ticket) {
            self.pending.remove(path);
            return true;
        }
        false
    }

    pub fn has_pending_get(&self, path: &str) -> bool {
        self.pending.contains_key(path)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Registers a subscription under `prefix`. Returns `true` when it
    /// replaced an existing one.
    pub fn subscribe(&mut self, prefix: &str, interval_ms: u32, callback: SubscriptionCallback) -> bool {
        self.subscriptions
            .insert(
                prefix.to_string(),
                Subscription::new(prefix, interval_ms, callback),
            )
            .is_some()
    }

    /// Removes the subscription registered under exactly `prefix`.
    pub fn unsubscribe(&mut self, prefix: &str) -> bool {
        self.subscriptions.remove(prefix).is_some()
    }

    pub fn is_subscribed(&self, prefix: &str) -> bool {
        self.subscriptions.contains_key(prefix)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn clear_subscriptions(&mut self) {
        self.subscriptions.clear();
    }

    /// Matches a data frame against pending gets and subscriptions and
    /// records it in the state cache.
    pub fn route(&mut self, frame: DataFrame) -> Delivery {
        let get = self.pending.remove(&frame.path).map(|p| p.callback);
        let subscribers = self
            .subscriptions
            .values()
            .filter(|s| s.matches(&frame.path))
            .map(Subscription::callback)
            .collect();

        self.state
            .insert(frame.path.clone(), CachedValue::new(frame.value.clone()));

        Delivery {
            path: frame.path,
            value: frame.value,
            get,
            subscribers,
        }
    }

    /// Removes every pending get issued more than `timeout_ms` before `now`.
    pub fn expire_pending(&mut self, now: i64, timeout_ms: u64) -> Vec<(String, GetCallback)> {
        let timeout = i64::try_from(timeout_ms).unwrap_or(i64::MAX);
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, p)| now.saturating_sub(p.issued_at) >= timeout)
            .map(|(path, _)| path.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|path| self.pending.remove(&path).map(|p| (path, p.callback)))
            .collect()
    }

    /// Removes every pending get, e.g. because the connection went away.
    pub fn drain_pending(&mut self) -> Vec<(String, GetCallback)> {
        self.pending
            .drain()
            .map(|(path, p)| (path, p.callback))
            .collect()
    }

    pub fn cached(&self, path: &str) -> Option<&CachedValue> {
        self.state.get(path)
    }

    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.state
            .iter()
            .map(|(path, cached)| (path.clone(), cached.value.clone()))
            .collect()
    }
}
