use std::fmt;
use std::sync::Arc;

use crate::codec::Value;

/// Callback invoked with the concrete topic path and its new value.
pub type SubscriptionCallback = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// An active subscription, keyed by a topic path prefix.
///
/// One subscription can match many concrete topics: `/robot` receives
/// `/robot/a` and `/robot/b/c` alike.
pub struct Subscription {
    pub prefix: String,
    /// Interval hint the broker was asked to push at.
    pub interval_ms: u32,
    callback: SubscriptionCallback,
}

impl Subscription {
    pub fn new(prefix: &str, interval_ms: u32, callback: SubscriptionCallback) -> Self {
        Self {
            prefix: prefix.to_string(),
            interval_ms,
            callback,
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }

    pub fn callback(&self) -> SubscriptionCallback {
        Arc::clone(&self.callback)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("prefix", &self.prefix)
            .field("interval_ms", &self.interval_ms)
            .finish_non_exhaustive()
    }
}
