use chrono::{DateTime, Utc};

use crate::codec::Value;

/// The last value observed for a topic and when it arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue {
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

impl CachedValue {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            updated_at: Utc::now(),
        }
    }
}
