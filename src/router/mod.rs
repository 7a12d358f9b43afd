//! The `router` module correlates inbound data frames with whoever is
//! waiting for them: pending `get` requests, prefix subscriptions, and the
//! topic state cache.

pub mod cache;
pub mod engine;
pub mod subscription;

pub use cache::CachedValue;
pub use engine::{Delivery, GetCallback, GetTicket, Router};
pub use subscription::{Subscription, SubscriptionCallback};
