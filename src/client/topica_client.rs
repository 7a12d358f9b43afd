//! Topica client
//!
//! `TopicaClient` is a cheap, cloneable handle over one connection to a
//! Topica broker. Each instance owns its own router, event listeners and
//! connection task; nothing is shared between instances.
//!
//! Usage notes:
//! - `connect` spawns the connection task, so it must run inside a tokio
//!   runtime. Call `shutdown` to stop it; dropping the handle does not.
//! - `get`, `set` and `subscribe` are fire-and-forget and do nothing while
//!   the connection is not open. `get_value` and `wait_until_open` are the
//!   awaitable forms and report `TopicaError::NotOpen` instead.
//! - Callbacks run on the connection task with no client lock held, so they
//!   may call back into the client. They should not block.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::client::events::{Event, EventCallback, EventKind, EventRegistry};
use crate::codec::{Request, Value, decode_data_frame};
use crate::config::Settings;
use crate::discovery::{LAST_TOPIC_CREATED, REST_PORT_TOPIC, fetch_topics, rest_port};
use crate::router::{CachedValue, GetCallback, Router, SubscriptionCallback};
use crate::transport::{ConnectionHandler, ConnectionState, Link, ReconnectPolicy, run_connection};
use crate::utils::error::{DiscoveryError, TopicaError};

#[derive(Clone)]
pub struct TopicaClient {
    inner: Arc<Inner>,
}

struct Inner {
    id: Uuid,
    me: Weak<Inner>,
    settings: Settings,
    router: Mutex<Router>,
    link: Link,
    events: Mutex<EventRegistry>,
    http: reqwest::Client,
    running: Mutex<Option<Running>>,
}

struct Running {
    shutdown: watch::Sender<bool>,
    connection: JoinHandle<()>,
    sweeper: Option<JoinHandle<()>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TopicaClient {
    /// Builds a disconnected client. Nothing is spawned until `connect`.
    pub fn new(settings: Settings) -> Self {
        let inner = Arc::new_cyclic(|me| Inner {
            id: Uuid::new_v4(),
            me: me.clone(),
            settings,
            router: Mutex::new(Router::new()),
            link: Link::new(),
            events: Mutex::new(EventRegistry::default()),
            http: reqwest::Client::new(),
            running: Mutex::new(None),
        });
        Self { inner }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn url(&self) -> String {
        self.inner.settings.broker.url()
    }

    /// Starts connecting in the background.
    ///
    /// Calling it again while the connection task is alive does nothing.
    /// Once a task without reconnection has given up, it starts a new one.
    pub fn connect(&self) {
        let mut running = lock(&self.inner.running);
        if let Some(current) = running.take() {
            if !current.connection.is_finished() {
                *running = Some(current);
                return;
            }
            let _ = current.shutdown.send(true);
        }

        let client = &self.inner.settings.client;
        let policy = ReconnectPolicy::new(client.reconnect, client.reconnect_interval_ms);
        let (stop, shutdown) = watch::channel(false);

        info!(client = %self.inner.id, url = %self.url(), "starting connection");
        let connection = tokio::spawn(run_connection(
            self.url(),
            Arc::clone(&self.inner),
            policy,
            shutdown.clone(),
        ));
        let sweeper = spawn_sweeper(Arc::clone(&self.inner), shutdown);

        *running = Some(Running {
            shutdown: stop,
            connection,
            sweeper,
        });
    }

    /// Stops reconnecting, closes the socket after flushing queued frames and
    /// waits for the background tasks to finish.
    pub async fn shutdown(&self) {
        let running = lock(&self.inner.running).take();
        let Some(running) = running else {
            return;
        };

        let _ = running.shutdown.send(true);
        let _ = running.connection.await;
        if let Some(sweeper) = running.sweeper {
            let _ = sweeper.await;
        }
        self.inner.link.close();
        info!(client = %self.inner.id, "client shut down");
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.link.state()
    }

    pub fn is_open(&self) -> bool {
        self.inner.link.is_open()
    }

    /// Resolves once the connection is open, or fails with `NotOpen` when
    /// `timeout` passes first.
    pub async fn wait_until_open(&self, timeout: Duration) -> Result<(), TopicaError> {
        let mut state = self.inner.link.watch_state();
        match tokio::time::timeout(timeout, state.wait_for(|s| *s == ConnectionState::Open)).await {
            Ok(Ok(_)) => Ok(()),
            _ => Err(TopicaError::NotOpen),
        }
    }

    /// Requests the current value of `path`.
    ///
    /// The callback receives the value, or the reason none will come: the get
    /// timed out, the connection closed, or the path could not be encoded.
    /// A newer `get` on the same path replaces this one, and the replaced
    /// callback is never called. Does nothing while the connection is closed.
    pub fn get<F>(&self, path: &str, callback: F)
    where
        F: FnOnce(Result<Value, TopicaError>) + Send + 'static,
    {
        self.inner.issue_get(path, Box::new(callback));
    }

    /// Awaitable `get`.
    pub async fn get_value(&self, path: &str) -> Result<Value, TopicaError> {
        self.inner.get_value(path).await
    }

    /// Writes `value` to `path`. The wire type follows the `Value` variant.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<(), TopicaError> {
        self.inner.set(path, value.into())
    }

    /// Asks the broker to push `prefix` every `interval_ms`.
    ///
    /// The callback sees every data frame whose path starts with `prefix`.
    /// Subscriptions end with the connection and are not re-issued after a
    /// reconnect; listen for [`EventKind::Reconnect`] to subscribe again.
    pub fn subscribe<F>(&self, prefix: &str, interval_ms: u32, callback: F) -> Result<(), TopicaError>
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.inner.subscribe(prefix, interval_ms, Arc::new(callback))
    }

    /// Stops delivering frames for `prefix`. The broker is not told.
    pub fn unsubscribe(&self, prefix: &str) -> bool {
        lock(&self.inner.router).unsubscribe(prefix)
    }

    /// Lists every topic the broker knows about.
    pub async fn get_topics(&self) -> Result<Vec<String>, TopicaError> {
        self.inner.get_topics().await
    }

    pub fn on_event<F>(&self, kind: EventKind, callback: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let callback: EventCallback = Arc::new(callback);
        // `on_open` flips the link under the same lock, so an `Open` listener
        // is either in its snapshot or sees the link open here, never both.
        let (count, already_open) = {
            let mut events = lock(&self.inner.events);
            let count = events.register(kind, Arc::clone(&callback));
            (count, self.inner.link.is_open())
        };

        match kind {
            EventKind::Open if already_open => callback(&Event::Open),
            EventKind::NewTopic if count == 1 => self.inner.watch_new_topics(),
            _ => {}
        }
    }

    pub fn cached(&self, path: &str) -> Option<CachedValue> {
        lock(&self.inner.router).cached(path).cloned()
    }

    pub fn cache_snapshot(&self) -> HashMap<String, Value> {
        lock(&self.inner.router).snapshot()
    }

    pub fn has_pending_get(&self, path: &str) -> bool {
        lock(&self.inner.router).has_pending_get(path)
    }
}

impl fmt::Debug for TopicaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicaClient")
            .field("id", &self.inner.id)
            .field("url", &self.url())
            .field("state", &self.state())
            .finish()
    }
}

impl Inner {
    fn emit(&self, event: Event) {
        let listeners = lock(&self.events).listeners(event.kind());
        fire(&listeners, &event);
    }

    /// Registers and sends a get. Returns `false` when nothing was sent and
    /// the callback was dropped uncalled.
    fn issue_get(&self, path: &str, callback: GetCallback) -> bool {
        if !self.link.is_open() {
            trace!(client = %self.id, path, "get ignored, connection not open");
            return false;
        }

        let request = Request::Get {
            path: path.to_string(),
        };
        let frame = match request.encode() {
            Ok(frame) => frame,
            Err(e) => {
                callback(Err(e.into()));
                return true;
            }
        };

        let issued_at = Utc::now().timestamp_millis();
        let ticket = lock(&self.router).register_get(path, callback, issued_at);
        if ticket.replaced {
            debug!(client = %self.id, path, "replaced pending get");
        }

        if !self.link.send(frame) {
            lock(&self.router).cancel_get(path, ticket.id);
            return false;
        }
        trace!(client = %self.id, path, "get sent");
        true
    }

    async fn get_value(&self, path: &str) -> Result<Value, TopicaError> {
        let (tx, mut rx) = oneshot::channel();
        let issued = self.issue_get(
            path,
            Box::new(move |result: Result<Value, TopicaError>| {
                let _ = tx.send(result);
            }),
        );

        if !issued {
            // The connection may have closed between registering and sending,
            // in which case the callback already reported why.
            return rx.try_recv().unwrap_or(Err(TopicaError::NotOpen));
        }
        rx.await
            .unwrap_or_else(|_| Err(TopicaError::Superseded(path.to_string())))
    }

    fn set(&self, path: &str, value: Value) -> Result<(), TopicaError> {
        if !self.link.is_open() {
            trace!(client = %self.id, path, "set ignored, connection not open");
            return Ok(());
        }

        let frame = Request::Set {
            path: path.to_string(),
            value,
        }
        .encode()?;
        if self.link.send(frame) {
            trace!(client = %self.id, path, "set sent");
        }
        Ok(())
    }

    fn subscribe(
        &self,
        prefix: &str,
        interval_ms: u32,
        callback: SubscriptionCallback,
    ) -> Result<(), TopicaError> {
        if !self.link.is_open() {
            trace!(client = %self.id, prefix, "subscribe ignored, connection not open");
            return Ok(());
        }

        let frame = Request::Subscribe {
            path: prefix.to_string(),
            interval_ms,
        }
        .encode()?;

        if lock(&self.router).subscribe(prefix, interval_ms, callback) {
            debug!(client = %self.id, prefix, "replaced subscription");
        }
        if !self.link.send(frame) {
            lock(&self.router).unsubscribe(prefix);
            return Ok(());
        }
        debug!(client = %self.id, prefix, interval_ms, "subscribed");
        Ok(())
    }

    async fn get_topics(&self) -> Result<Vec<String>, TopicaError> {
        let port_value = self
            .get_value(REST_PORT_TOPIC)
            .await
            .map_err(|e| DiscoveryError::PortUnresolved(Box::new(e)))?;
        let port = rest_port(&port_value)?;
        Ok(fetch_topics(&self.http, &self.settings.broker.host, port).await?)
    }

    /// Subscribes to the topic-creation meta-topic and re-runs discovery
    /// each time it arrives. The payload is never looked at.
    ///
    /// Arrivals during a running discovery are folded into it, and a
    /// `NewTopic` event goes out when the listing differs from the last one
    /// delivered.
    fn watch_new_topics(&self) {
        let me = self.me.clone();
        let in_flight = Arc::new(AtomicBool::new(false));
        let last_listing: Arc<Mutex<Option<Vec<String>>>> = Arc::default();

        let callback = move |_: &str, _: &Value| {
            let Some(inner) = me.upgrade() else {
                return;
            };
            if in_flight.swap(true, Ordering::AcqRel) {
                trace!(client = %inner.id, "discovery already running");
                return;
            }

            let in_flight = Arc::clone(&in_flight);
            let last_listing = Arc::clone(&last_listing);
            tokio::spawn(async move {
                let result = inner.get_topics().await;
                in_flight.store(false, Ordering::Release);

                match result {
                    Ok(topics) => {
                        {
                            let mut last = lock(&last_listing);
                            if last.as_ref() == Some(&topics) {
                                return;
                            }
                            *last = Some(topics.clone());
                        }
                        inner.emit(Event::NewTopic { topics });
                    }
                    Err(e) => {
                        warn!(client = %inner.id, "topic discovery failed: {e}");
                        inner.emit(Event::Error(Arc::new(e)));
                    }
                }
            });
        };

        let interval_ms = self.settings.client.newtopic_interval_ms;
        if let Err(e) = self.subscribe(LAST_TOPIC_CREATED, interval_ms, Arc::new(callback)) {
            warn!(client = %self.id, "could not watch for new topics: {e}");
        }
    }

    fn expire_pending(&self, timeout_ms: u64) {
        let now = Utc::now().timestamp_millis();
        let expired = lock(&self.router).expire_pending(now, timeout_ms);
        for (path, callback) in expired {
            debug!(client = %self.id, path = %path, "get timed out");
            callback(Err(TopicaError::GetTimeout { path, timeout_ms }));
        }
    }
}

impl ConnectionHandler for Inner {
    fn on_connecting(&self) {
        self.link.set_connecting();
    }

    fn on_open(&self, outbound: mpsc::UnboundedSender<WsMessage>) {
        let (event, listeners, watch_topics) = {
            let events = lock(&self.events);
            let event = if self.link.open(outbound) {
                Event::Open
            } else {
                Event::Reconnect
            };
            let listeners = events.listeners(event.kind());
            (event, listeners, events.count(EventKind::NewTopic) > 0)
        };
        info!(client = %self.id, event = %event.kind(), "connection open");

        fire(&listeners, &event);
        if watch_topics {
            self.watch_new_topics();
        }
    }

    fn on_message(&self, bytes: &[u8]) {
        let frame = match decode_data_frame(bytes) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                trace!(client = %self.id, len = bytes.len(), "ignoring non-data frame");
                return;
            }
            Err(e) => {
                warn!(client = %self.id, "dropping malformed frame: {e}");
                return;
            }
        };

        trace!(client = %self.id, path = %frame.path, "data frame");
        let delivery = lock(&self.router).route(frame);
        delivery.deliver();
    }

    fn on_close(&self) {
        let was_open = self.link.is_open();
        self.link.close();

        let pending = {
            let mut router = lock(&self.router);
            router.clear_subscriptions();
            router.drain_pending()
        };
        for (path, callback) in pending {
            callback(Err(TopicaError::ConnectionClosed(path)));
        }

        if was_open {
            info!(client = %self.id, "connection closed");
        }
        self.emit(Event::Close);
    }

    fn on_error(&self, error: TopicaError) {
        warn!(client = %self.id, "{error}");
        self.emit(Event::Error(Arc::new(error)));
    }
}

fn fire(listeners: &[EventCallback], event: &Event) {
    for listener in listeners {
        listener(event);
    }
}

/// Spawns the task that times out pending gets, unless timeouts are off.
fn spawn_sweeper(inner: Arc<Inner>, mut shutdown: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
    let timeout_ms = inner.settings.client.get_timeout_ms;
    if timeout_ms == 0 {
        return None;
    }
    let period = Duration::from_millis(timeout_ms / 4)
        .clamp(Duration::from_millis(10), Duration::from_secs(1));

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => inner.expire_pending(timeout_ms),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }))
}
