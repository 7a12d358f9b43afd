use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::utils::error::TopicaError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Receives the lifecycle of one client connection.
///
/// Every method is called from the single connection task, so inbound
/// frames arrive at `on_message` strictly in order. A connection attempt
/// that fails reports `on_error` followed by `on_close`.
pub trait ConnectionHandler: Send + Sync + 'static {
    fn on_connecting(&self);
    fn on_open(&self, outbound: mpsc::UnboundedSender<WsMessage>);
    fn on_message(&self, frame: &[u8]);
    fn on_close(&self);
    fn on_error(&self, error: TopicaError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub interval: Duration,
}

impl ReconnectPolicy {
    pub fn new(enabled: bool, interval_ms: u64) -> Self {
        Self {
            enabled,
            interval: Duration::from_millis(interval_ms),
        }
    }
}

/// Drives the socket for one client until shutdown, or until the first
/// disconnect when reconnection is disabled.
pub async fn run_connection<H: ConnectionHandler>(
    url: String,
    handler: Arc<H>,
    policy: ReconnectPolicy,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        handler.on_connecting();
        debug!(%url, "connecting");

        let attempt = tokio::select! {
            _ = stopped(&mut shutdown) => break,
            attempt = connect_async(url.as_str()) => attempt,
        };

        match attempt {
            Ok((socket, _)) => {
                info!(%url, "connected");
                if serve(socket, handler.as_ref(), &mut shutdown).await {
                    break;
                }
                info!(%url, "connection closed");
            }
            Err(e) => {
                handler.on_error(TopicaError::Connect(Box::new(e)));
                handler.on_close();
            }
        }

        if !policy.enabled {
            break;
        }

        tokio::select! {
            _ = stopped(&mut shutdown) => break,
            _ = tokio::time::sleep(policy.interval) => {}
        }
    }
    debug!(%url, "connection task finished");
}

/// Pumps one open socket. Returns `true` when it ended because of shutdown.
async fn serve<H: ConnectionHandler>(
    socket: Socket,
    handler: &H,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = ws_sender.send(msg).await {
                warn!("failed to write frame: {e}");
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    handler.on_open(tx);

    let mut stopping = false;
    loop {
        tokio::select! {
            _ = stopped(shutdown) => {
                stopping = true;
                break;
            }
            frame = ws_receiver.next() => match frame {
                Some(Ok(WsMessage::Binary(data))) => handler.on_message(&data),
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    handler.on_error(TopicaError::Transport(Box::new(e)));
                    break;
                }
            }
        }
    }

    // The handler drops its sender on close, which lets the writer drain
    // what is already queued and finish.
    handler.on_close();
    if stopping {
        let _ = writer.await;
    } else {
        writer.abort();
    }
    stopping
}

/// Resolves once shutdown is requested or its sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
