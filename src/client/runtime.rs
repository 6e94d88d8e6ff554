//! The client connection runtime: a background task owns the socket
//! and drives reconnect/backoff, while the [`Client`] handle is cheap
//! to clone and safe to call from anywhere.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::frame::{Frame, Method};
use crate::path::split_url;

use super::listeners::ListenerRegistry;
use super::pending::PendingTable;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection lifecycle state. `Reconnecting` loops back to
/// `Connecting` until a connection succeeds or [`Client::close`] is
/// called, at which point the runtime settles on `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientState {
    Disconnected = 0,
    Connecting = 1,
    Open = 2,
    Closing = 3,
    Reconnecting = 4,
}

impl ClientState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ClientState::Connecting,
            2 => ClientState::Open,
            3 => ClientState::Closing,
            4 => ClientState::Reconnecting,
            _ => ClientState::Disconnected,
        }
    }
}

struct SharedState(AtomicU8);

impl SharedState {
    fn new(state: ClientState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn get(&self) -> ClientState {
        ClientState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, state: ClientState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// A handle to a reconnecting WebSocket client. Cloning shares the
/// same background connection, outbound queue, pending-request table,
/// and listener registry.
#[derive(Clone)]
pub struct Client {
    url: String,
    state: Arc<SharedState>,
    outbound: mpsc::UnboundedSender<Frame>,
    pending: Arc<PendingTable>,
    listeners: Arc<ListenerRegistry>,
    shutdown: watch::Sender<bool>,
    request_timeout: Duration,
}

impl Client {
    /// Start connecting to `url` in the background. Returns
    /// immediately with a handle in the `Connecting` state; outbound
    /// calls made before the socket opens are queued and flushed on
    /// connect.
    #[must_use]
    pub fn connect(url: impl Into<String>, config: ClientConfig) -> Self {
        let url = url.into();
        let state = Arc::new(SharedState::new(ClientState::Connecting));
        let pending = Arc::new(PendingTable::new());
        let listeners = Arc::new(ListenerRegistry::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound, inbound_rx) = mpsc::unbounded_channel();
        let request_timeout = Duration::from_millis(config.request_timeout_ms);

        let client = Self {
            url: url.clone(),
            state: state.clone(),
            outbound,
            pending: pending.clone(),
            listeners: listeners.clone(),
            shutdown: shutdown_tx,
            request_timeout,
        };

        tokio::spawn(run(url, config, state, pending, listeners, shutdown_rx, inbound_rx));

        client
    }

    /// The current connection lifecycle state.
    #[must_use]
    pub fn state(&self) -> ClientState {
        self.state.get()
    }

    /// Send a fire-and-forget frame. Queued if the socket isn't open.
    pub fn send(&self, method: Method, url: impl Into<String>, data: Option<serde_json::Value>) -> Result<()> {
        self.outbound
            .send(Frame::send(method, url, data))
            .map_err(|_| Error::ClientClosed)
    }

    /// Send a request frame and await its correlated response, or
    /// [`Error::ClientTimeout`] if none arrives within
    /// `request_timeout_ms`.
    pub async fn request(
        &self,
        method: Method,
        url: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let frame = Frame::request(method, url, data);
        let id = frame.id.clone().expect("Frame::request always assigns an id");
        let rx = self.pending.insert(id.clone());

        self.outbound.send(frame).map_err(|_| Error::ClientClosed)?;

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(Error::ClientClosed),
            Err(_) => {
                self.pending.cancel(&id);
                Err(Error::ClientTimeout(id))
            }
        }
    }

    /// Register a callback for inbound broadcasts/events whose `url`
    /// matches `pattern` (the same `:name` capture syntax routes use).
    pub async fn on(
        &self,
        pattern: &str,
        callback: impl Fn(&Frame, std::collections::HashMap<String, String>) + Send + Sync + 'static,
    ) {
        self.listeners.add(pattern, callback).await;
    }

    /// Begin a graceful shutdown: stop reconnecting and close the
    /// socket. Outstanding requests resolve with [`Error::ClientClosed`].
    pub fn close(&self) {
        self.state.set(ClientState::Closing);
        let _ = self.shutdown.send(true);
    }
}

fn is_shutting_down(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow()
}

#[allow(clippy::too_many_arguments)]
async fn run(
    url: String,
    config: ClientConfig,
    state: Arc<SharedState>,
    pending: Arc<PendingTable>,
    listeners: Arc<ListenerRegistry>,
    mut shutdown: watch::Receiver<bool>,
    mut outbound_rx: mpsc::UnboundedReceiver<Frame>,
) {
    let mut attempt: u32 = 0;

    loop {
        if is_shutting_down(&shutdown) {
            break;
        }
        state.set(ClientState::Connecting);

        match connect_async(&url).await {
            Ok((socket, _response)) => {
                attempt = 0;
                state.set(ClientState::Open);
                tracing::debug!(%url, "client connected");
                run_connected(socket, &state, &pending, &listeners, &mut shutdown, &mut outbound_rx).await;
            }
            Err(err) => {
                tracing::debug!(%url, error = %err, "client connect failed");
            }
        }

        if is_shutting_down(&shutdown) {
            break;
        }

        state.set(ClientState::Reconnecting);
        let delay = backoff_delay(&config, attempt);
        attempt = attempt.saturating_add(1);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    state.set(ClientState::Disconnected);
    pending.cancel_all();
}

/// Drive one established connection until it closes (peer close,
/// read/write error, or an explicit [`Client::close`]).
async fn run_connected(
    socket: WsStream,
    state: &Arc<SharedState>,
    pending: &Arc<PendingTable>,
    listeners: &Arc<ListenerRegistry>,
    shutdown: &mut watch::Receiver<bool>,
    outbound_rx: &mut mpsc::UnboundedReceiver<Frame>,
) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                match frame {
                    Some(frame) => {
                        let Ok(text) = frame.to_json() else {
                            tracing::debug!("failed to serialize outgoing frame");
                            continue;
                        };
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        state.set(ClientState::Closing);
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        handle_inbound(&text, pending, listeners).await;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = sink.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::debug!(error = %err, "client socket read error");
                        break;
                    }
                }
            }
            _ = shutdown.changed() => {
                if is_shutting_down(shutdown) {
                    state.set(ClientState::Closing);
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }
}

async fn handle_inbound(text: &str, pending: &Arc<PendingTable>, listeners: &Arc<ListenerRegistry>) {
    let frame = match Frame::from_json(text) {
        Ok(f) => f,
        Err(err) => {
            tracing::debug!(error = %err, "client received malformed frame");
            return;
        }
    };

    match &frame.id {
        Some(id) => pending.resolve(id, frame.data.clone().unwrap_or(serde_json::Value::Null)),
        None => {
            let (pathname, _) = split_url(&frame.url);
            listeners.dispatch(&pathname, &frame).await;
        }
    }
}

fn backoff_delay(config: &ClientConfig, attempt: u32) -> Duration {
    let base = config.reconnect_backoff_base_ms;
    let cap = config.reconnect_backoff_cap_ms;
    let scaled = base.saturating_mul(1u64 << attempt.min(16));
    Duration::from_millis(scaled.min(cap))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_respects_cap() {
        let config = ClientConfig {
            reconnect_backoff_base_ms: 100,
            reconnect_backoff_cap_ms: 1_000,
            request_timeout_ms: 5_000,
        };
        assert_eq!(backoff_delay(&config, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(&config, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(&config, 2), Duration::from_millis(400));
        assert_eq!(backoff_delay(&config, 10), Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn connect_to_unreachable_address_stays_reconnecting_until_closed() {
        let config = ClientConfig {
            reconnect_backoff_base_ms: 5,
            reconnect_backoff_cap_ms: 20,
            request_timeout_ms: 100,
        };
        let client = Client::connect("ws://127.0.0.1:1", config);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_ne!(client.state(), ClientState::Open);
        client.close();
    }

    #[tokio::test]
    async fn request_against_a_closed_client_times_out_or_reports_closed() {
        let config = ClientConfig {
            reconnect_backoff_base_ms: 5,
            reconnect_backoff_cap_ms: 20,
            request_timeout_ms: 20,
        };
        let client = Client::connect("ws://127.0.0.1:1", config);
        let result = client.request(Method::Get, "/api/ping", None).await;
        assert!(result.is_err());
        client.close();
    }
}
