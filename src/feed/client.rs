// Websocket feed client for the order-book stream
//
// One OrderBookFeed instance owns one logical connection. Reconnection is
// bounded and exponentially backed off; an intentional disconnect() wins
// over any in-flight close or error, including a pending reconnect timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::ReconnectConfig;
use crate::error::{SimError, SimResult};
use crate::feed::{backoff_delay, codec, ConnectionState, FeedEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct OrderBookFeed {
    url: String,
    reconnect: ReconnectConfig,
    events: mpsc::Sender<FeedEvent>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    intentional_close: Arc<AtomicBool>,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl OrderBookFeed {
    /// Build a feed for one endpoint. Returns the feed handle plus the
    /// event stream and connection-state channel its consumer reads.
    pub fn new(
        url: impl Into<String>,
        reconnect: ReconnectConfig,
    ) -> (
        Self,
        mpsc::Receiver<FeedEvent>,
        watch::Receiver<ConnectionState>,
    ) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let feed = Self {
            url: url.into(),
            reconnect,
            events: events_tx,
            state_tx: Arc::new(state_tx),
            intentional_close: Arc::new(AtomicBool::new(false)),
            shutdown_tx: None,
            task: None,
        };

        (feed, events_rx, state_rx)
    }

    /// Open the transport and start delivering events.
    ///
    /// Resets the retry counter and the intentional-close flag, so this is
    /// also the explicit way back out of the `Failed` state.
    pub fn connect(&mut self) -> SimResult<()> {
        match *self.state_tx.borrow() {
            ConnectionState::Disconnected | ConnectionState::Failed => {}
            state => {
                warn!("connect() ignored, feed is {:?}", state);
                return Ok(());
            }
        }

        self.intentional_close.store(false, Ordering::SeqCst);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);

        let task = tokio::spawn(run_connection(
            self.url.clone(),
            self.reconnect.clone(),
            self.events.clone(),
            Arc::clone(&self.state_tx),
            shutdown_rx,
            Arc::clone(&self.intentional_close),
        ));
        self.task = Some(task);

        Ok(())
    }

    /// Intentionally close the connection.
    ///
    /// Sets the intentional-close flag before signalling shutdown, so a
    /// close or error event already in flight cannot schedule a reconnect.
    /// The connection status flips to disconnected immediately.
    pub fn disconnect(&mut self) {
        self.intentional_close.store(true, Ordering::SeqCst);
        if let Some(shutdown) = self.shutdown_tx.take() {
            let _ = shutdown.send(true);
        }
        let _ = self.state_tx.send(ConnectionState::Disconnected);
        info!("Feed disconnected (intentional)");
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Handle of the background connection task, if one was started
    pub fn task(&mut self) -> Option<&mut JoinHandle<()>> {
        self.task.as_mut()
    }
}

#[derive(Debug, PartialEq)]
enum ReadOutcome {
    /// Intentional shutdown observed mid-read
    Shutdown,
    /// Abnormal close or transport error
    ConnectionLost,
}

async fn run_connection(
    url: String,
    cfg: ReconnectConfig,
    events: mpsc::Sender<FeedEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
    mut shutdown: watch::Receiver<bool>,
    intentional: Arc<AtomicBool>,
) {
    let base = Duration::from_millis(cfg.base_delay_ms);
    let max = Duration::from_millis(cfg.max_delay_ms);
    let mut attempt: u32 = 0;

    loop {
        if shutdown_requested(&mut shutdown, &intentional) {
            let _ = state.send(ConnectionState::Disconnected);
            return;
        }

        let _ = state.send(ConnectionState::Connecting);
        debug!("Dialing feed endpoint {}", url);

        let dialed = tokio::select! {
            biased;
            _ = shutdown.changed() => None,
            res = connect_async(url.as_str()) => Some(res),
        };

        let ws = match dialed {
            None => {
                let _ = state.send(ConnectionState::Disconnected);
                return;
            }
            Some(Ok((ws, _response))) => ws,
            Some(Err(e)) => {
                let err = SimError::Connection(format!("connect failed: {}", e));
                let _ = events.send(FeedEvent::Error(err.to_string())).await;
                if wait_for_retry(&mut attempt, &cfg, base, max, &state, &events, &mut shutdown, &intentional).await {
                    continue;
                }
                return;
            }
        };

        attempt = 0;
        let _ = state.send(ConnectionState::Connected);
        let _ = events.send(FeedEvent::Connected).await;
        info!("✅ Connected to order-book feed");

        let outcome = read_frames(ws, &events, &mut shutdown).await;

        if outcome == ReadOutcome::Shutdown || intentional.load(Ordering::SeqCst) {
            let _ = state.send(ConnectionState::Disconnected);
            return;
        }

        // Abnormal closure: status drops right away, then the retry policy runs
        if !wait_for_retry(&mut attempt, &cfg, base, max, &state, &events, &mut shutdown, &intentional).await {
            return;
        }
    }
}

/// Apply the backoff policy before the next dial. Returns false when the
/// loop must stop; the terminal state has been published in that case.
#[allow(clippy::too_many_arguments)]
async fn wait_for_retry(
    attempt: &mut u32,
    cfg: &ReconnectConfig,
    base: Duration,
    max: Duration,
    state: &watch::Sender<ConnectionState>,
    events: &mpsc::Sender<FeedEvent>,
    shutdown: &mut watch::Receiver<bool>,
    intentional: &Arc<AtomicBool>,
) -> bool {
    if shutdown_requested(shutdown, intentional) {
        let _ = state.send(ConnectionState::Disconnected);
        return false;
    }

    *attempt += 1;
    if *attempt > cfg.max_attempts {
        let err = SimError::ReconnectExhausted {
            attempts: cfg.max_attempts,
        };
        warn!("{}", err);
        let _ = state.send(ConnectionState::Failed);
        let _ = events.send(FeedEvent::Error(err.to_string())).await;
        return false;
    }

    let delay = backoff_delay(*attempt, base, max);
    let _ = state.send(ConnectionState::Reconnecting);
    info!(
        "Reconnecting in {:?} (attempt {}/{})",
        delay, attempt, cfg.max_attempts
    );

    tokio::select! {
        biased;
        _ = shutdown.changed() => {
            let _ = state.send(ConnectionState::Disconnected);
            false
        }
        _ = sleep(delay) => true,
    }
}

async fn read_frames(
    mut ws: WsStream,
    events: &mpsc::Sender<FeedEvent>,
    shutdown: &mut watch::Receiver<bool>,
) -> ReadOutcome {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                let _ = ws.close(None).await;
                return ReadOutcome::Shutdown;
            }
            msg = ws.next() => match msg {
                Some(Ok(Message::Text(text))) => match codec::decode_frame(&text) {
                    Ok(snapshot) => {
                        let _ = events.send(FeedEvent::Snapshot(snapshot)).await;
                    }
                    Err(e) => {
                        // Parse failures never drop the connection
                        warn!("Dropping malformed frame: {}", e);
                        let _ = events.send(FeedEvent::Error(e.to_string())).await;
                    }
                },
                Some(Ok(Message::Ping(payload))) => {
                    let _ = ws.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(f) => (Some(u16::from(f.code)), f.reason.to_string()),
                        None => (None, String::new()),
                    };
                    let _ = events.send(FeedEvent::Closed { code, reason }).await;
                    return ReadOutcome::ConnectionLost;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events
                        .send(FeedEvent::Error(format!("transport error: {}", e)))
                        .await;
                    return ReadOutcome::ConnectionLost;
                }
                None => {
                    let _ = events
                        .send(FeedEvent::Closed {
                            code: None,
                            reason: "stream ended".to_string(),
                        })
                        .await;
                    return ReadOutcome::ConnectionLost;
                }
            }
        }
    }
}

fn shutdown_requested(shutdown: &mut watch::Receiver<bool>, intentional: &Arc<AtomicBool>) -> bool {
    *shutdown.borrow_and_update() || intentional.load(Ordering::SeqCst)
}
