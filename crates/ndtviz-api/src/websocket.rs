//! Push-channel feed with auto-reconnect.
//!
//! Connects to the backend's event socket and streams parsed
//! [`FeedMessage`]s through a [`tokio::sync::broadcast`] channel. Outbound
//! [`ControlIntent`]s are queued on an mpsc channel and written on the live
//! connection. Reconnection uses exponential backoff + jitter; subscribers
//! keep their receivers across reconnects.
//!
//! # Example
//!
//! ```rust,ignore
//! use ndtviz_api::websocket::{FeedHandle, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let cancel = CancellationToken::new();
//! let url = Url::parse("ws://localhost:5000/socket")?;
//!
//! let handle = FeedHandle::connect(url, ReconnectConfig::default(), cancel.clone());
//! let mut rx = handle.subscribe();
//!
//! while let Ok(msg) = rx.recv().await {
//!     println!("{}", msg.event_name());
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::wire::{ControlIntent, FeedMessage};

// ── Channel capacities ───────────────────────────────────────────────

const MESSAGE_CHANNEL_CAPACITY: usize = 1024;
const INTENT_CHANNEL_CAPACITY: usize = 64;

// ── FeedStatus ───────────────────────────────────────────────────────

/// Link state of the push channel, observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Closed,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── FeedHandle ───────────────────────────────────────────────────────

/// Handle to a running feed task.
///
/// Call [`shutdown`](Self::shutdown) (or cancel the token passed to
/// [`connect`](Self::connect)) to tear down the background task.
pub struct FeedHandle {
    msg_rx: broadcast::Receiver<Arc<FeedMessage>>,
    intent_tx: mpsc::Sender<ControlIntent>,
    status_rx: watch::Receiver<FeedStatus>,
    cancel: CancellationToken,
}

impl FeedHandle {
    /// Spawn the reconnection loop for `url`.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background. Must be called inside a tokio runtime.
    pub fn connect(url: Url, reconnect: ReconnectConfig, cancel: CancellationToken) -> Self {
        let (msg_tx, msg_rx) = broadcast::channel(MESSAGE_CHANNEL_CAPACITY);
        let (intent_tx, intent_rx) = mpsc::channel(INTENT_CHANNEL_CAPACITY);
        let (status_tx, status_rx) = watch::channel(FeedStatus::Connecting);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            feed_loop(url, msg_tx, intent_rx, status_tx, reconnect, task_cancel).await;
        });

        Self {
            msg_rx,
            intent_tx,
            status_rx,
            cancel,
        }
    }

    /// Get a new broadcast receiver for the message stream.
    ///
    /// Multiple consumers can subscribe concurrently. If a consumer falls
    /// behind, it receives [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<FeedMessage>> {
        self.msg_rx.resubscribe()
    }

    /// Queue a control intent for the backend.
    ///
    /// Intents queued while disconnected are written once the link is back.
    pub fn send(&self, intent: ControlIntent) -> Result<(), Error> {
        self.intent_tx.try_send(intent).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::WebSocketConnect(
                "intent queue full, backend not draining".into(),
            ),
            mpsc::error::TrySendError::Closed(_) => Error::FeedClosed,
        })
    }

    /// Observe link state changes.
    pub fn status(&self) -> watch::Receiver<FeedStatus> {
        self.status_rx.clone()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn feed_loop(
    url: Url,
    msg_tx: broadcast::Sender<Arc<FeedMessage>>,
    mut intent_rx: mpsc::Receiver<ControlIntent>,
    status_tx: watch::Sender<FeedStatus>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&url, &msg_tx, &mut intent_rx, &status_tx, &cancel) => {
                match result {
                    // Clean disconnect (server close frame or stream ended).
                    Ok(()) => {
                        if cancel.is_cancelled() {
                            break;
                        }
                        tracing::info!("feed disconnected cleanly, reconnecting");
                        attempt = 0;
                        let _ = status_tx.send(FeedStatus::Reconnecting { attempt });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "feed error");

                        if reconnect.max_retries.is_some_and(|max| attempt >= max) {
                            tracing::error!(
                                max_retries = reconnect.max_retries,
                                "feed reconnection limit reached, giving up"
                            );
                            break;
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        let _ = status_tx.send(FeedStatus::Reconnecting { attempt });
                        tracing::info!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt,
                            "waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt = attempt.saturating_add(1);
                    }
                }
            }
        }
    }

    // Close the intent queue before announcing Closed so senders observe it.
    drop(intent_rx);
    let _ = status_tx.send(FeedStatus::Closed);
    tracing::debug!("feed loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish a single connection and pump frames until it drops.
async fn connect_and_read(
    url: &Url,
    msg_tx: &broadcast::Sender<Arc<FeedMessage>>,
    intent_rx: &mut mpsc::Receiver<ControlIntent>,
    status_tx: &watch::Sender<FeedStatus>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting to feed");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("feed connected");
    let _ = status_tx.send(FeedStatus::Connected);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                return Ok(());
            }
            Some(intent) = intent_rx.recv() => {
                let frame = intent.to_frame()?;
                tracing::debug!(%frame, "sending control intent");
                write
                    .send(tungstenite::Message::Text(frame.into()))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        parse_and_broadcast(&text, msg_tx);
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite queues the pong; flushed on next write
                        tracing::trace!("feed ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason, "feed close frame received");
                            if cf.code != tungstenite::protocol::frame::coding::CloseCode::Normal {
                                return Err(Error::WebSocketClosed {
                                    code: cf.code.into(),
                                    reason: cf.reason.to_string(),
                                });
                            }
                        } else {
                            tracing::info!("feed close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("feed stream ended");
                        return Ok(());
                    }
                    Some(Ok(_)) => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Parse one text frame and broadcast it. Malformed frames are logged
/// and dropped; nothing is retried.
fn parse_and_broadcast(text: &str, msg_tx: &broadcast::Sender<Arc<FeedMessage>>) {
    match FeedMessage::parse(text) {
        Ok(Some(msg)) => {
            tracing::trace!(event = msg.event_name(), "feed message");
            // No active subscribers is fine
            let _ = msg_tx.send(Arc::new(msg));
        }
        Ok(None) => tracing::debug!("ignoring unknown feed event"),
        Err(e) => tracing::warn!(error = %e, "dropping malformed feed message"),
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exp = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exp);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        // With jitter factor up to 1.25, max effective is 12.5s
        let d10 = calculate_backoff(10, &config);
        assert!(d10 <= Duration::from_secs(13), "got {d10:?}");

        let huge = calculate_backoff(u32::MAX, &config);
        assert!(huge <= Duration::from_secs(13), "got {huge:?}");
    }

    #[test]
    fn parse_and_broadcast_known_event() {
        let (tx, mut rx) = broadcast::channel(16);

        let raw = json!({ "event": "available_timestamps", "data": { "values": [1, 2] } });
        parse_and_broadcast(&raw.to_string(), &tx);

        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.event_name(), "available_timestamps");
    }

    #[test]
    fn parse_and_broadcast_drops_unknown_and_malformed() {
        let (tx, mut rx) = broadcast::channel::<Arc<FeedMessage>>(16);

        parse_and_broadcast("not json at all", &tx);
        parse_and_broadcast(r#"{"event":"heartbeat","data":{}}"#, &tx);
        parse_and_broadcast(r#"{"event":"available_timestamps","data":{"values":"x"}}"#, &tx);

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_after_shutdown_reports_closed() {
        let cancel = CancellationToken::new();
        // Nothing listens on port 9 locally; the loop just backs off.
        let url = Url::parse("ws://127.0.0.1:9/socket").unwrap();
        let handle = FeedHandle::connect(
            url,
            ReconnectConfig {
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(20),
                max_retries: Some(0),
            },
            cancel,
        );

        let mut status = handle.status();
        tokio::time::timeout(Duration::from_secs(5), async {
            while *status.borrow_and_update() != FeedStatus::Closed {
                if status.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .unwrap();

        let err = handle
            .send(ControlIntent::Seek { timestamp: 1 })
            .unwrap_err();
        assert!(matches!(err, Error::FeedClosed), "got {err:?}");
    }
}
