//! Owns the single logical realtime connection.
//!
//! One attempt at a time: the next attempt is only scheduled after the
//! previous one has closed, always after the same fixed delay. The manager
//! retries forever; transport failure is never surfaced as a terminal error.

use crate::dispatch;
use crate::state::SharedState;
use futures_util::{SinkExt, StreamExt};
use payops_core::ConnectionState;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};
use url::Url;

pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);
const PING_INTERVAL: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct ConnectionManager {
    url: Url,
    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(url: Url) -> (Self, watch::Receiver<ConnectionState>) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        (Self { url, state_tx }, state_rx)
    }

    pub async fn run(self, shared: SharedState) {
        loop {
            self.state_tx.send_replace(ConnectionState::Connecting);
            match connect_async(self.url.clone()).await {
                Ok((ws, _)) => {
                    self.state_tx.send_replace(ConnectionState::Open);
                    {
                        let mut state = shared.lock().await;
                        state.record_system("Connected to live agent stream");
                    }
                    info!(url = %self.url, "channel open");
                    read_until_closed(ws, &shared).await;
                    warn!("channel closed, reconnecting in {}s", RECONNECT_DELAY.as_secs());
                }
                Err(err) => {
                    warn!("connect failed: {err}");
                }
            }
            self.state_tx.send_replace(ConnectionState::Closed);
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }
}

/// Pumps one open socket: inbound frames go to the dispatcher in arrival
/// order, a keepalive ping goes out every 30 seconds.
async fn read_until_closed(mut ws: WsStream, shared: &SharedState) {
    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.tick().await; // the first tick fires immediately
    loop {
        tokio::select! {
            incoming = ws.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let mut state = shared.lock().await;
                        dispatch::apply_frame(&mut state, &text);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }
            _ = ping.tick() => {
                if ws.send(Message::Text("ping".to_string())).await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = ws.close(None).await;
}
