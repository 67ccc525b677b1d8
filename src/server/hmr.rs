//! Hot Module Replacement (HMR) transport

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use super::ServerState;
use crate::engine::BuildStats;

/// Messages pushed to the hot-reload client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum HmrMessage {
    /// Hot replacement is enabled
    Hot,

    /// Sources changed, a rebuild is running
    Invalid,

    /// Hash of the latest successful build
    Hash(String),

    /// Build finished cleanly
    Ok,

    /// Build failed
    Errors(Vec<String>),

    /// Build finished with warnings
    Warnings(Vec<String>),
}

/// Fan-out of build results to connected clients
#[derive(Debug)]
pub struct HmrHub {
    tx: broadcast::Sender<HmrMessage>,
    hot: bool,
    last: Mutex<Vec<HmrMessage>>,
}

impl HmrHub {
    pub fn new(hot: bool) -> Self {
        let (tx, _) = broadcast::channel(100);
        Self {
            tx,
            hot,
            last: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HmrMessage> {
        self.tx.subscribe()
    }

    /// Messages a newly connected client receives before live updates
    pub fn greeting(&self) -> Vec<HmrMessage> {
        let mut messages = Vec::new();
        if self.hot {
            messages.push(HmrMessage::Hot);
        }
        messages.extend(self.last.lock().iter().cloned());
        messages
    }

    pub fn invalidate(&self) {
        self.send(HmrMessage::Invalid);
    }

    /// Announce a finished build
    pub fn publish(&self, stats: &BuildStats) {
        let mut messages = Vec::new();
        if let Some(hash) = &stats.hash {
            messages.push(HmrMessage::Hash(hash.clone()));
        }
        if stats.warnings.is_empty() {
            messages.push(HmrMessage::Ok);
        } else {
            messages.push(HmrMessage::Warnings(stats.warnings.clone()));
        }
        self.replay(messages);
    }

    /// Announce a failed build
    pub fn fail(&self, errors: Vec<String>) {
        self.replay(vec![HmrMessage::Errors(errors)]);
    }

    fn replay(&self, messages: Vec<HmrMessage>) {
        *self.last.lock() = messages.clone();
        for message in messages {
            self.send(message);
        }
    }

    fn send(&self, message: HmrMessage) {
        // No receivers just means no browser is connected
        let _ = self.tx.send(message);
    }
}

/// Handle WebSocket upgrade for HMR
pub async fn hmr_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_hmr_socket(socket, state))
}

async fn handle_hmr_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe first so nothing published during the greeting is lost
    let mut hmr_rx = state.hub.subscribe();

    for message in state.hub.greeting() {
        if let Ok(json) = serde_json::to_string(&message) {
            if sender.send(Message::Text(json)).await.is_err() {
                return;
            }
        }
    }

    debug!("HMR client connected");

    let send_task = tokio::spawn(async move {
        loop {
            match hmr_rx.recv().await {
                Ok(message) => {
                    if let Ok(json) = serde_json::to_string(&message) {
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("HMR client lagged by {} messages", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                debug!("HMR client disconnected");
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    debug!("HMR connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format() {
        assert_eq!(serde_json::to_string(&HmrMessage::Ok).unwrap(), r#"{"type":"ok"}"#);
        assert_eq!(
            serde_json::to_string(&HmrMessage::Hash("abc".to_string())).unwrap(),
            r#"{"type":"hash","data":"abc"}"#
        );
        assert_eq!(
            serde_json::to_string(&HmrMessage::Errors(vec!["boom".to_string()])).unwrap(),
            r#"{"type":"errors","data":["boom"]}"#
        );
    }

    #[test]
    fn test_greeting_replays_last_build() {
        let hub = HmrHub::new(true);
        assert_eq!(hub.greeting(), vec![HmrMessage::Hot]);

        hub.publish(&BuildStats {
            hash: Some("f00".to_string()),
            ..BuildStats::default()
        });
        assert_eq!(
            hub.greeting(),
            vec![HmrMessage::Hot, HmrMessage::Hash("f00".to_string()), HmrMessage::Ok]
        );

        hub.fail(vec!["syntax error".to_string()]);
        assert_eq!(
            hub.greeting(),
            vec![HmrMessage::Hot, HmrMessage::Errors(vec!["syntax error".to_string()])]
        );
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let hub = HmrHub::new(false);
        let mut rx = hub.subscribe();

        hub.invalidate();
        hub.publish(&BuildStats {
            warnings: vec!["large bundle".to_string()],
            ..BuildStats::default()
        });

        assert_eq!(rx.recv().await.unwrap(), HmrMessage::Invalid);
        assert_eq!(
            rx.recv().await.unwrap(),
            HmrMessage::Warnings(vec!["large bundle".to_string()])
        );
        assert!(hub.greeting().iter().all(|m| *m != HmrMessage::Hot));
    }
}
