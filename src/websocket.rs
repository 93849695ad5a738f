use crate::error::{AppError, AppResult};
use crate::models::AccountSummary;
use crate::services::GroupService;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(50);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(2);

/// Pause before retrying `accept` after `failures` consecutive errors
fn accept_backoff(failures: u32) -> Duration {
    let factor = 1u32 << failures.saturating_sub(1).min(10);
    (ACCEPT_BACKOFF_BASE * factor).min(ACCEPT_BACKOFF_MAX)
}

/// Frames a client may send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "get_group_rank")]
    GetGroupRank { group_id: Uuid },
}

/// Frames the server sends back
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "group_rank")]
    GroupRank {
        group_id: Uuid,
        ranking: Vec<AccountSummary>,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Registry of connected clients, owned by the socket server
#[derive(Clone, Default)]
pub struct ConnectionManager {
    clients: Arc<RwLock<HashMap<Uuid, SocketAddr>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly connected client and return its id
    pub async fn add(&self, addr: SocketAddr) -> Uuid {
        let client_id = Uuid::new_v4();
        self.clients.write().await.insert(client_id, addr);
        client_id
    }

    pub async fn remove(&self, client_id: Uuid) -> bool {
        self.clients.write().await.remove(&client_id).is_some()
    }

    pub async fn count(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn contains(&self, client_id: Uuid) -> bool {
        self.clients.read().await.contains_key(&client_id)
    }
}

/// One-shot ranking requests over WebSocket
#[derive(Clone)]
pub struct RankingSocketServer {
    groups: Arc<GroupService>,
    connections: ConnectionManager,
}

impl RankingSocketServer {
    pub fn new(groups: Arc<GroupService>) -> Self {
        Self {
            groups,
            connections: ConnectionManager::new(),
        }
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Accept connections forever, backing off while `accept` keeps failing
    pub async fn serve(self, listener: TcpListener) {
        let mut failures: u32 = 0;
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    failures = 0;
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream, addr).await {
                            error!("WebSocket connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let pause = accept_backoff(failures);
                    error!("WebSocket accept error: {} (retrying in {:?})", e, pause);
                    tokio::time::sleep(pause).await;
                }
            }
        }
    }

    /// Serve one client until it disconnects
    pub async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) -> AppResult<()> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| AppError::Message(format!("WebSocket handshake failed: {}", e)))?;

        let client_id = self.connections.add(addr).await;
        info!(
            "WebSocket client {} connected from {} ({} connected)",
            client_id,
            addr,
            self.connections.count().await
        );

        let (mut sender, mut receiver) = ws_stream.split();

        while let Some(msg) = receiver.next().await {
            let reply = match msg {
                Ok(Message::Text(text)) => self.handle_text(&text).await,
                Ok(Message::Close(_)) => break,
                Ok(Message::Ping(payload)) => {
                    if let Err(e) = sender.send(Message::Pong(payload)).await {
                        warn!("Failed to answer ping from {}: {}", client_id, e);
                        break;
                    }
                    continue;
                }
                Ok(_) => continue,
                Err(e) => {
                    error!("WebSocket error for client {}: {}", client_id, e);
                    break;
                }
            };

            let json = match serde_json::to_string(&reply) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(json)).await {
                error!("Failed to send message to client {}: {}", client_id, e);
                break;
            }
        }

        self.connections.remove(client_id).await;
        info!("WebSocket client {} disconnected", client_id);
        Ok(())
    }

    /// Turn one client frame into the reply frame
    pub async fn handle_text(&self, text: &str) -> ServerMessage {
        let request = match serde_json::from_str::<ClientMessage>(text) {
            Ok(request) => request,
            Err(e) => {
                warn!("Unparseable WebSocket frame: {}", e);
                return ServerMessage::Error {
                    message: "Invalid message format".to_string(),
                };
            }
        };

        match request {
            ClientMessage::GetGroupRank { group_id } => match self.groups.ranking(group_id).await {
                Ok(ranking) => ServerMessage::GroupRank { group_id, ranking },
                Err(e) => ServerMessage::Error {
                    message: e.public_message(),
                },
            },
        }
    }
}
