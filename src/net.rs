use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::Message;

use pursuit_server::SimWorld;

use crate::state::{ServerMessage, SharedGameState};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Input {
        #[serde(default)]
        steer: f32,
        #[serde(default)]
        throttle: f32,
    },
    Recover,
    Ping,
}

pub async fn start_websocket_server(
    listener: TcpListener,
    state: Arc<Mutex<SharedGameState>>,
    world: Arc<Mutex<SimWorld>>,
) {
    match listener.local_addr() {
        Ok(addr) => info!(%addr, "websocket listening"),
        Err(err) => warn!(%err, "websocket listening on unknown address"),
    }

    loop {
        let (raw, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(%err, "accept failed");
                continue;
            }
        };
        tokio::spawn(handle_client(raw, peer, Arc::clone(&state), Arc::clone(&world)));
    }
}

async fn handle_client(
    raw: TcpStream,
    peer: SocketAddr,
    state: Arc<Mutex<SharedGameState>>,
    world: Arc<Mutex<SimWorld>>,
) {
    let ws = match accept_async(raw).await {
        Ok(ws) => ws,
        Err(err) => {
            warn!(%peer, %err, "websocket handshake failed");
            return;
        }
    };
    let (mut write, mut read) = ws.split();

    // outgoing channel, drained by its own task
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    let (client_id, player, tick, clients) = {
        let mut game = state.lock().await;
        let id = game.register_client(tx.clone());
        (id, game.player, game.tick, game.client_count())
    };
    info!(client = %client_id, %peer, clients, "client connected");

    if let Some(welcome) = (ServerMessage::Welcome { client_id, player, tick }).encode() {
        let _ = tx.send(welcome);
    }

    while let Some(msg) = read.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(err) => {
                debug!(client = %client_id, %err, "websocket read failed");
                break;
            }
        };
        let Message::Text(text) = msg else { continue };

        let parsed: ClientMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(err) => {
                debug!(client = %client_id, %err, "ignoring malformed message");
                continue;
            }
        };

        match parsed {
            ClientMessage::Ping => {
                if let Some(pong) = ServerMessage::Pong.encode() {
                    let _ = tx.send(pong);
                }
            }
            ClientMessage::Input { steer, throttle } => {
                if let Err(err) = world.lock().await.set_input(player, steer, throttle) {
                    warn!(client = %client_id, %err, "input rejected");
                }
            }
            ClientMessage::Recover => match world.lock().await.recover_vehicle(player) {
                Ok(true) => info!(client = %client_id, vehicle = %player, "recover requested"),
                Ok(false) => debug!(client = %client_id, "recover ignored, vehicle upright or moving"),
                Err(err) => warn!(client = %client_id, %err, "recover failed"),
            },
        }
    }

    state.lock().await.remove_client(client_id);
    send_task.abort();
    info!(client = %client_id, "client disconnected");
}
