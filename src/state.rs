use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};
use uuid::Uuid;

use pursuit_server::SimEvent;
use pursuit_server::world::{VehicleId, WorldSnapshot};

/// Everything the server pushes down a websocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    Welcome { client_id: Uuid, player: VehicleId, tick: u64 },
    Pong,
    Snapshot(&'a WorldSnapshot),
    Event(&'a SimEvent),
}

impl ServerMessage<'_> {
    pub fn encode(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(err) => {
                warn!(%err, "failed to encode server message");
                None
            }
        }
    }
}

pub struct SharedGameState {
    pub tick: u64,
    /// The car every client drives and every pursuer chases.
    pub player: VehicleId,
    clients: HashMap<Uuid, UnboundedSender<String>>,
}

impl SharedGameState {
    pub fn new(player: VehicleId) -> Self {
        Self { tick: 0, player, clients: HashMap::new() }
    }

    pub fn register_client(&mut self, tx: UnboundedSender<String>) -> Uuid {
        let id = Uuid::new_v4();
        self.clients.insert(id, tx);
        id
    }

    pub fn remove_client(&mut self, id: Uuid) {
        self.clients.remove(&id);
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Sends `msg` to every client, forgetting the ones whose send task is gone.
    pub fn broadcast(&mut self, msg: &ServerMessage<'_>) {
        if self.clients.is_empty() {
            return;
        }
        let Some(json) = msg.encode() else { return };
        self.clients.retain(|id, tx| {
            let alive = tx.send(json.clone()).is_ok();
            if !alive {
                debug!(client = %id, "dropping closed client");
            }
            alive
        });
    }
}
