//! Room store and per-room actors
//!
//! The store is the only process-wide mutable structure: a read-mostly map
//! from room id to channel handles, guarded by one coarse mutex that is
//! touched only at join/lookup/teardown. Each room's state lives inside its
//! actor task (`actor::RoomActor`) and is never shared.

pub mod actor;
pub mod hooks;
pub mod state;

pub use actor::{Flow, RoomCommand};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::agent::AgentModels;
use crate::game::GameError;
use crate::gateway::messages::Outbound;
use crate::types::{GameMode, Role, SessionId};

/// Capacity of a room's command queue. Commands are small and the actor
/// drains quickly; backpressure here only ever bites a runaway client.
const COMMAND_QUEUE_DEPTH: usize = 256;

/// Capacity of a room's broadcast ring. Slow consumers observe a lag error
/// and resynchronize rather than stalling the room.
const BROADCAST_QUEUE_DEPTH: usize = 1024;

/// Channel endpoints for one live room.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    pub commands: mpsc::Sender<RoomCommand>,
    pub events: broadcast::Sender<Outbound>,
    /// Cancelling this stops the room's actor at its next suspension point.
    pub cancel: CancellationToken,
}

/// Process-wide mapping of room id to live room.
pub struct RoomStore {
    rooms: Mutex<HashMap<String, RoomHandle>>,
    log_dir: PathBuf,
    models: AgentModels,
}

impl RoomStore {
    pub fn new(log_dir: impl Into<PathBuf>, models: AgentModels) -> Arc<Self> {
        Arc::new(Self {
            rooms: Mutex::new(HashMap::new()),
            log_dir: log_dir.into(),
            models,
        })
    }

    /// Join a room, creating it on the first join for that id. Returns the
    /// command sender and a broadcast receiver already subscribed, so no
    /// message emitted by the join itself can be missed.
    pub async fn join(
        self: &Arc<Self>,
        room_id: &str,
        session: SessionId,
        username: &str,
        role: Role,
        mode: GameMode,
    ) -> Result<(RoomHandle, broadcast::Receiver<Outbound>), GameError> {
        let handle = self.ensure_room(room_id)?;
        let events = handle.events.subscribe();

        let (reply_tx, reply_rx) = oneshot::channel();
        let command = RoomCommand::Join {
            session,
            username: username.to_string(),
            role,
            mode,
            reply: reply_tx,
        };
        if handle.commands.send(command).await.is_err() {
            // The actor raced to shutdown; treat as a fresh room next try.
            return Err(GameError::RoomFull);
        }
        match reply_rx.await {
            Ok(Ok(())) => Ok((handle, events)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(GameError::RoomFull),
        }
    }

    /// Look up a live room without joining (TTS delivery path).
    pub fn get(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms
            .lock()
            .ok()
            .and_then(|rooms| rooms.get(room_id).cloned())
    }

    /// Remove a room from the map. Called by the room actor as it exits.
    pub fn remove(&self, room_id: &str) {
        if let Ok(mut rooms) = self.rooms.lock() {
            rooms.remove(room_id);
        }
        tracing::info!(room = %room_id, "room removed from store");
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Cancel every live room. Used on server shutdown; each actor stops at
    /// its next suspension point and removes itself from the map.
    pub fn shutdown_all(&self) {
        let Ok(rooms) = self.rooms.lock() else {
            return;
        };
        for (room_id, handle) in rooms.iter() {
            tracing::info!(room = %room_id, "cancelling room for shutdown");
            handle.cancel.cancel();
        }
    }

    fn ensure_room(self: &Arc<Self>, room_id: &str) -> Result<RoomHandle, GameError> {
        let mut rooms = self
            .rooms
            .lock()
            .map_err(|_| GameError::LogWrite("room store poisoned".to_string()))?;
        if let Some(handle) = rooms.get(room_id) {
            return Ok(handle.clone());
        }

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (events_tx, _) = broadcast::channel(BROADCAST_QUEUE_DEPTH);
        let cancel = CancellationToken::new();

        let logger = crate::logger::SessionLogger::create(&self.log_dir, room_id)
            .map_err(|e| GameError::LogWrite(e.to_string()))?;

        let room_actor = actor::RoomActor::new(
            room_id,
            commands_rx,
            commands_tx.clone(),
            events_tx.clone(),
            cancel.clone(),
            logger,
            self.models.clone(),
            Arc::clone(self),
        );
        tokio::spawn(room_actor.run());

        let handle = RoomHandle {
            commands: commands_tx,
            events: events_tx,
            cancel,
        };
        rooms.insert(room_id.to_string(), handle.clone());
        tracing::info!(room = %room_id, "room created");
        Ok(handle)
    }
}
