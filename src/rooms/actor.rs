//! The per-room actor task
//!
//! One task owns one `RoomState` and processes commands from a single mpsc
//! queue, with the Phase-2 simulation tick multiplexed into the same
//! `tokio::select!` loop. Queue order is processing order; nothing else can
//! observe intermediate state, which is the whole concurrency story for a
//! room: no locks, atomic decision-queue promotion, write-once detections.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::hooks::AgentHooks;
use super::state::{RoomState, SeatedUser, StateSnapshot, ROOM_CAPACITY};
use super::RoomStore;
use crate::agent::{self, AgentModels, AgentSeat};
use crate::game::{self, GameError, RoomCtx};
use crate::gateway::messages::{rejection_details, ServerMessage};
use crate::logger::SessionLogger;
use crate::sim;
use crate::types::{Actor, GameMode, Phase, PlayerRequest, Role, SessionId};

/// Commands accepted by a room actor.
pub enum RoomCommand {
    Join {
        session: SessionId,
        username: String,
        role: Role,
        mode: GameMode,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    Leave {
        session: SessionId,
    },
    /// A game action from a human connection or an AI agent - identical shape.
    Request {
        actor: Actor,
        request: PlayerRequest,
    },
    /// Consistent read-only projection for the AI observer.
    Snapshot {
        reply: oneshot::Sender<StateSnapshot>,
    },
}

/// Loop control for the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

pub struct RoomActor {
    state: RoomState,
    commands: mpsc::Receiver<RoomCommand>,
    /// Handed to AI agents so their actions enter the same queue as clients.
    self_tx: mpsc::Sender<RoomCommand>,
    outbound: broadcast::Sender<crate::gateway::messages::Outbound>,
    /// External stop signal (server shutdown); observed between dispatches.
    cancel: CancellationToken,
    logger: SessionLogger,
    hooks: AgentHooks,
    models: AgentModels,
    store: Arc<RoomStore>,
}

impl RoomActor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        room_id: &str,
        commands: mpsc::Receiver<RoomCommand>,
        self_tx: mpsc::Sender<RoomCommand>,
        outbound: broadcast::Sender<crate::gateway::messages::Outbound>,
        cancel: CancellationToken,
        logger: SessionLogger,
        models: AgentModels,
        store: Arc<RoomStore>,
    ) -> Self {
        Self {
            state: RoomState::new(room_id),
            commands,
            self_tx,
            outbound,
            cancel,
            logger,
            hooks: AgentHooks::new(),
            models,
            store,
        }
    }

    /// Single-dispatch loop: one command or one sim tick at a time.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(Duration::from_millis(sim::TICK_INTERVAL_MS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let sim_active = self.sim_active();
            let flow = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(room = %self.state.id, "room cancelled");
                    Flow::Shutdown
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => Flow::Shutdown,
                },
                _ = ticker.tick(), if sim_active => self.handle_tick(),
            };
            if flow == Flow::Shutdown {
                break;
            }
        }

        // Signal any remaining observers, then leave the map.
        self.cancel.cancel();
        self.store.remove(&self.state.id);
        info!(room = %self.state.id, "room actor stopped");
    }

    fn sim_active(&self) -> bool {
        self.state.phase2.as_ref().is_some_and(|p| !p.finished)
    }

    fn handle_tick(&mut self) -> Flow {
        let t = match self.state.phase2.as_ref() {
            Some(p) => p.sim_start.elapsed().as_secs_f64(),
            None => return Flow::Continue,
        };
        let mut ctx = RoomCtx {
            outbound: &self.outbound,
            logger: &mut self.logger,
            hooks: &self.hooks,
        };
        match sim::tick(&mut self.state, &mut ctx, t, &mut rand::thread_rng()) {
            Ok(()) => Flow::Continue,
            Err(e) => self.abort_room(&e),
        }
    }

    fn handle_command(&mut self, command: RoomCommand) -> Flow {
        match command {
            RoomCommand::Join {
                session,
                username,
                role,
                mode,
                reply,
            } => {
                let result = self.handle_join(session, &username, role, mode);
                let fatal = match &result {
                    Err(e) if e.is_fatal() => Some(e.to_string()),
                    _ => None,
                };
                let _ = reply.send(result);
                match fatal {
                    Some(msg) => self.abort_room(&GameError::LogWrite(msg)),
                    None => Flow::Continue,
                }
            }
            RoomCommand::Leave { session } => self.handle_leave(session),
            RoomCommand::Request { actor, request } => self.handle_request(&actor, &request),
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(StateSnapshot::of(&self.state));
                Flow::Continue
            }
        }
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    fn handle_join(
        &mut self,
        session: SessionId,
        username: &str,
        role: Role,
        mode: GameMode,
    ) -> Result<(), GameError> {
        if self.state.users.len() >= ROOM_CAPACITY {
            return Err(GameError::RoomFull);
        }
        if self.state.role_taken(role) {
            return Err(GameError::SeatTaken(role));
        }
        if self.state.users.is_empty() {
            self.state.mode = mode;
        }

        self.state.users.insert(
            session,
            SeatedUser {
                name: username.to_string(),
                role,
                is_ai: false,
            },
        );
        info!(room = %self.state.id, user = %username, role = %role, "user joined");

        let mut ctx = RoomCtx {
            outbound: &self.outbound,
            logger: &mut self.logger,
            hooks: &self.hooks,
        };
        ctx.log_system(
            &self.state,
            "user_joined",
            json!({ "username": username, "role": role.as_str(), "mode": self.state.mode }),
        )?;
        ctx.emit_room(ServerMessage::UserCountUpdate {
            count: self.state.users.len(),
            usernames: self.state.usernames(),
        });

        if self.state.mode == GameMode::SinglePlayer {
            self.seat_ai_partner(role.peer())?;
        }

        if self.state.users.len() == ROOM_CAPACITY && self.state.phase == Phase::Waiting {
            let mut ctx = RoomCtx {
                outbound: &self.outbound,
                logger: &mut self.logger,
                hooks: &self.hooks,
            };
            game::start_phase1(&mut self.state, &mut ctx)?;
        }
        Ok(())
    }

    /// Seat the AI in the free role and spawn its agent task. The agent's
    /// actions come back through `self_tx`, through the same queue as every
    /// client message.
    fn seat_ai_partner(&mut self, ai_role: Role) -> Result<(), GameError> {
        if self.state.role_taken(ai_role) || self.state.users.len() >= ROOM_CAPACITY {
            return Ok(());
        }

        let hook_rx = self.hooks.register(ai_role);
        let seat_handle = SessionId::new_v4();
        self.state.users.insert(
            seat_handle,
            SeatedUser {
                name: format!("AI {}", ai_role),
                role: ai_role,
                is_ai: true,
            },
        );

        tokio::spawn(agent::run(AgentSeat {
            room: self.state.id.clone(),
            role: ai_role,
            commands: self.self_tx.clone(),
            hooks: hook_rx,
            models: self.models.clone(),
        }));

        info!(room = %self.state.id, role = %ai_role, "AI partner seated");
        let mut ctx = RoomCtx {
            outbound: &self.outbound,
            logger: &mut self.logger,
            hooks: &self.hooks,
        };
        ctx.log_system(
            &self.state,
            "ai_seated",
            json!({ "role": ai_role.as_str() }),
        )?;
        ctx.emit_room(ServerMessage::UserCountUpdate {
            count: self.state.users.len(),
            usernames: self.state.usernames(),
        });
        Ok(())
    }

    fn handle_leave(&mut self, session: SessionId) -> Flow {
        let Some(user) = self.state.users.remove(&session) else {
            return Flow::Continue;
        };
        self.state.ready_for_next.remove(&session);
        info!(room = %self.state.id, user = %user.name, "user left");

        let mut ctx = RoomCtx {
            outbound: &self.outbound,
            logger: &mut self.logger,
            hooks: &self.hooks,
        };
        if let Err(e) = ctx.log_system(
            &self.state,
            "user_left",
            json!({ "username": user.name, "role": user.role.as_str() }),
        ) {
            return self.abort_room(&e);
        }
        ctx.emit_room(ServerMessage::UserLeft {
            username: user.name,
            role: user.role,
            remaining_count: self.state.users.len(),
        });

        // The AI alone does not keep a room alive.
        if self.state.human_count() == 0 {
            info!(room = %self.state.id, "last human left, tearing down");
            return Flow::Shutdown;
        }
        Flow::Continue
    }

    // ------------------------------------------------------------------
    // Game requests
    // ------------------------------------------------------------------

    fn handle_request(&mut self, actor: &Actor, request: &PlayerRequest) -> Flow {
        let mut ctx = RoomCtx {
            outbound: &self.outbound,
            logger: &mut self.logger,
            hooks: &self.hooks,
        };
        match game::dispatch(&mut self.state, &mut ctx, actor, request) {
            Ok(()) => Flow::Continue,
            Err(e) if e.is_fatal() => self.abort_room(&e),
            Err(e) => {
                debug!(
                    room = %self.state.id,
                    actor = %actor.name,
                    action = request.action_name(),
                    error = %e,
                    "request rejected"
                );
                if let Some(session) = actor.session {
                    ctx.emit_session(session, ServerMessage::ErrorMsg { msg: e.to_string() });
                }
                // Best effort: record the rejected attempt. If even that
                // write fails the room is aborted.
                if ctx
                    .log_system(
                        &self.state,
                        "rejected_action",
                        rejection_details(request.action_name(), &e.to_string()),
                    )
                    .is_err()
                {
                    return self.abort_room(&e);
                }
                Flow::Continue
            }
        }
    }

    // ------------------------------------------------------------------
    // Fatal teardown
    // ------------------------------------------------------------------

    fn abort_room(&mut self, error: &GameError) -> Flow {
        warn!(room = %self.state.id, error = %error, "aborting room on fatal error");
        let _ = self
            .outbound
            .send(crate::gateway::messages::Outbound::room(ServerMessage::SysMsg {
                msg: "Session aborted: the server can no longer record this room.".to_string(),
            }));
        Flow::Shutdown
    }
}
