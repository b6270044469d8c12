//! The tick driver: the simulation's single logical caller
//!
//! Once per fixed interval: drain queued commands in arrival order, advance
//! the simulation, build the immutable snapshot, hand it to the hub. Commands
//! arriving after a drain begins wait for the next tick.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::util::time::{tick_delta, unix_millis, TICK_DURATION_MICROS};
use crate::ws::hub::HubHandle;
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::object_manager::ObjectManager;
use super::player::PLAYER_SPEED;
use super::snapshot::{build_snapshot, encode};
use super::GameCommand;

/// The authoritative tick loop
pub struct GameMaster<M: ObjectManager> {
    objects: M,
    cmd_rx: mpsc::Receiver<GameCommand>,
    hub: HubHandle,
    tick: u64,
    player_count: Arc<AtomicUsize>,
}

impl<M: ObjectManager> GameMaster<M> {
    pub fn new(
        objects: M,
        cmd_rx: mpsc::Receiver<GameCommand>,
        hub: HubHandle,
        player_count: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            objects,
            cmd_rx,
            hub,
            tick: 0,
            player_count,
        }
    }

    /// Run the fixed-interval loop until the hub goes away
    pub async fn run(mut self) {
        info!("game master started");

        let mut tick_interval = interval(Duration::from_micros(TICK_DURATION_MICROS));
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;
            if !self.step().await {
                break;
            }
        }

        info!("game master stopped");
    }

    /// Advance one full tick: drain, update, snapshot, broadcast.
    /// Returns false once the hub is gone and the loop should stop.
    pub async fn step(&mut self) -> bool {
        self.drain_commands().await;

        self.objects.update();
        self.tick += 1;

        let players = self.objects.get_players();
        let shoots = self.objects.get_shoots();
        self.player_count.store(players.len(), Ordering::Relaxed);

        let snapshot = build_snapshot(self.tick, &players, &shoots);
        match encode(&snapshot) {
            Ok(payload) => self.hub.broadcast(payload).await.is_ok(),
            Err(e) => {
                warn!(error = %e, "failed to encode snapshot");
                true
            }
        }
    }

    /// Apply every command accumulated since the last tick, in arrival order
    async fn drain_commands(&mut self) {
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            self.apply(cmd).await;
        }
    }

    async fn apply(&mut self, cmd: GameCommand) {
        match cmd {
            GameCommand::Frame { client_id, payload } => {
                match serde_json::from_slice::<ClientMsg>(&payload) {
                    Ok(msg) => self.apply_client_msg(client_id, msg).await,
                    // A bad frame is local to its command; the tick goes on.
                    Err(e) => warn!(client_id, error = %e, "unparseable client frame"),
                }
            }
            GameCommand::RemoveClient { client_id } => {
                if let Some(player) = self.objects.get_player_by_client_id(client_id) {
                    self.objects.remove_player_by_client_id(client_id);
                    self.announce_left(player.id).await;
                }
            }
        }
    }

    async fn apply_client_msg(&mut self, client_id: i32, msg: ClientMsg) {
        match msg {
            ClientMsg::Join { name } => {
                let player = self.objects.register_player(client_id, &name);
                let init = ServerMsg::Init {
                    player_id: player.id,
                    map: self.objects.get_map().info(),
                };
                match encode(&init) {
                    Ok(payload) => {
                        let _ = self.hub.unicast(client_id, payload).await;
                    }
                    Err(e) => warn!(client_id, error = %e, "failed to encode init"),
                }
            }

            ClientMsg::Move { dx, dy } => {
                if let Some(player) = self.objects.get_player_by_client_id(client_id) {
                    self.objects
                        .move_player(player.id, dx, dy, PLAYER_SPEED, tick_delta());
                } else {
                    debug!(client_id, "move for client without player");
                }
            }

            ClientMsg::Shoot { x, y, dx, dy } => {
                if let Some(player) = self.objects.get_player_by_client_id(client_id) {
                    if self
                        .objects
                        .register_shoot(player.id, x, y, dx, dy, unix_millis())
                        .is_none()
                    {
                        debug!(client_id, "shoot rejected");
                    }
                } else {
                    debug!(client_id, "shoot for client without player");
                }
            }
        }
    }

    async fn announce_left(&self, player_id: i32) {
        match encode(&ServerMsg::PlayerLeft { player_id }) {
            Ok(payload) => {
                let _ = self.hub.broadcast(payload).await;
            }
            Err(e) => warn!(player_id, error = %e, "failed to encode player-left"),
        }
    }
}
