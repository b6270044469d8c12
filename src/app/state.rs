//! Application state shared across routes

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::game::{GameMap, GameMaster, GameObjects, COMMAND_QUEUE_CAPACITY};
use crate::ws::hub::{Hub, HubHandle};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: HubHandle,
    pub player_count: Arc<AtomicUsize>,
}

impl AppState {
    /// Wire up the core: hub, simulation, and tick driver. The returned `Hub`
    /// and `GameMaster` must each be spawned onto their own task.
    pub fn new(config: Config) -> (Self, Hub, GameMaster<GameObjects>) {
        let config = Arc::new(config);

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (hub, hub_handle) = Hub::new(cmd_tx, config.send_policy);

        let map = GameMap::generate(config.map_seed);
        let objects = GameObjects::new(map, config.map_seed);

        let player_count = Arc::new(AtomicUsize::new(0));
        let master = GameMaster::new(objects, cmd_rx, hub_handle.clone(), player_count.clone());

        let state = Self {
            config,
            hub: hub_handle,
            player_count,
        };

        (state, hub, master)
    }
}
