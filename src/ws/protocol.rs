//! WebSocket protocol message definitions
//! Default codec for client-server communication; the core itself treats
//! payloads as opaque bytes everywhere except the tick driver's decode step.

use serde::{Deserialize, Serialize};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Request to spawn a player
    Join {
        /// Display name
        name: String,
    },

    /// Movement input for the current tick
    Move {
        /// Direction X component (-1.0 to 1.0)
        dx: f32,
        /// Direction Y component (-1.0 to 1.0)
        dy: f32,
    },

    /// Fire a projectile
    Shoot {
        /// Muzzle position X
        x: f32,
        /// Muzzle position Y
        y: f32,
        /// Direction X component
        dx: f32,
        /// Direction Y component
        dy: f32,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once after a Join is processed
    Init {
        /// The id of the player created for this client
        player_id: i32,
        /// World description
        map: MapInfo,
    },

    /// Game state snapshot (sent every tick)
    Snapshot {
        /// Server tick number
        tick: u64,
        /// All player states
        players: Vec<PlayerSnapshot>,
        /// All live projectiles
        shoots: Vec<ShootSnapshot>,
    },

    /// A player was removed from the game
    PlayerLeft {
        player_id: i32,
    },
}

/// World description for the init message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapInfo {
    /// Grid width in cells
    pub cols: usize,
    /// Grid height in cells
    pub rows: usize,
    /// Cell edge length in world units
    pub cell_size: f32,
    /// Row-major wall flags
    pub walls: Vec<Vec<bool>>,
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: i32,
    pub name: String,
    /// Position X
    pub x: f32,
    /// Position Y
    pub y: f32,
    /// Health (0-100)
    pub health: f32,
}

/// Projectile state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShootSnapshot {
    pub id: i32,
    /// Owning player id
    pub player_id: i32,
    pub x: f32,
    pub y: f32,
    /// Direction X component (normalized)
    pub dx: f32,
    /// Direction Y component (normalized)
    pub dy: f32,
}
