//! Game simulation modules

pub mod map;
pub mod master;
pub mod object_manager;
pub mod player;
pub mod shoot;
pub mod snapshot;

pub use map::GameMap;
pub use master::GameMaster;
pub use object_manager::{GameObjects, ObjectManager};
pub use player::Player;
pub use shoot::Shoot;

use bytes::Bytes;

/// Capacity of the serialized command stream between hub and tick driver
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// A command queued for the tick driver. Produced only by the hub's
/// serialization point; consumed only by the tick driver's draining phase.
#[derive(Debug, Clone)]
pub enum GameCommand {
    /// A raw inbound frame from one connection, decoded at drain time
    Frame { client_id: i32, payload: Bytes },
    /// A connection went away; its player must be removed
    RemoveClient { client_id: i32 },
}
