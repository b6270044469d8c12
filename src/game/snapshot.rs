//! Snapshot building and encoding

use bytes::Bytes;

use crate::ws::protocol::{PlayerSnapshot, ServerMsg, ShootSnapshot};

use super::player::Player;
use super::shoot::Shoot;

/// Build the immutable per-tick view of the game state
pub fn build_snapshot(tick: u64, players: &[Player], shoots: &[Shoot]) -> ServerMsg {
    let players = players
        .iter()
        .map(|p| PlayerSnapshot {
            id: p.id,
            name: p.name.clone(),
            x: p.x,
            y: p.y,
            health: p.health,
        })
        .collect();

    let shoots = shoots
        .iter()
        .map(|s| ShootSnapshot {
            id: s.id,
            player_id: s.player_id,
            x: s.x,
            y: s.y,
            dx: s.dx,
            dy: s.dy,
        })
        .collect();

    ServerMsg::Snapshot {
        tick,
        players,
        shoots,
    }
}

/// Serialize a server message once; the resulting `Bytes` is refcount-shared
/// across all broadcast recipients.
pub fn encode(msg: &ServerMsg) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(msg).map(Bytes::from)
}
