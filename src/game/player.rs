//! Player entity (authoritative)

/// Maximum player health
pub const PLAYER_MAX_HEALTH: f32 = 100.0;
/// Player hitbox radius in world units
pub const PLAYER_HITBOX_RADIUS: f32 = 12.0;
/// Base movement speed in world units per second
pub const PLAYER_SPEED: f32 = 200.0;

/// Authoritative player state, owned by the simulation
#[derive(Debug, Clone)]
pub struct Player {
    pub id: i32,
    /// The connection this player belongs to
    pub client_id: i32,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub health: f32,
}

impl Player {
    pub fn new(id: i32, client_id: i32, name: String, x: f32, y: f32) -> Self {
        Self {
            id,
            client_id,
            name,
            x,
            y,
            health: PLAYER_MAX_HEALTH,
        }
    }

    /// Apply damage, returns true if the player was killed
    pub fn apply_damage(&mut self, damage: f32) -> bool {
        self.health = (self.health - damage).max(0.0);
        self.health <= 0.0
    }
}
