//! Projectile entity and lifecycle

use crate::util::time::tick_delta;

/// Projectile travel speed in world units per second
pub const SHOOT_SPEED: f32 = 450.0;
/// Projectile lifetime in seconds
pub const SHOOT_LIFETIME: f32 = 2.0;
/// Projectile hitbox radius
pub const SHOOT_RADIUS: f32 = 4.0;
/// Damage per hit
pub const SHOOT_DAMAGE: f32 = 20.0;

/// Active projectile, owned by the simulation
#[derive(Debug, Clone)]
pub struct Shoot {
    pub id: i32,
    /// Owning player id
    pub player_id: i32,
    pub x: f32,
    pub y: f32,
    /// Direction X component (normalized)
    pub dx: f32,
    /// Direction Y component (normalized)
    pub dy: f32,
    /// Unix millis at creation
    pub start_time: u64,
    pub lifetime_remaining: f32,
}

impl Shoot {
    pub fn new(id: i32, player_id: i32, x: f32, y: f32, dx: f32, dy: f32, start_time: u64) -> Self {
        let len = (dx * dx + dy * dy).sqrt();
        let (dx, dy) = if len > f32::EPSILON {
            (dx / len, dy / len)
        } else {
            (1.0, 0.0)
        };

        Self {
            id,
            player_id,
            x,
            y,
            dx,
            dy,
            start_time,
            lifetime_remaining: SHOOT_LIFETIME,
        }
    }

    /// Advance by one tick, returns false if expired
    pub fn update(&mut self) -> bool {
        let dt = tick_delta();
        self.x += self.dx * SHOOT_SPEED * dt;
        self.y += self.dy * SHOOT_SPEED * dt;
        self.lifetime_remaining -= dt;
        self.lifetime_remaining > 0.0
    }

    /// Check collision with a circular target
    pub fn check_hit(&self, target_x: f32, target_y: f32, target_radius: f32) -> bool {
        let dx = self.x - target_x;
        let dy = self.y - target_y;
        let dist_sq = dx * dx + dy * dy;
        let combined_radius = SHOOT_RADIUS + target_radius;
        dist_sq <= combined_radius * combined_radius
    }
}
