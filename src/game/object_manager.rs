//! Authoritative game-state owner
//!
//! None of these operations take internal locks. The contract is that exactly
//! one logical caller (the tick driver) ever invokes them; all concurrent
//! requests must be marshalled through its command queue first.

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use super::map::GameMap;
use super::player::{Player, PLAYER_HITBOX_RADIUS};
use super::shoot::{Shoot, SHOOT_DAMAGE};

/// Capability set the tick driver consumes. Single logical caller only.
pub trait ObjectManager {
    /// Create a player bound to a client. If the client already has a player
    /// the existing one is replaced.
    fn register_player(&mut self, client_id: i32, name: &str) -> Player;

    /// Create a projectile owned by `player_id`. Rejected (`None`) when the
    /// player is not currently live.
    fn register_shoot(
        &mut self,
        player_id: i32,
        x: f32,
        y: f32,
        dx: f32,
        dy: f32,
        start_time: u64,
    ) -> Option<Shoot>;

    fn remove_player_by_id(&mut self, id: i32);
    fn remove_player_by_client_id(&mut self, client_id: i32);

    /// Snapshot copy of all players, safe to iterate
    fn get_players(&self) -> Vec<Player>;
    /// Snapshot copy of all live projectiles
    fn get_shoots(&self) -> Vec<Shoot>;
    fn get_map(&self) -> &GameMap;
    fn get_player_by_id(&self, id: i32) -> Option<Player>;
    fn get_player_by_client_id(&self, client_id: i32) -> Option<Player>;

    /// Apply a bounded displacement, clamped against map walls
    fn move_player(&mut self, id: i32, dx: f32, dy: f32, speed: f32, time_elapsed: f32);

    /// Advance time-dependent state by one tick. Runs unconditionally every
    /// interval, whether or not any command arrived.
    fn update(&mut self);
}

/// The default in-memory implementation
pub struct GameObjects {
    players: HashMap<i32, Player>,
    shoots: Vec<Shoot>,
    map: GameMap,
    next_player_id: i32,
    next_shoot_id: i32,
    rng: ChaCha8Rng,
}

impl GameObjects {
    pub fn new(map: GameMap, spawn_seed: u64) -> Self {
        Self {
            players: HashMap::new(),
            shoots: Vec::new(),
            map,
            next_player_id: 0,
            next_shoot_id: 0,
            rng: ChaCha8Rng::seed_from_u64(spawn_seed),
        }
    }
}

impl ObjectManager for GameObjects {
    fn register_player(&mut self, client_id: i32, name: &str) -> Player {
        // Replace policy: a re-register for the same client drops the old player.
        if let Some(existing) = self.get_player_by_client_id(client_id) {
            warn!(
                client_id,
                player_id = existing.id,
                "client re-registered, replacing existing player"
            );
            self.players.remove(&existing.id);
        }

        let id = self.next_player_id;
        self.next_player_id += 1;

        let (x, y) = self.map.random_spawn(&mut self.rng);
        let player = Player::new(id, client_id, name.to_string(), x, y);
        info!(player_id = id, client_id, name, "player registered");
        self.players.insert(id, player.clone());
        player
    }

    fn register_shoot(
        &mut self,
        player_id: i32,
        x: f32,
        y: f32,
        dx: f32,
        dy: f32,
        start_time: u64,
    ) -> Option<Shoot> {
        if !self.players.contains_key(&player_id) {
            debug!(player_id, "shoot rejected, owner is not live");
            return None;
        }

        let id = self.next_shoot_id;
        self.next_shoot_id += 1;

        let shoot = Shoot::new(id, player_id, x, y, dx, dy, start_time);
        self.shoots.push(shoot.clone());
        Some(shoot)
    }

    fn remove_player_by_id(&mut self, id: i32) {
        if self.players.remove(&id).is_some() {
            info!(player_id = id, "player removed");
        }
    }

    fn remove_player_by_client_id(&mut self, client_id: i32) {
        if let Some(player) = self.get_player_by_client_id(client_id) {
            self.remove_player_by_id(player.id);
        }
    }

    fn get_players(&self) -> Vec<Player> {
        self.players.values().cloned().collect()
    }

    fn get_shoots(&self) -> Vec<Shoot> {
        self.shoots.clone()
    }

    fn get_map(&self) -> &GameMap {
        &self.map
    }

    fn get_player_by_id(&self, id: i32) -> Option<Player> {
        self.players.get(&id).cloned()
    }

    fn get_player_by_client_id(&self, client_id: i32) -> Option<Player> {
        self.players
            .values()
            .find(|p| p.client_id == client_id)
            .cloned()
    }

    fn move_player(&mut self, id: i32, dx: f32, dy: f32, speed: f32, time_elapsed: f32) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };

        let len = (dx * dx + dy * dy).sqrt();
        if len <= f32::EPSILON {
            return;
        }
        let step_x = dx / len * speed * time_elapsed;
        let step_y = dy / len * speed * time_elapsed;

        // Axis-separated so a blocked axis does not cancel the other (wall slide).
        let new_x = player.x + step_x;
        if self.map.is_walkable(new_x, player.y) {
            player.x = new_x;
        }
        let new_y = player.y + step_y;
        if self.map.is_walkable(player.x, new_y) {
            player.y = new_y;
        }
    }

    fn update(&mut self) {
        let mut expired: Vec<usize> = Vec::new();
        let mut hits: Vec<(i32, i32)> = Vec::new();

        for (idx, shoot) in self.shoots.iter_mut().enumerate() {
            if !shoot.update() || !self.map.is_walkable(shoot.x, shoot.y) {
                expired.push(idx);
                continue;
            }

            // Owner is skipped; orphaned shoots (owner already removed) keep flying.
            for player in self.players.values() {
                if player.id == shoot.player_id {
                    continue;
                }
                if shoot.check_hit(player.x, player.y, PLAYER_HITBOX_RADIUS) {
                    hits.push((shoot.player_id, player.id));
                    expired.push(idx);
                    break;
                }
            }
        }

        expired.sort_unstable();
        expired.dedup();
        for idx in expired.into_iter().rev() {
            self.shoots.remove(idx);
        }

        for (shooter_id, target_id) in hits {
            let killed = match self.players.get_mut(&target_id) {
                Some(target) => target.apply_damage(SHOOT_DAMAGE),
                None => false,
            };
            if killed {
                info!(player_id = target_id, killer_id = shooter_id, "player killed");
                self.players.remove(&target_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::player::PLAYER_MAX_HEALTH;
    use crate::game::shoot::SHOOT_SPEED;
    use crate::util::time::tick_delta;

    fn objects() -> GameObjects {
        GameObjects::new(GameMap::generate(1), 1)
    }

    #[test]
    fn player_ids_are_distinct_and_monotonic() {
        let mut objects = objects();
        let a = objects.register_player(10, "a");
        let b = objects.register_player(11, "b");
        assert_ne!(a.id, b.id);
        assert!(b.id > a.id);
    }

    #[test]
    fn reregister_replaces_existing_player() {
        let mut objects = objects();
        let first = objects.register_player(5, "alice");
        let second = objects.register_player(5, "alice2");

        assert_ne!(first.id, second.id);
        assert!(objects.get_player_by_id(first.id).is_none());
        assert_eq!(objects.get_players().len(), 1);
        assert_eq!(
            objects.get_player_by_client_id(5).map(|p| p.id),
            Some(second.id)
        );
    }

    #[test]
    fn remove_by_client_id_makes_id_lookup_miss() {
        let mut objects = objects();
        let alice = objects.register_player(5, "Alice");
        objects.remove_player_by_client_id(5);
        assert!(objects.get_player_by_id(alice.id).is_none());
        assert!(objects.get_player_by_client_id(5).is_none());
    }

    #[test]
    fn remove_by_id_makes_client_lookup_miss() {
        let mut objects = objects();
        let alice = objects.register_player(5, "Alice");
        objects.remove_player_by_id(alice.id);
        assert!(objects.get_player_by_client_id(5).is_none());
    }

    #[test]
    fn shoot_for_removed_player_is_rejected() {
        let mut objects = objects();
        let player = objects.register_player(1, "p");
        objects.remove_player_by_id(player.id);

        let shoot = objects.register_shoot(player.id, 64.0, 64.0, 1.0, 0.0, 0);
        assert!(shoot.is_none());
        assert!(objects.get_shoots().is_empty());
    }

    #[test]
    fn shoot_for_live_player_is_created() {
        let mut objects = objects();
        let player = objects.register_player(1, "p");
        let shoot = objects
            .register_shoot(player.id, player.x, player.y, 0.0, 1.0, 123)
            .unwrap();
        assert_eq!(shoot.player_id, player.id);
        assert_eq!(shoot.start_time, 123);
        assert_eq!(objects.get_shoots().len(), 1);
    }

    #[test]
    fn update_with_no_entities_is_a_noop() {
        let mut objects = objects();
        objects.update();
        assert!(objects.get_players().is_empty());
        assert!(objects.get_shoots().is_empty());
    }

    #[test]
    fn move_player_is_blocked_by_map_bounds() {
        let mut objects = objects();
        let player = objects.register_player(1, "p");

        // Walk left for far longer than the map is wide.
        for _ in 0..10_000 {
            objects.move_player(player.id, -1.0, 0.0, 200.0, tick_delta());
        }

        let moved = objects.get_player_by_id(player.id).unwrap();
        assert!(objects.get_map().is_walkable(moved.x, moved.y));
        assert!(moved.x >= 0.0);
    }

    #[test]
    fn shoots_expire_on_wall_hit() {
        let mut objects = objects();
        let player = objects.register_player(1, "p");
        objects.register_shoot(player.id, player.x, player.y, -1.0, 0.0, 0);

        // Enough ticks to cross the whole map.
        let ticks = (objects.get_map().width() / (SHOOT_SPEED * tick_delta())) as u32 + 2;
        for _ in 0..ticks {
            objects.update();
        }
        assert!(objects.get_shoots().is_empty());
    }

    #[test]
    fn hit_damages_target_and_removes_projectile() {
        let mut objects = objects();
        let shooter = objects.register_player(1, "shooter");
        let target = objects.register_player(2, "target");

        // Place the projectile one tick of travel away from the target.
        let spawn_x = target.x - SHOOT_SPEED * tick_delta();
        objects.register_shoot(shooter.id, spawn_x, target.y, 1.0, 0.0, 0);
        objects.update();

        let hit = objects.get_player_by_id(target.id).unwrap();
        assert_eq!(hit.health, PLAYER_MAX_HEALTH - SHOOT_DAMAGE);
        assert!(objects.get_shoots().is_empty());
    }

    #[test]
    fn lethal_hits_remove_the_target() {
        let mut objects = objects();
        let shooter = objects.register_player(1, "shooter");
        let target = objects.register_player(2, "target");

        let shots = (PLAYER_MAX_HEALTH / SHOOT_DAMAGE) as u32;
        for _ in 0..shots {
            let current = objects.get_player_by_id(target.id).unwrap();
            let spawn_x = current.x - SHOOT_SPEED * tick_delta();
            objects.register_shoot(shooter.id, spawn_x, current.y, 1.0, 0.0, 0);
            objects.update();
        }

        assert!(objects.get_player_by_id(target.id).is_none());
        assert!(objects.get_player_by_id(shooter.id).is_some());
    }

    #[test]
    fn orphaned_shoots_keep_flying_after_owner_removal() {
        let mut objects = objects();
        let shooter = objects.register_player(1, "shooter");
        objects.register_shoot(shooter.id, shooter.x, shooter.y, 1.0, 0.0, 0);
        objects.remove_player_by_id(shooter.id);

        objects.update();
        assert_eq!(objects.get_shoots().len(), 1);
    }
}
