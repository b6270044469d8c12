//! Tile map generation and movement bounds

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::ws::protocol::MapInfo;

/// Default grid width in cells
pub const DEFAULT_COLS: usize = 40;
/// Default grid height in cells
pub const DEFAULT_ROWS: usize = 30;
/// Cell edge length in world units
pub const CELL_SIZE: f32 = 32.0;

/// Fraction of interior cells turned into walls
const WALL_DENSITY: f64 = 0.08;

/// Read-mostly world description. Owned by the simulation; everyone else
/// only sees copies of the serializable [`MapInfo`] view.
#[derive(Debug, Clone)]
pub struct GameMap {
    cols: usize,
    rows: usize,
    cell_size: f32,
    walls: Vec<Vec<bool>>,
}

impl GameMap {
    /// Generate the default-sized map deterministically from a seed
    pub fn generate(seed: u64) -> Self {
        Self::generate_sized(seed, DEFAULT_COLS, DEFAULT_ROWS)
    }

    /// Generate a map with explicit dimensions. The border is always walled;
    /// interior walls are scattered from the seeded RNG.
    pub fn generate_sized(seed: u64, cols: usize, rows: usize) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut walls = vec![vec![false; cols]; rows];

        for (r, row) in walls.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                let border = r == 0 || c == 0 || r == rows - 1 || c == cols - 1;
                *cell = border || rng.gen_bool(WALL_DENSITY);
            }
        }

        Self {
            cols,
            rows,
            cell_size: CELL_SIZE,
            walls,
        }
    }

    /// World width in world units
    pub fn width(&self) -> f32 {
        self.cols as f32 * self.cell_size
    }

    /// World height in world units
    pub fn height(&self) -> f32 {
        self.rows as f32 * self.cell_size
    }

    pub fn is_wall_cell(&self, col: usize, row: usize) -> bool {
        self.walls
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(true)
    }

    /// Whether a world-space point is inside the map and not inside a wall
    pub fn is_walkable(&self, x: f32, y: f32) -> bool {
        if x < 0.0 || y < 0.0 || x >= self.width() || y >= self.height() {
            return false;
        }
        let col = (x / self.cell_size) as usize;
        let row = (y / self.cell_size) as usize;
        !self.is_wall_cell(col, row)
    }

    /// Pick a random walkable cell center for spawning
    pub fn random_spawn(&self, rng: &mut impl Rng) -> (f32, f32) {
        for _ in 0..64 {
            let col = rng.gen_range(1..self.cols - 1);
            let row = rng.gen_range(1..self.rows - 1);
            if !self.is_wall_cell(col, row) {
                return self.cell_center(col, row);
            }
        }

        // Degenerate maps: fall back to the first open cell.
        for row in 0..self.rows {
            for col in 0..self.cols {
                if !self.is_wall_cell(col, row) {
                    return self.cell_center(col, row);
                }
            }
        }
        (self.width() / 2.0, self.height() / 2.0)
    }

    fn cell_center(&self, col: usize, row: usize) -> (f32, f32) {
        (
            (col as f32 + 0.5) * self.cell_size,
            (row as f32 + 0.5) * self.cell_size,
        )
    }

    /// Serializable description sent to clients in the init message
    pub fn info(&self) -> MapInfo {
        MapInfo {
            cols: self.cols,
            rows: self.rows,
            cell_size: self.cell_size,
            walls: self.walls.clone(),
        }
    }
}
