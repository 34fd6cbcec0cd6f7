//! Spatial hash grid over the [-1, 1]² domain.
//!
//! The grid is a derived index, rebuilt from scratch every frame: each cell
//! keeps an occupancy counter and a fixed number of particle-index slots.
//! Insertion reserves a slot with an atomic compare-and-swap on the counter and
//! fails once the cell is full, so a crowded cell costs at most
//! `max_per_cell` slots and neighbour scans stay bounded. A particle that
//! loses the race for the last slot still exists and keeps integrating; it is
//! only invisible to neighbour queries for that frame. Which particle loses is
//! decided by parallel execution order and is not reproducible.

use glam::{UVec2, Vec2};
use std::sync::atomic::{AtomicU32, Ordering};

/// Number of cells along each axis needed to cover [-1, 1] with `cell_size`.
///
/// Computed in `f32`, the precision the shaders see the cell size in.
pub fn grid_width(cell_size: f32) -> u32 {
    (2.0 / cell_size).ceil() as u32
}

/// Cell coordinate of a position, clamped onto the grid.
pub fn cell_coord(pos: Vec2, cell_size: f32, width: u32) -> UVec2 {
    let max = (width - 1) as f32;
    let cell = ((pos + Vec2::ONE) / cell_size).floor();
    // NaN positions saturate to cell 0 in the cast
    UVec2::new(cell.x.clamp(0.0, max) as u32, cell.y.clamp(0.0, max) as u32)
}

/// CPU-side grid with atomic slot reservation.
///
/// [`try_insert`](Self::try_insert) takes `&self`, so any number of workers
/// may insert concurrently; [`clear`](Self::clear) needs exclusive access and
/// therefore cannot overlap a build.
#[derive(Debug)]
pub struct SpatialGrid {
    cell_size: f32,
    width: u32,
    max_per_cell: u32,
    counts: Vec<AtomicU32>,
    slots: Vec<AtomicU32>,
    dropped: AtomicU32,
}

impl SpatialGrid {
    pub fn new(cell_size: f32, max_per_cell: u32) -> Self {
        let width = grid_width(cell_size);
        let cells = width as usize * width as usize;
        Self {
            cell_size,
            width,
            max_per_cell,
            counts: (0..cells).map(|_| AtomicU32::new(0)).collect(),
            slots: (0..cells * max_per_cell as usize)
                .map(|_| AtomicU32::new(0))
                .collect(),
            dropped: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn max_per_cell(&self) -> u32 {
        self.max_per_cell
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn cell_coord(&self, pos: Vec2) -> UVec2 {
        cell_coord(pos, self.cell_size, self.width)
    }

    #[inline]
    pub fn cell_index(&self, coord: UVec2) -> usize {
        (coord.y * self.width + coord.x) as usize
    }

    /// Reserve a slot in `cell` and store `index` in it.
    ///
    /// Returns `false` without touching the cell once it holds `max_per_cell`
    /// entries.
    pub fn try_insert(&self, cell: usize, index: u32) -> bool {
        let counter = &self.counts[cell];
        let mut current = counter.load(Ordering::Relaxed);
        loop {
            if current >= self.max_per_cell {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            match counter.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    let slot = cell * self.max_per_cell as usize + current as usize;
                    self.slots[slot].store(index, Ordering::Release);
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Empty every cell.
    pub fn clear(&mut self) {
        for count in &mut self.counts {
            *count.get_mut() = 0;
        }
        for slot in &mut self.slots {
            *slot.get_mut() = 0;
        }
        *self.dropped.get_mut() = 0;
    }

    /// Occupancy of `cell`, never above `max_per_cell`.
    #[inline]
    pub fn count(&self, cell: usize) -> u32 {
        self.counts[cell].load(Ordering::Acquire).min(self.max_per_cell)
    }

    /// Particle indices stored in `cell`.
    pub fn occupants(&self, cell: usize) -> impl Iterator<Item = u32> + '_ {
        let base = cell * self.max_per_cell as usize;
        (0..self.count(cell) as usize).map(move |s| self.slots[base + s].load(Ordering::Acquire))
    }

    /// Cell indices of `coord` and its in-bounds neighbours (up to 9).
    pub fn neighborhood(&self, coord: UVec2) -> impl Iterator<Item = usize> + '_ {
        let width = self.width as i32;
        let (cx, cy) = (coord.x as i32, coord.y as i32);
        (-1..=1)
            .flat_map(move |dy| (-1..=1).map(move |dx| (cx + dx, cy + dy)))
            .filter(move |&(x, y)| x >= 0 && y >= 0 && x < width && y < width)
            .map(move |(x, y)| (y * width + x) as usize)
    }

    /// Insertions rejected since the last clear.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Total indices stored across all cells.
    pub fn occupied(&self) -> u32 {
        (0..self.cell_count()).map(|c| self.count(c)).sum()
    }
}

/// WGSL cell math, identical to [`cell_coord`].
pub const GRID_WGSL: &str = r#"
fn cell_coord(pos: vec2<f32>, cell_size: f32, width: u32) -> vec2<u32> {
    let max_cell = f32(width - 1u);
    let cell = floor((pos + vec2<f32>(1.0)) / cell_size);
    return vec2<u32>(clamp(cell, vec2<f32>(0.0), vec2<f32>(max_cell)));
}

fn cell_index(coord: vec2<u32>, width: u32) -> u32 {
    return coord.y * width + coord.x;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_grid_width() {
        assert_eq!(grid_width(0.01), 200);
        assert_eq!(grid_width(0.015), 134);
        assert_eq!(grid_width(0.5), 4);
        assert_eq!(grid_width(2.0), 1);
    }

    #[test]
    fn test_cell_coord_clamps() {
        let grid = SpatialGrid::new(0.5, 2);
        assert_eq!(grid.cell_coord(Vec2::new(-1.0, -1.0)), UVec2::new(0, 0));
        assert_eq!(grid.cell_coord(Vec2::new(0.1, -0.6)), UVec2::new(2, 0));
        assert_eq!(grid.cell_coord(Vec2::new(1.0, 1.0)), UVec2::new(3, 3));
        assert_eq!(grid.cell_coord(Vec2::new(-5.0, 7.0)), UVec2::new(0, 3));
        assert_eq!(grid.cell_coord(Vec2::new(f32::NAN, 0.0)).x, 0);
    }

    #[test]
    fn test_insert_respects_cell_capacity() {
        let grid = SpatialGrid::new(0.5, 2);
        let cell = grid.cell_index(UVec2::new(1, 1));

        assert!(grid.try_insert(cell, 7));
        assert!(grid.try_insert(cell, 9));
        assert!(!grid.try_insert(cell, 11));

        assert_eq!(grid.count(cell), 2);
        let occupants: Vec<u32> = grid.occupants(cell).collect();
        assert_eq!(occupants, vec![7, 9]);
        assert_eq!(grid.dropped(), 1);
    }

    #[test]
    fn test_clear_empties_cells() {
        let mut grid = SpatialGrid::new(0.5, 2);
        assert!(grid.try_insert(3, 1));
        assert!(grid.try_insert(3, 2));
        assert!(!grid.try_insert(3, 3));

        grid.clear();
        assert_eq!(grid.count(3), 0);
        assert_eq!(grid.occupants(3).count(), 0);
        assert_eq!(grid.dropped(), 0);

        assert!(grid.try_insert(3, 7));
        assert_eq!(grid.occupants(3).collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_concurrent_insert_is_bounded() {
        let grid = SpatialGrid::new(0.5, 8);
        let cell = 5;

        let inserted = (0..10_000u32)
            .into_par_iter()
            .filter(|&i| grid.try_insert(cell, i))
            .count();

        assert_eq!(inserted, 8);
        assert_eq!(grid.count(cell), 8);
        assert_eq!(grid.dropped(), 10_000 - 8);

        let mut occupants: Vec<u32> = grid.occupants(cell).collect();
        occupants.sort_unstable();
        occupants.dedup();
        assert_eq!(occupants.len(), 8);
    }

    #[test]
    fn test_neighborhood_edges() {
        let grid = SpatialGrid::new(0.5, 1);
        assert_eq!(grid.neighborhood(UVec2::new(0, 0)).count(), 4);
        assert_eq!(grid.neighborhood(UVec2::new(3, 1)).count(), 6);
        assert_eq!(grid.neighborhood(UVec2::new(1, 2)).count(), 9);

        let cells: Vec<usize> = grid.neighborhood(UVec2::new(0, 0)).collect();
        assert_eq!(cells, vec![0, 1, 4, 5]);
    }
}
