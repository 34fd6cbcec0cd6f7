//! Rayon implementation of the simulation kernels.
//!
//! Each kernel is one parallel iterator, and rayon joins every worker before
//! returning, so kernel boundaries are full barriers without any extra
//! synchronisation. Integrate writes disjoint slots of the write buffer while
//! reading the read buffer shared. Grid build inserts through the grid's
//! atomic counters from a shared reference. Resolve decides every particle
//! from an immutable view first and applies the results in a second pass, so
//! no worker reads a field another worker writes.

use rayon::prelude::*;

use crate::grid::SpatialGrid;
use crate::particle::Particle;
use crate::physics::{resolve, update_slot, Resolution};
use crate::pipeline::{ComputeBackend, WORKGROUP_SIZE};
use crate::uniforms::{FrameParams, SimParams};

/// Runs the kernels on the rayon thread pool.
#[derive(Debug, Default)]
pub struct CpuBackend {
    sim: SimParams,
    frame: FrameParams,
    overflow: u32,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indices a dispatch of `workgroups` covers that hold live work.
    fn bound(&self, workgroups: u32, len: usize) -> usize {
        let dispatched = workgroups.saturating_mul(WORKGROUP_SIZE);
        (dispatched.min(self.frame.active_count) as usize).min(len)
    }

    /// Grid insertions rejected during the last completed grid build.
    pub fn last_overflow(&self) -> u32 {
        self.overflow
    }
}

impl ComputeBackend for CpuBackend {
    type Particles = Vec<Particle>;
    type Grid = SpatialGrid;

    fn create_particles(&mut self, capacity: u32, _slot: usize) -> Vec<Particle> {
        vec![Particle::default(); capacity as usize]
    }

    fn create_grid(&mut self, sim: &SimParams) -> SpatialGrid {
        SpatialGrid::new(sim.cell_size, sim.max_per_cell)
    }

    fn write_sim_params(&mut self, sim: &SimParams) {
        self.sim = *sim;
    }

    fn begin_frame(&mut self, frame: &FrameParams) {
        self.frame = *frame;
    }

    fn clear_grid(&mut self, grid: &mut SpatialGrid) {
        grid.clear();
    }

    fn integrate(&mut self, read: &Vec<Particle>, write: &mut Vec<Particle>, workgroups: u32) {
        let n = self.bound(workgroups, read.len().min(write.len()));
        let (sim, frame) = (&self.sim, &self.frame);

        write[..n]
            .par_iter_mut()
            .zip(read[..n].par_iter())
            .enumerate()
            .for_each(|(i, (out, p))| {
                if let Some(next) = update_slot(i as u32, p, sim, frame) {
                    *out = next;
                }
            });
    }

    fn build_grid(&mut self, particles: &Vec<Particle>, grid: &SpatialGrid, workgroups: u32) {
        let n = self.bound(workgroups, particles.len());

        particles[..n]
            .par_iter()
            .enumerate()
            .filter(|(_, p)| p.is_active())
            .for_each(|(i, p)| {
                let cell = grid.cell_index(grid.cell_coord(p.pos()));
                grid.try_insert(cell, i as u32);
            });

        self.overflow = grid.dropped();
        if self.overflow > 0 {
            log::debug!("{} particles missed a full grid cell", self.overflow);
        }
    }

    fn resolve(&mut self, particles: &mut Vec<Particle>, grid: &SpatialGrid, workgroups: u32) {
        let n = self.bound(workgroups, particles.len());
        let sim = &self.sim;

        let view: &[Particle] = particles;
        let decisions: Vec<Option<Resolution>> = (0..n as u32)
            .into_par_iter()
            .map(|i| resolve(i, view, grid, sim))
            .collect();

        particles[..n]
            .par_iter_mut()
            .zip(decisions.par_iter())
            .for_each(|(p, decision)| {
                if let Some(resolution) = decision {
                    resolution.apply(p);
                }
            });
    }

    fn end_frame(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::pipeline::UpdatePipeline;

    #[test]
    fn test_slots_past_active_count_untouched() {
        let config = SimConfig::default().with_max_particles(64);
        let mut pipeline = UpdatePipeline::new(CpuBackend::new(), &config).unwrap();

        let marker = Particle {
            id: 99,
            ..Default::default()
        };
        pipeline.front_mut()[40] = marker;

        let frame = FrameParams {
            emit: 1,
            emit_start: 0,
            emit_end: 10,
            active_count: 10,
            ..Default::default()
        };
        pipeline.run_frame(&frame);

        let front = pipeline.front();
        assert!(front[..10].iter().all(Particle::is_active));
        assert!(front[10..].iter().all(|p| !p.is_active()));
        // slot 40 was seeded in the other buffer
        assert_eq!(pipeline.particles().back()[40], marker);
    }
}
