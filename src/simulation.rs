//! Per-step driver that owns the particle store, the tree and the configuration.
//!
//! # Example
//!
//! ```
//! use rs_gravity_tree::{TreeConfig, TreeSimulation};
//! use rs_gravity_tree::particles::Particle;
//!
//! let config = TreeConfig::new(Some(1.0), Some((1, 1, 1)), None, Some(true));
//! let mut sim = TreeSimulation::new(config).expect("valid config");
//! sim.add(Particle::new(0.1, 0.2, 0.3, 1.0)).expect("inside the box");
//! sim.add(Particle::new(-0.3, -0.2, -0.1, 3.0)).expect("inside the box");
//!
//! let report = sim.update_tree().expect("tree update");
//! assert!(report.evictions.is_empty());
//!
//! let root = sim.tree.root(0).and_then(|id| sim.tree.node(id)).expect("root node");
//! assert!((root.m - 4.0).abs() < 1e-12);
//! ```
use log::{debug, warn};

use crate::config::TreeConfig;
use crate::errors::TreeError;
use crate::particles::{Particle, ParticleStore};
use crate::tree::{EssentialPurpose, EssentialTreeTransport, Eviction, Ownership, Tree};

/// Outcome of one [`TreeSimulation::update_tree`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    /// Particles that left their leaf during maintenance.
    pub evictions: Vec<Eviction>,
    /// Particles placed by the construction phase.
    pub inserted: usize,
    /// Detached particles that could not be separated from a leaf's occupant
    /// within the depth limit. They stay in the store without a leaf.
    pub rejected: Vec<usize>,
    /// Live nodes after the step.
    pub nodes: usize,
}

/// Simulation state threaded through every tree operation.
#[derive(Debug, Clone)]
pub struct TreeSimulation {
    pub config: TreeConfig,
    pub particles: ParticleStore,
    pub tree: Tree,
    next_id: u64,
}

impl TreeSimulation {
    pub fn new(config: TreeConfig) -> Result<Self, TreeError> {
        let tree = Tree::new(&config)?;
        Ok(Self {
            config,
            particles: ParticleStore::new(),
            tree,
            next_id: 0,
        })
    }

    /// Creates the state of one compute node in a distributed run.
    pub fn distributed(config: TreeConfig, ownership: Ownership) -> Result<Self, TreeError> {
        let tree = Tree::distributed(&config, ownership)?;
        Ok(Self {
            config,
            particles: ParticleStore::new(),
            tree,
            next_id: 0,
        })
    }

    /// True if `particle` lies within the half-open domain `[-box/2, box/2)`.
    ///
    /// The upper face belongs to the periodic image of the lower one.
    pub fn is_in_domain(&self, particle: &Particle) -> bool {
        let inside = |c: f64, extent: f64| c >= -extent / 2.0 && c < extent / 2.0;
        let [bx, by, bz] = self.config.box_size;
        inside(particle.x, bx) && inside(particle.y, by) && inside(particle.z, bz)
    }

    /// Adds a particle, assigns it a global id and inserts it into the tree.
    ///
    /// ### Arguments
    ///
    /// * `particle` - The particle to add. Its id and back-reference are overwritten.
    ///
    /// ### Returns
    ///
    /// The particle's index in the store. If the insertion fails the particle
    /// is removed from the store again and the error is returned.
    pub fn add(&mut self, particle: Particle) -> Result<usize, TreeError> {
        if !self.is_in_domain(&particle) {
            return Err(TreeError::OutsideDomain {
                x: particle.x,
                y: particle.y,
                z: particle.z,
            });
        }
        let mut particle = particle.with_id(self.next_id);
        particle.node = None;
        self.next_id += 1;
        let index = self.particles.push(particle);
        if let Err(err) = self.tree.insert(&mut self.particles, index) {
            // Still the last particle, so this pops it.
            self.particles.remove_and_compact(index)?;
            return Err(err);
        }
        Ok(index)
    }

    /// Inserts every particle that currently has no leaf.
    ///
    /// Particles in root boxes owned by other compute nodes are skipped.
    /// Particles that coincide with a leaf's occupant are left detached and
    /// reported instead of aborting the phase.
    ///
    /// ### Returns
    ///
    /// The number of inserted particles and the indices of rejected ones.
    pub fn insert_detached(&mut self) -> Result<(usize, Vec<usize>), TreeError> {
        let mut inserted = 0;
        let mut rejected = Vec::new();
        for index in self.particles.detached() {
            match self.tree.insert(&mut self.particles, index) {
                Ok(Some(_)) => inserted += 1,
                Ok(None) => {}
                Err(TreeError::MaxDepthExceeded { other, depth, .. }) => {
                    warn!(
                        "particle {} coincides with particle {} within {} levels, left detached",
                        index, other, depth
                    );
                    rejected.push(index);
                }
                Err(err) => return Err(err),
            }
        }
        Ok((inserted, rejected))
    }

    /// Runs one step of tree upkeep: maintenance, construction of the evicted
    /// and new particles, then moment aggregation.
    pub fn update_tree(&mut self) -> Result<StepReport, TreeError> {
        let evictions = self.tree.update(&mut self.particles)?;
        let (inserted, rejected) = self.insert_detached()?;
        self.tree.update_moments(&self.particles)?;
        let report = StepReport {
            evictions,
            inserted,
            rejected,
            nodes: self.tree.node_count(),
        };
        debug!(
            "step: {} evicted, {} inserted, {} rejected, {} nodes",
            report.evictions.len(),
            report.inserted,
            report.rejected.len(),
            report.nodes
        );
        Ok(report)
    }

    /// Drifts all particles along their velocities and wraps them into the
    /// periodic domain.
    pub fn drift(&mut self, dt: f64) {
        let box_size = self.config.box_size;
        for p in self.particles.iter_mut() {
            p.drift(dt);
            p.x = wrap(p.x, box_size[0]);
            p.y = wrap(p.y, box_size[1]);
            p.z = wrap(p.z, box_size[2]);
        }
    }

    /// Replaces all remote root boxes with fresh essential trees.
    ///
    /// Must follow [`TreeSimulation::update_tree`] so that the outbound trees
    /// carry this step's moments.
    pub fn exchange_essential_tree<T: EssentialTreeTransport>(
        &mut self,
        purpose: EssentialPurpose,
        transport: &mut T,
    ) -> Result<usize, TreeError> {
        self.tree.prepare_essential_tree(purpose, transport)?;
        self.tree.receive_essential_tree(purpose, transport)
    }
}

// Maps into [-extent/2, extent/2). rem_euclid can round up to `extent` for
// tiny negative inputs, which would land on the excluded upper face.
fn wrap(coord: f64, extent: f64) -> f64 {
    let wrapped = (coord + extent / 2.0).rem_euclid(extent) - extent / 2.0;
    if wrapped >= extent / 2.0 {
        wrapped - extent
    } else {
        wrapped
    }
}
