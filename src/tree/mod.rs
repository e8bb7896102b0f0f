//! Adaptive octree forest over a periodic grid of root boxes.
//!
//! Every root box owns an independent octree. Nodes live in a single slab
//! arena and are addressed by [`NodeId`]; freed slots are reused. A step
//! runs the phases in a fixed order:
//!
//! 1. [`Tree::update`] repairs the structure after particles moved and
//!    evicts particles that left their leaf.
//! 2. [`Tree::insert`] places new or evicted particles.
//! 3. [`Tree::update_moments`] aggregates masses, centers of mass and
//!    quadrupoles bottom-up.
//! 4. In distributed runs, [`Tree::prepare_essential_tree`] and
//!    [`Tree::add_essential_node`] replace remote root boxes with fresh
//!    mirrors received from their owners.
//!
//! # Example
//!
//! ```
//! use rs_gravity_tree::config::TreeConfig;
//! use rs_gravity_tree::particles::{Particle, ParticleStore};
//! use rs_gravity_tree::tree::{NodeKind, Tree};
//!
//! let config = TreeConfig::new(Some(1.0), Some((1, 1, 1)), None, None);
//! let mut tree = Tree::new(&config).expect("valid config");
//! let mut particles = ParticleStore::from_particles(vec![
//!     Particle::new(0.1, 0.1, 0.1, 1.0),
//!     Particle::new(-0.1, -0.1, -0.1, 1.0),
//! ]);
//! tree.insert(&mut particles, 0).expect("insert");
//! tree.insert(&mut particles, 1).expect("insert");
//!
//! let root = tree.root(0).expect("root exists");
//! assert_eq!(tree.node(root).map(|n| n.kind), Some(NodeKind::Branch { count: 2 }));
//! ```
use log::trace;
use slab::Slab;

use crate::config::TreeConfig;
use crate::errors::TreeError;

mod construction;
mod essential;
mod maintenance;
mod moments;
mod node;
mod root_grid;
mod validation;

pub use essential::*;
pub use maintenance::Eviction;
pub use node::*;
pub use root_grid::RootGrid;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod essential_tests;

/// The forest of octrees covering the root grid.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Slab<Node>,
    /// One slot per root box, allocated on first use.
    roots: Option<Vec<Option<NodeId>>>,
    grid: RootGrid,
    n_tree_fixed: usize,
    quadrupole: bool,
    max_depth: usize,
    ownership: Option<Ownership>,
}

impl Tree {
    /// Creates an empty single-process tree.
    pub fn new(config: &TreeConfig) -> Result<Self, TreeError> {
        config.validate()?;
        Ok(Self {
            nodes: Slab::new(),
            roots: None,
            grid: RootGrid::from_config(config),
            n_tree_fixed: config.n_tree_fixed,
            quadrupole: config.quadrupole,
            max_depth: config.max_depth,
            ownership: None,
        })
    }

    /// Creates an empty tree that only builds the root boxes `ownership` assigns to it.
    pub fn distributed(config: &TreeConfig, ownership: Ownership) -> Result<Self, TreeError> {
        let mut tree = Self::new(config)?;
        if ownership.len() != tree.grid.len() {
            return Err(TreeError::InvalidConfig(format!(
                "Ownership map covers {} root boxes, grid has {}",
                ownership.len(),
                tree.grid.len()
            )));
        }
        tree.ownership = Some(ownership);
        Ok(tree)
    }

    pub fn grid(&self) -> &RootGrid {
        &self.grid
    }

    pub fn ownership(&self) -> Option<&Ownership> {
        self.ownership.as_ref()
    }

    pub fn quadrupole_enabled(&self) -> bool {
        self.quadrupole
    }

    /// True if this process owns (builds and maintains) the root box.
    pub fn is_local(&self, root_box: usize) -> bool {
        match &self.ownership {
            Some(ownership) => ownership.is_local(root_box),
            None => true,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Root node of a root box, if the box holds anything.
    pub fn root(&self, root_box: usize) -> Option<NodeId> {
        self.roots
            .as_ref()
            .and_then(|roots| roots.get(root_box).copied().flatten())
    }

    /// Iterates over `(root_box, root node)` for every occupied root box.
    pub fn roots(&self) -> impl Iterator<Item = (usize, NodeId)> + '_ {
        self.roots
            .iter()
            .flat_map(|roots| roots.iter().enumerate())
            .filter_map(|(i, r)| r.map(|id| (i, id)))
    }

    /// Number of live nodes, remote mirrors included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Particles held by the locally owned root boxes.
    pub fn particle_count(&self) -> usize {
        self.roots()
            .filter(|(i, _)| self.is_local(*i))
            .map(|(_, id)| self.nodes[id.0].kind.occupancy())
            .sum()
    }

    fn ensure_roots(&mut self) {
        if self.roots.is_none() {
            self.roots = Some(vec![None; self.grid.len()]);
        }
    }

    fn set_root(&mut self, root_box: usize, id: Option<NodeId>) {
        self.ensure_roots();
        if let Some(slot) = self.roots.as_mut().and_then(|roots| roots.get_mut(root_box)) {
            *slot = id;
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        NodeId(self.nodes.insert(node))
    }

    fn free(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.try_remove(id.0)
    }

    /// Frees a node and everything below it.
    fn free_subtree(&mut self, id: NodeId) -> usize {
        let mut stack = vec![id];
        let mut freed = 0;
        while let Some(id) = stack.pop() {
            if let Some(node) = self.free(id) {
                stack.extend(node.children.iter().flatten());
                freed += 1;
            }
        }
        trace!("freed subtree rooted at {:?} ({} nodes)", id, freed);
        freed
    }
}
