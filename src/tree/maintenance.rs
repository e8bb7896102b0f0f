use log::{debug, trace};

use super::{NodeId, NodeKind, Tree};
use crate::errors::TreeError;
use crate::particles::ParticleStore;

/// A particle that left its leaf during [`Tree::update`].
///
/// The particle is no longer in the tree. It sits at `new_index` in the
/// particle store without a back-reference, waiting for the next
/// construction phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eviction {
    pub old_index: usize,
    pub new_index: usize,
    /// Global id of the evicted particle.
    pub id: u64,
}

impl Tree {
    /// Repairs every locally owned root tree after particles moved.
    ///
    /// Children are processed before their parent. Leaves whose particle left
    /// the cell are freed and reported as evictions, branch counts are
    /// recomputed, empty branches are pruned and branches left with a single
    /// leaf child collapse into that leaf. A collapsed node is not re-checked
    /// in the same pass.
    ///
    /// Evicted particles below `n_tree_fixed` keep their index. Others are
    /// removed with swap-with-last and appended at the end of the store.
    ///
    /// ### Arguments
    ///
    /// * `particles` - The particle store, after particles moved. Evicted
    ///   particles lose their back-reference and may change index.
    ///
    /// ### Returns
    ///
    /// One [`Eviction`] per particle that left its leaf, in the order the
    /// leaves were visited. `new_index` is the particle's final slot.
    pub fn update(&mut self, particles: &mut ParticleStore) -> Result<Vec<Eviction>, TreeError> {
        self.ensure_roots();
        let mut evictions = Vec::new();
        for root_box in 0..self.grid.len() {
            if !self.is_local(root_box) {
                continue;
            }
            if let Some(root) = self.root(root_box) {
                let kept = self.update_cell(particles, root, &mut evictions)?;
                self.set_root(root_box, kept);
            }
        }
        debug!(
            "tree update: {} evictions, {} nodes, {} particles in tree",
            evictions.len(),
            self.node_count(),
            self.particle_count()
        );
        Ok(evictions)
    }

    fn update_cell(
        &mut self,
        particles: &mut ParticleStore,
        id: NodeId,
        evictions: &mut Vec<Eviction>,
    ) -> Result<Option<NodeId>, TreeError> {
        match self.nodes[id.0].kind {
            NodeKind::Branch { .. } => {
                let children = self.nodes[id.0].children;
                for (o, child) in children.iter().enumerate() {
                    if let Some(child) = *child {
                        let kept = self.update_cell(particles, child, evictions)?;
                        self.nodes[id.0].children[o] = kept;
                    }
                }

                let mut count = 0;
                let mut leaf_octant = None;
                for (o, child) in self.nodes[id.0].occupied_children() {
                    match self.nodes[child.0].kind {
                        NodeKind::Leaf { .. } => {
                            count += 1;
                            leaf_octant = Some(o);
                        }
                        NodeKind::Branch { count: n } => count += n,
                    }
                }

                match (count, leaf_octant) {
                    (0, _) => {
                        self.free(id);
                        Ok(None)
                    }
                    (1, Some(o)) => {
                        self.collapse(particles, id, o)?;
                        Ok(Some(id))
                    }
                    _ => {
                        self.nodes[id.0].kind = NodeKind::Branch { count };
                        Ok(Some(id))
                    }
                }
            }
            NodeKind::Leaf { particle } => {
                let inside = self.nodes[id.0].is_inside(particles.get(particle)?);
                if inside {
                    particles[particle].node = Some(id);
                    Ok(Some(id))
                } else {
                    self.free(id);
                    self.evict(particles, particle, evictions)?;
                    Ok(None)
                }
            }
        }
    }

    /// Turns branch `id` into a leaf holding the particle of its only child.
    fn collapse(
        &mut self,
        particles: &mut ParticleStore,
        id: NodeId,
        octant: usize,
    ) -> Result<(), TreeError> {
        let child = self.nodes[id.0].children[octant].take();
        let particle = match child.and_then(|c| self.free(c)).map(|n| n.kind) {
            Some(NodeKind::Leaf { particle }) => particle,
            _ => {
                return Err(TreeError::InvariantViolation(format!(
                    "octant {} of node {:?} is not a leaf",
                    octant, id
                )))
            }
        };
        self.nodes[id.0].kind = NodeKind::Leaf { particle };
        particles.get_mut(particle)?.node = Some(id);
        trace!("collapsed node {:?} into leaf of particle {}", id, particle);
        Ok(())
    }

    fn evict(
        &mut self,
        particles: &mut ParticleStore,
        old_index: usize,
        evictions: &mut Vec<Eviction>,
    ) -> Result<(), TreeError> {
        if old_index < self.n_tree_fixed {
            let p = particles.get_mut(old_index)?;
            p.node = None;
            trace!("evicted fixed particle {}", old_index);
            evictions.push(Eviction {
                old_index,
                new_index: old_index,
                id: p.id,
            });
            return Ok(());
        }

        let mut evicted = particles.remove_and_compact(old_index)?;
        let last = particles.len();
        if old_index < last {
            // The former last particle now lives at old_index; its leaf must follow.
            match particles[old_index].node {
                Some(moved) => {
                    if let Some(node) = self.nodes.get_mut(moved.0) {
                        if node.kind == (NodeKind::Leaf { particle: last }) {
                            node.kind = NodeKind::Leaf { particle: old_index };
                        }
                    }
                }
                None => {
                    // An earlier eviction of this pass parked it at the end.
                    if let Some(earlier) = evictions.iter_mut().find(|e| e.new_index == last) {
                        earlier.new_index = old_index;
                    }
                }
            }
        }
        evicted.node = None;
        let id = evicted.id;
        let new_index = particles.push(evicted);
        trace!("evicted particle {} (now {})", old_index, new_index);
        evictions.push(Eviction {
            old_index,
            new_index,
            id,
        });
        Ok(())
    }
}
