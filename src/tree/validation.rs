use super::{NodeId, NodeKind, Tree};
use crate::errors::TreeError;
use crate::particles::ParticleStore;

impl Tree {
    /// Checks the structural invariants of every locally owned root tree.
    ///
    /// Holds after [`Tree::update`] followed by the construction phase:
    /// branch counts match an independent recount, no branch holds fewer than
    /// two particles, every leaf and its particle point at each other and every
    /// particle lies within its leaf.
    pub fn validate(&self, particles: &ParticleStore) -> Result<(), TreeError> {
        for (root_box, root) in self.roots() {
            if self.is_local(root_box) {
                self.validate_cell(particles, root)?;
            }
        }
        Ok(())
    }

    fn validate_cell(&self, particles: &ParticleStore, id: NodeId) -> Result<usize, TreeError> {
        let node = self
            .node(id)
            .ok_or_else(|| TreeError::InvariantViolation(format!("dangling node {:?}", id)))?;
        match node.kind {
            NodeKind::Leaf { particle } => {
                if node.occupied_children().next().is_some() {
                    return Err(TreeError::InvariantViolation(format!(
                        "leaf {:?} has children",
                        id
                    )));
                }
                let p = particles.get(particle)?;
                if p.node != Some(id) {
                    return Err(TreeError::InvariantViolation(format!(
                        "particle {} points at {:?} instead of leaf {:?}",
                        particle, p.node, id
                    )));
                }
                if !node.is_inside(p) {
                    return Err(TreeError::InvariantViolation(format!(
                        "particle {} lies outside leaf {:?}",
                        particle, id
                    )));
                }
                Ok(1)
            }
            NodeKind::Branch { count } => {
                let mut total = 0;
                for (_, child) in node.occupied_children() {
                    total += self.validate_cell(particles, child)?;
                }
                if total != count {
                    return Err(TreeError::InvariantViolation(format!(
                        "branch {:?} counts {} particles but holds {}",
                        id, count, total
                    )));
                }
                if count < 2 {
                    return Err(TreeError::InvariantViolation(format!(
                        "branch {:?} holds only {} particles",
                        id, count
                    )));
                }
                Ok(total)
            }
        }
    }
}
