use log::{trace, warn};

use super::{Node, NodeId, NodeKind, Tree};
use crate::errors::TreeError;
use crate::particles::ParticleStore;

impl Tree {
    /// Inserts particle `index` into the tree of its root box.
    ///
    /// Branch counts along the path are only raised once placement succeeded, so
    /// a failed insertion leaves the tree untouched.
    ///
    /// ### Arguments
    ///
    /// * `particles` - The particle store. The inserted particle and any leaf
    ///   occupant pushed down a level get their back-reference updated.
    /// * `index` - Index of the particle to insert.
    ///
    /// ### Returns
    ///
    /// The leaf now holding the particle, or `None` when the root box belongs
    /// to another compute node (the insertion is silently dropped).
    ///
    /// # Errors
    ///
    /// `ParticleOutOfRange` for an unknown index, `MaxDepthExceeded` if the particle
    /// cannot be separated from the leaf's occupant within `max_depth` levels.
    pub fn insert(
        &mut self,
        particles: &mut ParticleStore,
        index: usize,
    ) -> Result<Option<NodeId>, TreeError> {
        let (x, y, z, current) = {
            let p = particles.get(index)?;
            (p.x, p.y, p.z, p.node)
        };
        if let Some(id) = current {
            if self.holds(id, index) {
                return Ok(Some(id));
            }
        }
        self.ensure_roots();

        let root_box = self.grid.root_index_of(x, y, z);
        if !self.is_local(root_box) {
            trace!("particle {} belongs to remote root box {}, not inserted", index, root_box);
            return Ok(None);
        }

        let leaf = match self.root(root_box) {
            Some(root) => self.add_to_cell(particles, root, index, 0)?,
            None => {
                let (i, j, k) = self.grid.cell_of(x, y, z);
                let (cx, cy, cz) = self.grid.center(i, j, k);
                let id = self.alloc(Node::leaf(cx, cy, cz, self.grid.root_size, index));
                self.set_root(root_box, Some(id));
                particles[index].node = Some(id);
                id
            }
        };
        Ok(Some(leaf))
    }

    fn holds(&self, id: NodeId, index: usize) -> bool {
        matches!(
            self.nodes.get(id.0).map(|n| (n.kind, n.remote)),
            Some((NodeKind::Leaf { particle }, false)) if particle == index
        )
    }

    fn add_to_cell(
        &mut self,
        particles: &mut ParticleStore,
        id: NodeId,
        index: usize,
        depth: usize,
    ) -> Result<NodeId, TreeError> {
        match self.nodes[id.0].kind {
            NodeKind::Leaf { particle: existing } => {
                let node = &self.nodes[id.0];
                let (a, b) = (&particles[existing], &particles[index]);
                if !self.separates(node, (a.x, a.y, a.z), (b.x, b.y, b.z), depth) {
                    warn!(
                        "particles {} and {} coincide within {} levels, insertion refused",
                        index, existing, self.max_depth
                    );
                    return Err(TreeError::MaxDepthExceeded {
                        particle: index,
                        other: existing,
                        depth: self.max_depth,
                    });
                }
                self.nodes[id.0].kind = NodeKind::Branch { count: 2 };
                let o = self.nodes[id.0].octant_of(&particles[existing]);
                self.place_in_octant(particles, id, o, existing, depth)?;
                let o = self.nodes[id.0].octant_of(&particles[index]);
                self.place_in_octant(particles, id, o, index, depth)
            }
            NodeKind::Branch { .. } => {
                let o = self.nodes[id.0].octant_of(&particles[index]);
                let leaf = self.place_in_octant(particles, id, o, index, depth)?;
                if let NodeKind::Branch { count } = &mut self.nodes[id.0].kind {
                    *count += 1;
                }
                Ok(leaf)
            }
        }
    }

    fn place_in_octant(
        &mut self,
        particles: &mut ParticleStore,
        parent: NodeId,
        octant: usize,
        index: usize,
        depth: usize,
    ) -> Result<NodeId, TreeError> {
        match self.nodes[parent.0].children[octant] {
            Some(child) => self.add_to_cell(particles, child, index, depth + 1),
            None => {
                let (x, y, z, w) = self.nodes[parent.0].child_geometry(octant);
                let child = self.alloc(Node::leaf(x, y, z, w, index));
                self.nodes[parent.0].children[octant] = Some(child);
                particles[index].node = Some(child);
                Ok(child)
            }
        }
    }

    /// Whether splitting `node` (at `depth`) separates points `a` and `b` into
    /// different leaves without creating a level below `max_depth`.
    fn separates(&self, node: &Node, a: (f64, f64, f64), b: (f64, f64, f64), depth: usize) -> bool {
        let mut cell = Node::leaf(node.x, node.y, node.z, node.w, 0);
        let mut depth = depth;
        while depth < self.max_depth {
            let oa = cell.octant_of_point(a.0, a.1, a.2);
            if oa != cell.octant_of_point(b.0, b.1, b.2) {
                return true;
            }
            let (x, y, z, w) = cell.child_geometry(oa);
            cell = Node::leaf(x, y, z, w, 0);
            depth += 1;
        }
        false
    }
}
