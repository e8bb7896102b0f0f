use super::{NodeId, NodeKind, Quadrupole, Tree};
use crate::errors::TreeError;
use crate::particles::ParticleStore;

impl Tree {
    /// Recomputes mass, center of mass and, if enabled, the quadrupole tensor
    /// of every node in the locally owned root trees.
    ///
    /// Must run after [`Tree::update`] and the construction phase of the same step.
    ///
    /// ### Arguments
    ///
    /// * `particles` - The particle store the leaves point into.
    ///
    /// ### Returns
    ///
    /// `Ok(())` once every local node carries fresh moments. Remote mirrors
    /// keep the moments they were received with.
    pub fn update_moments(&mut self, particles: &ParticleStore) -> Result<(), TreeError> {
        for root_box in 0..self.grid.len() {
            if !self.is_local(root_box) {
                continue;
            }
            if let Some(root) = self.root(root_box) {
                self.update_moments_in_cell(particles, root)?;
            }
        }
        Ok(())
    }

    fn update_moments_in_cell(&mut self, particles: &ParticleStore, id: NodeId) -> Result<(), TreeError> {
        match self.nodes[id.0].kind {
            NodeKind::Leaf { particle } => {
                let p = particles.get(particle)?;
                let node = &mut self.nodes[id.0];
                node.m = p.m;
                node.mx = p.x;
                node.my = p.y;
                node.mz = p.z;
                // A point mass has no quadrupole of its own.
                node.quadrupole = Quadrupole::default();
            }
            NodeKind::Branch { .. } => {
                let children = self.nodes[id.0].children;
                let mut m = 0.0;
                let (mut mx, mut my, mut mz) = (0.0, 0.0, 0.0);
                for child in children.iter().flatten() {
                    self.update_moments_in_cell(particles, *child)?;
                    let d = &self.nodes[child.0];
                    mx += d.mx * d.m;
                    my += d.my * d.m;
                    mz += d.mz * d.m;
                    m += d.m;
                }
                if m > 0.0 {
                    mx /= m;
                    my /= m;
                    mz /= m;
                }

                let mut q = Quadrupole::default();
                if self.quadrupole {
                    // Parallel-axis shift of each child's tensor (Hernquist 1987).
                    for child in children.iter().flatten() {
                        let d = &self.nodes[child.0];
                        let qx = d.mx - mx;
                        let qy = d.my - my;
                        let qz = d.mz - mz;
                        let qr2 = qx * qx + qy * qy + qz * qz;
                        q.mxx += d.quadrupole.mxx + d.m * (3.0 * qx * qx - qr2);
                        q.mxy += d.quadrupole.mxy + d.m * 3.0 * qx * qy;
                        q.mxz += d.quadrupole.mxz + d.m * 3.0 * qx * qz;
                        q.myy += d.quadrupole.myy + d.m * (3.0 * qy * qy - qr2);
                        q.myz += d.quadrupole.myz + d.m * 3.0 * qy * qz;
                    }
                    q.mzz = -(q.mxx + q.myy);
                }

                let node = &mut self.nodes[id.0];
                node.m = m;
                node.mx = mx;
                node.my = my;
                node.mz = mz;
                node.quadrupole = q;
            }
        }
        Ok(())
    }
}
