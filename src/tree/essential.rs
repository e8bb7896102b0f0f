use log::{debug, trace};

use super::{Node, NodeId, NodeKind, Quadrupole, Tree};
use crate::errors::TreeError;

/// Which compute node owns each root box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownership {
    rank: usize,
    owners: Vec<usize>,
}

impl Ownership {
    /// Splits `n_root` root boxes into contiguous blocks of `n_root / n_ranks`,
    /// the last rank taking any remainder.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_gravity_tree::tree::Ownership;
    ///
    /// let ownership = Ownership::contiguous(5, 2, 1).expect("valid partition");
    /// assert_eq!(ownership.owner_of(1), Some(0));
    /// assert_eq!(ownership.owner_of(2), Some(1));
    /// assert_eq!(ownership.owner_of(4), Some(1));
    /// assert!(ownership.is_local(3));
    /// ```
    pub fn contiguous(n_root: usize, n_ranks: usize, rank: usize) -> Result<Self, TreeError> {
        if n_ranks == 0 || rank >= n_ranks {
            return Err(TreeError::InvalidConfig(format!(
                "Rank {} is not part of a run with {} ranks",
                rank, n_ranks
            )));
        }
        if n_root < n_ranks {
            return Err(TreeError::InvalidConfig(format!(
                "{} root boxes cannot be shared by {} ranks",
                n_root, n_ranks
            )));
        }
        let per_rank = n_root / n_ranks;
        let owners = (0..n_root).map(|i| (i / per_rank).min(n_ranks - 1)).collect();
        Ok(Self { rank, owners })
    }

    /// Uses an explicit `root box -> rank` map.
    pub fn from_owners(rank: usize, owners: Vec<usize>) -> Self {
        Self { rank, owners }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn owner_of(&self, root_box: usize) -> Option<usize> {
        self.owners.get(root_box).copied()
    }

    pub fn is_local(&self, root_box: usize) -> bool {
        self.owner_of(root_box) == Some(self.rank)
    }
}

/// What the essential tree is being exchanged for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EssentialPurpose {
    Gravity,
    Collisions,
}

/// The transmitted form of a node: geometry, occupancy tag and moments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EssentialNode {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
    /// Particle index on the sender for leaves, minus the subtree count for branches.
    pub tag: i64,
    pub m: f64,
    pub mx: f64,
    pub my: f64,
    pub mz: f64,
    pub quadrupole: Quadrupole,
}

impl EssentialNode {
    pub fn from_node(node: &Node) -> Self {
        Self {
            x: node.x,
            y: node.y,
            z: node.z,
            w: node.w,
            tag: node.kind.tag(),
            m: node.m,
            mx: node.mx,
            my: node.my,
            mz: node.mz,
            quadrupole: node.quadrupole,
        }
    }

    fn into_node(self) -> Node {
        Node {
            x: self.x,
            y: self.y,
            z: self.z,
            w: self.w,
            m: self.m,
            mx: self.mx,
            my: self.my,
            mz: self.mz,
            quadrupole: self.quadrupole,
            children: [None; 8],
            kind: NodeKind::from_tag(self.tag),
            remote: true,
        }
    }
}

/// Moves essential trees between compute nodes.
///
/// Which nodes of a root tree are worth sending to which destination is the
/// transport's decision; [`Tree::export_subtree`] produces them in an order
/// the receiver can graft.
pub trait EssentialTreeTransport {
    /// Hands a locally owned root tree over for outbound distribution.
    fn send_root(
        &mut self,
        purpose: EssentialPurpose,
        root_box: usize,
        tree: &Tree,
        root: NodeId,
    ) -> Result<(), TreeError>;

    /// Returns the nodes received from other compute nodes, parents before children.
    fn receive(&mut self, purpose: EssentialPurpose) -> Result<Vec<EssentialNode>, TreeError>;
}

// Relative tolerance for matching received geometry against local cells.
const GEOMETRY_TOLERANCE: f64 = 1e-9;

impl Tree {
    /// Sends every locally owned root tree to the transport and drops all
    /// remote root boxes, so that fresh mirrors can be received.
    pub fn prepare_essential_tree<T: EssentialTreeTransport>(
        &mut self,
        purpose: EssentialPurpose,
        transport: &mut T,
    ) -> Result<(), TreeError> {
        if self.ownership.is_none() {
            return Err(TreeError::NotDistributed);
        }
        self.ensure_roots();
        let mut dropped = 0;
        for root_box in 0..self.grid.len() {
            let Some(root) = self.root(root_box) else {
                continue;
            };
            if self.is_local(root_box) {
                transport.send_root(purpose, root_box, self, root)?;
            } else {
                self.set_root(root_box, None);
                dropped += self.free_subtree(root);
            }
        }
        debug!("prepared essential tree for {:?}, dropped {} remote nodes", purpose, dropped);
        Ok(())
    }

    /// Grafts every node the transport delivers. Returns the number of nodes added.
    pub fn receive_essential_tree<T: EssentialTreeTransport>(
        &mut self,
        purpose: EssentialPurpose,
        transport: &mut T,
    ) -> Result<usize, TreeError> {
        let received = transport.receive(purpose)?;
        let n = received.len();
        for node in received {
            self.add_essential_node(node)?;
        }
        debug!("received {} essential nodes for {:?}", n, purpose);
        Ok(n)
    }

    /// Grafts a received node into the mirror of its (remote) root box.
    ///
    /// The walk starts at the root box containing the node's center and
    /// descends by octant until it reaches an empty slot. Contents are never
    /// merged; the sender must transmit parents before children.
    ///
    /// ### Arguments
    ///
    /// * `received` - A node produced by [`Tree::export_subtree`] on the owning
    ///   compute node.
    ///
    /// ### Returns
    ///
    /// The id of the grafted node, marked `remote`.
    ///
    /// # Errors
    ///
    /// `TopologyViolation` when the node falls into a locally owned root box,
    /// starts an empty root box without being a root cell, is not smaller
    /// than a cell on its path, or does not match the child cell it lands in.
    pub fn add_essential_node(&mut self, received: EssentialNode) -> Result<NodeId, TreeError> {
        if self.ownership.is_none() {
            return Err(TreeError::NotDistributed);
        }
        self.ensure_roots();
        let root_box = self.grid.root_index_of(received.x, received.y, received.z);
        if self.is_local(root_box) {
            return Err(TreeError::TopologyViolation(format!(
                "received node at ({}, {}, {}) lies in locally owned root box {}",
                received.x, received.y, received.z, root_box
            )));
        }

        let Some(mut current) = self.root(root_box) else {
            let (cx, cy, cz) = self.grid.center_of_index(root_box);
            let root = Node::leaf(cx, cy, cz, self.grid.root_size, 0);
            if !matches_cell(&received, &root) {
                return Err(TreeError::TopologyViolation(format!(
                    "first node of root box {} is not its root cell (w = {})",
                    root_box, received.w
                )));
            }
            let id = self.alloc(received.into_node());
            self.set_root(root_box, Some(id));
            trace!("essential root {:?} for root box {}", id, root_box);
            return Ok(id);
        };

        let incoming = received.into_node();
        loop {
            let node = &self.nodes[current.0];
            if incoming.w >= node.w {
                return Err(TreeError::TopologyViolation(format!(
                    "received node of width {} does not fit below a cell of width {}",
                    incoming.w, node.w
                )));
            }
            let o = node.octant_of_node(&incoming);
            let slot = node.children[o];
            match slot {
                Some(next) => current = next,
                None => {
                    let (x, y, z, w) = node.child_geometry(o);
                    if !matches_cell(&received, &Node::leaf(x, y, z, w, 0)) {
                        return Err(TreeError::TopologyViolation(format!(
                            "received node at ({}, {}, {}) with width {} skips levels below {:?}",
                            received.x, received.y, received.z, received.w, current
                        )));
                    }
                    let id = self.alloc(incoming);
                    self.nodes[current.0].children[o] = Some(id);
                    trace!("grafted essential node {:?} under {:?} in octant {}", id, current, o);
                    return Ok(id);
                }
            }
        }
    }

    /// Collects `root` and its descendants in pre-order.
    ///
    /// `descend` decides, per node, whether its children are included too; an
    /// opening-angle criterion is the usual choice.
    pub fn export_subtree<F>(&self, root: NodeId, mut descend: F) -> Vec<EssentialNode>
    where
        F: FnMut(&Node) -> bool,
    {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id.0) else {
                continue;
            };
            out.push(EssentialNode::from_node(node));
            if descend(node) {
                stack.extend(node.children.iter().rev().flatten());
            }
        }
        out
    }
}

fn matches_cell(received: &EssentialNode, cell: &Node) -> bool {
    let tol = cell.w * GEOMETRY_TOLERANCE;
    (received.w - cell.w).abs() <= tol
        && (received.x - cell.x).abs() <= tol
        && (received.y - cell.y).abs() <= tol
        && (received.z - cell.z).abs() <= tol
}
