use crate::particles::Particle;

/// Index of a node in the tree's arena.
///
/// Ids of freed nodes are reused, so an id held across a maintenance pass
/// must be re-resolved through the particle's back-reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Occupancy of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Holds exactly one particle.
    Leaf { particle: usize },
    /// Holds `count` particles in its subtree, never stored directly.
    Branch { count: usize },
}

impl NodeKind {
    /// Number of particles this node accounts for.
    pub fn occupancy(&self) -> usize {
        match *self {
            NodeKind::Leaf { .. } => 1,
            NodeKind::Branch { count } => count,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, NodeKind::Leaf { .. })
    }

    /// The signed occupancy tag: the particle index for leaves, minus the
    /// subtree count for branches.
    pub fn tag(&self) -> i64 {
        match *self {
            NodeKind::Leaf { particle } => particle as i64,
            NodeKind::Branch { count } => -(count as i64),
        }
    }

    /// Inverse of [`NodeKind::tag`]. A tag of zero is a leaf holding particle 0.
    pub fn from_tag(tag: i64) -> Self {
        if tag >= 0 {
            NodeKind::Leaf { particle: tag as usize }
        } else {
            NodeKind::Branch { count: tag.unsigned_abs() as usize }
        }
    }
}

/// Independent components of the traceless mass quadrupole tensor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Quadrupole {
    pub mxx: f64,
    pub mxy: f64,
    pub mxz: f64,
    pub myy: f64,
    pub myz: f64,
    /// Always `-(mxx + myy)`.
    pub mzz: f64,
}

impl Quadrupole {
    pub fn trace(&self) -> f64 {
        self.mxx + self.myy + self.mzz
    }
}

/// A cubic cell of the octree.
#[derive(Clone, Debug)]
pub struct Node {
    /// Geometric center.
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Full width of the cell.
    pub w: f64,
    /// Total mass.
    pub m: f64,
    /// Center of mass.
    pub mx: f64,
    pub my: f64,
    pub mz: f64,
    pub quadrupole: Quadrupole,
    pub children: [Option<NodeId>; 8],
    pub kind: NodeKind,
    /// Mirrors a node owned by another compute node.
    pub remote: bool,
}

impl Node {
    /// Creates a leaf without moments.
    pub fn leaf(x: f64, y: f64, z: f64, w: f64, particle: usize) -> Self {
        Self {
            x,
            y,
            z,
            w,
            m: 0.0,
            mx: 0.0,
            my: 0.0,
            mz: 0.0,
            quadrupole: Quadrupole::default(),
            children: [None; 8],
            kind: NodeKind::Leaf { particle },
            remote: false,
        }
    }

    /// Geometry of the child cell in `octant`.
    ///
    /// A set bit places the child on the negative side of this node's center.
    pub fn child_geometry(&self, octant: usize) -> (f64, f64, f64, f64) {
        let w = self.w / 2.0;
        let offset = |bit: usize| if (octant >> bit) & 1 == 0 { w / 2.0 } else { -w / 2.0 };
        (self.x + offset(0), self.y + offset(1), self.z + offset(2), w)
    }

    /// Octant of the point `(x, y, z)` relative to this node's center.
    #[inline]
    pub fn octant_of_point(&self, x: f64, y: f64, z: f64) -> usize {
        let mut octant = 0;
        if x < self.x {
            octant += 1;
        }
        if y < self.y {
            octant += 2;
        }
        if z < self.z {
            octant += 4;
        }
        octant
    }

    /// Octant of `particle` relative to this node's center.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_gravity_tree::particles::Particle;
    /// use rs_gravity_tree::tree::Node;
    ///
    /// let node = Node::leaf(0.0, 0.0, 0.0, 1.0, 0);
    /// assert_eq!(node.octant_of(&Particle::new(0.1, 0.1, 0.1, 1.0)), 0);
    /// assert_eq!(node.octant_of(&Particle::new(-0.1, -0.1, -0.1, 1.0)), 7);
    /// // Boundaries fall on the positive side.
    /// assert_eq!(node.octant_of(&Particle::new(0.0, -0.1, 0.0, 1.0)), 2);
    /// ```
    #[inline]
    pub fn octant_of(&self, particle: &Particle) -> usize {
        self.octant_of_point(particle.x, particle.y, particle.z)
    }

    /// Octant of another node's center relative to this node's center.
    #[inline]
    pub fn octant_of_node(&self, other: &Node) -> usize {
        self.octant_of_point(other.x, other.y, other.z)
    }

    /// True if `particle` lies within this cell, bounds included.
    #[inline]
    pub fn is_inside(&self, particle: &Particle) -> bool {
        let half = self.w / 2.0;
        (particle.x - self.x).abs() <= half
            && (particle.y - self.y).abs() <= half
            && (particle.z - self.z).abs() <= half
    }

    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }

    /// Iterates over `(octant, child)` for every occupied slot.
    pub fn occupied_children(&self) -> impl Iterator<Item = (usize, NodeId)> + '_ {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(o, c)| c.map(|id| (o, id)))
    }
}
