use crate::errors::TreeError;
use crate::tree::NodeId;

/// A point mass tracked by the tree.
///
/// The tree never owns particles. It reads their position and mass and keeps
/// `node` pointing at the leaf that currently holds the particle.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    /// Particle's mass.
    pub m: f64,
    /// Simulation-global identifier, stable across index changes.
    pub id: u64,
    /// Leaf currently holding this particle, `None` while it is outside the tree.
    pub node: Option<NodeId>,
}

impl Particle {
    /// Creates a particle at rest.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_gravity_tree::particles::Particle;
    ///
    /// let p = Particle::new(0.1, -0.2, 0.3, 2.0);
    /// assert_eq!(p.m, 2.0);
    /// assert!(p.node.is_none());
    /// ```
    pub fn new(x: f64, y: f64, z: f64, m: f64) -> Self {
        Self {
            x,
            y,
            z,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            m,
            id: 0,
            node: None,
        }
    }

    pub fn with_velocity(mut self, vx: f64, vy: f64, vz: f64) -> Self {
        self.vx = vx;
        self.vy = vy;
        self.vz = vz;
        self
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Drifts the particle along its velocity.
    pub fn drift(&mut self, dt: f64) {
        self.x += self.vx * dt;
        self.y += self.vy * dt;
        self.z += self.vz * dt;
    }
}

/// Indexable particle array with the compaction rules the tree relies on.
#[derive(Debug, Clone, Default)]
pub struct ParticleStore {
    particles: Vec<Particle>,
}

impl ParticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_particles(particles: Vec<Particle>) -> Self {
        Self { particles }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Particle, TreeError> {
        let len = self.particles.len();
        self.particles
            .get(index)
            .ok_or(TreeError::ParticleOutOfRange { index, len })
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut Particle, TreeError> {
        let len = self.particles.len();
        self.particles
            .get_mut(index)
            .ok_or(TreeError::ParticleOutOfRange { index, len })
    }

    /// Appends a particle and returns its index.
    pub fn push(&mut self, particle: Particle) -> usize {
        self.particles.push(particle);
        self.particles.len() - 1
    }

    /// Removes the particle at `index` by moving the last particle into its slot.
    ///
    /// The moved particle keeps its back-reference; callers holding a tree must
    /// re-point that leaf at `index`.
    pub fn remove_and_compact(&mut self, index: usize) -> Result<Particle, TreeError> {
        let len = self.particles.len();
        if index >= len {
            return Err(TreeError::ParticleOutOfRange { index, len });
        }
        Ok(self.particles.swap_remove(index))
    }

    /// Looks up the current index of the particle with the given global id.
    pub fn index_of_id(&self, id: u64) -> Option<usize> {
        self.particles.iter().position(|p| p.id == id)
    }

    /// Indices of particles that currently have no leaf.
    pub fn detached(&self) -> Vec<usize> {
        self.particles
            .iter()
            .enumerate()
            .filter(|(_, p)| p.node.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn total_mass(&self) -> f64 {
        self.particles.iter().map(|p| p.m).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Particle> {
        self.particles.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Particle> {
        self.particles.iter_mut()
    }

    pub fn as_slice(&self) -> &[Particle] {
        &self.particles
    }
}

impl std::ops::Index<usize> for ParticleStore {
    type Output = Particle;

    fn index(&self, index: usize) -> &Particle {
        &self.particles[index]
    }
}

impl std::ops::IndexMut<usize> for ParticleStore {
    fn index_mut(&mut self, index: usize) -> &mut Particle {
        &mut self.particles[index]
    }
}
