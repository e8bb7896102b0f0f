use thiserror::Error;

/// Represents errors that can occur while building, maintaining or exchanging trees.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    /// The root grid or a tree limit is not usable (e.g. zero root boxes).
    #[error("Invalid tree configuration: {0}")]
    InvalidConfig(String),
    /// A particle index does not exist in the particle store.
    #[error("Particle index {index} out of range (store holds {len} particles)")]
    ParticleOutOfRange { index: usize, len: usize },
    /// A particle was added outside the simulation domain.
    #[error("Particle at ({x}, {y}, {z}) lies outside the domain")]
    OutsideDomain { x: f64, y: f64, z: f64 },
    /// Two particles could not be separated within the configured depth limit.
    ///
    /// This happens for coincident (or nearly coincident) positions. The tree is
    /// left unchanged and `particle` stays outside of it.
    #[error("Particles {particle} and {other} do not separate within {depth} levels")]
    MaxDepthExceeded {
        particle: usize,
        other: usize,
        depth: usize,
    },
    /// A received essential node does not fit the local tree geometry.
    #[error("Essential tree topology violation: {0}")]
    TopologyViolation(String),
    /// An essential tree operation was requested on a tree without an ownership map.
    #[error("Tree is not configured for distributed execution")]
    NotDistributed,
    /// A structural invariant does not hold.
    #[error("Tree invariant violated: {0}")]
    InvariantViolation(String),
    /// The transport collaborator failed to send or deliver a subtree.
    #[error("Transport error: {0}")]
    Transport(String),
}
