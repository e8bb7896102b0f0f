//! Adaptive octree forest for N-body gravity.
//!
//! The crate maintains one octree per periodic root box, repairs it every
//! timestep as particles move, aggregates monopole and quadrupole moments for
//! a force evaluator, and exchanges essential trees between compute nodes.
pub mod config;
pub mod errors;
pub mod particles;
pub mod simulation;
pub mod tree;

pub use config::TreeConfig;
pub use errors::TreeError;
pub use simulation::{StepReport, TreeSimulation};
