use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::TreeConfig;
use crate::particles::{Particle, ParticleStore};
use crate::tree::{NodeId, NodeKind, Tree};

/// A single root box of width 1 centered on the origin.
pub fn unit_config() -> TreeConfig {
    TreeConfig::new(Some(1.0), Some((1, 1, 1)), None, None)
}

/// Builds a store where particle `i` has global id `i`.
pub fn store(positions: &[(f64, f64, f64)]) -> ParticleStore {
    ParticleStore::from_particles(
        positions
            .iter()
            .enumerate()
            .map(|(i, &(x, y, z))| Particle::new(x, y, z, 1.0).with_id(i as u64))
            .collect(),
    )
}

/// Uniformly distributed particles with random masses inside `config`'s domain.
pub fn random_store(config: &TreeConfig, n: usize, seed: u64) -> ParticleStore {
    let mut rng = StdRng::seed_from_u64(seed);
    let [bx, by, bz] = config.box_size;
    ParticleStore::from_particles(
        (0..n)
            .map(|i| {
                Particle::new(
                    rng.random_range(-bx / 2.0..bx / 2.0),
                    rng.random_range(-by / 2.0..by / 2.0),
                    rng.random_range(-bz / 2.0..bz / 2.0),
                    rng.random_range(0.5..2.0),
                )
                .with_id(i as u64)
            })
            .collect(),
    )
}

/// Inserts every particle of the store.
pub fn build(tree: &mut Tree, particles: &mut ParticleStore) {
    for i in 0..particles.len() {
        tree.insert(particles, i).expect("insert");
    }
}

/// Pre-order snapshot of every root tree: id, kind and children of each node.
pub fn structure(tree: &Tree) -> Vec<(NodeId, NodeKind, [Option<NodeId>; 8])> {
    let mut out = Vec::new();
    for (_, root) in tree.roots() {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = tree.node(id).expect("live node");
            out.push((id, node.kind, node.children));
            stack.extend(node.children.iter().flatten());
        }
    }
    out
}

/// Number of particles below `id`, counted leaf by leaf.
pub fn count_leaves(tree: &Tree, id: NodeId) -> usize {
    let node = tree.node(id).expect("live node");
    match node.kind {
        NodeKind::Leaf { .. } => 1,
        NodeKind::Branch { .. } => node
            .occupied_children()
            .map(|(_, child)| count_leaves(tree, child))
            .sum(),
    }
}
