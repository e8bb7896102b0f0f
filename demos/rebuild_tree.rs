// demos/rebuild_tree.rs

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rs_gravity_tree::particles::Particle;
use rs_gravity_tree::{TreeConfig, TreeError, TreeSimulation};

fn main() -> Result<(), TreeError> {
    env_logger::init();

    let config = TreeConfig::new(Some(0.5), Some((2, 2, 2)), None, Some(true));
    let mut sim = TreeSimulation::new(config.clone())?;
    let mut rng = StdRng::seed_from_u64(42);
    let [bx, by, bz] = config.box_size;

    for _ in 0..2_000 {
        let particle = Particle::new(
            rng.random_range(-bx / 2.0..bx / 2.0),
            rng.random_range(-by / 2.0..by / 2.0),
            rng.random_range(-bz / 2.0..bz / 2.0),
            rng.random_range(0.1..1.0),
        )
        .with_velocity(
            rng.random_range(-0.5..0.5),
            rng.random_range(-0.5..0.5),
            rng.random_range(-0.5..0.5),
        );
        sim.add(particle)?;
    }
    sim.update_tree()?;
    println!(
        "Initial tree: {} particles, {} nodes",
        sim.tree.particle_count(),
        sim.tree.node_count()
    );

    for step in 1..=20 {
        sim.drift(0.01);
        let report = sim.update_tree()?;
        sim.tree.validate(&sim.particles)?;
        info!(
            "step {}: {} evicted, {} reinserted, {} nodes",
            step,
            report.evictions.len(),
            report.inserted,
            report.nodes
        );
    }

    let mass: f64 = sim
        .tree
        .roots()
        .filter_map(|(_, id)| sim.tree.node(id))
        .map(|n| n.m)
        .sum();
    println!("Mass in tree: {:.6} (particles: {:.6})", mass, sim.particles.total_mass());

    if let Some(root) = sim.tree.root(0).and_then(|id| sim.tree.node(id)) {
        let q = root.quadrupole;
        println!(
            "Root box 0: m={:.4}, com=({:.4}, {:.4}, {:.4}), trace={:e}",
            root.m,
            root.mx,
            root.my,
            root.mz,
            q.trace()
        );
    }
    Ok(())
}
