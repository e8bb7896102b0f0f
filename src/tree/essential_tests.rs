use approx::assert_relative_eq;

use crate::config::TreeConfig;
use crate::errors::TreeError;
use crate::particles::ParticleStore;
use crate::tree::test_utils::{build, store};
use crate::tree::{
    EssentialNode, EssentialPurpose, EssentialTreeTransport, NodeId, NodeKind, Ownership,
    Quadrupole, Tree,
};

/// Records outbound root trees and hands out a preloaded inbox.
#[derive(Default)]
struct MailboxTransport {
    sent: Vec<(EssentialPurpose, usize, Vec<EssentialNode>)>,
    inbox: Vec<EssentialNode>,
}

impl EssentialTreeTransport for MailboxTransport {
    fn send_root(
        &mut self,
        purpose: EssentialPurpose,
        root_box: usize,
        tree: &Tree,
        root: NodeId,
    ) -> Result<(), TreeError> {
        self.sent.push((purpose, root_box, tree.export_subtree(root, |_| true)));
        Ok(())
    }

    fn receive(&mut self, _purpose: EssentialPurpose) -> Result<Vec<EssentialNode>, TreeError> {
        Ok(std::mem::take(&mut self.inbox))
    }
}

/// Two root boxes side by side along x: box 0 spans x < 0, box 1 spans x > 0.
fn pair_config() -> TreeConfig {
    TreeConfig::new(Some(1.0), Some((2, 1, 1)), None, Some(true))
}

fn rank_tree(rank: usize) -> Tree {
    let config = pair_config();
    let ownership = Ownership::contiguous(config.root_n(), 2, rank).expect("ownership");
    Tree::distributed(&config, ownership).expect("tree")
}

fn rank_zero_state() -> (Tree, ParticleStore) {
    let mut tree = rank_tree(0);
    let mut particles = store(&[
        (-0.7, 0.2, 0.1),
        (-0.3, -0.2, 0.3),
        (-0.6, 0.3, -0.4),
        (-0.2, 0.1, -0.1),
    ]);
    build(&mut tree, &mut particles);
    tree.update_moments(&particles).expect("moments");
    (tree, particles)
}

fn cell(x: f64, y: f64, z: f64, w: f64) -> EssentialNode {
    EssentialNode {
        x,
        y,
        z,
        w,
        tag: 0,
        m: 1.0,
        mx: x,
        my: y,
        mz: z,
        quadrupole: Quadrupole::default(),
    }
}

#[test]
fn test_contiguous_ownership() {
    let ownership = Ownership::contiguous(4, 2, 0).expect("ownership");
    assert_eq!(ownership.len(), 4);
    assert!(ownership.is_local(0) && ownership.is_local(1));
    assert!(!ownership.is_local(2) && !ownership.is_local(3));
    assert_eq!(ownership.owner_of(4), None);

    let uneven = Ownership::contiguous(7, 3, 2).expect("ownership");
    let owners: Vec<_> = (0..7).filter_map(|i| uneven.owner_of(i)).collect();
    assert_eq!(owners, vec![0, 0, 1, 1, 2, 2, 2]);
}

#[test]
fn test_invalid_ownership_is_rejected() {
    assert!(matches!(Ownership::contiguous(4, 0, 0), Err(TreeError::InvalidConfig(_))));
    assert!(matches!(Ownership::contiguous(4, 2, 2), Err(TreeError::InvalidConfig(_))));
    assert!(matches!(Ownership::contiguous(1, 2, 0), Err(TreeError::InvalidConfig(_))));

    let config = pair_config();
    let short = Ownership::from_owners(0, vec![0]);
    assert!(matches!(Tree::distributed(&config, short), Err(TreeError::InvalidConfig(_))));
}

#[test]
fn test_remote_root_box_is_not_built() {
    let mut tree = rank_tree(1);
    let mut particles = store(&[(-0.5, 0.0, 0.0), (0.5, 0.0, 0.0)]);
    assert_eq!(tree.insert(&mut particles, 0).expect("insert"), None);
    assert!(tree.insert(&mut particles, 1).expect("insert").is_some());
    assert_eq!(tree.root(0), None);
    assert_eq!(tree.particle_count(), 1);
    assert_eq!(particles[0].node, None);
}

#[test]
fn test_export_is_pre_order() {
    let mut tree = Tree::new(&TreeConfig::default()).expect("tree");
    let mut particles = store(&[(0.2, 0.2, 0.2), (-0.2, -0.2, -0.2)]);
    build(&mut tree, &mut particles);
    let root = tree.root(0).expect("root");

    let all = tree.export_subtree(root, |_| true);
    let tags: Vec<_> = all.iter().map(|n| n.tag).collect();
    assert_eq!(tags, vec![-2, 0, 1]);
    assert_eq!((all[1].x, all[1].w), (0.25, 0.5));
    assert_eq!((all[2].x, all[2].w), (-0.25, 0.5));

    let top = tree.export_subtree(root, |_| false);
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].tag, -2);
}

#[test]
fn test_exchange_builds_identical_mirror() {
    let (mut sender, particles) = rank_zero_state();
    let mut outbound = MailboxTransport::default();
    sender
        .prepare_essential_tree(EssentialPurpose::Gravity, &mut outbound)
        .expect("prepare");

    assert_eq!(outbound.sent.len(), 1);
    let (purpose, root_box, nodes) = outbound.sent.remove(0);
    assert_eq!((purpose, root_box), (EssentialPurpose::Gravity, 0));
    assert_eq!(nodes.len(), sender.node_count());

    let mut receiver = rank_tree(1);
    let mut inbound = MailboxTransport {
        inbox: nodes,
        ..Default::default()
    };
    let received = receiver
        .receive_essential_tree(EssentialPurpose::Gravity, &mut inbound)
        .expect("receive");
    assert_eq!(received, sender.node_count());
    assert_eq!(receiver.node_count(), sender.node_count());

    let local = sender.root(0).and_then(|id| sender.node(id)).expect("local root");
    let mirror = receiver.root(0).and_then(|id| receiver.node(id)).expect("mirror root");
    assert!(mirror.remote);
    assert_eq!(mirror.kind, NodeKind::Branch { count: 4 });
    assert_relative_eq!(mirror.m, particles.total_mass());
    assert_relative_eq!(mirror.mx, local.mx);
    assert_eq!(mirror.quadrupole, local.quadrupole);

    let mut stack = vec![receiver.root(0).expect("mirror root")];
    while let Some(id) = stack.pop() {
        let node = receiver.node(id).expect("live node");
        assert!(node.remote);
        stack.extend(node.children.iter().flatten());
    }
    // Mirrors are not part of the local particle count.
    assert_eq!(receiver.particle_count(), 0);
}

#[test]
fn test_maintenance_leaves_mirror_alone() {
    let (mut sender, _) = rank_zero_state();
    let mut outbound = MailboxTransport::default();
    sender
        .prepare_essential_tree(EssentialPurpose::Collisions, &mut outbound)
        .expect("prepare");

    let mut receiver = rank_tree(1);
    let mut particles = store(&[(0.3, 0.1, 0.1), (0.7, -0.1, -0.2)]);
    build(&mut receiver, &mut particles);
    let mut inbound = MailboxTransport {
        inbox: outbound.sent.remove(0).2,
        ..Default::default()
    };
    receiver
        .receive_essential_tree(EssentialPurpose::Collisions, &mut inbound)
        .expect("receive");
    let before = receiver.node_count();

    assert!(receiver.update(&mut particles).expect("update").is_empty());
    receiver.update_moments(&particles).expect("moments");
    receiver.validate(&particles).expect("valid");
    assert_eq!(receiver.node_count(), before);
    assert_eq!(receiver.particle_count(), 2);
}

#[test]
fn test_prepare_drops_stale_mirror() {
    let (mut sender, _) = rank_zero_state();
    let mut outbound = MailboxTransport::default();
    sender
        .prepare_essential_tree(EssentialPurpose::Gravity, &mut outbound)
        .expect("prepare");

    let mut receiver = rank_tree(1);
    let mut inbound = MailboxTransport {
        inbox: outbound.sent.remove(0).2,
        ..Default::default()
    };
    receiver
        .receive_essential_tree(EssentialPurpose::Gravity, &mut inbound)
        .expect("receive");
    assert!(receiver.root(0).is_some());

    let mut next = MailboxTransport::default();
    receiver
        .prepare_essential_tree(EssentialPurpose::Gravity, &mut next)
        .expect("prepare");
    assert_eq!(receiver.root(0), None);
    assert_eq!(receiver.node_count(), 0);
    // Nothing local to send.
    assert!(next.sent.is_empty());
}

#[test]
fn test_node_in_owned_root_box_is_rejected() {
    let mut tree = rank_tree(1);
    let result = tree.add_essential_node(cell(0.5, 0.0, 0.0, 1.0));
    assert!(matches!(result, Err(TreeError::TopologyViolation(_))));
    assert_eq!(tree.node_count(), 0);
}

#[test]
fn test_first_node_must_be_root_cell() {
    let mut tree = rank_tree(1);
    let result = tree.add_essential_node(cell(-0.75, 0.25, 0.25, 0.5));
    assert!(matches!(result, Err(TreeError::TopologyViolation(_))));
    assert_eq!(tree.root(0), None);
}

#[test]
fn test_oversized_or_misplaced_nodes_are_rejected() {
    let mut tree = rank_tree(1);
    let root = tree.add_essential_node(cell(-0.5, 0.0, 0.0, 1.0)).expect("root cell");
    assert_eq!(tree.root(0), Some(root));

    let same_width = tree.add_essential_node(cell(-0.5, 0.0, 0.0, 1.0));
    assert!(matches!(same_width, Err(TreeError::TopologyViolation(_))));

    // Would skip the level of width 0.5.
    let skipping = tree.add_essential_node(cell(-0.875, -0.375, -0.375, 0.25));
    assert!(matches!(skipping, Err(TreeError::TopologyViolation(_))));

    let child = tree.add_essential_node(cell(-0.75, -0.25, -0.25, 0.5)).expect("child cell");
    assert_eq!(tree.node(root).map(|n| n.children[7]), Some(Some(child)));
    let grandchild = tree
        .add_essential_node(cell(-0.875, -0.375, -0.375, 0.25))
        .expect("grandchild cell");
    assert_eq!(tree.node(child).map(|n| n.children[7]), Some(Some(grandchild)));
    assert_eq!(tree.node_count(), 3);
}

#[test]
fn test_single_process_tree_has_no_essential_tree() {
    let mut tree = Tree::new(&pair_config()).expect("tree");
    let mut transport = MailboxTransport::default();
    assert_eq!(
        tree.prepare_essential_tree(EssentialPurpose::Gravity, &mut transport),
        Err(TreeError::NotDistributed)
    );
    assert_eq!(
        tree.add_essential_node(cell(-0.5, 0.0, 0.0, 1.0)),
        Err(TreeError::NotDistributed)
    );
}
