//! End-to-end scenarios: whole simulations driven through the public
//! surface, with fixed seeds for reproducibility.

use crate::geometry::Position;
use crate::protocol::node::{Node, NodeState};
use crate::sim::harness::Simulator;
use crate::SimConfig;

fn config() -> SimConfig {
    SimConfig::new()
        .with_packet_size(64)
        .with_time_interval(1.0)
        .with_app_traffic(1e9, 10.0)
        .with_seed(1)
}

fn node_at(addr: u32, x: f64, energy: f64) -> Node {
    Node::new(addr, Position::new(x, 0.0, 0.0), energy, false)
}

fn sink_at(addr: u32, x: f64) -> Node {
    Node::new(addr, Position::new(x, 0.0, 0.0), 100.0, true)
}

/// A sink and one in-range node converge to a two-node cluster: the sink
/// elects itself head, the node joins it as a member.
#[test]
fn sink_and_neighbor_form_a_cluster() {
    let mut sim = Simulator::new(config()).unwrap();
    sim.add_node(sink_at(1, 0.0)).unwrap();
    sim.add_node(node_at(2, 10.0, 100.0)).unwrap();

    // Three protocol rounds of two slots each.
    sim.run(6.0).unwrap();

    let sink = sim.node(1).unwrap();
    assert_eq!(sink.state(), NodeState::ClusterHead);
    assert_eq!(sink.hops_to_sink(), Some(0));

    let member = sim.node(2).unwrap();
    assert_eq!(member.state(), NodeState::ClusterMember);
    assert_eq!(member.next_hop(), Some(1));
    assert_eq!(member.optical_neighbor_count(), 1);
    assert_eq!(member.reachable_estimate(), 1);
}

/// A member delivers periodic application traffic to the sink over the
/// optical link, one hop away.
#[test]
fn member_delivers_application_traffic_to_the_sink() {
    let config = config().with_app_traffic(12.0, 4.0).with_seed(42);
    let mut sim = Simulator::new(config).unwrap();
    sim.add_node(sink_at(1, 0.0)).unwrap();
    sim.add_node(node_at(2, 10.0, 100.0)).unwrap();

    sim.run(30.0).unwrap();

    let sink = sim.node(1).unwrap();
    assert!(sink.data_received() >= 1);
    assert_eq!(sink.avg_num_hops(), 1.0);
    assert_eq!(sink.max_num_hops(), 1);
    assert!(sink.avg_latency() > 0.0);
    assert!(sink.max_latency() < 30.0);

    let member = sim.node(2).unwrap();
    assert_eq!(member.data_sent(), sink.data_received());
    assert_eq!(member.msgs_lost(), 0);
    assert!(sim.stats().optical_transmissions >= 2 * sink.data_received());
}

/// A node whose energy runs out mid-run goes quiet: its energy pins at
/// zero and nothing more of its traffic reaches the sink.
#[test]
fn depleted_node_goes_quiet() {
    let mut sim = Simulator::new(config()).unwrap();
    sim.add_node(sink_at(1, 0.0)).unwrap();
    // Enough energy for roughly one acoustic announcement.
    sim.add_node(node_at(2, 10.0, 0.06)).unwrap();

    sim.run(10.0).unwrap();

    let node = sim.node(2).unwrap();
    assert_eq!(node.energy(), 0.0);
    assert_eq!(node.data_sent(), 0);
    assert_eq!(sim.node(1).unwrap().data_received(), 0);
    assert_eq!(sim.time(), 10.0);

    // Further runs change nothing for the dead node.
    let before = sim.node(2).unwrap().round();
    sim.run(4.0).unwrap();
    assert_eq!(sim.node(2).unwrap().round(), before);
}

/// Nodes beyond acoustic range never learn about each other.
#[test]
fn out_of_range_nodes_stay_strangers() {
    let mut sim = Simulator::new(config()).unwrap();
    sim.add_node(node_at(2, 0.0, 100.0)).unwrap();
    sim.add_node(node_at(3, 2000.0, 100.0)).unwrap();

    sim.run(8.0).unwrap();

    for addr in [2, 3] {
        let node = sim.node(addr).unwrap();
        assert_eq!(node.reachable_estimate(), 0);
        assert_eq!(node.optical_neighbor_count(), 0);
        // Isolated election: member with no route.
        assert_eq!(node.state(), NodeState::ClusterMember);
        assert_eq!(node.next_hop(), None);
    }
}

/// Election in a mixed topology: two optically-paired nodes with acoustic
/// coverage elect the lower address as their head; an acoustic-only node
/// heads itself.
#[test]
fn coverage_drives_the_election() {
    let mut sim = Simulator::new(config()).unwrap();
    sim.add_node(node_at(2, 0.0, 100.0)).unwrap();
    sim.add_node(node_at(3, 10.0, 100.0)).unwrap();
    sim.add_node(node_at(4, 600.0, 100.0)).unwrap();

    sim.run(9.0).unwrap();

    assert_eq!(sim.node(2).unwrap().state(), NodeState::ClusterHead);

    let member = sim.node(3).unwrap();
    assert_eq!(member.state(), NodeState::ClusterMember);
    assert_eq!(member.next_hop(), Some(2));

    // No optical neighbors to defer to.
    assert_eq!(sim.node(4).unwrap().state(), NodeState::ClusterHead);
}

/// Equal seeds and equal configuration replay the identical simulation.
#[test]
fn equal_seeds_replay_identical_runs() {
    let build = || {
        let config = config().with_app_traffic(12.0, 4.0).with_seed(7);
        let mut sim = Simulator::new(config).unwrap();
        sim.add_node(sink_at(1, 0.0)).unwrap();
        sim.add_node(node_at(2, 10.0, 100.0)).unwrap();
        sim.add_node(node_at(3, 40.0, 100.0)).unwrap();
        sim.run(40.0).unwrap();
        sim
    };

    let a = build();
    let b = build();

    assert_eq!(
        a.stats().acoustic_transmissions,
        b.stats().acoustic_transmissions
    );
    assert_eq!(
        a.stats().optical_transmissions,
        b.stats().optical_transmissions
    );
    for addr in [1, 2, 3] {
        let na = a.node(addr).unwrap();
        let nb = b.node(addr).unwrap();
        assert_eq!(na.energy(), nb.energy());
        assert_eq!(na.state(), nb.state());
        assert_eq!(na.next_hop(), nb.next_hop());
        assert_eq!(na.data_received(), nb.data_received());
    }
    assert_eq!(a.time(), b.time());
}

/// Different seeds are allowed to diverge, but both still satisfy the
/// protocol invariants.
#[test]
fn different_seeds_still_converge_on_roles() {
    for seed in [3, 11] {
        let config = config().with_seed(seed);
        let mut sim = Simulator::new(config).unwrap();
        sim.add_node(sink_at(1, 0.0)).unwrap();
        sim.add_node(node_at(2, 10.0, 100.0)).unwrap();
        sim.run(6.0).unwrap();

        assert_eq!(sim.node(1).unwrap().state(), NodeState::ClusterHead);
        assert_eq!(sim.node(2).unwrap().next_hop(), Some(1));
    }
}

/// Scattered placement plugs straight into the simulator and a full run
/// completes with traffic flowing.
#[test]
fn scattered_network_runs_to_completion() {
    use crate::geometry::scatter_nodes;
    use crate::sim::rng::SimRng;

    let rng = SimRng::new(99);
    let positions = scatter_nodes(40.0, 40.0, 40.0, 2, 3, 1, &rng);

    let config = config().with_app_traffic(30.0, 10.0).with_seed(99);
    let mut sim = Simulator::new(config).unwrap();
    for (i, pos) in positions.iter().enumerate() {
        let addr = i as u32 + 1;
        let node = Node::new(addr, *pos, 100.0, addr == 1);
        sim.add_node(node).unwrap();
    }

    sim.run(100.0).unwrap();

    assert!(sim.stats().acoustic_transmissions > 0);
    assert_eq!(sim.time(), 100.0);
    // Every node settled out of the initial state.
    for &addr in sim.node_addrs() {
        assert_ne!(sim.node(addr).unwrap().state(), NodeState::Initial);
    }
}
