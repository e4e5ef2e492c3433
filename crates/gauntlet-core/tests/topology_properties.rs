//! Property tests for topology planning

use std::collections::HashSet;

use gauntlet_core::{NodeRole, PortBases, TopologyPlanner};
use proptest::prelude::*;

fn planner_with_occupied(occupied: HashSet<u16>) -> TopologyPlanner<impl Fn(u16) -> bool> {
    TopologyPlanner::with_probe("/tmp/gauntlet", move |port: u16| occupied.contains(&port))
}

proptest! {
    #[test]
    fn test_plan_ports_pairwise_distinct(
        node_count in 1usize..40,
        p2p in 2000u16..60000,
        http in 2000u16..60000,
        admin in 2000u16..60000,
        occupied in proptest::collection::hash_set(2000u16..62000, 0..64),
    ) {
        let planner = planner_with_occupied(occupied.clone());
        let bases = PortBases { p2p, http, admin };
        let nodes = planner.plan(node_count, &[], bases).unwrap();

        let mut seen = HashSet::new();
        for node in &nodes {
            for port in node.ports() {
                prop_assert!(seen.insert(port), "port {} handed out twice", port);
                prop_assert!(!occupied.contains(&port));
            }
        }
        prop_assert_eq!(nodes.len(), node_count);
        prop_assert_eq!(nodes.iter().filter(|n| n.role == NodeRole::Genesis).count(), 1);
    }

    #[test]
    fn test_extend_keeps_star_and_uniqueness(
        first in 1usize..10,
        more in 0usize..10,
    ) {
        let planner = planner_with_occupied(HashSet::new());
        let existing = planner.plan(first, &[], PortBases::default()).unwrap();
        let added = planner.extend(&existing, more, &[], PortBases::default()).unwrap();

        let genesis_addr = format!("/ip4/127.0.0.1/tcp/{}", existing[0].p2p_port);
        let mut seen = HashSet::new();
        for node in existing.iter().chain(added.iter()) {
            for port in node.ports() {
                prop_assert!(seen.insert(port));
            }
        }
        for (offset, node) in added.iter().enumerate() {
            prop_assert_eq!(node.index, first + offset);
            prop_assert_eq!(node.bootstrap_address.as_deref(), Some(genesis_addr.as_str()));
        }
    }
}

#[test]
fn test_plan_with_host_probe_avoids_live_listener() {
    let listener = std::net::TcpListener::bind("0.0.0.0:0").expect("Failed to bind listener");
    let busy = listener.local_addr().expect("Failed to read addr").port();

    let planner = TopologyPlanner::new("/tmp/gauntlet");
    let bases = PortBases {
        p2p: busy,
        http: busy,
        admin: busy,
    };
    let nodes = planner.plan(1, &[], bases).expect("Failed to plan topology");
    assert!(nodes[0].ports().iter().all(|p| *p != busy));
}
