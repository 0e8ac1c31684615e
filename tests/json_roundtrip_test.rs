//! Serialization round-trip tests for network definitions.
//!
//! A network is expected to travel as JSON between a caller's project file
//! and this core, so `Network`, `Node`, and `Link` need to survive a
//! serde_json round trip with their adjacency lists rebuilt rather than
//! carried over the wire.

use hec22::link::{ConduitData, Link, LinkSubtype};
use hec22::network::Network;
use hec22::node::{Node, OutfallKind, StorageAreaRelation, StorageData};
use hec22::xsect::{CrossSection, ShapeParams};

fn sample_network() -> Network {
    let nodes = vec![
        Node::new_junction("J1", 100.0, 8.0),
        Node::new_storage(
            "S1",
            96.0,
            12.0,
            StorageData {
                f_evap: 0.0,
                area: StorageAreaRelation::Functional { a_const: 500.0, a_coeff: 10.0, a_expon: 1.0 },
                exfiltration_rate: 0.0,
            },
        ),
        Node::new_outfall("O1", 90.0, OutfallKind::Fixed { stage: 91.0 }, true),
    ];
    let links = vec![
        Link::new(
            "C1",
            0,
            1,
            CrossSection::new(ShapeParams::Circular { diameter: 2.0 }).unwrap(),
            LinkSubtype::Conduit(ConduitData { length: 300.0, manning_n: 0.013, barrels: 1, culvert: None }),
        ),
        Link::new(
            "C2",
            1,
            2,
            CrossSection::new(ShapeParams::RectClosed { width: 3.0, height: 3.0 }).unwrap(),
            LinkSubtype::Conduit(ConduitData { length: 150.0, manning_n: 0.015, barrels: 1, culvert: None }),
        ),
    ];
    Network::new(nodes, links)
}

#[test]
fn network_survives_a_json_round_trip() {
    let network = sample_network();
    let json = serde_json::to_string_pretty(&network).expect("network should serialize");
    let restored: Network = serde_json::from_str(&json).expect("network should deserialize");

    assert_eq!(restored.node_count(), network.node_count());
    assert_eq!(restored.link_count(), network.link_count());
    assert_eq!(restored.find_node("S1"), Some(1));
    assert_eq!(restored.find_link("C2"), Some(1));

    // Adjacency is #[serde(skip)]; Network's custom Deserialize routes through
    // Network::new via a shadow struct, so confirm it came back rebuilt
    // rather than empty.
    assert_eq!(restored.out_links(0), &[0]);
    assert_eq!(restored.in_links(2), &[1]);

    assert_eq!(restored.validate().is_ok(), network.validate().is_ok());
}

#[test]
fn node_subtypes_round_trip_through_json() {
    let outfall = Node::new_outfall("O1", 90.0, OutfallKind::Tidal { curve: vec![(0.0, 1.0), (12.0, 2.5)] }, false);
    let json = serde_json::to_string(&outfall).unwrap();
    let restored: Node = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, outfall);
}

#[test]
fn malformed_network_json_fails_to_deserialize() {
    let bad = r#"{"nodes": [], "links": "not-an-array"}"#;
    assert!(serde_json::from_str::<Network>(bad).is_err());
}
