//! Network topology: dense-indexed node and link arrays addressed by
//! `usize` rather than name, plus the adjacency maps built once at `open`.

use crate::error::{RoutingError, RoutingResult};
use crate::link::Link;
use crate::node::{Node, NodeSubtype};
use crate::toposort::{self, Arc};
use serde::{Deserialize, Serialize};

/// A drainage/conveyance network: dense node and link arrays addressed by
/// `usize` index, plus adjacency lists built once at construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "NetworkShadow")]
pub struct Network {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    /// Indices into `links` whose `nodeUp` equals the array position
    /// (outflow links of each node).
    #[serde(skip, default)]
    out_links: Vec<Vec<usize>>,
    /// Indices into `links` whose `nodeDn` equals the array position
    /// (inflow links of each node).
    #[serde(skip, default)]
    in_links: Vec<Vec<usize>>,
}

/// Wire representation a `Network` deserializes through, so adjacency is
/// always rebuilt rather than arriving empty off the wire.
#[derive(Deserialize)]
struct NetworkShadow {
    nodes: Vec<Node>,
    links: Vec<Link>,
}

impl From<NetworkShadow> for Network {
    fn from(shadow: NetworkShadow) -> Self {
        Network::new(shadow.nodes, shadow.links)
    }
}

impl Network {
    pub fn new(nodes: Vec<Node>, links: Vec<Link>) -> Network {
        let mut net = Network { nodes, links, out_links: Vec::new(), in_links: Vec::new() };
        net.rebuild_adjacency();
        net
    }

    fn rebuild_adjacency(&mut self) {
        let n = self.nodes.len();
        self.out_links = vec![Vec::new(); n];
        self.in_links = vec![Vec::new(); n];
        for (idx, link) in self.links.iter().enumerate() {
            if link.node_up < n {
                self.out_links[link.node_up].push(idx);
            }
            if link.node_dn < n {
                self.in_links[link.node_dn].push(idx);
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn out_links(&self, node: usize) -> &[usize] {
        &self.out_links[node]
    }

    pub fn in_links(&self, node: usize) -> &[usize] {
        &self.in_links[node]
    }

    fn arcs(&self) -> Vec<Arc> {
        self.links
            .iter()
            .enumerate()
            .map(|(idx, link)| Arc { from: link.node_up, to: link.node_dn, link: idx })
            .collect()
    }

    /// Validate link endpoints, then each divider's downstream layout.
    /// Called once at `open`.
    pub fn validate(&self) -> RoutingResult<()> {
        let n = self.node_count();
        for (idx, link) in self.links.iter().enumerate() {
            if link.node_up >= n || link.node_dn >= n {
                return Err(RoutingError::InvalidLinkEndpoints { link: idx, up: link.node_up, dn: link.node_dn });
            }
            if link.node_up == link.node_dn {
                return Err(RoutingError::InvalidLinkEndpoints { link: idx, up: link.node_up, dn: link.node_dn });
            }
        }

        let arcs = self.arcs();
        for (node_idx, node) in self.nodes.iter().enumerate() {
            if let NodeSubtype::Divider(data) = &node.subtype {
                let diverted_to = self.links[data.diverted_link].node_dn;
                toposort::validate_divider_tree(n, &arcs, node_idx, diverted_to, || node.name.clone())?;
            }
        }
        Ok(())
    }

    /// Topological node order for kinematic/steady routing.
    pub fn topological_order(&self) -> RoutingResult<Vec<usize>> {
        let arcs = self.arcs();
        let nodes = &self.nodes;
        toposort::topological_sort(self.node_count(), &arcs, |n| nodes[n].name.clone())
    }

    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn find_link(&self, name: &str) -> Option<usize> {
        self.links.iter().position(|l| l.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{ConduitData, LinkSubtype};
    use crate::xsect::{CrossSection, ShapeParams};

    fn pipe_xsect() -> CrossSection {
        CrossSection::new(ShapeParams::Circular { diameter: 1.0 }).unwrap()
    }

    fn conduit(name: &str, up: usize, dn: usize) -> Link {
        Link::new(
            name,
            up,
            dn,
            pipe_xsect(),
            LinkSubtype::Conduit(ConduitData { length: 100.0, manning_n: 0.013, barrels: 1, culvert: None }),
        )
    }

    #[test]
    fn adjacency_lists_are_built_correctly() {
        let nodes = vec![Node::new_junction("J1", 100.0, 5.0), Node::new_junction("J2", 95.0, 5.0)];
        let links = vec![conduit("C1", 0, 1)];
        let net = Network::new(nodes, links);
        assert_eq!(net.out_links(0), &[0]);
        assert_eq!(net.in_links(1), &[0]);
        assert!(net.in_links(0).is_empty());
    }

    #[test]
    fn validate_rejects_out_of_range_endpoint() {
        let nodes = vec![Node::new_junction("J1", 100.0, 5.0)];
        let links = vec![conduit("C1", 0, 5)];
        let net = Network::new(nodes, links);
        assert!(net.validate().is_err());
    }

    #[test]
    fn validate_rejects_self_loop() {
        let nodes = vec![Node::new_junction("J1", 100.0, 5.0)];
        let links = vec![conduit("C1", 0, 0)];
        let net = Network::new(nodes, links);
        assert!(net.validate().is_err());
    }

    #[test]
    fn topological_order_respects_flow_direction() {
        let nodes = vec![
            Node::new_junction("J1", 100.0, 5.0),
            Node::new_junction("J2", 95.0, 5.0),
            Node::new_outfall("O1", 90.0, crate::node::OutfallKind::Free, false),
        ];
        let links = vec![conduit("C1", 0, 1), conduit("C2", 1, 2)];
        let net = Network::new(nodes, links);
        let order = net.topological_order().unwrap();
        let pos = |n: usize| order.iter().position(|&x| x == n).unwrap();
        assert!(pos(0) < pos(1));
        assert!(pos(1) < pos(2));
    }
}
