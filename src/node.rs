//! Node entity and per-step mutable state.

use serde::{Deserialize, Serialize};

/// Outfall boundary-condition kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OutfallKind {
    /// Depth set to the lesser of critical and normal depth of the single
    /// outflow conduit.
    Free,
    /// Depth set to the normal depth of the single outflow conduit.
    Normal,
    /// Depth fixed to `stage` minus the node's invert elevation.
    Fixed { stage: f64 },
    /// Depth driven by a tidal stage curve, keyed by caller-supplied
    /// time-of-day; the curve itself is owned by the node.
    Tidal { curve: Vec<(f64, f64)> },
    /// Depth driven by an externally supplied stage time series,
    /// identified by name and resolved by the inflow collaborator.
    TimeSeries { series_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutfallData {
    pub has_flap_gate: bool,
}

/// How a storage node's surface area varies with depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StorageAreaRelation {
    Curve { points: Vec<(f64, f64)> },
    Functional { a_const: f64, a_coeff: f64, a_expon: f64 },
}

impl StorageAreaRelation {
    pub fn area_at_depth(&self, y: f64) -> f64 {
        match self {
            StorageAreaRelation::Curve { points } => interp_monotone(points, y),
            StorageAreaRelation::Functional { a_const, a_coeff, a_expon } => {
                a_const + a_coeff * y.max(0.0).powf(*a_expon)
            }
        }
    }
}

fn interp_monotone(points: &[(f64, f64)], x: f64) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    if x <= points[0].0 {
        return points[0].1;
    }
    if x >= points[points.len() - 1].0 {
        return points[points.len() - 1].1;
    }
    for w in points.windows(2) {
        let (x0, y0) = w[0];
        let (x1, y1) = w[1];
        if x >= x0 && x <= x1 {
            if (x1 - x0).abs() < 1e-12 {
                return y0;
            }
            let frac = (x - x0) / (x1 - x0);
            return y0 + frac * (y1 - y0);
        }
    }
    points[points.len() - 1].1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageData {
    pub f_evap: f64,
    pub area: StorageAreaRelation,
    /// Constant-rate exfiltration loss, ft/s; `0.0` for none.
    pub exfiltration_rate: f64,
}

/// Flow-splitting behaviour at a divider node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DividerKind {
    /// All inflow above `qMin` goes to the diverted link; the rest
    /// continues downstream.
    Cutoff,
    /// Inflow above `qMin` overflows to the diverted link.
    Overflow,
    /// Diverted flow given by a tabular inflow/diverted-flow curve.
    Tabular { curve: Vec<(f64, f64)> },
    /// Diverted flow given by weir discharge over the node's invert.
    Weir { height: f64, coefficient: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DividerData {
    pub kind: DividerKind,
    pub diverted_link: usize,
    pub q_min: f64,
}

/// Subtype-specific data for a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeSubtype {
    Junction,
    Outfall(OutfallData, OutfallKind),
    Storage(StorageData),
    Divider(DividerData),
}

impl NodeSubtype {
    pub fn is_outfall(&self) -> bool {
        matches!(self, NodeSubtype::Outfall(..))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, NodeSubtype::Storage(_))
    }

    pub fn is_divider(&self) -> bool {
        matches!(self, NodeSubtype::Divider(_))
    }
}

/// Per-step mutable state carried by a node, reset and advanced once per
/// routing step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeState {
    pub old_depth: f64,
    pub new_depth: f64,
    pub old_volume: f64,
    pub new_volume: f64,
    pub old_lat_flow: f64,
    pub new_lat_flow: f64,
    pub inflow: f64,
    pub outflow: f64,
    pub overflow: f64,
    pub crown_elev: f64,
    pub surf_area: f64,
    pub sum_of_dqdh: f64,
    /// Depth carried from the previous Picard iteration, for convergence
    /// testing.
    pub y_last_iter: f64,
    pub converged: bool,
    pub bypassed: bool,
}

/// A network node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub name: String,
    pub invert_elev: f64,
    pub full_depth: f64,
    pub surcharge_depth: f64,
    pub ponded_area: f64,
    pub initial_depth: f64,
    pub subtype: NodeSubtype,
    pub has_external_inflow: bool,
    pub has_dwf_inflow: bool,
    pub has_rdii_inflow: bool,
    #[serde(skip, default)]
    pub state: NodeState,
}

impl Node {
    pub fn new_junction(name: impl Into<String>, invert_elev: f64, full_depth: f64) -> Node {
        Node {
            name: name.into(),
            invert_elev,
            full_depth,
            surcharge_depth: 0.0,
            ponded_area: 0.0,
            initial_depth: 0.0,
            subtype: NodeSubtype::Junction,
            has_external_inflow: false,
            has_dwf_inflow: false,
            has_rdii_inflow: false,
            state: NodeState::default(),
        }
    }

    pub fn new_outfall(name: impl Into<String>, invert_elev: f64, kind: OutfallKind, has_flap_gate: bool) -> Node {
        Node {
            name: name.into(),
            invert_elev,
            full_depth: 0.0,
            surcharge_depth: 0.0,
            ponded_area: 0.0,
            initial_depth: 0.0,
            subtype: NodeSubtype::Outfall(OutfallData { has_flap_gate }, kind),
            has_external_inflow: false,
            has_dwf_inflow: false,
            has_rdii_inflow: false,
            state: NodeState::default(),
        }
    }

    pub fn new_storage(name: impl Into<String>, invert_elev: f64, full_depth: f64, data: StorageData) -> Node {
        Node {
            name: name.into(),
            invert_elev,
            full_depth,
            surcharge_depth: 0.0,
            ponded_area: 0.0,
            initial_depth: 0.0,
            subtype: NodeSubtype::Storage(data),
            has_external_inflow: false,
            has_dwf_inflow: false,
            has_rdii_inflow: false,
            state: NodeState::default(),
        }
    }

    pub fn new_divider(name: impl Into<String>, invert_elev: f64, full_depth: f64, data: DividerData) -> Node {
        Node {
            name: name.into(),
            invert_elev,
            full_depth,
            surcharge_depth: 0.0,
            ponded_area: 0.0,
            initial_depth: 0.0,
            subtype: NodeSubtype::Divider(data),
            has_external_inflow: false,
            has_dwf_inflow: false,
            has_rdii_inflow: false,
            state: NodeState::default(),
        }
    }

    pub fn max_depth(&self) -> f64 {
        self.full_depth + self.surcharge_depth
    }

    pub fn crown_elev_static(&self) -> f64 {
        self.invert_elev + self.full_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn junction_defaults_are_sane() {
        let n = Node::new_junction("J1", 100.0, 5.0);
        assert!(n.subtype == NodeSubtype::Junction);
        assert_eq!(n.max_depth(), 5.0);
        assert_eq!(n.state.old_depth, 0.0);
    }

    #[test]
    fn storage_functional_area_matches_formula() {
        let data = StorageData {
            f_evap: 0.0,
            area: StorageAreaRelation::Functional { a_const: 100.0, a_coeff: 2.0, a_expon: 1.0 },
            exfiltration_rate: 0.0,
        };
        let n = Node::new_storage("S1", 90.0, 10.0, data);
        if let NodeSubtype::Storage(d) = &n.subtype {
            assert_eq!(d.area.area_at_depth(5.0), 110.0);
        } else {
            panic!("expected storage subtype");
        }
    }

    #[test]
    fn storage_curve_interpolates() {
        let data = StorageData {
            f_evap: 0.0,
            area: StorageAreaRelation::Curve { points: vec![(0.0, 100.0), (10.0, 500.0)] },
            exfiltration_rate: 0.0,
        };
        let n = Node::new_storage("S1", 0.0, 10.0, data);
        if let NodeSubtype::Storage(d) = &n.subtype {
            assert_eq!(d.area.area_at_depth(5.0), 300.0);
        } else {
            panic!("expected storage subtype");
        }
    }

    #[test]
    fn outfall_predicate() {
        let n = Node::new_outfall("O1", 80.0, OutfallKind::Free, false);
        assert!(n.subtype.is_outfall());
        assert!(!n.subtype.is_storage());
    }
}
