//! Link entity and per-step mutable state. The flow-computation kernel
//! itself lives in `linkflow`.

use crate::xsect::CrossSection;
use serde::{Deserialize, Serialize};

/// Flow-class categories a conduit can be in during a Picard iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlowClass {
    Dry,
    UpDry,
    DnDry,
    SubCritical,
    SupCritical,
    UpCritical,
    DnCritical,
}

/// Which end(s) of a conduit are flowing full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FullState {
    NeitherEnd,
    UpstreamFull,
    DownstreamFull,
    BothEnds,
}

/// Pump discharge-curve shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "curveType", rename_all = "camelCase")]
pub enum PumpCurve {
    /// Wet-well volume vs. flow, step look-up.
    Type1 { points: Vec<(f64, f64)> },
    /// Inlet node depth vs. flow, step look-up.
    Type2 { points: Vec<(f64, f64)> },
    /// Head differential vs. flow, linearly interpolated.
    Type3 { points: Vec<(f64, f64)> },
    /// Inlet depth vs. flow, linearly interpolated.
    Type4 { points: Vec<(f64, f64)> },
    /// No curve: flow equals total upstream inflow.
    Ideal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpData {
    pub curve: PumpCurve,
    pub y_on: f64,
    pub y_off: f64,
    /// Whether the on/off thresholds in `yOn`/`yOff` are depths (`false`)
    /// or wet-well volumes (`true`, used with `Type1`).
    pub thresholds_are_volume: bool,
    #[serde(skip, default)]
    pub is_on: bool,
}

/// Side or bottom orifice shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrificeShape {
    Circular { diameter: f64 },
    Rectangular { width: f64, height: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrificePlacement {
    Side,
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrificeData {
    pub shape: OrificeShape,
    pub placement: OrificePlacement,
    pub discharge_coeff: f64,
    /// Height of the orifice's bottom above the upstream node's invert.
    pub crest_height: f64,
    /// Seconds needed for a full 0-to-1 setting change; `0.0` for instant.
    pub open_close_rate: f64,
}

/// Weir geometry family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "weirType", rename_all = "camelCase")]
pub enum WeirKind {
    Transverse { length: f64 },
    Sideflow { length: f64 },
    Vnotch { angle_degrees: f64 },
    Trapezoidal { bottom_length: f64, side_slope: f64 },
    Roadway { length: f64, surface: RoadSurface, profile: RoadProfile },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoadSurface {
    Paved,
    Gravel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoadProfile {
    Normal,
    ArchCorrugatedMetalMitered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeirData {
    pub kind: WeirKind,
    pub discharge_coeff: f64,
    pub crest_height: f64,
    pub end_contractions: u32,
    pub can_surcharge: bool,
    /// Height of the weir opening above its crest; once both upstream and
    /// downstream heads exceed this, flow transitions to the submerged
    /// orifice-equivalent formula.
    pub opening_height: f64,
}

/// Outlet discharge relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "curveType", rename_all = "camelCase")]
pub enum OutletCurve {
    Tabular { points: Vec<(f64, f64)>, head_is_differential: bool },
    Functional { coeff: f64, exponent: f64, head_is_differential: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutletData {
    pub curve: OutletCurve,
    pub crest_height: f64,
}

/// Culvert inlet-control rating form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CulvertRatingForm {
    /// HEC-5 Form 1 coefficients (K, M, c, Y), the primary rating form.
    Form1,
    /// FHWA Form 2 coefficients, used as a fallback.
    Form2,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CulvertData {
    pub rating_form: CulvertRatingForm,
    pub k: f64,
    pub m: f64,
    pub c: f64,
    pub y: f64,
    pub slope_factor: f64,
}

/// Subtype-specific data and parameters for a conduit beyond its
/// cross-section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConduitData {
    pub length: f64,
    pub manning_n: f64,
    pub barrels: u32,
    pub culvert: Option<CulvertData>,
}

/// A link's type-specific data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LinkSubtype {
    Conduit(ConduitData),
    Pump(PumpData),
    Orifice(OrificeData),
    Weir(WeirData),
    Outlet(OutletData),
}

/// Per-step mutable state carried by a link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkState {
    pub old_flow: f64,
    pub new_flow: f64,
    pub old_depth: f64,
    pub new_depth: f64,
    pub old_volume: f64,
    pub new_volume: f64,
    pub surf_area_up: f64,
    pub surf_area_dn: f64,
    pub setting: f64,
    pub target_setting: f64,
    pub froude: f64,
    pub dqdh: f64,
    pub direction: f64,
    pub bypassed: bool,
    pub normal_flow: bool,
    pub inlet_control: bool,
    pub capacity_limited: bool,
    pub flow_class: FlowClass,
    pub full_state: FullState,
    /// Flow from the previous Picard iteration.
    pub q_last_iter: f64,
}

impl Default for LinkState {
    fn default() -> Self {
        LinkState {
            old_flow: 0.0,
            new_flow: 0.0,
            old_depth: 0.0,
            new_depth: 0.0,
            old_volume: 0.0,
            new_volume: 0.0,
            surf_area_up: 0.0,
            surf_area_dn: 0.0,
            setting: 1.0,
            target_setting: 1.0,
            froude: 0.0,
            dqdh: 0.0,
            direction: 1.0,
            bypassed: false,
            normal_flow: false,
            inlet_control: false,
            capacity_limited: false,
            flow_class: FlowClass::Dry,
            full_state: FullState::NeitherEnd,
            q_last_iter: 0.0,
        }
    }
}

/// A network link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub name: String,
    pub node_up: usize,
    pub node_dn: usize,
    pub offset_up: f64,
    pub offset_dn: f64,
    pub xsect: CrossSection,
    pub q0: f64,
    pub q_limit: Option<f64>,
    pub loss_inlet: f64,
    pub loss_outlet: f64,
    pub loss_avg: f64,
    pub seep_rate: f64,
    pub has_flap_gate: bool,
    pub subtype: LinkSubtype,
    #[serde(skip, default)]
    pub state: LinkState,
}

impl Link {
    pub fn new(
        name: impl Into<String>,
        node_up: usize,
        node_dn: usize,
        xsect: CrossSection,
        subtype: LinkSubtype,
    ) -> Link {
        Link {
            name: name.into(),
            node_up,
            node_dn,
            offset_up: 0.0,
            offset_dn: 0.0,
            xsect,
            q0: 0.0,
            q_limit: None,
            loss_inlet: 0.0,
            loss_outlet: 0.0,
            loss_avg: 0.0,
            seep_rate: 0.0,
            has_flap_gate: false,
            subtype,
            state: LinkState::default(),
        }
    }

    pub fn is_conduit(&self) -> bool {
        matches!(self.subtype, LinkSubtype::Conduit(_))
    }

    pub fn is_regulator(&self) -> bool {
        !self.is_conduit()
    }

    pub fn length(&self) -> f64 {
        match &self.subtype {
            LinkSubtype::Conduit(c) => c.length,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xsect::{CrossSection, ShapeParams};

    fn test_xsect() -> CrossSection {
        CrossSection::new(ShapeParams::Circular { diameter: 1.0 }).unwrap()
    }

    #[test]
    fn new_link_defaults_to_open_setting() {
        let link = Link::new(
            "C1",
            0,
            1,
            test_xsect(),
            LinkSubtype::Conduit(ConduitData { length: 400.0, manning_n: 0.013, barrels: 1, culvert: None }),
        );
        assert_eq!(link.state.setting, 1.0);
        assert!(link.is_conduit());
    }

    #[test]
    fn regulator_predicate() {
        let link = Link::new(
            "P1",
            0,
            1,
            test_xsect(),
            LinkSubtype::Pump(PumpData {
                curve: PumpCurve::Ideal,
                y_on: 0.0,
                y_off: 0.0,
                thresholds_are_volume: false,
                is_on: false,
            }),
        );
        assert!(link.is_regulator());
        assert_eq!(link.length(), 0.0);
    }
}
