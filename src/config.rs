//! Routing configuration options, consumed once at `open`.

use serde::{Deserialize, Serialize};

/// Overall numerical routing scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoutingModel {
    /// Full Saint-Venant dynamic wave (Picard iteration, adaptive dt).
    Dynamic,
    /// Single-direction kinematic wave routing per conduit.
    Kinematic,
    /// Steady-flow translation (no storage).
    Steady,
}

/// Which momentum terms are damped by the inertial-damping factor sigma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InertialTerms {
    Full,
    Partial,
    None,
}

/// Criterion used to decide whether normal-flow limiting applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NormalFlowCriterion {
    Slope,
    Froude,
    Both,
}

/// Method used to represent surcharged (pressurized) flow above a
/// conduit's crown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SurchargeMethod {
    /// Original EXTRAN pressure-flow sub-iteration.
    Extran,
    /// Preissmann slot: conduit is given a narrow imaginary top slot so
    /// full-pipe flow stays a free-surface problem.
    SlotWidth,
}

/// Friction equation used for a pressurized circular force main.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ForceMainEquation {
    HazenWilliams,
    DarcyWeisbach,
}

/// Routing options consumed once at `open`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingOptions {
    pub routing_model: RoutingModel,
    pub inertial_terms: InertialTerms,
    pub normal_flow_criterion: NormalFlowCriterion,
    pub surcharge_method: SurchargeMethod,
    pub force_main_equation: ForceMainEquation,
    /// Courant safety factor, in (0, 2].
    pub courant_factor: f64,
    /// Minimum surface area substituted at junctions with too little
    /// contributing conduit surface (default: area of a 4-ft diameter
    /// circle).
    pub min_surf_area: f64,
    /// Head-convergence tolerance for the Picard iteration, ft.
    pub head_tolerance: f64,
    /// Maximum Picard iterations per routing step.
    pub max_trials: usize,
    /// Floor applied to the adaptive time step, seconds.
    pub min_variable_step: f64,
}

impl RoutingOptions {
    /// Gravitational acceleration in the project's unit system. The core is
    /// internally foot-pound-second.
    pub const GRAVITY: f64 = 32.17;

    /// Under-relaxation factor used by the conduit momentum equation.
    pub const OMEGA: f64 = 0.5;
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            routing_model: RoutingModel::Dynamic,
            inertial_terms: InertialTerms::Full,
            normal_flow_criterion: NormalFlowCriterion::Both,
            surcharge_method: SurchargeMethod::Extran,
            force_main_equation: ForceMainEquation::HazenWilliams,
            courant_factor: 0.75,
            min_surf_area: std::f64::consts::PI * 4.0 * 4.0 / 4.0,
            head_tolerance: 0.005,
            max_trials: 8,
            min_variable_step: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_expected_values() {
        let opts = RoutingOptions::default();
        assert_eq!(opts.courant_factor, 0.75);
        assert_eq!(opts.head_tolerance, 0.005);
        assert_eq!(opts.max_trials, 8);
        assert_eq!(opts.min_variable_step, 0.5);
        assert!((opts.min_surf_area - 12.566).abs() < 0.01);
    }
}
