//! External interface: `open`/`routingStep`/`execute`/`close` lifecycle,
//! plus read-only per-node/per-link accessors.

use crate::config::RoutingOptions;
use crate::dynwave::{self, RoutingCollaborators, StepReport};
use crate::error::{RoutingError, RoutingResult, WarningLog};
use crate::link::FullState;
use crate::massbal::ContinuityTracker;
use crate::network::Network;

/// Lifecycle state of a [`RoutingContext`]; `execute`/`routingStep` are only
/// valid once `open` has succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Closed,
    Open,
}

/// Owns the network, options, and accumulated run state across the
/// `open`/`routingStep`/`close` lifecycle.
pub struct RoutingContext {
    network: Network,
    options: RoutingOptions,
    continuity: ContinuityTracker,
    warnings: WarningLog,
    state: LifecycleState,
    elapsed_time: f64,
}

impl RoutingContext {
    /// Validate the network and allocate run state. No partial state is
    /// left behind if validation fails.
    pub fn open(network: Network, options: RoutingOptions) -> RoutingResult<RoutingContext> {
        network.validate()?;

        let mut continuity = ContinuityTracker::new();
        let mut initial_volume = 0.0;
        for node in &network.nodes {
            if let crate::node::NodeSubtype::Storage(data) = &node.subtype {
                initial_volume += data.area.area_at_depth(node.initial_depth) * node.initial_depth;
            }
        }
        continuity.record_initial_volume(initial_volume);

        Ok(RoutingContext {
            network,
            options,
            continuity,
            warnings: WarningLog::new(),
            state: LifecycleState::Open,
            elapsed_time: 0.0,
        })
    }

    fn require_open(&self) -> RoutingResult<()> {
        if self.state != LifecycleState::Open {
            return Err(RoutingError::NotOpen);
        }
        Ok(())
    }

    /// Advance the simulation by one adaptively-sized step. Returns the
    /// step's actual duration and convergence outcome.
    pub fn routing_step(
        &mut self,
        fixed_step: f64,
        collaborators: &dyn RoutingCollaborators,
    ) -> RoutingResult<StepReport> {
        self.require_open()?;
        let dt = dynwave::adaptive_time_step(&self.network, fixed_step, &self.options);
        let report = dynwave::route_step(
            &mut self.network,
            self.elapsed_time,
            dt,
            &self.options,
            collaborators,
            &mut self.continuity,
            &mut self.warnings,
        );
        self.elapsed_time += report.dt_used;
        Ok(report)
    }

    /// Run `routingStep` repeatedly until `total_duration` seconds have
    /// elapsed.
    pub fn execute(
        &mut self,
        total_duration: f64,
        fixed_step: f64,
        collaborators: &dyn RoutingCollaborators,
    ) -> RoutingResult<Vec<StepReport>> {
        self.require_open()?;
        let mut reports = Vec::new();
        while self.elapsed_time < total_duration {
            let remaining = total_duration - self.elapsed_time;
            let report = self.routing_step(fixed_step.min(remaining.max(self.options.min_variable_step)), collaborators)?;
            reports.push(report);
        }
        Ok(reports)
    }

    /// Release run state. A closed context rejects further stepping.
    pub fn close(&mut self) {
        self.state = LifecycleState::Closed;
    }

    pub fn elapsed_time(&self) -> f64 {
        self.elapsed_time
    }

    pub fn continuity_error(&self) -> f64 {
        self.continuity.continuity_error()
    }

    pub fn warnings(&self) -> &WarningLog {
        &self.warnings
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn node_depth(&self, node: usize) -> f64 {
        self.network.nodes[node].state.new_depth
    }

    pub fn node_head(&self, node: usize) -> f64 {
        self.network.nodes[node].invert_elev + self.network.nodes[node].state.new_depth
    }

    pub fn node_inflow(&self, node: usize) -> f64 {
        self.network.nodes[node].state.inflow
    }

    pub fn link_flow(&self, link: usize) -> f64 {
        self.network.links[link].state.new_flow
    }

    pub fn link_depth(&self, link: usize) -> f64 {
        self.network.links[link].state.new_depth
    }

    pub fn link_volume(&self, link: usize) -> f64 {
        let l = &self.network.links[link];
        l.xsect.area_at_depth(l.state.new_depth) * l.length()
    }

    pub fn link_setting(&self, link: usize) -> f64 {
        self.network.links[link].state.setting
    }

    pub fn link_froude(&self, link: usize) -> f64 {
        self.network.links[link].state.froude
    }

    pub fn link_full_state(&self, link: usize) -> FullState {
        self.network.links[link].state.full_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{ConduitData, Link, LinkSubtype};
    use crate::node::{Node, OutfallKind};
    use crate::xsect::{CrossSection, ShapeParams};

    struct ConstantInflow(f64);
    impl RoutingCollaborators for ConstantInflow {
        fn lateral_inflow(&self, node: usize, _time: f64) -> f64 {
            if node == 0 {
                self.0
            } else {
                0.0
            }
        }
        fn losses(&self, _node: usize, _time: f64, _depth: f64) -> f64 {
            0.0
        }
        fn target_setting(&self, _link: usize, _time: f64) -> f64 {
            1.0
        }
        fn time_series(&self, _series_id: &str, _time: f64) -> Option<f64> {
            None
        }
    }

    fn single_pipe_network() -> Network {
        let nodes = vec![
            Node::new_junction("J1", 100.0, 10.0),
            Node::new_outfall("O1", 95.0, OutfallKind::Free, false),
        ];
        let xsect = CrossSection::new(ShapeParams::Circular { diameter: 2.0 }).unwrap();
        let links = vec![Link::new(
            "C1",
            0,
            1,
            xsect,
            LinkSubtype::Conduit(ConduitData { length: 500.0, manning_n: 0.013, barrels: 1, culvert: None }),
        )];
        Network::new(nodes, links)
    }

    #[test]
    fn open_succeeds_on_a_valid_network() {
        let ctx = RoutingContext::open(single_pipe_network(), RoutingOptions::default());
        assert!(ctx.is_ok());
    }

    #[test]
    fn routing_step_advances_elapsed_time() {
        let mut ctx = RoutingContext::open(single_pipe_network(), RoutingOptions::default()).unwrap();
        let collaborators = ConstantInflow(1.0);
        ctx.routing_step(5.0, &collaborators).unwrap();
        assert!(ctx.elapsed_time() > 0.0);
    }

    #[test]
    fn closed_context_rejects_further_steps() {
        let mut ctx = RoutingContext::open(single_pipe_network(), RoutingOptions::default()).unwrap();
        ctx.close();
        let collaborators = ConstantInflow(1.0);
        assert!(ctx.routing_step(5.0, &collaborators).is_err());
    }

    #[test]
    fn execute_runs_until_target_duration() {
        let mut ctx = RoutingContext::open(single_pipe_network(), RoutingOptions::default()).unwrap();
        let collaborators = ConstantInflow(1.0);
        let reports = ctx.execute(30.0, 5.0, &collaborators).unwrap();
        assert!(!reports.is_empty());
        assert!(ctx.elapsed_time() >= 30.0 - 1e-6);
    }
}
