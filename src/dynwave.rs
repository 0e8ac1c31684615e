//! Dynamic-wave Picard iteration driver and adaptive time step.
//!
//! Grounded on the reference engine's `dynwave.c` (`dw_execute`/
//! `findConduitFlow`/`getVariableStep`).

use crate::config::RoutingOptions;
use crate::error::{Warning, WarningLog};
use crate::link::LinkSubtype;
use crate::linkflow::{self, ConduitFlowInput};
use crate::massbal::ContinuityTracker;
use crate::network::Network;
use crate::node::{Node, NodeSubtype};
use crate::nodeupdate::{self, LinkContribution, NodeUpdateInput};

/// Opaque collaborator hooks the driver needs from the host application:
/// lateral inflow, head-dependent losses, and control-rule target settings.
pub trait RoutingCollaborators {
    fn lateral_inflow(&self, node: usize, time: f64) -> f64;
    fn losses(&self, node: usize, time: f64, depth: f64) -> f64;
    fn target_setting(&self, link: usize, time: f64) -> f64;
    fn time_series(&self, series_id: &str, time: f64) -> Option<f64>;
}

/// Result of one `routingStep` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub dt_used: f64,
    pub trials: usize,
    pub converged: bool,
}

/// Step size chosen for the next Picard iteration:
/// `dt = min(fixedStep, minLinkDt, minNodeDt)`, floored at `minVariableStep`.
pub fn adaptive_time_step(network: &Network, fixed_step: f64, options: &RoutingOptions) -> f64 {
    let mut dt = fixed_step;

    for link in &network.links {
        if !link.is_conduit() {
            continue;
        }
        let length = link.length();
        let y = link.state.new_depth.max(link.state.old_depth);
        let area = link.xsect.area_at_depth(y);
        if area <= 1e-9 {
            continue;
        }
        let velocity = (link.state.new_flow.abs() / area).max(1e-9);
        let wave_speed = velocity + (RoutingOptions::GRAVITY * link.xsect.hyd_radius_at_depth(y).max(1e-9)).sqrt();
        if wave_speed > 1e-9 {
            let link_dt = options.courant_factor * length / wave_speed;
            dt = dt.min(link_dt);
        }
    }

    for node in &network.nodes {
        if node.subtype.is_outfall() {
            continue;
        }
        let surf_area = node.state.surf_area.max(options.min_surf_area);
        let net_flow = (node.state.inflow - node.state.outflow).abs();
        if net_flow > 1e-9 {
            let available_depth = (node.max_depth() - node.state.old_depth).max(0.01);
            let node_dt = surf_area * available_depth / net_flow;
            dt = dt.min(node_dt);
        }
    }

    dt.max(options.min_variable_step)
}

/// One full Picard iteration for a routing step: link sweep, node sweep,
/// convergence test, repeated up to `options.max_trials`.
pub fn route_step(
    network: &mut Network,
    time: f64,
    dt: f64,
    options: &RoutingOptions,
    collaborators: &dyn RoutingCollaborators,
    continuity: &mut ContinuityTracker,
    warnings: &mut WarningLog,
) -> StepReport {
    for node in &mut network.nodes {
        node.state.old_depth = node.state.new_depth;
        node.state.y_last_iter = node.state.new_depth;
    }
    for link in &mut network.links {
        link.state.old_flow = link.state.new_flow;
        link.state.q_last_iter = link.state.new_flow;
        link.state.old_depth = link.state.new_depth;
    }

    let mut converged = false;
    let mut trial = 0;

    while trial < options.max_trials && !converged {
        trial += 1;

        link_sweep(network, time, dt, options, collaborators);
        converged = node_sweep(network, time, dt, options, collaborators, continuity);

        if !converged {
            for node in &mut network.nodes {
                let relaxed = 0.5 * node.state.new_depth + 0.5 * node.state.y_last_iter;
                node.state.y_last_iter = node.state.new_depth;
                node.state.new_depth = relaxed;
            }
            for link in &mut network.links {
                link.state.q_last_iter = link.state.new_flow;
            }
        }
    }

    if !converged {
        for (idx, node) in network.nodes.iter().enumerate() {
            if !node.state.converged {
                warnings.push(Warning::NodeNonConvergence { node: idx, step_time: time });
            }
        }
    }

    StepReport { dt_used: dt, trials: trial, converged }
}

fn link_sweep(network: &mut Network, time: f64, dt: f64, options: &RoutingOptions, collaborators: &dyn RoutingCollaborators) {
    let node_heads: Vec<f64> = network.nodes.iter().map(|n| n.invert_elev + n.state.new_depth).collect();

    for (link_idx, link) in network.links.iter_mut().enumerate() {
        let h1 = node_heads[link.node_up];
        let h2 = node_heads[link.node_dn];
        let z1 = network.nodes[link.node_up].invert_elev;
        let z2 = network.nodes[link.node_dn].invert_elev;

        match &link.subtype {
            LinkSubtype::Conduit(data) => {
                let a_old = link.xsect.area_at_depth(link.state.old_depth);
                let input = ConduitFlowInput {
                    h1,
                    h2,
                    z1,
                    z2,
                    q_old: link.state.q_last_iter,
                    q_prev: link.state.old_flow,
                    a_old,
                    dt,
                    length: data.length,
                    manning_n: data.manning_n,
                    barrels: data.barrels,
                    loss_inlet: link.loss_inlet,
                    loss_outlet: link.loss_outlet,
                    loss_avg: link.loss_avg,
                    seep_rate: link.seep_rate,
                    has_flap_gate: link.has_flap_gate,
                    q_limit: link.q_limit,
                    slope: (z1 - z2) / data.length.max(1e-9),
                    inertial_terms: options.inertial_terms,
                    normal_flow_criterion: options.normal_flow_criterion,
                    manning_k: 1.486,
                    force_main_equation: options.force_main_equation,
                    culvert: data.culvert,
                };
                let out = linkflow::conduit_momentum_flow(&link.xsect, &input, RoutingOptions::GRAVITY, RoutingOptions::OMEGA);
                link.state.new_flow = out.flow;
                link.state.dqdh = out.dqdh;
                link.state.froude = out.froude;
                link.state.flow_class = out.flow_class;
                link.state.full_state = out.full_state;
                link.state.normal_flow = out.normal_flow;
                link.state.surf_area_up = out.surf_area_up;
                link.state.surf_area_dn = out.surf_area_dn;
                link.state.new_depth = 0.5 * ((h1 - z1).max(0.0) + (h2 - z2).max(0.0));
            }
            LinkSubtype::Pump(data) => {
                let target = collaborators.target_setting(link_idx, time);
                link.state.target_setting = target;
                let up_depth = (h1 - z1).max(0.0);
                let is_on = if data.thresholds_are_volume {
                    data.is_on
                } else if up_depth >= data.y_on {
                    true
                } else if up_depth <= data.y_off {
                    false
                } else {
                    link.state.old_flow.abs() > 1e-9
                };
                let q = linkflow::pump_flow(&data.curve, is_on, up_depth, 0.0, h1 - h2, link.state.old_flow.max(0.0), target);
                link.state.new_flow = q;
            }
            LinkSubtype::Orifice(data) => {
                let setting = collaborators.target_setting(link_idx, time);
                link.state.setting = setting;
                let (q, dqdh) = linkflow::orifice_flow(
                    &data.shape,
                    data.discharge_coeff,
                    h1 - (z1 + data.crest_height),
                    h2 - (z1 + data.crest_height),
                    setting,
                    RoutingOptions::GRAVITY,
                    link.has_flap_gate,
                );
                link.state.new_flow = q;
                link.state.dqdh = dqdh;
            }
            LinkSubtype::Weir(data) => {
                let setting = collaborators.target_setting(link_idx, time);
                link.state.setting = setting;
                let head_up = (h1 - (z1 + data.crest_height)).max(0.0);
                let head_dn = (h2 - (z1 + data.crest_height)).max(0.0);
                let q = linkflow::weir_flow(
                    &data.kind,
                    data.discharge_coeff,
                    data.end_contractions,
                    data.can_surcharge,
                    data.opening_height,
                    head_up,
                    head_dn,
                    link.state.setting,
                    RoutingOptions::GRAVITY,
                );
                link.state.new_flow = q;
            }
            LinkSubtype::Outlet(data) => {
                let depth = (h1 - (z1 + data.crest_height)).max(0.0);
                let q = linkflow::outlet_flow(&data.curve, depth, h1 - h2);
                link.state.new_flow = q;
            }
        }
    }
}

fn node_sweep(
    network: &mut Network,
    time: f64,
    dt: f64,
    options: &RoutingOptions,
    collaborators: &dyn RoutingCollaborators,
    continuity: &mut ContinuityTracker,
) -> bool {
    let mut all_converged = true;

    let node_count = network.node_count();
    for node_idx in 0..node_count {
        let is_outfall = network.nodes[node_idx].subtype.is_outfall();

        if is_outfall {
            let in_links: Vec<usize> = network.in_links(node_idx).to_vec();
            let out_links: Vec<usize> = network.out_links(node_idx).to_vec();
            let kind = if let NodeSubtype::Outfall(_, kind) = &network.nodes[node_idx].subtype {
                kind.clone()
            } else {
                unreachable!()
            };
            let (xsect, q, slope, manning_n) = if let Some(&lidx) = in_links.first() {
                let link = &network.links[lidx];
                let slope = match &link.subtype {
                    LinkSubtype::Conduit(c) => {
                        (network.nodes[link.node_up].invert_elev - network.nodes[link.node_dn].invert_elev) / c.length.max(1e-9)
                    }
                    _ => 0.0,
                };
                let n = match &link.subtype {
                    LinkSubtype::Conduit(c) => c.manning_n,
                    _ => 0.013,
                };
                (Some(link.xsect.clone()), link.state.new_flow, slope, n)
            } else if let Some(&lidx) = out_links.first() {
                let link = &network.links[lidx];
                (Some(link.xsect.clone()), link.state.new_flow, 0.0001, 0.013)
            } else {
                (None, 0.0, 0.0001, 0.013)
            };

            let depth = nodeupdate::resolve_outfall_depth(
                &kind,
                xsect.as_ref(),
                q,
                slope,
                manning_n,
                1.486,
                time,
                RoutingOptions::GRAVITY,
                |id, t| collaborators.time_series(id, t),
            );
            network.nodes[node_idx].state.new_depth = depth.max(0.0);
            network.nodes[node_idx].state.converged = true;
            if !in_links.is_empty() {
                continuity.add_boundary_link_outflow(q.max(0.0), dt);
            }
            continue;
        }

        let in_links = network.in_links(node_idx).to_vec();
        let out_links = network.out_links(node_idx).to_vec();
        let mut contributions = Vec::with_capacity(in_links.len() + out_links.len());
        for &lidx in &in_links {
            let link = &network.links[lidx];
            contributions.push(LinkContribution {
                flow: link.state.new_flow,
                dqdh: link.state.dqdh,
                is_upstream_end: false,
                surf_area: link.state.surf_area_dn,
                full_state: link.state.full_state,
                is_conduit: link.is_conduit(),
            });
        }
        for &lidx in &out_links {
            let link = &network.links[lidx];
            contributions.push(LinkContribution {
                flow: link.state.new_flow,
                dqdh: link.state.dqdh,
                is_upstream_end: true,
                surf_area: link.state.surf_area_up,
                full_state: link.state.full_state,
                is_conduit: link.is_conduit(),
            });
        }

        let lateral = collaborators.lateral_inflow(node_idx, time);
        let losses = collaborators.losses(node_idx, time, network.nodes[node_idx].state.old_depth);

        let input = NodeUpdateInput { lateral_inflow: lateral, losses, links: &contributions, dt };
        let out = nodeupdate::update_node(&mut network.nodes[node_idx], &input, options);

        continuity.add_lateral_inflow(lateral, dt);
        continuity.add_overflow(out.overflow, dt);

        if !out.converged {
            all_converged = false;
        }
    }

    for node in &network.nodes {
        if node.subtype.is_storage() {
            continuity.set_final_volume(storage_volume(node));
        }
    }

    all_converged
}

fn storage_volume(node: &Node) -> f64 {
    if let NodeSubtype::Storage(data) = &node.subtype {
        // Trapezoidal integration of area over depth, sampled coarsely:
        // adequate for the continuity check, not a reporting-grade volume.
        const STEPS: usize = 20;
        let y = node.state.new_depth;
        let mut volume = 0.0;
        let dy = y / STEPS as f64;
        for i in 0..STEPS {
            let y0 = i as f64 * dy;
            let y1 = (i + 1) as f64 * dy;
            volume += 0.5 * (data.area.area_at_depth(y0) + data.area.area_at_depth(y1)) * dy;
        }
        volume
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{ConduitData, Link, LinkSubtype};
    use crate::node::OutfallKind;
    use crate::xsect::{CrossSection, ShapeParams};

    struct NoInflow;
    impl RoutingCollaborators for NoInflow {
        fn lateral_inflow(&self, _node: usize, _time: f64) -> f64 {
            0.0
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

    fn simple_network() -> Network {
        let nodes = vec![
            Node::new_junction("J1", 100.0, 10.0),
            Node::new_outfall("O1", 95.0, OutfallKind::Free, false),
        ];
        let xsect = CrossSection::new(ShapeParams::Circular { diameter: 1.0 }).unwrap();
        let links = vec![Link::new(
            "C1",
            0,
            1,
            xsect,
            LinkSubtype::Conduit(ConduitData { length: 400.0, manning_n: 0.013, barrels: 1, culvert: None }),
        )];
        Network::new(nodes, links)
    }

    #[test]
    fn route_step_runs_without_panicking() {
        let mut net = simple_network();
        net.nodes[0].state.new_depth = 0.3;
        let options = RoutingOptions::default();
        let mut continuity = ContinuityTracker::new();
        let mut warnings = WarningLog::new();
        let collaborators = NoInflow;
        let report = route_step(&mut net, 0.0, 5.0, &options, &collaborators, &mut continuity, &mut warnings);
        assert!(report.trials >= 1);
    }

    #[test]
    fn adaptive_time_step_is_floored_at_minimum() {
        let net = simple_network();
        let options = RoutingOptions { min_variable_step: 2.0, ..RoutingOptions::default() };
        let dt = adaptive_time_step(&net, 10.0, &options);
        assert!(dt >= 2.0);
    }
}
