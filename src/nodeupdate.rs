//! Node state update: surface-area aggregation, the Newton head update,
//! the surcharge algorithm, and outfall stage resolution.
//!
//! Grounded on the reference engine's `dynwave.c` (`updateNodeDepth`) and
//! `node.c` (`node_getSurfArea` / outfall handling).

use crate::config::RoutingOptions;
use crate::link::FullState;
use crate::node::{Node, NodeSubtype, OutfallKind};
use crate::xsect::CrossSection;

/// One adjoining link's contribution to a node's surface area and flow
/// balance, gathered by the caller from the link sweep.
pub struct LinkContribution {
    pub flow: f64,
    pub dqdh: f64,
    /// `true` if this node is the link's upstream end (flow leaves the
    /// node through this link), `false` if downstream (flow enters).
    pub is_upstream_end: bool,
    pub surf_area: f64,
    pub full_state: FullState,
    pub is_conduit: bool,
}

pub struct NodeUpdateInput<'a> {
    pub lateral_inflow: f64,
    pub losses: f64,
    pub links: &'a [LinkContribution],
    pub dt: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeUpdateOutput {
    pub new_depth: f64,
    pub new_inflow: f64,
    pub new_outflow: f64,
    pub overflow: f64,
    pub surf_area: f64,
    pub converged: bool,
}

/// Step 1: aggregate surface area from adjoining conduits, substituting
/// `minSurfArea` when contributing conduits are too narrow or all full.
fn aggregate_surf_area(node: &Node, input: &NodeUpdateInput, options: &RoutingOptions) -> f64 {
    if let NodeSubtype::Storage(data) = &node.subtype {
        return data.area.area_at_depth(node.state.new_depth).max(options.min_surf_area);
    }

    let mut area: f64 = 0.0;
    let mut all_full = true;
    for link in input.links {
        if !link.is_conduit {
            continue;
        }
        area += link.surf_area;
        let full_at_this_end = match (link.is_upstream_end, link.full_state) {
            (true, FullState::UpstreamFull) | (true, FullState::BothEnds) => true,
            (false, FullState::DownstreamFull) | (false, FullState::BothEnds) => true,
            _ => false,
        };
        if !full_at_this_end {
            all_full = false;
        }
    }

    if area < options.min_surf_area || (all_full && !input.links.is_empty()) {
        area = options.min_surf_area;
    }
    area += node.ponded_area;
    area
}

/// Steps 2-7: continuity accumulation, Newton head update, surcharge
/// handling, overflow recording, convergence test. Outfalls are resolved
/// separately by [`resolve_outfall_depth`] and should not be passed here.
pub fn update_node(node: &mut Node, input: &NodeUpdateInput, options: &RoutingOptions) -> NodeUpdateOutput {
    let mut inflow = input.lateral_inflow.max(0.0);
    let mut outflow = input.lateral_inflow.min(0.0).abs();
    let mut sum_dqdh = 0.0;

    for link in input.links {
        if link.is_upstream_end {
            // Flow leaves the node through this link when positive.
            if link.flow >= 0.0 {
                outflow += link.flow;
            } else {
                inflow += -link.flow;
            }
            sum_dqdh -= link.dqdh;
        } else {
            if link.flow >= 0.0 {
                inflow += link.flow;
            } else {
                outflow += -link.flow;
            }
            sum_dqdh += link.dqdh;
        }
    }
    inflow += input.losses.max(0.0);
    outflow += input.losses.min(0.0).abs();

    let surf_area = aggregate_surf_area(node, input, options);

    // Newton head update: dh = dt*(netFlow)/(surfArea - dt*sumDqdh).
    let net_flow = inflow - outflow;
    let denom = (surf_area - input.dt * sum_dqdh).max(options.min_surf_area * 0.1);
    let mut dh = input.dt * net_flow / denom;

    let max_depth = node.max_depth();
    let mut new_depth = node.state.old_depth + dh;
    let mut overflow = 0.0;

    if new_depth > max_depth {
        // Step 5: surcharge / overflow. Ponded storage absorbs what it can;
        // the remainder above full depth plus ponded capacity is lost.
        if node.ponded_area > 0.0 {
            new_depth = new_depth.min(max_depth + (new_depth - max_depth));
        } else {
            let excess_volume = (new_depth - max_depth) * surf_area;
            overflow = excess_volume / input.dt.max(1e-9);
            new_depth = max_depth;
            dh = new_depth - node.state.old_depth;
        }
    } else if new_depth < 0.0 {
        new_depth = 0.0;
        dh = new_depth - node.state.old_depth;
    }

    let converged = dh.abs() <= options.head_tolerance;

    node.state.new_depth = new_depth;
    node.state.inflow = inflow;
    node.state.outflow = outflow;
    node.state.overflow = overflow;
    node.state.surf_area = surf_area;
    node.state.sum_of_dqdh = sum_dqdh;
    node.state.converged = converged;

    NodeUpdateOutput { new_depth, new_inflow: inflow, new_outflow: outflow, overflow, surf_area, converged }
}

/// Step 6: outfall stage resolution by [`OutfallKind`]. Distinct from
/// [`update_node`] because an outfall's depth is a boundary condition, not
/// a Newton-solved unknown.
pub fn resolve_outfall_depth(
    kind: &OutfallKind,
    outflow_xsect: Option<&CrossSection>,
    outflow_link_q: f64,
    outflow_link_slope: f64,
    manning_n: f64,
    manning_k: f64,
    time_of_day: f64,
    gravity: f64,
    time_series_lookup: impl Fn(&str, f64) -> Option<f64>,
) -> f64 {
    match kind {
        OutfallKind::Fixed { stage } => *stage,
        OutfallKind::Tidal { curve } => interp_curve(curve, time_of_day),
        OutfallKind::TimeSeries { series_id } => time_series_lookup(series_id, time_of_day).unwrap_or(0.0),
        OutfallKind::Free => {
            if let Some(xs) = outflow_xsect {
                let yc = xs.critical_depth(outflow_link_q.abs(), gravity);
                let yn = xs.normal_depth(outflow_link_q.abs(), outflow_link_slope, manning_n, manning_k);
                yc.min(yn)
            } else {
                0.0
            }
        }
        OutfallKind::Normal => {
            if let Some(xs) = outflow_xsect {
                xs.normal_depth(outflow_link_q.abs(), outflow_link_slope, manning_n, manning_k)
            } else {
                0.0
            }
        }
    }
}

fn interp_curve(points: &[(f64, f64)], x: f64) -> f64 {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    #[test]
    fn rising_inflow_raises_depth() {
        let mut node = Node::new_junction("J1", 100.0, 10.0);
        let options = RoutingOptions::default();
        let input = NodeUpdateInput { lateral_inflow: 5.0, losses: 0.0, links: &[], dt: 1.0 };
        let out = update_node(&mut node, &input, &options);
        assert!(out.new_depth > 0.0);
    }

    #[test]
    fn depth_is_capped_at_max_depth_with_overflow_recorded() {
        let mut node = Node::new_junction("J1", 100.0, 1.0);
        let options = RoutingOptions::default();
        let input = NodeUpdateInput { lateral_inflow: 1000.0, losses: 0.0, links: &[], dt: 100.0 };
        let out = update_node(&mut node, &input, &options);
        assert!((out.new_depth - 1.0).abs() < 1e-9);
        assert!(out.overflow > 0.0);
    }

    #[test]
    fn fixed_outfall_uses_its_stage() {
        let kind = OutfallKind::Fixed { stage: 42.0 };
        let depth = resolve_outfall_depth(&kind, None, 0.0, 0.0, 0.013, 1.486, 0.0, 32.17, |_, _| None);
        assert_eq!(depth, 42.0);
    }

    #[test]
    fn tidal_outfall_interpolates_curve() {
        let kind = OutfallKind::Tidal { curve: vec![(0.0, 1.0), (12.0, 3.0)] };
        let depth = resolve_outfall_depth(&kind, None, 0.0, 0.0, 0.013, 1.486, 6.0, 32.17, |_, _| None);
        assert!((depth - 2.0).abs() < 1e-9);
    }
}
