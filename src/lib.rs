//! # Dynamic-wave hydraulic routing core
//!
//! A Saint-Venant (dynamic-wave) hydraulic routing engine for stormwater and
//! drainage conveyance networks: Picard-iteration momentum solving over a
//! dense-indexed node/link network, a cross-section geometry library
//! covering closed-form and tabulated shapes, and the discharge formulas
//! for pumps, orifices, weirs, outlets, and culverts that regulate flow
//! between conduits.
//!
//! ## Modules
//!
//! - [`xsect`] - Cross-section geometry library and transect/custom-shape
//!   tabulation.
//! - [`csv`] - CSV loaders for transect and custom-curve geometry tables.
//! - [`linkflow`] - Conduit momentum equation and pump/orifice/weir/outlet/
//!   culvert discharge formulas.
//! - [`node`] / [`link`] - Network entity types and per-step mutable state.
//! - [`nodeupdate`] - Node surface area, continuity, and head update.
//! - [`dynwave`] - Picard-iteration driver and adaptive time step.
//! - [`network`] - Dense-indexed node/link storage and adjacency.
//! - [`toposort`] - Topological sort, cycle detection, divider-tree
//!   validation.
//! - [`findroot`] - Newton+bisection and Ridder's method root finders.
//! - [`mathexpr`] - Expression tokenizer/evaluator for control rules.
//! - [`massbal`] - Minimal continuity accounting.
//! - [`context`] - `open`/`routingStep`/`execute`/`close` lifecycle.
//! - [`config`] - Routing options.
//! - [`project`] - Project metadata and unit definitions.
//! - [`error`] - `RoutingError` and warning accumulation.
//!
//! ## Example
//!
//! ```no_run
//! use hec22::config::RoutingOptions;
//! use hec22::context::RoutingContext;
//! use hec22::dynwave::RoutingCollaborators;
//! use hec22::link::{ConduitData, Link, LinkSubtype};
//! use hec22::network::Network;
//! use hec22::node::{Node, OutfallKind};
//! use hec22::xsect::{CrossSection, ShapeParams};
//!
//! struct NoLateralInflow;
//! impl RoutingCollaborators for NoLateralInflow {
//!     fn lateral_inflow(&self, _node: usize, _time: f64) -> f64 { 0.0 }
//!     fn losses(&self, _node: usize, _time: f64, _depth: f64) -> f64 { 0.0 }
//!     fn target_setting(&self, _link: usize, _time: f64) -> f64 { 1.0 }
//!     fn time_series(&self, _series_id: &str, _time: f64) -> Option<f64> { None }
//! }
//!
//! let nodes = vec![
//!     Node::new_junction("J1", 100.0, 10.0),
//!     Node::new_outfall("O1", 95.0, OutfallKind::Free, false),
//! ];
//! let xsect = CrossSection::new(ShapeParams::Circular { diameter: 2.0 }).unwrap();
//! let links = vec![Link::new(
//!     "C1", 0, 1, xsect,
//!     LinkSubtype::Conduit(ConduitData { length: 500.0, manning_n: 0.013, barrels: 1, culvert: None }),
//! )];
//! let mut ctx = RoutingContext::open(Network::new(nodes, links), RoutingOptions::default()).unwrap();
//! ctx.execute(3600.0, 15.0, &NoLateralInflow).unwrap();
//! ```

pub mod config;
pub mod context;
pub mod csv;
pub mod dynwave;
pub mod error;
pub mod findroot;
pub mod link;
pub mod linkflow;
pub mod massbal;
pub mod mathexpr;
pub mod network;
pub mod node;
pub mod nodeupdate;
pub mod project;
pub mod toposort;
pub mod xsect;
