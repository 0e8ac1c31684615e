//! Minimal dynamic-wave routing demonstration driver.
//!
//! Loads a JSON-serialized [`hec22::network::Network`], runs a dynamic-wave
//! simulation for a fixed duration with no lateral inflow or control
//! actions, and prints summary depth/flow/continuity output. Input-file
//! parsing beyond this `Network`'s own `serde_json` representation, report
//! formatting, and a full control-rule language are out of scope; see
//! DESIGN.md.

use clap::Parser;
use hec22::config::RoutingOptions;
use hec22::context::RoutingContext;
use hec22::dynwave::RoutingCollaborators;
use hec22::network::Network;
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "hec22")]
#[command(version = "0.1.0")]
#[command(about = "Dynamic-wave hydraulic routing demonstration driver", long_about = None)]
struct Cli {
    /// Path to a JSON-serialized network (nodes + links).
    #[arg(short, long, value_name = "FILE")]
    network: PathBuf,

    /// Total simulated duration, in seconds.
    #[arg(short, long, default_value = "3600")]
    duration: f64,

    /// Fixed routing step ceiling, in seconds (the adaptive step may be
    /// smaller).
    #[arg(short, long, default_value = "15")]
    step: f64,
}

/// A driver with no lateral inflow, losses, or control actions: every node
/// and link just responds to the initial depths in the loaded network.
struct NoCollaborators;

impl RoutingCollaborators for NoCollaborators {
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

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let json = fs::read_to_string(&cli.network).unwrap_or_else(|e| {
        eprintln!("failed to read {}: {e}", cli.network.display());
        process::exit(1);
    });

    let network: Network = serde_json::from_str(&json).unwrap_or_else(|e| {
        eprintln!("failed to parse network: {e}");
        process::exit(1);
    });

    let mut ctx = RoutingContext::open(network, RoutingOptions::default()).unwrap_or_else(|e| {
        eprintln!("failed to open routing context: {e}");
        process::exit(1);
    });

    let collaborators = NoCollaborators;
    match ctx.execute(cli.duration, cli.step, &collaborators) {
        Ok(reports) => {
            println!("ran {} routing steps over {:.1}s", reports.len(), ctx.elapsed_time());
        }
        Err(e) => {
            eprintln!("routing failed: {e}");
            process::exit(1);
        }
    }

    println!("continuity error: {:.4}%", ctx.continuity_error() * 100.0);
    for warning in ctx.warnings().iter() {
        println!("warning: {warning:?}");
    }

    for node_idx in 0..ctx.network().node_count() {
        println!(
            "node {}: depth={:.3} head={:.3} inflow={:.3}",
            ctx.network().nodes[node_idx].name,
            ctx.node_depth(node_idx),
            ctx.node_head(node_idx),
            ctx.node_inflow(node_idx)
        );
    }
    for link_idx in 0..ctx.network().link_count() {
        println!(
            "link {}: flow={:.3} depth={:.3} froude={:.3}",
            ctx.network().links[link_idx].name,
            ctx.link_flow(link_idx),
            ctx.link_depth(link_idx),
            ctx.link_froude(link_idx)
        );
    }
}
