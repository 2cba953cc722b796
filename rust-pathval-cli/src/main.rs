//! Command-line front end for the path validation application.
//!
//! Runs the application against the in-process switch fabric and reads verbs
//! from standard input, one per line: `install`, `validate`, `revalidate`,
//! `stopvalidate`. Anything else reports a usage error and changes nothing.
//! After arming a trace, a demo ICMP probe is injected between the two
//! configured hosts and the traversed path is printed.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::LevelFilter;
use rust_pathval_common::topology::{HostAttachment, Topology};
use rust_pathval_core::PathvalApp;
use rust_pathval_sim::SwitchFabric;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};

/// Install the static flow rule pipeline and validate forwarding paths.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Topology description file (JSON). Defaults to the built-in
    /// four-switch, four-host reference topology.
    #[clap(short, long)]
    topology: Option<PathBuf>,

    /// Host the demo probe originates from
    #[clap(long, default_value = "h1")]
    probe_src: String,

    /// Host the demo probe is addressed to
    #[clap(long, default_value = "d1")]
    probe_dst: String,

    /// Sets the level of verbosity
    #[clap(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();

    let topology = match &cli.topology {
        Some(path) => Topology::from_file(path)
            .with_context(|| format!("loading topology from {}", path.display()))?,
        None => Topology::reference(),
    };
    let topology = Arc::new(topology);

    let probe_src = lookup_host(&topology, &cli.probe_src)?;
    let probe_dst = lookup_host(&topology, &cli.probe_dst)?;

    let fabric = Arc::new(SwitchFabric::new(topology.clone()));
    let app = PathvalApp::activate(
        topology.clone(),
        fabric.as_ref(),
        fabric.clone(),
        fabric.clone(),
    )?;

    println!("commands: install | validate | revalidate | stopvalidate (ctrl-d to quit)");

    let mut lines = BufReader::new(stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let verb = line.trim();
        let outcome = match verb {
            "install" => app.install().map(|()| {
                println!("static pipeline installed");
            }),
            "validate" => app.start_trace().map(|()| {
                fabric.inject_probe(&probe_src, &probe_dst);
                report_path(&app);
            }),
            "revalidate" => app.restart_trace().map(|()| {
                fabric.inject_probe(&probe_src, &probe_dst);
                report_path(&app);
            }),
            "stopvalidate" => app.stop_trace().map(|()| {
                println!("path tracing stopped");
            }),
            "" => Ok(()),
            _ => {
                println!("command input error");
                Ok(())
            }
        };
        // Failures surface as text; the dispatcher keeps running.
        if let Err(e) = outcome {
            println!("{e}");
        }
    }

    app.deactivate()?;
    Ok(())
}

fn lookup_host(topology: &Topology, name: &str) -> Result<HostAttachment> {
    topology
        .host(name)
        .cloned()
        .ok_or_else(|| anyhow!("unknown host `{name}` in topology"))
}

fn report_path(app: &PathvalApp) {
    let path: Vec<String> = app.trace_path().iter().map(|d| d.to_string()).collect();
    if path.is_empty() {
        println!("probe traversed no devices (is the pipeline installed?)");
    } else {
        println!("probe traversed: {}", path.join(" -> "));
    }
}
