//! # chordprobe
//!
//! Benchmark and health tool for Chord ring clusters.
//!
//! ## Commands
//!
//! - `bench`: Growth, shrink and crash-tolerance experiments
//! - `throughput`: Put/get throughput with read-back verification
//! - `health`: Check that every node answers its endpoints
//! - `reconfigure`: Push ring parameters to every node
//! - `report`: Summarize a results file written by `bench`
//!
//! ## Example
//!
//! ```bash
//! # Check the cluster first
//! chordprobe health c1-1:50000 c1-2:50000 c1-3:50000
//!
//! # Run every experiment, three repetitions each
//! chordprobe bench --output results.json c1-1:50000 c1-2:50000 ...
//!
//! # Try everything against an in-process simulated cluster
//! chordprobe --sim 32 bench --scenario crash
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ring_bench::{BenchConfig, ScenarioKind};
use ring_client::{HttpTransport, SimCluster};
use ring_types::NodeAddress;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod commands;

/// Upper bound for `--sim`.
const MAX_SIM_NODES: i64 = 4096;

use commands::{bench, health, reconfigure, report, throughput, Runtime};

/// Benchmark and health tool for Chord ring clusters.
#[derive(Parser, Debug)]
#[command(name = "chordprobe")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Run against an in-process simulated cluster of N nodes instead of NODES
    #[arg(
        long,
        global = true,
        value_name = "N",
        value_parser = clap::value_parser!(u16).range(1..=MAX_SIM_NODES)
    )]
    sim: Option<u16>,

    /// Seed for node sampling and generated values
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run topology-change experiments
    Bench {
        /// Experiments to run
        #[arg(long, value_enum, default_value = "all")]
        scenario: ScenarioArg,

        /// Repetitions per experiment (overrides config)
        #[arg(long)]
        repetitions: Option<usize>,

        /// Results file
        #[arg(long, short, default_value = "results.json")]
        output: PathBuf,

        /// Node addresses (host:port)
        nodes: Vec<NodeAddress>,
    },

    /// Measure put/get throughput
    Throughput {
        /// Repetitions (overrides config)
        #[arg(long)]
        repetitions: Option<usize>,

        /// Node addresses (host:port)
        nodes: Vec<NodeAddress>,
    },

    /// Check node endpoints
    Health {
        /// Node addresses (host:port)
        nodes: Vec<NodeAddress>,
    },

    /// Push ring parameters to every node
    Reconfigure {
        /// Maximum ring size
        #[arg(long)]
        max_nodes: usize,

        /// Finger table entries per node
        #[arg(long)]
        finger_table_size: usize,

        /// Node addresses (host:port)
        nodes: Vec<NodeAddress>,
    },

    /// Summarize a results file
    Report {
        /// Results file written by `bench`
        file: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ScenarioArg {
    All,
    Growth,
    Shrink,
    Crash,
}

impl ScenarioArg {
    fn kind(self) -> Option<ScenarioKind> {
        match self {
            ScenarioArg::All => None,
            ScenarioArg::Growth => Some(ScenarioKind::Growth),
            ScenarioArg::Shrink => Some(ScenarioKind::Shrink),
            ScenarioArg::Crash => Some(ScenarioKind::Crash),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Report { file } = &cli.command {
        return report::run(file);
    }

    let config = match &cli.config {
        Some(path) => BenchConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => BenchConfig::default(),
    };

    match cli.sim {
        Some(size) => {
            let sim = SimCluster::new(usize::from(size));
            let addresses = sim.addresses();
            let runtime = Runtime::new(Arc::new(sim), config, cli.seed)?;
            dispatch(&runtime, cli.command, Some(addresses)).await
        }
        None => {
            let runtime = Runtime::new(Arc::new(HttpTransport::new()), config, cli.seed)?;
            dispatch(&runtime, cli.command, None).await
        }
    }
}

async fn dispatch<T: ring_client::Transport>(
    runtime: &Runtime<T>,
    command: Commands,
    simulated: Option<Vec<NodeAddress>>,
) -> Result<()> {
    let select = |nodes: Vec<NodeAddress>| commands::select_nodes(nodes, simulated.clone());

    match command {
        Commands::Bench {
            scenario,
            repetitions,
            output,
            nodes,
        } => bench::run(runtime, scenario.kind(), repetitions, &output, select(nodes)?).await,
        Commands::Throughput { repetitions, nodes } => {
            throughput::run(runtime, repetitions, select(nodes)?).await
        }
        Commands::Health { nodes } => health::run(runtime, select(nodes)?).await,
        Commands::Reconfigure {
            max_nodes,
            finger_table_size,
            nodes,
        } => reconfigure::run(runtime, max_nodes, finger_table_size, select(nodes)?).await,
        Commands::Report { file } => report::run(&file),
    }
}
