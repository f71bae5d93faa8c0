// ssgraph - process-to-process communication graphs from `ss -tip` snapshots
// Reads paired summary/detail lines and writes a {nodes, links} JSON graph

mod app;
mod graph;
mod net;

use anyhow::{Context, Result};
use app::config::{
    OwnerIdentity, RunConfig, SnapshotConfig, DEFAULT_INPUT, DEFAULT_LOG_LEVEL, DEFAULT_OUTPUT,
};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

/// Convert an `ss -tip` snapshot into a communication graph.
#[derive(Parser, Debug)]
#[command(name = "ssgraph", version, about)]
struct Cli {
    /// Snapshot file with alternating summary and detail lines ("-" for stdin).
    #[arg(default_value = DEFAULT_INPUT)]
    input: PathBuf,

    /// Where to write the JSON graph ("-" for stdout).
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Owner field used as the graph node id.
    #[arg(long, value_enum, default_value_t = OwnerIdentity::Name)]
    identity: OwnerIdentity,

    /// Discard a leading "State Recv-Q ..." column header.
    #[arg(long)]
    skip_header: bool,

    /// Indent the JSON output.
    #[arg(long)]
    pretty: bool,

    /// Logging verbosity level (trace, debug, info, warn, error).
    #[arg(long, default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
}

impl Cli {
    fn into_config(self) -> RunConfig {
        RunConfig {
            input: self.input,
            output: self.output,
            pretty: self.pretty,
            snapshot: SnapshotConfig {
                identity: self.identity,
                skip_header: self.skip_header,
            },
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout can carry the graph
    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    app::run(&cli.into_config())
}
