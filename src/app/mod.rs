// Run orchestration
//
// Reads a snapshot, parses it, builds the graph and writes it out. The
// graph is fully built before any output is written, and file output goes
// through a sibling temp file renamed into place, so a failed run never
// leaves a partial or truncated graph file behind.

pub mod config;

use config::RunConfig;

use crate::graph::{self, Graph};
use crate::net;
use anyhow::{Context, Result};
use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

/// Execute one snapshot-to-graph conversion
pub fn run(config: &RunConfig) -> Result<()> {
    let input = read_input(config)?;

    let connections = net::parse_snapshot(&input, &config.snapshot)
        .with_context(|| format!("parsing {}", config.input.display()))?;
    let graph = graph::build_graph(&connections)?;

    write_graph(config, &graph)?;

    info!(
        connections = connections.len(),
        nodes = graph.nodes.len(),
        links = graph.links.len(),
        output = %config.output.display(),
        "graph written"
    );
    Ok(())
}

fn read_input(config: &RunConfig) -> Result<String> {
    if config.reads_stdin() {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("reading snapshot from stdin")?;
        return Ok(buf);
    }

    fs::read_to_string(&config.input)
        .with_context(|| format!("Cannot read {}", config.input.display()))
}

fn write_graph(config: &RunConfig, graph: &Graph<'_>) -> Result<()> {
    if config.writes_stdout() {
        let stdout = io::stdout();
        return encode(stdout.lock(), graph, config.pretty).context("writing graph to stdout");
    }

    write_atomically(&config.output, |file| {
        encode(BufWriter::new(file), graph, config.pretty)
    })
    .with_context(|| format!("writing graph to {}", config.output.display()))
}

/// Write through a temp file in the target's directory, then rename it over
/// the target. On error the target is left as it was.
fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Cannot create temp file in {}", dir.display()))?;

    write(tmp.as_file_mut())?;

    tmp.persist(path)
        .with_context(|| format!("Cannot replace {}", path.display()))?;
    Ok(())
}

fn encode<W: Write>(mut writer: W, graph: &Graph<'_>, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut writer, graph)?;
    } else {
        serde_json::to_writer(&mut writer, graph)?;
    }
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
