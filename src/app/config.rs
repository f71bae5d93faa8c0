// Application configuration types
//
// This module contains configuration structs and enums for:
// - Owner identity used for graph nodes
// - Snapshot parsing options
// - Input/output locations

use clap::ValueEnum;
use std::path::PathBuf;

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of owning processes a single connection may list
pub const MAX_OWNERS: usize = 2;

/// Input file read when no path is given
pub const DEFAULT_INPUT: &str = "ss.txt";

/// Output file written when no path is given
pub const DEFAULT_OUTPUT: &str = "data.json";

/// Path that selects stdin or stdout instead of a file
pub const STDIO_PATH: &str = "-";

/// Default tracing filter
pub const DEFAULT_LOG_LEVEL: &str = "warn";

// ============================================================================
// Enums
// ============================================================================

/// Which owner field identifies a process in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OwnerIdentity {
    /// Process name (default). Distinct processes sharing a name collapse
    /// into one node.
    #[default]
    Name,
    /// Process id, rendered as a decimal string
    Pid,
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Options controlling how a snapshot is turned into connections
#[derive(Debug, Clone, Default)]
pub struct SnapshotConfig {
    /// Node identity for owners
    pub identity: OwnerIdentity,

    /// Drop a leading `State Recv-Q ...` column header
    pub skip_header: bool,
}

/// Everything needed for one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Snapshot file, or `-` for stdin
    pub input: PathBuf,

    /// Graph file, or `-` for stdout
    pub output: PathBuf,

    /// Indent the JSON output
    pub pretty: bool,

    pub snapshot: SnapshotConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output: PathBuf::from(DEFAULT_OUTPUT),
            pretty: false,
            snapshot: SnapshotConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn reads_stdin(&self) -> bool {
        self.input.as_os_str() == STDIO_PATH
    }

    pub fn writes_stdout(&self) -> bool {
        self.output.as_os_str() == STDIO_PATH
    }
}
