// graph module - process-to-process communication graph
// Maps connection endpoints to their owning processes and emits weighted
// edges, one per owned connection
//
// Built in two passes: the address index sees every connection before any
// edge is resolved, so input order does not affect resolution.

use crate::net::{Connection, ProcessOwner};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Errors raised while building the graph
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("connection {local_addr} -> {peer_addr} has zero average rtt, weight is undefined")]
    ZeroRtt {
        local_addr: String,
        peer_addr: String,
    },
}

/// A graph vertex: an owning process or an unresolved endpoint address
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node<'a> {
    pub id: String,
    #[serde(flatten)]
    pub owner: Option<&'a ProcessOwner>,
}

/// A directed edge from a local process to its peer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link<'a> {
    pub source: String,
    pub target: String,
    /// `1 / rtt_avg`, smaller means further apart
    pub weight: f64,
    #[serde(flatten)]
    pub connection: &'a Connection,
}

/// Nodes and links ready for a force-directed renderer
///
/// Node ids are not deduplicated; the same process appears once per
/// connection that mentions it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Graph<'a> {
    pub nodes: Vec<Node<'a>>,
    pub links: Vec<Link<'a>>,
}

/// Raw endpoint address -> identity of the process known to own it
#[derive(Debug)]
pub struct AddressOwnerIndex<'a> {
    map: HashMap<&'a str, Option<&'a str>>,
}

impl<'a> AddressOwnerIndex<'a> {
    /// Record every local address, and every peer address whose owner is known
    ///
    /// Later connections overwrite earlier entries for the same address.
    pub fn build(conns: &'a [Connection]) -> Self {
        let mut map = HashMap::new();

        for conn in conns {
            let summary = &conn.summary;
            map.insert(summary.local_addr.as_str(), conn.local_owner.as_deref());

            if let Some(peer) = conn.peer_owner.as_deref() {
                if !summary.peer_addr.is_empty() {
                    map.insert(summary.peer_addr.as_str(), Some(peer));
                }
            }
        }

        Self { map }
    }

    /// Whether the address was seen at all, owned or not
    pub fn contains(&self, addr: &str) -> bool {
        self.map.contains_key(addr)
    }

    /// Owner identity recorded for the address
    ///
    /// `None` when the address is unknown or was last seen without an owner.
    pub fn owner_of(&self, addr: &str) -> Option<&'a str> {
        self.map.get(addr).copied().flatten()
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }
}

/// Build the communication graph from a full snapshot
pub fn build_graph(conns: &[Connection]) -> Result<Graph<'_>, GraphError> {
    let index = AddressOwnerIndex::build(conns);
    debug!("build_graph: Indexed {} addresses", index.len());

    let mut nodes = Vec::new();
    let mut links = Vec::new();

    for conn in conns {
        let summary = &conn.summary;

        // No visible local process, nothing to draw
        let Some(own_identity) = conn.local_owner.as_deref() else {
            debug!(local = %summary.local_addr, "Skipping connection without owner");
            continue;
        };

        if conn.rtt_avg == 0.0 {
            return Err(GraphError::ZeroRtt {
                local_addr: summary.local_addr.clone(),
                peer_addr: summary.peer_addr.clone(),
            });
        }
        let weight = 1.0 / conn.rtt_avg;

        let source = index
            .owner_of(&summary.local_addr)
            .unwrap_or(own_identity)
            .to_string();
        let target = match index.owner_of(&summary.peer_addr) {
            Some(peer) => peer.to_string(),
            None => {
                if index.contains(&summary.peer_addr) {
                    debug!(peer = %summary.peer_addr, "Peer address known but unowned");
                }
                summary.peer_addr.clone()
            }
        };

        links.push(Link {
            source: source.clone(),
            target: target.clone(),
            weight,
            connection: conn,
        });
        nodes.push(Node {
            id: target,
            owner: None,
        });
        nodes.push(Node {
            id: source,
            owner: conn.local_process(),
        });
    }

    debug!(
        "build_graph: Emitted {} nodes and {} links",
        nodes.len(),
        links.len()
    );
    Ok(Graph { nodes, links })
}
