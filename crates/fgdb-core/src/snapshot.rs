//! Snapshot codec: whole-store serialization as a versioned, checksummed blob.
//!
//! Graphs are decomposed into flat node and edge rows (index, weight) and
//! rebuilt row by row on restore, so node and edge indices survive the round
//! trip exactly. Everything derived from the rows (name indices, version
//! tables, chain tail) is recomputed and re-validated rather than trusted.
//!
//! # Blob layout
//!
//! ```text
//! { "format": "fgdb-snapshot", "version": 1, "checksum": "<blake3 hex>",
//!   "payload": "<json text>" }
//! ```
//!
//! The checksum covers the exact payload bytes.

use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Directed;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::Timestamp;
use crate::management::ManagementGraph;
use crate::edge::{DeclarationEdge, OperationEdge};
use crate::node::{ManagementNode, OperationNode};
use crate::operation::{ExecutionRecord, OperationGraph};
use crate::registry::{BlockKind, IdentifierRegistry};

/// Format tag every snapshot carries.
pub const SNAPSHOT_FORMAT: &str = "fgdb-snapshot";

/// Current snapshot version. Restore rejects any other version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A graph broken into flat rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphRows<N, E> {
    /// `(node_index, weight)`, ascending by index.
    pub nodes: Vec<(u32, N)>,
    /// `(edge_index, source, target, weight)`, ascending by index.
    pub edges: Vec<(u32, u32, u32, E)>,
}

impl<N, E> Default for GraphRows<N, E> {
    fn default() -> Self {
        GraphRows {
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }
}

/// Breaks a graph into rows.
pub fn decompose<N: Clone, E: Clone>(graph: &StableGraph<N, E, Directed, u32>) -> GraphRows<N, E> {
    let mut nodes: Vec<(u32, N)> = graph
        .node_indices()
        .map(|idx| (idx.index() as u32, graph[idx].clone()))
        .collect();
    nodes.sort_by_key(|(idx, _)| *idx);

    let mut edges: Vec<(u32, u32, u32, E)> = graph
        .edge_references()
        .map(|e| {
            (
                e.id().index() as u32,
                e.source().index() as u32,
                e.target().index() as u32,
                e.weight().clone(),
            )
        })
        .collect();
    edges.sort_by_key(|(idx, ..)| *idx);

    GraphRows { nodes, edges }
}

/// Rebuilds a graph from rows. Indices must be dense and start at 0, which
/// holds for every graph this crate builds since nothing is ever removed.
pub fn recompose<N, E>(rows: GraphRows<N, E>) -> Result<StableGraph<N, E, Directed, u32>, CoreError> {
    let mut graph = StableGraph::with_capacity(rows.nodes.len(), rows.edges.len());

    for (expected, (index, weight)) in rows.nodes.into_iter().enumerate() {
        if index as usize != expected {
            return Err(CoreError::GraphInconsistency {
                reason: format!("node row {} out of sequence (expected {})", index, expected),
            });
        }
        graph.add_node(weight);
    }

    let node_count = graph.node_count() as u32;
    for (expected, (index, source, target, weight)) in rows.edges.into_iter().enumerate() {
        if index as usize != expected {
            return Err(CoreError::GraphInconsistency {
                reason: format!("edge row {} out of sequence (expected {})", index, expected),
            });
        }
        if source >= node_count || target >= node_count {
            return Err(CoreError::GraphInconsistency {
                reason: format!("edge {} references a missing node", index),
            });
        }
        graph.add_edge(
            NodeIndex::new(source as usize),
            NodeIndex::new(target as usize),
            weight,
        );
    }

    Ok(graph)
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    format: String,
    version: u32,
    checksum: String,
    payload: String,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    registry: IdentifierRegistry,
    management: GraphRows<ManagementNode, DeclarationEdge>,
    #[serde(default)]
    dependents: Vec<String>,
    operation: GraphRows<OperationNode, OperationEdge>,
    executions: Vec<ExecutionRecord>,
    high_water: Option<Timestamp>,
}

/// Serializes the three store components into a snapshot blob.
pub(crate) fn encode(
    registry: &IdentifierRegistry,
    management: &ManagementGraph,
    operation: &OperationGraph,
) -> Result<Vec<u8>, CoreError> {
    let payload = Payload {
        registry: registry.clone(),
        management: management.to_rows(),
        dependents: management.dependent_rows(),
        operation: operation.to_rows(),
        executions: operation.executions().to_vec(),
        high_water: operation.high_water(),
    };
    let payload = serde_json::to_string(&payload)?;
    let envelope = Envelope {
        format: SNAPSHOT_FORMAT.to_string(),
        version: SNAPSHOT_VERSION,
        checksum: blake3::hash(payload.as_bytes()).to_hex().to_string(),
        payload,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Restores the three store components from a snapshot blob.
///
/// Every failure, including an inconsistent graph, surfaces as
/// [`CoreError::Serialization`].
pub(crate) fn decode(
    blob: &[u8],
) -> Result<(IdentifierRegistry, ManagementGraph, OperationGraph), CoreError> {
    let envelope: Envelope = serde_json::from_slice(blob)?;
    if envelope.format != SNAPSHOT_FORMAT {
        return Err(CoreError::Serialization {
            reason: format!("unknown snapshot format '{}'", envelope.format),
        });
    }
    if envelope.version != SNAPSHOT_VERSION {
        return Err(CoreError::Serialization {
            reason: format!(
                "unsupported snapshot version {} (expected {})",
                envelope.version, SNAPSHOT_VERSION
            ),
        });
    }
    let actual = blake3::hash(envelope.payload.as_bytes()).to_hex().to_string();
    if actual != envelope.checksum {
        return Err(CoreError::Serialization {
            reason: "snapshot checksum mismatch".into(),
        });
    }

    let payload: Payload = serde_json::from_str(&envelope.payload)?;
    rebuild(payload).map_err(|err| match err {
        CoreError::GraphInconsistency { reason } => CoreError::Serialization {
            reason: format!("inconsistent snapshot: {}", reason),
        },
        other => other,
    })
}

fn rebuild(
    payload: Payload,
) -> Result<(IdentifierRegistry, ManagementGraph, OperationGraph), CoreError> {
    let registry = payload.registry;
    let management = ManagementGraph::from_rows(payload.management, payload.dependents)?;
    let operation = OperationGraph::from_rows(
        payload.operation,
        payload.executions,
        payload.high_water,
    )?;

    // The management chain must list exactly the registry, in order.
    let chain = management.declaration_order();
    if chain.len() != registry.len() {
        return Err(CoreError::GraphInconsistency {
            reason: format!(
                "registry holds {} name(s) but the management graph {}",
                registry.len(),
                chain.len()
            ),
        });
    }
    for ((_, name, kind), node) in registry.iter().zip(chain) {
        let matches = match (kind, node) {
            (BlockKind::Function, ManagementNode::Function(n)) => n == name,
            (BlockKind::Variable, ManagementNode::Variable(n)) => n == name,
            _ => false,
        };
        if !matches {
            return Err(CoreError::GraphInconsistency {
                reason: format!("registry entry '{}' does not match management node '{}'", name, node),
            });
        }
    }

    // Referential integrity between the layers.
    let og = operation.graph();
    for node in og.node_indices().map(|idx| &og[idx]) {
        if let Some(name) = node.name() {
            if !registry.is_variable(name) {
                return Err(CoreError::GraphInconsistency {
                    reason: format!("operation node '{}' is not a declared variable", node),
                });
            }
        }
    }
    for edge in og.edge_references() {
        if let Some(function) = edge.weight().function() {
            if !registry.is_function(function) {
                return Err(CoreError::GraphInconsistency {
                    reason: format!("operation edge uses undeclared function '{}'", function),
                });
            }
        }
    }

    Ok((registry, management, operation))
}
