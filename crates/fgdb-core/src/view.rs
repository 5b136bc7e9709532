//! Read-only export of both graph layers as plain node and edge lists.
//!
//! Visualizers consume this instead of walking the petgraph structures.

use petgraph::stable_graph::StableGraph;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Directed;
use serde::{Deserialize, Serialize};

use crate::edge::{DeclarationEdge, OperationEdge};
use crate::id::{EdgeId, NodeId};
use crate::management::ManagementGraph;
use crate::node::{ManagementNode, NodeKind, OperationNode};
use crate::operation::OperationGraph;

/// An exported node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedNode {
    pub id: NodeId,
    /// `ROOT`, a declared name, or `name@timestamp` for instances.
    pub label: String,
    pub kind: NodeKind,
}

/// An exported edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    /// Applied function for operation edges.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedGraph {
    pub nodes: Vec<ExportedNode>,
    pub edges: Vec<ExportedEdge>,
}

impl ExportedGraph {
    fn export<N, E>(
        graph: &StableGraph<N, E, Directed, u32>,
        node: impl Fn(&N) -> (String, NodeKind),
        edge: impl Fn(&E) -> Option<String>,
    ) -> Self {
        let nodes = graph
            .node_indices()
            .map(|idx| {
                let (label, kind) = node(&graph[idx]);
                ExportedNode {
                    id: NodeId::from(idx),
                    label,
                    kind,
                }
            })
            .collect();
        let edges = graph
            .edge_references()
            .map(|e| ExportedEdge {
                id: EdgeId::from(e.id()),
                source: NodeId::from(e.source()),
                target: NodeId::from(e.target()),
                label: edge(e.weight()),
            })
            .collect();
        ExportedGraph { nodes, edges }
    }

    pub fn node(&self, id: NodeId) -> Option<&ExportedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The node with the given label.
    pub fn find(&self, label: &str) -> Option<&ExportedNode> {
        self.nodes.iter().find(|n| n.label == label)
    }

    pub fn count_kind(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.kind == kind).count()
    }
}

/// Both layers of a store, exported together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphView {
    pub management: ExportedGraph,
    pub operation: ExportedGraph,
}

impl GraphView {
    pub fn new(management: &ManagementGraph, operation: &OperationGraph) -> Self {
        GraphView {
            management: ExportedGraph::export(
                management.graph(),
                |n: &ManagementNode| (n.to_string(), management.kind_of(n)),
                |_: &DeclarationEdge| None,
            ),
            operation: ExportedGraph::export(
                operation.graph(),
                |n: &OperationNode| (n.to_string(), n.kind()),
                |e: &OperationEdge| e.function().map(str::to_string),
            ),
        }
    }

    pub fn to_json(&self) -> Result<String, crate::error::CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Timestamp;
    use crate::registry::IdentifierRegistry;
    use crate::statement::Statement;

    fn view() -> GraphView {
        let mut reg = IdentifierRegistry::new();
        let mut mg = ManagementGraph::new();
        let mut og = OperationGraph::new();
        let stmt: Statement = "y1 = f1(x1)".parse().unwrap();
        mg.register_statement(&mut reg, &stmt).unwrap();
        og.record_execution(&mg, "f1", &["x1"], "y1", Timestamp(7)).unwrap();
        GraphView::new(&mg, &og)
    }

    #[test]
    fn exports_kinds_and_labels() {
        let view = view();

        assert_eq!(view.management.nodes.len(), 4);
        assert_eq!(view.management.count_kind(NodeKind::Function), 1);
        assert_eq!(view.management.count_kind(NodeKind::IndependentVariable), 1);
        assert_eq!(view.management.find("y1").unwrap().kind, NodeKind::DependentVariable);
        assert_eq!(view.management.find("x1").unwrap().kind, NodeKind::IndependentVariable);
        assert!(view.management.edges.iter().all(|e| e.label.is_none()));

        let x1 = view.operation.find("x1").unwrap();
        let y1 = view.operation.find("y1@7").unwrap();
        assert_eq!(x1.kind, NodeKind::IndependentVariable);
        assert_eq!(y1.kind, NodeKind::DependentVariable);

        let applied = view
            .operation
            .edges
            .iter()
            .find(|e| e.target == y1.id)
            .unwrap();
        assert_eq!(applied.source, x1.id);
        assert_eq!(applied.label.as_deref(), Some("f1"));
    }

    #[test]
    fn json_uses_kebab_case_kinds() {
        let json = view().to_json().unwrap();
        assert!(json.contains("\"dependent-variable\""));
        assert!(json.contains("\"root\""));
    }
}
