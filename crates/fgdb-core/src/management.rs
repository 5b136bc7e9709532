//! ManagementGraph: the declaration-order record of function and data blocks.
//!
//! Every newly declared name becomes a node whose parent is the previously
//! declared node, so the graph is a single chain hanging off the root. The
//! chain is an audit trail of what was declared when; the functional
//! dependency structure lives in the [`OperationGraph`](crate::operation::OperationGraph).

use std::collections::{BTreeSet, HashMap};

use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::{Directed, Direction};
use tracing::debug;

use crate::dag::check_rooted_dag;
use crate::edge::DeclarationEdge;
use crate::error::CoreError;
use crate::id::NodeId;
use crate::node::{ManagementNode, NodeKind};
use crate::registry::{BlockKind, IdentifierRegistry};
use crate::snapshot::{decompose, recompose, GraphRows};
use crate::statement::{is_valid_name, Statement};

/// The management graph.
#[derive(Debug, Clone)]
pub struct ManagementGraph {
    graph: StableGraph<ManagementNode, DeclarationEdge, Directed, u32>,
    root: NodeIndex<u32>,
    /// Declared name -> node.
    index: HashMap<String, NodeIndex<u32>>,
    /// Most recently declared node; the parent of the next declaration.
    tail: NodeIndex<u32>,
    /// Variables some registered statement assigns to.
    dependents: BTreeSet<String>,
}

impl ManagementGraph {
    /// Creates a graph holding only the root sentinel.
    pub fn new() -> Self {
        let mut graph = StableGraph::new();
        let root = graph.add_node(ManagementNode::Root);
        ManagementGraph {
            graph,
            root,
            index: HashMap::new(),
            tail: root,
            dependents: BTreeSet::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Declares a function block. Idempotent for an existing function.
    pub fn register_function(
        &mut self,
        registry: &mut IdentifierRegistry,
        name: &str,
    ) -> Result<NodeId, CoreError> {
        self.register(registry, name, BlockKind::Function)
    }

    /// Declares a data block. Idempotent for an existing variable.
    pub fn register_variable(
        &mut self,
        registry: &mut IdentifierRegistry,
        name: &str,
    ) -> Result<NodeId, CoreError> {
        self.register(registry, name, BlockKind::Variable)
    }

    /// Declares everything a statement mentions: the function first, then the
    /// variables left to right (`lhs`, then each argument).
    ///
    /// Invalid names are rejected before anything is declared. A name that
    /// conflicts with an earlier declaration of the other kind is skipped;
    /// the rest of the statement still registers and the first conflict is
    /// returned afterwards. A successfully declared `lhs` is remembered as a
    /// dependent variable.
    pub fn register_statement(
        &mut self,
        registry: &mut IdentifierRegistry,
        statement: &Statement,
    ) -> Result<Vec<NodeId>, CoreError> {
        let names: Vec<(&str, BlockKind)> =
            std::iter::once((statement.function.as_str(), BlockKind::Function))
                .chain(statement.variables().map(|v| (v, BlockKind::Variable)))
                .collect();

        if let Some((bad, _)) = names.iter().find(|(name, _)| !is_valid_name(name)) {
            let reason = if bad.is_empty() {
                "empty name"
            } else {
                "invalid identifier"
            };
            return Err(CoreError::parse(0, *bad, reason));
        }

        let mut nodes = Vec::with_capacity(names.len());
        let mut first_conflict = None;
        for (name, kind) in names {
            match self.register(registry, name, kind) {
                Ok(node) => nodes.push(node),
                Err(err @ CoreError::Conflict { .. }) => {
                    debug!("skipping conflicting declaration of '{}': {}", name, err);
                    first_conflict.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }
        if self.contains_variable(&statement.lhs) {
            self.dependents.insert(statement.lhs.clone());
        }

        match first_conflict {
            Some(err) => Err(err),
            None => Ok(nodes),
        }
    }

    fn register(
        &mut self,
        registry: &mut IdentifierRegistry,
        name: &str,
        kind: BlockKind,
    ) -> Result<NodeId, CoreError> {
        let declaration = registry.declare(name, kind)?;
        if !declaration.fresh {
            return self
                .index
                .get(name)
                .map(|&idx| NodeId::from(idx))
                .ok_or_else(|| CoreError::GraphInconsistency {
                    reason: format!("'{}' is declared but has no management node", name),
                });
        }

        let node = match kind {
            BlockKind::Function => ManagementNode::Function(name.to_string()),
            BlockKind::Variable => ManagementNode::Variable(name.to_string()),
        };
        let idx = self.graph.add_node(node);
        self.graph.add_edge(self.tail, idx, DeclarationEdge);
        self.index.insert(name.to_string(), idx);
        self.tail = idx;

        debug!("declared {} '{}' as management node {}", kind, name, idx.index());
        Ok(NodeId::from(idx))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Read-only access to the underlying graph.
    pub fn graph(&self) -> &StableGraph<ManagementNode, DeclarationEdge, Directed, u32> {
        &self.graph
    }

    pub fn root(&self) -> NodeId {
        NodeId::from(self.root)
    }

    /// The most recently declared node, or the root when nothing is declared.
    pub fn tail(&self) -> NodeId {
        NodeId::from(self.tail)
    }

    pub fn node(&self, id: NodeId) -> Option<&ManagementNode> {
        self.graph.node_weight(id.into())
    }

    pub fn node_of(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).map(|&idx| NodeId::from(idx))
    }

    pub fn contains_function(&self, name: &str) -> bool {
        matches!(self.node_of(name).and_then(|id| self.node(id)), Some(ManagementNode::Function(_)))
    }

    pub fn contains_variable(&self, name: &str) -> bool {
        matches!(self.node_of(name).and_then(|id| self.node(id)), Some(ManagementNode::Variable(_)))
    }

    /// Whether some registered statement assigns to `name`.
    pub fn is_dependent(&self, name: &str) -> bool {
        self.dependents.contains(name)
    }

    /// Assigned variables, sorted by name.
    pub fn dependents(&self) -> impl Iterator<Item = &str> {
        self.dependents.iter().map(String::as_str)
    }

    /// Kind tag of a node of this graph: variables some statement assigns to
    /// are dependent, every other variable is independent.
    pub fn kind_of(&self, node: &ManagementNode) -> NodeKind {
        match node {
            ManagementNode::Variable(name) if self.is_dependent(name) => NodeKind::DependentVariable,
            other => other.kind(),
        }
    }

    /// The node declared immediately before `id`.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.graph
            .neighbors_directed(id.into(), Direction::Incoming)
            .next()
            .map(NodeId::from)
    }

    /// Walks the declaration chain from the root, root excluded.
    pub fn declaration_order(&self) -> Vec<&ManagementNode> {
        let mut order = Vec::with_capacity(self.index.len());
        let mut current = self.root;
        while let Some(next) = self
            .graph
            .neighbors_directed(current, Direction::Outgoing)
            .next()
        {
            order.push(&self.graph[next]);
            current = next;
        }
        order
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    // -----------------------------------------------------------------------
    // Snapshot support
    // -----------------------------------------------------------------------

    pub(crate) fn to_rows(&self) -> GraphRows<ManagementNode, DeclarationEdge> {
        decompose(&self.graph)
    }

    pub(crate) fn dependent_rows(&self) -> Vec<String> {
        self.dependents.iter().cloned().collect()
    }

    /// Rebuilds a graph from stored rows, re-deriving the name index and the
    /// chain tail and re-checking the chain shape. Every dependent must be a
    /// declared variable.
    pub(crate) fn from_rows(
        rows: GraphRows<ManagementNode, DeclarationEdge>,
        dependents: Vec<String>,
    ) -> Result<Self, CoreError> {
        let graph = recompose(rows)?;
        let root = NodeIndex::new(0);

        match graph.node_weight(root) {
            Some(ManagementNode::Root) => {}
            _ => {
                return Err(CoreError::GraphInconsistency {
                    reason: "management node 0 is not the root".into(),
                })
            }
        }
        check_rooted_dag(&graph, root, "management")?;

        let mut index = HashMap::new();
        let mut tail = root;
        for idx in graph.node_indices() {
            if idx == root {
                continue;
            }
            let name = match &graph[idx] {
                ManagementNode::Root => {
                    return Err(CoreError::GraphInconsistency {
                        reason: format!("second management root at node {}", idx.index()),
                    })
                }
                ManagementNode::Function(name) | ManagementNode::Variable(name) => name.clone(),
            };
            if graph.neighbors_directed(idx, Direction::Incoming).count() != 1 {
                return Err(CoreError::GraphInconsistency {
                    reason: format!("management node '{}' must have exactly one parent", name),
                });
            }
            if index.insert(name.clone(), idx).is_some() {
                return Err(CoreError::GraphInconsistency {
                    reason: format!("duplicate management node '{}'", name),
                });
            }
            tail = idx;
        }

        let mut mg = ManagementGraph {
            graph,
            root,
            index,
            tail,
            dependents: BTreeSet::new(),
        };
        for name in dependents {
            if !mg.contains_variable(&name) {
                return Err(CoreError::GraphInconsistency {
                    reason: format!("dependent '{}' is not a declared variable", name),
                });
            }
            mg.dependents.insert(name);
        }
        Ok(mg)
    }
}

impl Default for ManagementGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural equality: identical node and edge tables and dependents.
impl PartialEq for ManagementGraph {
    fn eq(&self, other: &Self) -> bool {
        self.dependents == other.dependents && self.to_rows() == other.to_rows()
    }
}

impl Eq for ManagementGraph {}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (ManagementGraph, IdentifierRegistry) {
        (ManagementGraph::new(), IdentifierRegistry::new())
    }

    #[test]
    fn new_graph_has_only_root() {
        let (mg, _) = fresh();
        assert_eq!(mg.node_count(), 1);
        assert_eq!(mg.edge_count(), 0);
        assert_eq!(mg.tail(), mg.root());
        assert!(mg.declaration_order().is_empty());
    }

    #[test]
    fn first_registration_hangs_off_root() {
        let (mut mg, mut reg) = fresh();
        let f = mg.register_function(&mut reg, "f1").unwrap();
        assert_eq!(mg.parent_of(f), Some(mg.root()));
        assert!(mg.contains_function("f1"));
        assert!(!mg.contains_variable("f1"));
    }

    #[test]
    fn registrations_chain_in_global_order() {
        let (mut mg, mut reg) = fresh();
        let f = mg.register_function(&mut reg, "f1").unwrap();
        let x = mg.register_variable(&mut reg, "x1").unwrap();
        let g = mg.register_function(&mut reg, "f2").unwrap();
        assert_eq!(mg.parent_of(x), Some(f));
        assert_eq!(mg.parent_of(g), Some(x));
        assert_eq!(mg.tail(), g);
    }

    #[test]
    fn reregistration_is_idempotent() {
        let (mut mg, mut reg) = fresh();
        let first = mg.register_variable(&mut reg, "x1").unwrap();
        let nodes = mg.node_count();
        let edges = mg.edge_count();
        for _ in 0..5 {
            assert_eq!(mg.register_variable(&mut reg, "x1").unwrap(), first);
        }
        assert_eq!(mg.node_count(), nodes);
        assert_eq!(mg.edge_count(), edges);
    }

    #[test]
    fn statement_registers_function_then_variables() {
        let (mut mg, mut reg) = fresh();
        let stmt = Statement::new("y3", "f3", ["y1", "y2"]);
        let nodes = mg.register_statement(&mut reg, &stmt).unwrap();
        assert_eq!(nodes.len(), 4);

        let order: Vec<String> = mg
            .declaration_order()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(order, vec!["f3", "y3", "y1", "y2"]);
    }

    #[test]
    fn repeated_names_in_statement_are_declared_once() {
        let (mut mg, mut reg) = fresh();
        let stmt = Statement::new("x", "inc", ["x", "x"]);
        mg.register_statement(&mut reg, &stmt).unwrap();
        assert_eq!(mg.node_count(), 3);
        assert_eq!(mg.edge_count(), 2);
    }

    #[test]
    fn conflict_skips_only_the_offending_name() {
        let (mut mg, mut reg) = fresh();
        mg.register_function(&mut reg, "f1").unwrap();

        // `f1` used as a variable conflicts; `g` and `y` still register.
        let stmt = Statement::new("y", "g", ["f1"]);
        let err = mg.register_statement(&mut reg, &stmt).unwrap_err();
        assert!(matches!(err, CoreError::Conflict { ref name, .. } if name == "f1"));
        assert!(mg.contains_function("g"));
        assert!(mg.contains_variable("y"));
        assert!(mg.contains_function("f1"));
        assert_eq!(mg.node_count(), 4);
    }

    #[test]
    fn invalid_statement_does_not_mutate() {
        let (mut mg, mut reg) = fresh();
        let stmt = Statement::new("y", "f", ["ok", "not valid"]);
        let err = mg.register_statement(&mut reg, &stmt).unwrap_err();
        assert!(matches!(err, CoreError::Parse { ref token, .. } if token == "not valid"));
        assert_eq!(mg.node_count(), 1);
        assert!(reg.is_empty());
    }

    #[test]
    fn rows_roundtrip_preserves_structure() {
        let (mut mg, mut reg) = fresh();
        mg.register_statement(&mut reg, &Statement::new("y1", "f1", ["x1"]))
            .unwrap();
        let rebuilt = ManagementGraph::from_rows(mg.to_rows(), mg.dependent_rows()).unwrap();
        assert_eq!(rebuilt, mg);
        assert_eq!(rebuilt.tail(), mg.tail());
        assert_eq!(rebuilt.node_of("x1"), mg.node_of("x1"));
        assert!(rebuilt.is_dependent("y1"));
    }

    #[test]
    fn from_rows_rejects_duplicate_names() {
        let mut rows = GraphRows::default();
        rows.nodes.push((0, ManagementNode::Root));
        rows.nodes.push((1, ManagementNode::Variable("x".into())));
        rows.nodes.push((2, ManagementNode::Variable("x".into())));
        rows.edges.push((0, 0, 1, DeclarationEdge));
        rows.edges.push((1, 1, 2, DeclarationEdge));
        let err = ManagementGraph::from_rows(rows, Vec::new()).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn lhs_names_are_tagged_dependent() {
        let (mut mg, mut reg) = fresh();
        mg.register_statement(&mut reg, &Statement::new("y1", "f1", ["x1"]))
            .unwrap();

        assert!(mg.is_dependent("y1"));
        assert!(!mg.is_dependent("x1"));
        assert_eq!(
            mg.kind_of(&ManagementNode::Variable("y1".into())),
            NodeKind::DependentVariable
        );
        assert_eq!(
            mg.kind_of(&ManagementNode::Variable("x1".into())),
            NodeKind::IndependentVariable
        );
        assert_eq!(mg.kind_of(&ManagementNode::Function("f1".into())), NodeKind::Function);

        // Later use as an input does not undo the tag.
        mg.register_statement(&mut reg, &Statement::new("z", "f2", ["y1"]))
            .unwrap();
        assert_eq!(mg.dependents().collect::<Vec<_>>(), vec!["y1", "z"]);
    }

    #[test]
    fn conflicting_lhs_is_not_a_dependent() {
        let (mut mg, mut reg) = fresh();
        mg.register_function(&mut reg, "f").unwrap();
        let _ = mg.register_statement(&mut reg, &Statement::new("f", "g", ["x"]));
        assert!(!mg.is_dependent("f"));
    }

    #[test]
    fn from_rows_rejects_unknown_dependent() {
        let (mut mg, mut reg) = fresh();
        mg.register_statement(&mut reg, &Statement::new("y1", "f1", ["x1"]))
            .unwrap();
        let err = ManagementGraph::from_rows(mg.to_rows(), vec!["f1".into()]).unwrap_err();
        assert!(err.to_string().contains("not a declared variable"));
    }
}
