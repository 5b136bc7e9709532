//! OperationGraph: the append-only execution history.
//!
//! Nodes are variable versions. A variable first referenced as an input
//! before anything produced it becomes an independent node anchored to the
//! root. Every recorded execution adds one new [`VariableInstance`] for its
//! output and one function-labeled edge from the latest version of each
//! distinct input. Nothing is ever edited or removed.

use std::collections::HashMap;

use indexmap::IndexSet;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dag::check_rooted_dag;
use crate::edge::OperationEdge;
use crate::error::CoreError;
use crate::id::{NodeId, Timestamp};
use crate::management::ManagementGraph;
use crate::node::{OperationNode, VariableInstance};
use crate::snapshot::{decompose, recompose, GraphRows};

/// Where a variable base-name stands in its lifecycle.
///
/// `Unseen -> Independent -> Versioned(1) -> Versioned(2) -> ...`, with
/// `Unseen -> Versioned(1)` allowed directly. A versioned name never goes
/// back to independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableState {
    Unseen,
    Independent,
    /// Number of produced instances.
    Versioned(usize),
}

/// One entry of the execution feed handed to script generators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub function: String,
    /// Display names of the bound inputs: `x` for an independent variable,
    /// `y@t` for an instance. One entry per distinct input.
    pub inputs: Vec<String>,
    /// Display name of the produced instance, `lhs@timestamp`.
    pub output: String,
    pub timestamp: Timestamp,
}

/// The operation graph.
#[derive(Debug, Clone)]
pub struct OperationGraph {
    graph: StableGraph<OperationNode, OperationEdge, Directed, u32>,
    root: NodeIndex<u32>,
    /// Base-name -> independent node, for names referenced before production.
    independents: HashMap<String, NodeIndex<u32>>,
    /// Base-name -> produced instances, oldest first.
    versions: HashMap<String, Vec<NodeIndex<u32>>>,
    /// Execution feed in recording order.
    executions: Vec<ExecutionRecord>,
    /// Largest timestamp recorded so far.
    high_water: Option<Timestamp>,
}

impl OperationGraph {
    /// Creates a graph holding only the root sentinel.
    pub fn new() -> Self {
        let mut graph = StableGraph::new();
        let root = graph.add_node(OperationNode::Root);
        OperationGraph {
            graph,
            root,
            independents: HashMap::new(),
            versions: HashMap::new(),
            executions: Vec::new(),
            high_water: None,
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Records that `function` consumed `args` and produced a new version of
    /// `lhs` at `timestamp`.
    ///
    /// Every input binds to the latest version of its name, or to its
    /// independent node (created and anchored to the root on first use) when
    /// the name was never produced. Repeated input names yield one edge.
    ///
    /// All checks run before the graph is touched, so a rejected execution
    /// leaves the graph unchanged:
    /// - `function` must be a function in `mg` ([`CoreError::UnknownFunction`]),
    /// - at least one input is required ([`CoreError::NoInputs`]),
    /// - `lhs` and every input must be variables in `mg`
    ///   ([`CoreError::UnknownVariable`]),
    /// - `timestamp` must be later than every recorded one
    ///   ([`CoreError::TimestampCollision`]).
    pub fn record_execution<S: AsRef<str>>(
        &mut self,
        mg: &ManagementGraph,
        function: &str,
        args: &[S],
        lhs: &str,
        timestamp: Timestamp,
    ) -> Result<VariableInstance, CoreError> {
        if !mg.contains_function(function) {
            return Err(CoreError::UnknownFunction {
                name: function.to_string(),
            });
        }
        if args.is_empty() {
            return Err(CoreError::NoInputs {
                function: function.to_string(),
            });
        }
        let inputs: IndexSet<&str> = args.iter().map(AsRef::as_ref).collect();
        for name in inputs.iter().copied().chain(std::iter::once(lhs)) {
            if !mg.contains_variable(name) {
                return Err(CoreError::UnknownVariable {
                    name: name.to_string(),
                });
            }
        }
        if let Some(latest) = self.high_water {
            if timestamp <= latest {
                return Err(CoreError::TimestampCollision {
                    name: lhs.to_string(),
                    timestamp,
                    latest,
                });
            }
        }

        // Bind inputs before the new instance exists, so `x = f(x)` reads the
        // previous version of `x`.
        let sources: Vec<NodeIndex<u32>> = inputs
            .iter()
            .map(|name| self.bind_input(name))
            .collect();

        let instance = VariableInstance::new(lhs, timestamp);
        let target = self
            .graph
            .add_node(OperationNode::Instance(instance.clone()));
        for &source in &sources {
            self.graph
                .add_edge(source, target, OperationEdge::applied(function));
        }
        self.versions.entry(lhs.to_string()).or_default().push(target);
        self.high_water = Some(timestamp);

        let record = ExecutionRecord {
            function: function.to_string(),
            inputs: sources
                .iter()
                .map(|&idx| self.graph[idx].to_string())
                .collect(),
            output: instance.to_string(),
            timestamp,
        };
        debug!(
            "recorded {} = {}({})",
            record.output,
            record.function,
            record.inputs.join(", ")
        );
        self.executions.push(record);

        Ok(instance)
    }

    /// Marks `name` as an independent variable anchored to the root.
    ///
    /// Idempotent for a name that is already independent. Fails with
    /// [`CoreError::InvalidTransition`] once the name has been produced, and
    /// with [`CoreError::UnknownVariable`] if `mg` does not declare it.
    pub fn declare_independent(
        &mut self,
        mg: &ManagementGraph,
        name: &str,
    ) -> Result<NodeId, CoreError> {
        if !mg.contains_variable(name) {
            return Err(CoreError::UnknownVariable {
                name: name.to_string(),
            });
        }
        if self.versions.contains_key(name) {
            return Err(CoreError::InvalidTransition {
                name: name.to_string(),
            });
        }
        Ok(NodeId::from(self.independent_node(name)))
    }

    fn bind_input(&mut self, name: &str) -> NodeIndex<u32> {
        match self.versions.get(name).and_then(|v| v.last()) {
            Some(&latest) => latest,
            None => self.independent_node(name),
        }
    }

    fn independent_node(&mut self, name: &str) -> NodeIndex<u32> {
        if let Some(&idx) = self.independents.get(name) {
            return idx;
        }
        let idx = self
            .graph
            .add_node(OperationNode::Independent(name.to_string()));
        self.graph.add_edge(self.root, idx, OperationEdge::Anchor);
        self.independents.insert(name.to_string(), idx);
        debug!("anchored independent variable '{}'", name);
        idx
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Read-only access to the underlying graph.
    pub fn graph(&self) -> &StableGraph<OperationNode, OperationEdge, Directed, u32> {
        &self.graph
    }

    pub fn root(&self) -> NodeId {
        NodeId::from(self.root)
    }

    pub fn node(&self, id: NodeId) -> Option<&OperationNode> {
        self.graph.node_weight(id.into())
    }

    /// The most recent version of `name`.
    pub fn latest_instance(&self, name: &str) -> Option<&VariableInstance> {
        self.latest_node(name)
            .and_then(|id| self.node(id))
            .and_then(OperationNode::as_instance)
    }

    /// Node of the most recent version of `name`.
    pub fn latest_node(&self, name: &str) -> Option<NodeId> {
        self.versions
            .get(name)
            .and_then(|v| v.last())
            .map(|&idx| NodeId::from(idx))
    }

    /// Node of the independent variable `name`, if it was ever referenced
    /// before being produced.
    pub fn independent(&self, name: &str) -> Option<NodeId> {
        self.independents.get(name).map(|&idx| NodeId::from(idx))
    }

    /// All versions of `name`, oldest first.
    pub fn instances(&self, name: &str) -> Vec<&VariableInstance> {
        self.versions
            .get(name)
            .map(|v| {
                v.iter()
                    .filter_map(|&idx| self.graph[idx].as_instance())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn state_of(&self, name: &str) -> VariableState {
        match self.versions.get(name) {
            Some(v) if !v.is_empty() => VariableState::Versioned(v.len()),
            _ if self.independents.contains_key(name) => VariableState::Independent,
            _ => VariableState::Unseen,
        }
    }

    /// `(source, function)` pairs feeding into `id`.
    pub fn inputs_of(&self, id: NodeId) -> Vec<(NodeId, &str)> {
        self.graph
            .edges_directed(id.into(), Direction::Incoming)
            .filter_map(|e| e.weight().function().map(|f| (NodeId::from(e.source()), f)))
            .collect()
    }

    pub fn in_degree(&self, id: NodeId) -> usize {
        self.graph
            .edges_directed(id.into(), Direction::Incoming)
            .count()
    }

    pub fn out_degree(&self, id: NodeId) -> usize {
        self.graph
            .edges_directed(id.into(), Direction::Outgoing)
            .count()
    }

    /// The execution feed, in recording order.
    pub fn executions(&self) -> &[ExecutionRecord] {
        &self.executions
    }

    /// Largest timestamp recorded so far.
    pub fn high_water(&self) -> Option<Timestamp> {
        self.high_water
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

    pub(crate) fn to_rows(&self) -> GraphRows<OperationNode, OperationEdge> {
        decompose(&self.graph)
    }

    /// Rebuilds a graph from stored rows plus the execution feed, re-deriving
    /// the version tables and re-checking every operation-graph invariant.
    pub(crate) fn from_rows(
        rows: GraphRows<OperationNode, OperationEdge>,
        executions: Vec<ExecutionRecord>,
        high_water: Option<Timestamp>,
    ) -> Result<Self, CoreError> {
        let graph = recompose(rows)?;
        let root = NodeIndex::new(0);

        match graph.node_weight(root) {
            Some(OperationNode::Root) => {}
            _ => {
                return Err(CoreError::GraphInconsistency {
                    reason: "operation node 0 is not the root".into(),
                })
            }
        }
        check_rooted_dag(&graph, root, "operation")?;

        let mut independents = HashMap::new();
        let mut versions: HashMap<String, Vec<NodeIndex<u32>>> = HashMap::new();
        let mut seen_timestamps = Vec::new();

        for idx in graph.node_indices() {
            if idx == root {
                continue;
            }
            let incoming: Vec<&OperationEdge> = graph
                .edges_directed(idx, Direction::Incoming)
                .map(|e| e.weight())
                .collect();
            match &graph[idx] {
                OperationNode::Root => {
                    return Err(CoreError::GraphInconsistency {
                        reason: format!("second operation root at node {}", idx.index()),
                    })
                }
                OperationNode::Independent(name) => {
                    let anchored = incoming.len() == 1
                        && incoming[0].is_anchor()
                        && graph
                            .neighbors_directed(idx, Direction::Incoming)
                            .all(|src| src == root);
                    if !anchored {
                        return Err(CoreError::GraphInconsistency {
                            reason: format!("independent variable '{}' is not anchored to root", name),
                        });
                    }
                    if independents.insert(name.clone(), idx).is_some() {
                        return Err(CoreError::GraphInconsistency {
                            reason: format!("duplicate independent variable '{}'", name),
                        });
                    }
                }
                OperationNode::Instance(instance) => {
                    if incoming.is_empty() || incoming.iter().any(|e| e.is_anchor()) {
                        return Err(CoreError::GraphInconsistency {
                            reason: format!("instance {} has no function inputs", instance),
                        });
                    }
                    versions.entry(instance.name.clone()).or_default().push(idx);
                    seen_timestamps.push(instance.timestamp);
                }
            }
        }

        seen_timestamps.sort_unstable();
        if seen_timestamps.windows(2).any(|w| w[0] == w[1]) {
            return Err(CoreError::GraphInconsistency {
                reason: "two instances share a timestamp".into(),
            });
        }
        if seen_timestamps.last().copied() != high_water {
            return Err(CoreError::GraphInconsistency {
                reason: "high-water mark does not match the newest instance".into(),
            });
        }
        if executions.len() != seen_timestamps.len() {
            return Err(CoreError::GraphInconsistency {
                reason: format!(
                    "{} execution record(s) for {} instance(s)",
                    executions.len(),
                    seen_timestamps.len()
                ),
            });
        }

        for list in versions.values_mut() {
            list.sort_by_key(|&idx| graph[idx].as_instance().map(|i| i.timestamp));
        }

        Ok(OperationGraph {
            graph,
            root,
            independents,
            versions,
            executions,
            high_water,
        })
    }
}

impl Default for OperationGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural equality: identical node and edge tables and execution feed.
impl PartialEq for OperationGraph {
    fn eq(&self, other: &Self) -> bool {
        self.high_water == other.high_water
            && self.executions == other.executions
            && self.to_rows() == other.to_rows()
    }
}

impl Eq for OperationGraph {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::IdentifierRegistry;
    use crate::statement::Statement;

    fn configured(statements: &[&str]) -> ManagementGraph {
        let mut mg = ManagementGraph::new();
        let mut reg = IdentifierRegistry::new();
        for text in statements {
            let stmt: Statement = text.parse().unwrap();
            mg.register_statement(&mut reg, &stmt).unwrap();
        }
        mg
    }

    #[test]
    fn first_execution_anchors_inputs_to_root() {
        let mg = configured(&["y1 = f1(x1)"]);
        let mut og = OperationGraph::new();
        let y1 = og
            .record_execution(&mg, "f1", &["x1"], "y1", Timestamp(10))
            .unwrap();
        assert_eq!(y1, VariableInstance::new("y1", Timestamp(10)));

        let x1 = og.independent("x1").unwrap();
        assert_eq!(og.state_of("x1"), VariableState::Independent);
        assert_eq!(og.inputs_of(x1), vec![]);
        assert_eq!(og.in_degree(x1), 1);

        let y1_node = og.latest_node("y1").unwrap();
        assert_eq!(og.inputs_of(y1_node), vec![(x1, "f1")]);
        assert_eq!(og.out_degree(y1_node), 0);
        assert_eq!(og.node_count(), 3);
        assert_eq!(og.edge_count(), 2);
    }

    #[test]
    fn inputs_bind_to_latest_version() {
        let mg = configured(&["y1 = f1(x1)", "y2 = f2(y1)"]);
        let mut og = OperationGraph::new();
        og.record_execution(&mg, "f1", &["x1"], "y1", Timestamp(1)).unwrap();
        og.record_execution(&mg, "f1", &["x1"], "y1", Timestamp(2)).unwrap();
        og.record_execution(&mg, "f2", &["y1"], "y2", Timestamp(3)).unwrap();

        assert_eq!(og.state_of("y1"), VariableState::Versioned(2));
        let y2 = og.latest_node("y2").unwrap();
        let (source, function) = og.inputs_of(y2)[0];
        assert_eq!(function, "f2");
        assert_eq!(
            og.node(source).and_then(OperationNode::as_instance),
            Some(&VariableInstance::new("y1", Timestamp(2)))
        );
        assert_eq!(og.executions()[2].inputs, vec!["y1@2".to_string()]);
        assert_eq!(og.executions()[2].output, "y2@3");
    }

    #[test]
    fn self_update_reads_previous_version() {
        let mg = configured(&["x = inc(x)"]);
        let mut og = OperationGraph::new();
        og.record_execution(&mg, "inc", &["x"], "x", Timestamp(1)).unwrap();
        og.record_execution(&mg, "inc", &["x"], "x", Timestamp(2)).unwrap();

        let instances = og.instances("x");
        assert_eq!(instances.len(), 2);
        let second = og.latest_node("x").unwrap();
        let (source, _) = og.inputs_of(second)[0];
        assert_eq!(og.node(source).unwrap().to_string(), "x@1");
        // The independent `x` stays anchored even though `x` is now versioned.
        assert!(og.independent("x").is_some());
        assert_eq!(og.state_of("x"), VariableState::Versioned(2));
    }

    #[test]
    fn duplicate_inputs_collapse_to_one_edge() {
        let mg = configured(&["y = add(a, a, b)"]);
        let mut og = OperationGraph::new();
        og.record_execution(&mg, "add", &["a", "a", "b"], "y", Timestamp(5))
            .unwrap();
        let y = og.latest_node("y").unwrap();
        assert_eq!(og.in_degree(y), 2);
        assert_eq!(og.executions()[0].inputs, vec!["a", "b"]);
    }

    #[test]
    fn unknown_function_leaves_graph_unchanged() {
        let mg = configured(&["y1 = f1(x1)"]);
        let mut og = OperationGraph::new();
        let err = og
            .record_execution(&mg, "nope", &["x1"], "y1", Timestamp(1))
            .unwrap_err();
        assert_eq!(err, CoreError::UnknownFunction { name: "nope".into() });
        assert_eq!(og, OperationGraph::new());
    }

    #[test]
    fn unknown_variable_is_rejected() {
        let mg = configured(&["y1 = f1(x1)"]);
        let mut og = OperationGraph::new();
        let err = og
            .record_execution(&mg, "f1", &["x1", "ghost"], "y1", Timestamp(1))
            .unwrap_err();
        assert_eq!(err, CoreError::UnknownVariable { name: "ghost".into() });
        let err = og
            .record_execution(&mg, "f1", &["x1"], "f1", Timestamp(1))
            .unwrap_err();
        assert_eq!(err, CoreError::UnknownVariable { name: "f1".into() });
        assert_eq!(og.node_count(), 1);
    }

    #[test]
    fn empty_inputs_are_rejected() {
        let mg = configured(&["y1 = f1(x1)"]);
        let mut og = OperationGraph::new();
        let none: [&str; 0] = [];
        let err = og
            .record_execution(&mg, "f1", &none, "y1", Timestamp(1))
            .unwrap_err();
        assert_eq!(err, CoreError::NoInputs { function: "f1".into() });
    }

    #[test]
    fn repeated_or_older_timestamp_collides() {
        let mg = configured(&["y1 = f1(x1)"]);
        let mut og = OperationGraph::new();
        og.record_execution(&mg, "f1", &["x1"], "y1", Timestamp(7)).unwrap();
        let before = og.clone();

        let err = og
            .record_execution(&mg, "f1", &["x1"], "y1", Timestamp(7))
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::TimestampCollision {
                name: "y1".into(),
                timestamp: Timestamp(7),
                latest: Timestamp(7),
            }
        );
        assert!(og
            .record_execution(&mg, "f1", &["x1"], "y1", Timestamp(3))
            .is_err());
        assert_eq!(og, before);
    }

    #[test]
    fn independent_after_versioned_is_invalid() {
        let mg = configured(&["y1 = f1(x1)"]);
        let mut og = OperationGraph::new();

        // Independent first, then produced: legal.
        og.declare_independent(&mg, "y1").unwrap();
        og.record_execution(&mg, "f1", &["x1"], "y1", Timestamp(1)).unwrap();
        assert_eq!(og.state_of("y1"), VariableState::Versioned(1));

        let err = og.declare_independent(&mg, "y1").unwrap_err();
        assert_eq!(err, CoreError::InvalidTransition { name: "y1".into() });
    }

    #[test]
    fn declare_independent_is_idempotent() {
        let mg = configured(&["y1 = f1(x1)"]);
        let mut og = OperationGraph::new();
        let a = og.declare_independent(&mg, "x1").unwrap();
        let b = og.declare_independent(&mg, "x1").unwrap();
        assert_eq!(a, b);
        assert_eq!(og.node_count(), 2);
        assert!(og.declare_independent(&mg, "f1").is_err());
    }

    #[test]
    fn rows_roundtrip_preserves_versions() {
        let mg = configured(&["y1 = f1(x1)", "y2 = f2(y1)"]);
        let mut og = OperationGraph::new();
        og.record_execution(&mg, "f1", &["x1"], "y1", Timestamp(1)).unwrap();
        og.record_execution(&mg, "f2", &["y1"], "y2", Timestamp(2)).unwrap();
        og.record_execution(&mg, "f1", &["x1"], "y1", Timestamp(3)).unwrap();

        let rebuilt = OperationGraph::from_rows(
            og.to_rows(),
            og.executions().to_vec(),
            og.high_water(),
        )
        .unwrap();
        assert_eq!(rebuilt, og);
        assert_eq!(rebuilt.state_of("y1"), VariableState::Versioned(2));
        assert_eq!(
            rebuilt.latest_instance("y1"),
            Some(&VariableInstance::new("y1", Timestamp(3)))
        );
    }

    #[test]
    fn from_rows_rejects_mismatched_feed() {
        let mg = configured(&["y1 = f1(x1)"]);
        let mut og = OperationGraph::new();
        og.record_execution(&mg, "f1", &["x1"], "y1", Timestamp(1)).unwrap();
        let err = OperationGraph::from_rows(og.to_rows(), Vec::new(), og.high_water())
            .unwrap_err();
        assert!(err.to_string().contains("execution record"));
    }
}
