//! Shape checks shared by both graph layers: acyclic, single root, and every
//! node reachable from that root.

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::Bfs;
use petgraph::{Directed, Direction};

use crate::error::CoreError;

/// Counts the nodes reachable from `root`, `root` included.
pub fn reachable_count<N, E>(graph: &StableGraph<N, E, Directed, u32>, root: NodeIndex<u32>) -> usize {
    let mut bfs = Bfs::new(graph, root);
    let mut count = 0;
    while bfs.next(graph).is_some() {
        count += 1;
    }
    count
}

/// Verifies that `graph` is a DAG whose only source is `root` and from which
/// every node is reachable. `layer` names the graph in error messages.
pub fn check_rooted_dag<N, E>(
    graph: &StableGraph<N, E, Directed, u32>,
    root: NodeIndex<u32>,
    layer: &str,
) -> Result<(), CoreError> {
    if graph.node_weight(root).is_none() {
        return Err(CoreError::GraphInconsistency {
            reason: format!("{layer} graph has no root node"),
        });
    }
    if graph
        .neighbors_directed(root, Direction::Incoming)
        .next()
        .is_some()
    {
        return Err(CoreError::GraphInconsistency {
            reason: format!("{layer} root has incoming edges"),
        });
    }
    if is_cyclic_directed(graph) {
        return Err(CoreError::GraphInconsistency {
            reason: format!("{layer} graph contains a cycle"),
        });
    }
    let reached = reachable_count(graph, root);
    if reached != graph.node_count() {
        return Err(CoreError::GraphInconsistency {
            reason: format!(
                "{layer} graph has {} node(s) unreachable from root",
                graph.node_count() - reached
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_is_a_rooted_dag() {
        let mut g = StableGraph::<&str, ()>::new();
        let root = g.add_node("root");
        let a = g.add_node("a");
        let b = g.add_node("b");
        g.add_edge(root, a, ());
        g.add_edge(a, b, ());
        assert!(check_rooted_dag(&g, root, "test").is_ok());
        assert_eq!(reachable_count(&g, root), 3);
    }

    #[test]
    fn detached_node_is_rejected() {
        let mut g = StableGraph::<&str, ()>::new();
        let root = g.add_node("root");
        g.add_node("orphan");
        let err = check_rooted_dag(&g, root, "test").unwrap_err();
        assert!(err.to_string().contains("unreachable"));
    }

    #[test]
    fn cycle_is_rejected() {
        let mut g = StableGraph::<&str, ()>::new();
        let root = g.add_node("root");
        let a = g.add_node("a");
        let b = g.add_node("b");
        g.add_edge(root, a, ());
        g.add_edge(a, b, ());
        g.add_edge(b, a, ());
        let err = check_rooted_dag(&g, root, "test").unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }
}
