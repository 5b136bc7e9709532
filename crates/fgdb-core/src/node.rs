//! Node types for both graph layers.
//!
//! The management graph holds [`ManagementNode`]s: the root sentinel plus one
//! node per declared function or variable. The operation graph holds
//! [`OperationNode`]s: the root sentinel, independent variables, and
//! timestamped [`VariableInstance`]s. Functions never appear as operation
//! nodes; they only label operation edges.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::Timestamp;

/// Node-kind tag shared by both graph layers, used by the read view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Root,
    Function,
    IndependentVariable,
    DependentVariable,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Root => write!(f, "root"),
            NodeKind::Function => write!(f, "function"),
            NodeKind::IndependentVariable => write!(f, "independent-variable"),
            NodeKind::DependentVariable => write!(f, "dependent-variable"),
        }
    }
}

// ---------------------------------------------------------------------------
// Management graph nodes
// ---------------------------------------------------------------------------

/// A node in the management (declaration-order) graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManagementNode {
    /// The sentinel every declaration chain starts from.
    Root,
    /// A declared function block.
    Function(String),
    /// A declared data block (variable base-name).
    Variable(String),
}

impl ManagementNode {
    /// The declared name, or `None` for the root.
    pub fn name(&self) -> Option<&str> {
        match self {
            ManagementNode::Root => None,
            ManagementNode::Function(name) | ManagementNode::Variable(name) => Some(name),
        }
    }

    /// Kind without graph context: a variable is independent here.
    /// [`ManagementGraph::kind_of`](crate::management::ManagementGraph::kind_of)
    /// tags assigned variables as dependent.
    pub fn kind(&self) -> NodeKind {
        match self {
            ManagementNode::Root => NodeKind::Root,
            ManagementNode::Function(_) => NodeKind::Function,
            ManagementNode::Variable(_) => NodeKind::IndependentVariable,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, ManagementNode::Root)
    }
}

impl fmt::Display for ManagementNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagementNode::Root => write!(f, "ROOT"),
            ManagementNode::Function(name) | ManagementNode::Variable(name) => {
                write!(f, "{}", name)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Operation graph nodes
// ---------------------------------------------------------------------------

/// One immutable version of a variable, produced by one execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableInstance {
    /// Variable base-name.
    pub name: String,
    /// When the producing execution was recorded.
    pub timestamp: Timestamp,
}

impl VariableInstance {
    pub fn new(name: impl Into<String>, timestamp: Timestamp) -> Self {
        VariableInstance {
            name: name.into(),
            timestamp,
        }
    }
}

/// Instances print as `name@timestamp`, the name used in execution records.
impl fmt::Display for VariableInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.timestamp)
    }
}

/// A node in the operation (execution-history) graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationNode {
    /// The sentinel independent variables hang off.
    Root,
    /// A variable referenced as an input before it was ever produced.
    Independent(String),
    /// A produced version of a variable.
    Instance(VariableInstance),
}

impl OperationNode {
    /// The variable base-name, or `None` for the root.
    pub fn name(&self) -> Option<&str> {
        match self {
            OperationNode::Root => None,
            OperationNode::Independent(name) => Some(name),
            OperationNode::Instance(instance) => Some(&instance.name),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            OperationNode::Root => NodeKind::Root,
            OperationNode::Independent(_) => NodeKind::IndependentVariable,
            OperationNode::Instance(_) => NodeKind::DependentVariable,
        }
    }

    pub fn as_instance(&self) -> Option<&VariableInstance> {
        match self {
            OperationNode::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, OperationNode::Root)
    }
}

impl fmt::Display for OperationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationNode::Root => write!(f, "ROOT"),
            OperationNode::Independent(name) => write!(f, "{}", name),
            OperationNode::Instance(instance) => write!(f, "{}", instance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn management_node_kinds() {
        assert_eq!(ManagementNode::Root.kind(), NodeKind::Root);
        assert_eq!(ManagementNode::Function("f".into()).kind(), NodeKind::Function);
        assert_eq!(
            ManagementNode::Variable("x".into()).kind(),
            NodeKind::IndependentVariable
        );
        assert_eq!(ManagementNode::Root.name(), None);
        assert_eq!(ManagementNode::Function("f".into()).name(), Some("f"));
    }

    #[test]
    fn operation_node_kinds_and_names() {
        let inst = OperationNode::Instance(VariableInstance::new("y1", Timestamp(7)));
        assert_eq!(inst.kind(), NodeKind::DependentVariable);
        assert_eq!(inst.name(), Some("y1"));
        assert_eq!(inst.to_string(), "y1@7");
        assert!(inst.as_instance().is_some());

        let indep = OperationNode::Independent("x1".into());
        assert_eq!(indep.kind(), NodeKind::IndependentVariable);
        assert!(indep.as_instance().is_none());
        assert!(OperationNode::Root.is_root());
    }

    #[test]
    fn node_kind_tags_are_kebab_case() {
        let json = serde_json::to_string(&NodeKind::IndependentVariable).unwrap();
        assert_eq!(json, "\"independent-variable\"");
        assert_eq!(NodeKind::DependentVariable.to_string(), "dependent-variable");
    }
}
