//! Edge types for both graph layers.
//!
//! Management edges are untyped: `parent -> child` only says the child was
//! declared right after the parent. Operation edges either anchor an
//! independent variable to the root or record that a function consumed the
//! source instance and produced the target instance.

use serde::{Deserialize, Serialize};

/// Edge in the management graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DeclarationEdge;

/// Edge in the operation graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationEdge {
    /// Root -> independent variable.
    Anchor,
    /// Input instance -> output instance, labeled with the applied function.
    Applied { function: String },
}

impl OperationEdge {
    pub fn applied(function: impl Into<String>) -> Self {
        OperationEdge::Applied {
            function: function.into(),
        }
    }

    /// The function label, `None` for anchor edges.
    pub fn function(&self) -> Option<&str> {
        match self {
            OperationEdge::Anchor => None,
            OperationEdge::Applied { function } => Some(function),
        }
    }

    pub fn is_anchor(&self) -> bool {
        matches!(self, OperationEdge::Anchor)
    }
}
