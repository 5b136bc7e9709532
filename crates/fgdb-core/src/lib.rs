//! Functional graph database core.
//!
//! A store holds two rooted DAGs over one identifier registry:
//!
//! - the **management graph**, a single chain recording the order in which
//!   functions and variables were declared, and
//! - the **operation graph**, the execution history, where every execution
//!   of `lhs = fn(args)` adds a timestamped version of `lhs` linked from the
//!   latest version of each argument by an edge labeled `fn`.
//!
//! [`FunctionalGraph`] is the entry point; the snapshot codec turns it into
//! a blob that `fgdb-storage` persists.

pub mod analysis;
pub mod clock;
pub mod config;
pub mod dag;
pub mod edge;
pub mod error;
pub mod id;
pub mod management;
pub mod node;
pub mod operation;
pub mod registry;
pub mod snapshot;
pub mod statement;
pub mod store;
pub mod view;

// Re-export commonly used types
pub use analysis::StatementAnalysis;
pub use clock::{MonotonicClock, SequenceClock, TimestampSource};
pub use config::{ParseErrorPolicy, StoreConfig};
pub use edge::{DeclarationEdge, OperationEdge};
pub use error::CoreError;
pub use id::{BlockId, EdgeId, NodeId, Timestamp};
pub use management::ManagementGraph;
pub use node::{ManagementNode, NodeKind, OperationNode, VariableInstance};
pub use operation::{ExecutionRecord, OperationGraph, VariableState};
pub use registry::{BlockKind, Declaration, IdentifierRegistry};
pub use statement::{parse_statement, parse_statements, Statement};
pub use store::{ConfigureReport, ExecuteReport, FunctionalGraph, Summary};
pub use view::{ExportedEdge, ExportedGraph, ExportedNode, GraphView};
