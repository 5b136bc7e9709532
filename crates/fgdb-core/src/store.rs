//! FunctionalGraph: the store tying the registry and both graph layers
//! together.
//!
//! [`FunctionalGraph`] is the single entry point for building a functional
//! graph database. `configure` declares functions and variables from
//! statement text into the registry and the management graph; `execute`
//! replays statements as timestamped executions into the operation graph.
//! The three components are private and only change through store methods,
//! so the registry and management chain always agree.
//!
//! Batches commit statement by statement: a failing statement aborts the
//! rest of its batch, but whatever earlier statements recorded stays.

use std::fmt;

use tracing::{debug, info, warn};

use crate::analysis::StatementAnalysis;
use crate::clock::TimestampSource;
use crate::config::{ParseErrorPolicy, StoreConfig};
use crate::error::CoreError;
use crate::id::Timestamp;
use crate::management::ManagementGraph;
use crate::node::VariableInstance;
use crate::operation::{ExecutionRecord, OperationGraph, VariableState};
use crate::registry::{BlockKind, IdentifierRegistry};
use crate::snapshot;
use crate::statement::{parse_lines, Statement};
use crate::view::GraphView;

/// Outcome of a successful `configure` batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigureReport {
    /// Statements whose names were registered, in batch order.
    pub registered: Vec<Statement>,
    /// Lines skipped under [`ParseErrorPolicy::Skip`].
    pub skipped: Vec<(usize, CoreError)>,
    /// Variables anchored to the operation root as independents.
    pub anchored: Vec<String>,
}

/// Outcome of a successful `execute` batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteReport {
    /// Execution records of this batch, in recording order.
    pub records: Vec<ExecutionRecord>,
    /// Lines skipped under [`ParseErrorPolicy::Skip`].
    pub skipped: Vec<(usize, CoreError)>,
}

/// Node and edge counts of both layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub functions: usize,
    pub variables: usize,
    pub management_nodes: usize,
    pub management_edges: usize,
    pub operation_nodes: usize,
    pub operation_edges: usize,
    pub executions: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "declared: {} function(s), {} variable(s)",
            self.functions, self.variables
        )?;
        writeln!(
            f,
            "management graph: {} node(s), {} edge(s)",
            self.management_nodes, self.management_edges
        )?;
        write!(
            f,
            "operation graph: {} node(s), {} edge(s), {} execution(s)",
            self.operation_nodes, self.operation_edges, self.executions
        )
    }
}

/// A functional graph database.
#[derive(Debug, Clone, Default)]
pub struct FunctionalGraph {
    config: StoreConfig,
    registry: IdentifierRegistry,
    management: ManagementGraph,
    operation: OperationGraph,
}

impl FunctionalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StoreConfig) -> Self {
        FunctionalGraph {
            config,
            ..Self::default()
        }
    }

    // -----------------------------------------------------------------------
    // Batches
    // -----------------------------------------------------------------------

    /// Declares every name in `lines` (`lhs = fn(args)` statements).
    ///
    /// A malformed line either stops the batch or is skipped, depending on
    /// [`StoreConfig::parse_errors`]. A name conflict stops the batch after
    /// the other names of the offending statement are registered. Statements
    /// before the failure stay committed in both cases.
    ///
    /// With [`StoreConfig::anchor_independents`] set, inputs that no
    /// statement configured so far assigns to are then anchored to the
    /// operation root.
    pub fn configure<I, S>(&mut self, lines: I) -> Result<ConfigureReport, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = ConfigureReport::default();

        for (line, parsed) in parse_lines(lines) {
            let stmt = match parsed {
                Ok(stmt) => stmt,
                Err(err) => {
                    self.on_parse_error(line, err, &mut report.skipped)?;
                    continue;
                }
            };
            self.management
                .register_statement(&mut self.registry, &stmt)
                .map_err(|err| {
                    warn!("configure stopped at line {}: {}", line, err);
                    err
                })?;
            debug!("configured line {}: {}", line, stmt);
            report.registered.push(stmt);
        }

        if self.config.anchor_independents {
            let analysis = StatementAnalysis::from_statements(&report.registered);
            for name in &analysis.pure_independents {
                if !self.management.is_dependent(name)
                    && self.operation.state_of(name) == VariableState::Unseen
                {
                    self.operation.declare_independent(&self.management, name)?;
                    report.anchored.push(name.clone());
                }
            }
        }

        info!(
            "configure: {} statement(s) registered, {} skipped, {} independent(s) anchored",
            report.registered.len(),
            report.skipped.len(),
            report.anchored.len()
        );
        Ok(report)
    }

    /// Convenience wrapper over [`configure`](Self::configure) for a whole
    /// statement file.
    pub fn configure_text(&mut self, text: &str) -> Result<ConfigureReport, CoreError> {
        self.configure(text.lines())
    }

    /// Records one execution per statement in `lines`, stamping each with the
    /// next reading of `clock`.
    ///
    /// Returns the execution records of this batch and the lines skipped
    /// under [`ParseErrorPolicy::Skip`]. Any other error aborts the rest of
    /// the batch; executions recorded before it stay in the graph.
    pub fn execute<I, S, C>(&mut self, lines: I, clock: &mut C) -> Result<ExecuteReport, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        C: TimestampSource + ?Sized,
    {
        let mut report = ExecuteReport::default();

        for (line, parsed) in parse_lines(lines) {
            let stmt = match parsed {
                Ok(stmt) => stmt,
                Err(err) => {
                    self.on_parse_error(line, err, &mut report.skipped)?;
                    continue;
                }
            };
            let timestamp = clock.next_timestamp();
            let record = self.execute_statement(&stmt, timestamp).map_err(|err| {
                warn!("execute stopped at line {}: {}", line, err);
                err
            })?;
            report.records.push(record);
        }

        info!(
            "execute: {} execution(s) recorded, {} line(s) skipped",
            report.records.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    pub fn execute_text<C>(&mut self, text: &str, clock: &mut C) -> Result<ExecuteReport, CoreError>
    where
        C: TimestampSource + ?Sized,
    {
        self.execute(text.lines(), clock)
    }

    /// Records a single execution of `stmt` at an explicit timestamp.
    pub fn execute_statement(
        &mut self,
        stmt: &Statement,
        timestamp: Timestamp,
    ) -> Result<ExecutionRecord, CoreError> {
        let instance = self.operation.record_execution(
            &self.management,
            &stmt.function,
            stmt.args.as_slice(),
            &stmt.lhs,
            timestamp,
        )?;
        debug!("executed {} -> {}", stmt, instance);
        self.operation
            .executions()
            .last()
            .cloned()
            .ok_or_else(|| CoreError::GraphInconsistency {
                reason: format!("execution of '{}' left no record", stmt),
            })
    }

    fn on_parse_error(
        &self,
        line: usize,
        err: CoreError,
        skipped: &mut Vec<(usize, CoreError)>,
    ) -> Result<(), CoreError> {
        match self.config.parse_errors {
            ParseErrorPolicy::Halt => {
                warn!("stopping at line {}: {}", line, err);
                Err(err)
            }
            ParseErrorPolicy::Skip => {
                warn!("skipping line {}: {}", line, err);
                skipped.push((line, err));
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &IdentifierRegistry {
        &self.registry
    }

    pub fn management(&self) -> &ManagementGraph {
        &self.management
    }

    pub fn operation(&self) -> &OperationGraph {
        &self.operation
    }

    /// The execution feed, in recording order.
    pub fn executions(&self) -> &[ExecutionRecord] {
        self.operation.executions()
    }

    pub fn latest_instance(&self, name: &str) -> Option<&VariableInstance> {
        self.operation.latest_instance(name)
    }

    /// The newest recorded timestamp. Clocks continuing this store must
    /// resume after it.
    pub fn high_water(&self) -> Option<Timestamp> {
        self.operation.high_water()
    }

    pub fn graph_view(&self) -> GraphView {
        GraphView::new(&self.management, &self.operation)
    }

    pub fn summary(&self) -> Summary {
        let functions = self
            .registry
            .iter()
            .filter(|(_, _, kind)| *kind == BlockKind::Function)
            .count();
        Summary {
            functions,
            variables: self.registry.len() - functions,
            management_nodes: self.management.node_count(),
            management_edges: self.management.edge_count(),
            operation_nodes: self.operation.node_count(),
            operation_edges: self.operation.edge_count(),
            executions: self.operation.executions().len(),
        }
    }

    /// Classifies the names of a statement batch without touching the store.
    /// Malformed lines follow the configured parse error policy.
    pub fn analyze<I, S>(&self, lines: I) -> Result<StatementAnalysis, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut statements = Vec::new();
        let mut skipped = Vec::new();
        for (line, parsed) in parse_lines(lines) {
            match parsed {
                Ok(stmt) => statements.push(stmt),
                Err(err) => self.on_parse_error(line, err, &mut skipped)?,
            }
        }
        Ok(StatementAnalysis::from_statements(&statements))
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Serializes the whole store into a versioned, checksummed blob.
    pub fn snapshot(&self) -> Result<Vec<u8>, CoreError> {
        let blob = snapshot::encode(&self.registry, &self.management, &self.operation)?;
        debug!("snapshot: {} byte(s)", blob.len());
        Ok(blob)
    }

    /// Rebuilds a store from a [`snapshot`](Self::snapshot) blob with the
    /// default configuration.
    pub fn restore(blob: &[u8]) -> Result<Self, CoreError> {
        Self::restore_with_config(blob, StoreConfig::default())
    }

    pub fn restore_with_config(blob: &[u8], config: StoreConfig) -> Result<Self, CoreError> {
        let (registry, management, operation) = snapshot::decode(blob)?;
        info!(
            "restored store: {} name(s), {} execution(s)",
            registry.len(),
            operation.executions().len()
        );
        Ok(FunctionalGraph {
            config,
            registry,
            management,
            operation,
        })
    }
}

/// Structural equality. The configuration is not part of the stored state.
impl PartialEq for FunctionalGraph {
    fn eq(&self, other: &Self) -> bool {
        self.registry == other.registry
            && self.management == other.management
            && self.operation == other.operation
    }
}

impl Eq for FunctionalGraph {}
