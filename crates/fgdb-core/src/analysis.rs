//! Dependency analysis over a batch of statements.
//!
//! Classifies every name a batch mentions without touching any graph:
//! which names are functions, which variables are consumed, which are
//! produced, and how the two overlap.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::statement::Statement;

/// Sorted name sets describing a statement batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementAnalysis {
    pub functions: BTreeSet<String>,
    /// Every variable used as an argument.
    pub inputs: BTreeSet<String>,
    /// Every variable assigned by some statement.
    pub dependents: BTreeSet<String>,
    /// Inputs that no statement produces.
    pub pure_independents: BTreeSet<String>,
    /// Variables that are both produced and consumed.
    pub intermediates: BTreeSet<String>,
}

impl StatementAnalysis {
    pub fn from_statements<'a, I>(statements: I) -> Self
    where
        I: IntoIterator<Item = &'a Statement>,
    {
        let mut analysis = StatementAnalysis::default();
        for stmt in statements {
            analysis.functions.insert(stmt.function.clone());
            analysis.dependents.insert(stmt.lhs.clone());
            analysis.inputs.extend(stmt.args.iter().cloned());
        }
        analysis.pure_independents = analysis
            .inputs
            .difference(&analysis.dependents)
            .cloned()
            .collect();
        analysis.intermediates = analysis
            .inputs
            .intersection(&analysis.dependents)
            .cloned()
            .collect();
        analysis
    }

    /// Variables the batch produces but never consumes.
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.dependents
            .difference(&self.inputs)
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
