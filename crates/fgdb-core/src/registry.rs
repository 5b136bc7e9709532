//! Identifier registry for function and data block names.
//!
//! Every name in the store lives in one flat namespace. The
//! [`IdentifierRegistry`] hands out a [`BlockId`] per name in declaration
//! order, rejects a name reused under a different [`BlockKind`], and treats a
//! repeat declaration of the same kind as a no-op.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::BlockId;
use crate::statement::is_valid_name;

/// What a declared name stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// A function block.
    Function,
    /// A data block (variable base-name).
    Variable,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Function => write!(f, "function"),
            BlockKind::Variable => write!(f, "variable"),
        }
    }
}

/// Outcome of a successful [`IdentifierRegistry::declare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declaration {
    pub id: BlockId,
    pub kind: BlockKind,
    /// `false` when the name was already declared with the same kind.
    pub fresh: bool,
}

/// Insertion-ordered registry of declared names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentifierRegistry {
    /// Name -> kind, in declaration order. The position is the `BlockId`.
    names: IndexMap<String, BlockKind>,
}

impl IdentifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `name` as `kind`.
    ///
    /// Returns the existing id on a repeat declaration of the same kind.
    /// Fails with [`CoreError::Conflict`] if the name is already taken by the
    /// other kind, and with [`CoreError::Parse`] if the name is not a valid
    /// identifier.
    pub fn declare(&mut self, name: &str, kind: BlockKind) -> Result<Declaration, CoreError> {
        if let Some((index, _, &existing)) = self.names.get_full(name) {
            if existing != kind {
                return Err(CoreError::Conflict {
                    name: name.to_string(),
                    existing,
                    requested: kind,
                });
            }
            return Ok(Declaration {
                id: BlockId(index as u32),
                kind,
                fresh: false,
            });
        }

        if !is_valid_name(name) {
            return Err(CoreError::parse(0, name, "invalid identifier"));
        }

        let (index, _) = self.names.insert_full(name.to_string(), kind);
        Ok(Declaration {
            id: BlockId(index as u32),
            kind,
            fresh: true,
        })
    }

    /// Checks whether `declare(name, kind)` would succeed, without mutating.
    pub fn check(&self, name: &str, kind: BlockKind) -> Result<(), CoreError> {
        match self.names.get(name) {
            Some(&existing) if existing != kind => Err(CoreError::Conflict {
                name: name.to_string(),
                existing,
                requested: kind,
            }),
            Some(_) => Ok(()),
            None if is_valid_name(name) => Ok(()),
            None => Err(CoreError::parse(0, name, "invalid identifier")),
        }
    }

    /// Looks up a declared name.
    pub fn lookup(&self, name: &str) -> Option<(BlockId, BlockKind)> {
        self.names
            .get_full(name)
            .map(|(index, _, &kind)| (BlockId(index as u32), kind))
    }

    pub fn kind_of(&self, name: &str) -> Option<BlockKind> {
        self.names.get(name).copied()
    }

    pub fn is_function(&self, name: &str) -> bool {
        self.kind_of(name) == Some(BlockKind::Function)
    }

    pub fn is_variable(&self, name: &str) -> bool {
        self.kind_of(name) == Some(BlockKind::Variable)
    }

    /// Returns the name declared under `id`.
    pub fn name_of(&self, id: BlockId) -> Option<&str> {
        self.names
            .get_index(id.0 as usize)
            .map(|(name, _)| name.as_str())
    }

    /// Iterates declarations in the order they were first made.
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &str, BlockKind)> {
        self.names
            .iter()
            .enumerate()
            .map(|(index, (name, &kind))| (BlockId(index as u32), name.as_str(), kind))
    }

    /// The most recent declaration, if any.
    pub fn last(&self) -> Option<(BlockId, &str, BlockKind)> {
        let index = self.names.len().checked_sub(1)?;
        self.names
            .get_index(index)
            .map(|(name, &kind)| (BlockId(index as u32), name.as_str(), kind))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// IndexMap equality ignores order, but the order is what assigns BlockIds.
impl PartialEq for IdentifierRegistry {
    fn eq(&self, other: &Self) -> bool {
        self.names.iter().eq(other.names.iter())
    }
}

impl Eq for IdentifierRegistry {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_declaration_order() {
        let mut reg = IdentifierRegistry::new();
        let f = reg.declare("f1", BlockKind::Function).unwrap();
        let x = reg.declare("x1", BlockKind::Variable).unwrap();
        assert_eq!(f.id, BlockId(0));
        assert_eq!(x.id, BlockId(1));
        assert!(f.fresh && x.fresh);
        assert_eq!(reg.name_of(BlockId(1)), Some("x1"));
    }

    #[test]
    fn repeat_declaration_is_idempotent() {
        let mut reg = IdentifierRegistry::new();
        let first = reg.declare("x1", BlockKind::Variable).unwrap();
        let again = reg.declare("x1", BlockKind::Variable).unwrap();
        assert_eq!(first.id, again.id);
        assert!(!again.fresh);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn kind_mismatch_is_a_conflict() {
        let mut reg = IdentifierRegistry::new();
        reg.declare("f1", BlockKind::Function).unwrap();
        let err = reg.declare("f1", BlockKind::Variable).unwrap_err();
        assert_eq!(
            err,
            CoreError::Conflict {
                name: "f1".into(),
                existing: BlockKind::Function,
                requested: BlockKind::Variable,
            }
        );
        assert_eq!(reg.len(), 1);
        assert!(reg.check("f1", BlockKind::Variable).is_err());
        assert!(reg.check("f1", BlockKind::Function).is_ok());
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut reg = IdentifierRegistry::new();
        assert!(matches!(
            reg.declare("1x", BlockKind::Variable),
            Err(CoreError::Parse { .. })
        ));
        assert!(matches!(
            reg.declare("", BlockKind::Function),
            Err(CoreError::Parse { .. })
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn last_tracks_most_recent_declaration() {
        let mut reg = IdentifierRegistry::new();
        assert!(reg.last().is_none());
        reg.declare("f1", BlockKind::Function).unwrap();
        reg.declare("y1", BlockKind::Variable).unwrap();
        reg.declare("f1", BlockKind::Function).unwrap();
        assert_eq!(reg.last(), Some((BlockId(1), "y1", BlockKind::Variable)));
        assert!(reg.is_function("f1"));
        assert!(reg.is_variable("y1"));
        assert_eq!(reg.lookup("nope"), None);
    }

    #[test]
    fn equality_is_order_sensitive() {
        let mut a = IdentifierRegistry::new();
        a.declare("x", BlockKind::Variable).unwrap();
        a.declare("y", BlockKind::Variable).unwrap();
        let mut b = IdentifierRegistry::new();
        b.declare("y", BlockKind::Variable).unwrap();
        b.declare("x", BlockKind::Variable).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
