//! Store configuration.
//!
//! Reads configuration from environment variables:
//! - `FGDB_PARSE_ERRORS`: `halt` (default) or `skip`
//! - `FGDB_ANCHOR_INDEPENDENTS`: `true` (default) or `false`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// What a batch does with a statement line that does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorPolicy {
    /// Stop at the first malformed line. Earlier lines stay committed.
    #[default]
    Halt,
    /// Report the line and continue with the rest of the batch.
    Skip,
}

impl fmt::Display for ParseErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorPolicy::Halt => write!(f, "halt"),
            ParseErrorPolicy::Skip => write!(f, "skip"),
        }
    }
}

impl FromStr for ParseErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "halt" | "stop" => Ok(ParseErrorPolicy::Halt),
            "skip" | "continue" => Ok(ParseErrorPolicy::Skip),
            other => Err(format!("invalid parse error policy '{}', expected halt/skip", other)),
        }
    }
}

/// Behavior switches for a [`FunctionalGraph`](crate::store::FunctionalGraph).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub parse_errors: ParseErrorPolicy,
    /// When set, `configure` anchors every input the batch never produces to
    /// the operation graph's root right away instead of on first execution.
    pub anchor_independents: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            parse_errors: ParseErrorPolicy::Halt,
            anchor_independents: true,
        }
    }
}

impl StoreConfig {
    pub const PARSE_ERRORS_VAR: &'static str = "FGDB_PARSE_ERRORS";
    pub const ANCHOR_INDEPENDENTS_VAR: &'static str = "FGDB_ANCHOR_INDEPENDENTS";

    /// Builds a config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Unparseable values are
    /// logged and replaced by the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = StoreConfig::default();

        if let Some(raw) = lookup(Self::PARSE_ERRORS_VAR) {
            match raw.parse() {
                Ok(policy) => config.parse_errors = policy,
                Err(msg) => warn!("{}: {}; using {}", Self::PARSE_ERRORS_VAR, msg, config.parse_errors),
            }
        }

        if let Some(raw) = lookup(Self::ANCHOR_INDEPENDENTS_VAR) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.anchor_independents = true,
                "0" | "false" | "no" | "off" => config.anchor_independents = false,
                other => warn!(
                    "{}: invalid boolean '{}'; using {}",
                    Self::ANCHOR_INDEPENDENTS_VAR,
                    other,
                    config.anchor_independents
                ),
            }
        }

        config
    }
}
