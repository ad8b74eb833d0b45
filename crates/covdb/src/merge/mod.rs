//! Multi-source merge engine
//!
//! Combines the scope forests of several databases into one destination.
//! Scopes are unified by name and type at the same position in the
//! hierarchy, cover item counts are summed, and each merge call records one
//! MERGE history node that adopts the histories of its sources.
//!
//! Matching and copying only use the public [`Database`] interface, so any
//! mix of backends can be merged.

mod history;
mod merger;

pub use history::*;
pub use merger::*;

use crate::core::Database;

/// Default logical name of the synthesized MERGE history node
pub const DEFAULT_MERGE_NODE_NAME: &str = "merge";

/// Which side wins when two sources disagree on scope weight or goal
///
/// Counts are always summed; this only settles metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataPolicy {
    /// Keep what the destination already holds
    #[default]
    DestinationWins,
    /// The source merged last overwrites earlier values
    LastSourceWins,
}

/// Merge configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Drop per-test history and keep only the MERGE node
    pub squash_history: bool,
    pub metadata_policy: MetadataPolicy,
    /// Logical name of the MERGE history node
    pub merge_node_name: String,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            squash_history: false,
            metadata_policy: MetadataPolicy::default(),
            merge_node_name: DEFAULT_MERGE_NODE_NAME.to_string(),
        }
    }
}

impl MergeOptions {
    pub fn squashed() -> Self {
        Self {
            squash_history: true,
            ..Self::default()
        }
    }

    pub fn with_metadata_policy(mut self, policy: MetadataPolicy) -> Self {
        self.metadata_policy = policy;
        self
    }
}

/// One merge input: a database and the name errors and history refer to it by
#[derive(Debug, Clone, Copy)]
pub struct MergeSource<'a> {
    pub name: &'a str,
    pub database: &'a Database,
}

impl<'a> MergeSource<'a> {
    pub fn new(name: &'a str, database: &'a Database) -> Self {
        Self { name, database }
    }
}

/// What a merge did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub sources: usize,
    pub scopes_matched: usize,
    pub scopes_created: usize,
    pub items_merged: usize,
    pub items_created: usize,
    /// Ignore, illegal and excluded bins left untouched
    pub items_passive: usize,
    pub metadata_conflicts: usize,
    pub history_nodes_copied: usize,
    /// True when the same-schema count-only path was taken
    pub fast_path: bool,
}

impl MergeReport {
    pub fn summary(&self) -> String {
        format!(
            "merged {} source(s): {} scope(s) matched, {} created; {} bin(s) summed, {} added, {} passive; {} metadata conflict(s)",
            self.sources,
            self.scopes_matched,
            self.scopes_created,
            self.items_merged,
            self.items_created,
            self.items_passive,
            self.metadata_conflicts
        )
    }
}
