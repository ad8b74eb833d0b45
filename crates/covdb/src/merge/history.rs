//! MERGE history bookkeeping

use tracing::debug;

use crate::core::{Database, HistoryId, HistoryKind, Result};
use crate::plugins::ncdb::timestamp_now;
use crate::plugins::records::{restore_history, HistoryRecord};

/// Tool category recorded on MERGE nodes
pub const MERGE_TOOL_CATEGORY: &str = "merge";

/// Append the MERGE node for one merge of `source_names` into `dst`
pub fn create_merge_node(dst: &mut Database, name: &str, source_names: &[&str]) -> Result<HistoryId> {
    let id = dst.create_history_node(None, name, "", HistoryKind::Merge)?;
    let node = dst.history_node_mut(id)?;
    node.test.date = timestamp_now();
    node.test.tool_category = MERGE_TOOL_CATEGORY.to_string();
    node.test.comment = format!("Merged from: {}", source_names.join(", "));
    debug!(name, sources = source_names.len(), "Created merge history node");
    Ok(id)
}

/// Re-create a source's history forest beneath `merge_node`, returning the
/// number of nodes copied
pub fn adopt_history(dst: &mut Database, merge_node: HistoryId, records: &[HistoryRecord], source: &str) -> Result<usize> {
    let ids = restore_history(dst, records, Some(merge_node), source)?;
    Ok(ids.len())
}

/// Record how many tests were folded into a squashed MERGE node
pub fn record_squashed_tests(dst: &mut Database, merge_node: HistoryId, tests: usize) -> Result<()> {
    let node = dst.history_node_mut(merge_node)?;
    node.test.same_tests = u32::try_from(tests).unwrap_or(u32::MAX);
    Ok(())
}
