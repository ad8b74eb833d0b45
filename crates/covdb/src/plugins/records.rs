//! Serde records shared by the persisted formats
//!
//! History nodes and source files are stored the same way by every text or
//! container backend, so the mapping between the in-memory model and its
//! on-disk shape lives here once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{
    CovError, Database, HistoryId, HistoryKind, HistoryNode, Result, TestData, TestStatus,
};

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

/// One persisted history node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub logical_name: String,
    #[serde(default)]
    pub physical_name: String,
    pub kind: String,
    /// Index of the parent record, which always precedes this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    #[serde(default)]
    pub ucis_version: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub sim_time: f64,
    #[serde(default)]
    pub time_unit: String,
    #[serde(default)]
    pub cpu_time: f64,
    #[serde(default)]
    pub run_cwd: String,
    #[serde(default)]
    pub seed: String,
    #[serde(default)]
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub compulsory: bool,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub tool_category: String,
    #[serde(default)]
    pub vendor_id: String,
    #[serde(default)]
    pub vendor_tool: String,
    #[serde(default)]
    pub vendor_tool_version: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub same_tests: u32,
    #[serde(default)]
    pub comment: String,
}

fn default_status() -> String {
    TestStatus::Ok.name().to_string()
}

impl HistoryRecord {
    pub fn from_node(node: &HistoryNode, parent: Option<usize>) -> Self {
        let test = &node.test;
        Self {
            logical_name: node.logical_name().to_string(),
            physical_name: node.physical_name().to_string(),
            kind: node.kind().name().to_string(),
            parent,
            ucis_version: node.ucis_version().to_string(),
            status: test.status.name().to_string(),
            sim_time: test.sim_time,
            time_unit: test.time_unit.clone(),
            cpu_time: test.cpu_time,
            run_cwd: test.run_cwd.clone(),
            seed: test.seed.clone(),
            cmd: test.cmd.clone(),
            args: test.args.clone(),
            compulsory: test.compulsory,
            date: test.date.clone(),
            user_name: test.user_name.clone(),
            cost: test.cost,
            tool_category: test.tool_category.clone(),
            vendor_id: test.vendor_id.clone(),
            vendor_tool: test.vendor_tool.clone(),
            vendor_tool_version: test.vendor_tool_version.clone(),
            same_tests: test.same_tests,
            comment: test.comment.clone(),
        }
    }

    fn test_data(&self, member: &str) -> Result<TestData> {
        let status = TestStatus::from_name(&self.status).ok_or_else(|| {
            CovError::corrupt(member, format!("unknown test status '{}'", self.status))
        })?;
        Ok(TestData {
            status,
            sim_time: self.sim_time,
            time_unit: self.time_unit.clone(),
            run_cwd: self.run_cwd.clone(),
            cpu_time: self.cpu_time,
            seed: self.seed.clone(),
            cmd: self.cmd.clone(),
            args: self.args.clone(),
            compulsory: self.compulsory,
            date: self.date.clone(),
            user_name: self.user_name.clone(),
            cost: self.cost,
            tool_category: self.tool_category.clone(),
            vendor_id: self.vendor_id.clone(),
            vendor_tool: self.vendor_tool.clone(),
            vendor_tool_version: self.vendor_tool_version.clone(),
            same_tests: self.same_tests,
            comment: self.comment.clone(),
        })
    }
}

/// Every history node of `db` in creation order
pub fn history_records(db: &Database) -> Result<Vec<HistoryRecord>> {
    let ids: Vec<HistoryId> = db.history_nodes(None)?.collect();
    ids.iter()
        .map(|id| {
            let node = db.history_node(*id)?;
            Ok(HistoryRecord::from_node(node, node.parent().map(HistoryId::index)))
        })
        .collect()
}

/// Recreate `records` in `db`, returning the new node handles in record order
///
/// Records without a parent are attached beneath `root` (or at top level when
/// `root` is `None`). `member` names the container member or document the
/// records came from.
pub fn restore_history(
    db: &mut Database,
    records: &[HistoryRecord],
    root: Option<HistoryId>,
    member: &str,
) -> Result<Vec<HistoryId>> {
    let mut ids: Vec<HistoryId> = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let kind = HistoryKind::from_name(&record.kind).ok_or_else(|| {
            CovError::corrupt(member, format!("unknown history kind '{}'", record.kind))
        })?;
        let parent = match record.parent {
            Some(p) if p < index => Some(ids[p]),
            Some(p) => {
                return Err(CovError::corrupt(
                    member,
                    format!("history record {} names parent {} that does not precede it", index, p),
                ))
            }
            None => root,
        };
        let id = db.create_history_node(parent, &record.logical_name, &record.physical_name, kind)?;
        let node = db.history_node_mut(id)?;
        node.test = record.test_data(member)?;
        if !record.ucis_version.is_empty() {
            node.set_ucis_version(record.ucis_version.clone());
        }
        ids.push(id);
    }
    Ok(ids)
}

/// One persisted source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub filename: String,
    #[serde(default)]
    pub workdir: String,
}

/// User attributes of one scope or cover item, keyed by pre-order scope index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub scope: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<usize>,
    pub attributes: BTreeMap<String, String>,
}
