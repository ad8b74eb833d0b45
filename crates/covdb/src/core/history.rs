//! Test-run history
//!
//! History nodes form their own forest next to the scope forest. Leaves are
//! TEST records; MERGE nodes group the histories of merged inputs.

use super::error::{CovError, Result};
use super::property::{
    get_from, narrow, set_into, Accessor, HandleProperty, IntProperty, ObjRef, Properties,
    RealProperty, StrProperty, Table, SCOPE_LEVEL,
};
use super::types::{HistoryKind, TestStatus};

/// Handle to a history node within one database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HistoryId(pub(crate) u32);

impl HistoryId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Run details recorded by the simulator or merge tool
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TestData {
    pub status: TestStatus,
    pub sim_time: f64,
    pub time_unit: String,
    pub run_cwd: String,
    pub cpu_time: f64,
    pub seed: String,
    pub cmd: String,
    pub args: Vec<String>,
    pub compulsory: bool,
    pub date: String,
    pub user_name: String,
    pub cost: f64,
    pub tool_category: String,
    pub vendor_id: String,
    pub vendor_tool: String,
    pub vendor_tool_version: String,
    pub same_tests: u32,
    pub comment: String,
}

/// One test or merge event
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryNode {
    logical_name: String,
    physical_name: String,
    kind: HistoryKind,
    parent: Option<HistoryId>,
    ucis_version: String,
    pub test: TestData,
}

impl HistoryNode {
    pub(crate) fn new(
        parent: Option<HistoryId>,
        logical_name: impl Into<String>,
        physical_name: impl Into<String>,
        kind: HistoryKind,
        ucis_version: impl Into<String>,
    ) -> Self {
        Self {
            logical_name: logical_name.into(),
            physical_name: physical_name.into(),
            kind,
            parent,
            ucis_version: ucis_version.into(),
            test: TestData::default(),
        }
    }

    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    pub fn physical_name(&self) -> &str {
        &self.physical_name
    }

    pub fn kind(&self) -> HistoryKind {
        self.kind
    }

    pub fn parent(&self) -> Option<HistoryId> {
        self.parent
    }

    pub fn ucis_version(&self) -> &str {
        &self.ucis_version
    }

    pub(crate) fn set_ucis_version(&mut self, version: impl Into<String>) {
        self.ucis_version = version.into();
    }
}

fn set_status(node: &mut HistoryNode, value: i64) -> Result<()> {
    let bits: u32 = narrow(value, "test status")?;
    node.test.status = TestStatus::from_bits(bits)
        .ok_or_else(|| CovError::invalid_argument(format!("unknown test status {}", value)))?;
    Ok(())
}

static HISTORY_INT: Table<HistoryNode, IntProperty, i64> = &[
    Accessor {
        id: IntProperty::TestStatus,
        get: |node| Some(i64::from(node.test.status.bits())),
        set: Some(set_status),
    },
    Accessor {
        id: IntProperty::TestCompulsory,
        get: |node| Some(i64::from(node.test.compulsory)),
        set: None,
    },
];

static HISTORY_REAL: Table<HistoryNode, RealProperty, f64> = &[
    Accessor {
        id: RealProperty::SimTime,
        get: |node| Some(node.test.sim_time),
        set: Some(|node: &mut HistoryNode, value: f64| {
            node.test.sim_time = value;
            Ok(())
        }),
    },
    Accessor {
        id: RealProperty::CpuTime,
        get: |node| Some(node.test.cpu_time),
        set: Some(|node: &mut HistoryNode, value: f64| {
            node.test.cpu_time = value;
            Ok(())
        }),
    },
    Accessor {
        id: RealProperty::Cost,
        get: |node| Some(node.test.cost),
        set: Some(|node: &mut HistoryNode, value: f64| {
            node.test.cost = value;
            Ok(())
        }),
    },
];

static HISTORY_STR: Table<HistoryNode, StrProperty, String> = &[
    Accessor {
        id: StrProperty::HistLogName,
        get: |node| Some(node.logical_name.clone()),
        set: None,
    },
    Accessor {
        id: StrProperty::TestName,
        get: |node| Some(node.logical_name.clone()),
        set: None,
    },
    Accessor {
        id: StrProperty::HistPhysName,
        get: |node| Some(node.physical_name.clone()),
        set: None,
    },
    Accessor {
        id: StrProperty::HistCmdline,
        get: |node| Some(node.test.cmd.clone()),
        set: None,
    },
    Accessor {
        id: StrProperty::HistRunCwd,
        get: |node| Some(node.test.run_cwd.clone()),
        set: None,
    },
    Accessor {
        id: StrProperty::HistToolCategory,
        get: |node| Some(node.test.tool_category.clone()),
        set: None,
    },
    Accessor {
        id: StrProperty::TestTimeUnit,
        get: |node| Some(node.test.time_unit.clone()),
        set: Some(|node: &mut HistoryNode, value: String| {
            node.test.time_unit = value;
            Ok(())
        }),
    },
    Accessor {
        id: StrProperty::TestDate,
        get: |node| Some(node.test.date.clone()),
        set: None,
    },
    Accessor {
        id: StrProperty::TestSimArgs,
        get: |node| Some(node.test.args.join(" ")),
        set: None,
    },
    Accessor {
        id: StrProperty::TestUserName,
        get: |node| Some(node.test.user_name.clone()),
        set: None,
    },
    Accessor {
        id: StrProperty::TestSeed,
        get: |node| Some(node.test.seed.clone()),
        set: None,
    },
    Accessor {
        id: StrProperty::Comment,
        get: |node| Some(node.test.comment.clone()),
        set: Some(|node: &mut HistoryNode, value: String| {
            node.test.comment = value;
            Ok(())
        }),
    },
    Accessor {
        id: StrProperty::VerVendorId,
        get: |node| Some(node.test.vendor_id.clone()),
        set: None,
    },
    Accessor {
        id: StrProperty::VerVendorTool,
        get: |node| Some(node.test.vendor_tool.clone()),
        set: None,
    },
    Accessor {
        id: StrProperty::VerVendorVersion,
        get: |node| Some(node.test.vendor_tool_version.clone()),
        set: None,
    },
    Accessor {
        id: StrProperty::VerStandardVersion,
        get: |node| Some(node.ucis_version.clone()),
        set: None,
    },
];

fn scope_level_only(cover_index: i32) -> Result<()> {
    if cover_index == SCOPE_LEVEL {
        Ok(())
    } else {
        Err(CovError::invalid_argument(
            "history nodes have no cover items",
        ))
    }
}

impl Properties for HistoryNode {
    fn object_kind(&self) -> &'static str {
        "history node"
    }

    fn int_property(&self, cover_index: i32, property: IntProperty) -> Result<i64> {
        scope_level_only(cover_index)?;
        get_from(&[HISTORY_INT], self, property, self.object_kind())
    }

    fn set_int_property(&mut self, cover_index: i32, property: IntProperty, value: i64) -> Result<()> {
        scope_level_only(cover_index)?;
        set_into(&[HISTORY_INT], self, property, value, "history node")
    }

    fn real_property(&self, cover_index: i32, property: RealProperty) -> Result<f64> {
        scope_level_only(cover_index)?;
        get_from(&[HISTORY_REAL], self, property, self.object_kind())
    }

    fn set_real_property(&mut self, cover_index: i32, property: RealProperty, value: f64) -> Result<()> {
        scope_level_only(cover_index)?;
        set_into(&[HISTORY_REAL], self, property, value, "history node")
    }

    fn string_property(&self, cover_index: i32, property: StrProperty) -> Result<String> {
        scope_level_only(cover_index)?;
        get_from(&[HISTORY_STR], self, property, self.object_kind())
    }

    fn set_string_property(&mut self, cover_index: i32, property: StrProperty, value: &str) -> Result<()> {
        scope_level_only(cover_index)?;
        set_into(&[HISTORY_STR], self, property, value.to_string(), "history node")
    }

    fn handle_property(&self, property: HandleProperty) -> Result<ObjRef> {
        match property {
            HandleProperty::Parent => Ok(self.parent.map(ObjRef::History).unwrap_or(ObjRef::Root)),
            other => Err(CovError::unsupported_property(other, self.object_kind())),
        }
    }
}
