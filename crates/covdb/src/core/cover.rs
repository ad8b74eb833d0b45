//! Cover items (bins)

use std::collections::BTreeMap;

use super::error::Result;
use super::property::{narrow, Accessor, IntProperty, StrProperty, Table};
use super::scope::ScopeId;
use super::source::SourceInfo;
use super::types::{CoverFlags, CoverType};

/// Address of a cover item: the owning scope and its position beneath it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoverId {
    pub scope: ScopeId,
    pub index: usize,
}

/// Measurement payload of a cover item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverData {
    pub cover_type: CoverType,
    pub flags: CoverFlags,
    pub count: u64,
    /// At-least threshold
    pub goal: i64,
    pub weight: u32,
    /// Saturation limit, negative when unlimited
    pub limit: i64,
    /// Bit length of vector data, zero for scalar counts
    pub bitlen: u32,
}

impl CoverData {
    /// Data with the defaults for `cover_type`
    pub fn new(cover_type: CoverType, count: u64) -> Self {
        Self {
            cover_type,
            flags: CoverFlags::empty(),
            count,
            goal: cover_type.default_goal(),
            weight: 1,
            limit: -1,
            bitlen: 0,
        }
    }

    pub fn with_goal(mut self, goal: i64) -> Self {
        self.goal = goal;
        self.flags.insert(CoverFlags::HAS_GOAL);
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self.flags.insert(CoverFlags::HAS_WEIGHT);
        self
    }

    pub fn with_flags(mut self, flags: CoverFlags) -> Self {
        self.flags.insert(flags);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self.flags.insert(CoverFlags::HAS_LIMIT);
        self
    }

    /// Ignore/illegal bins and excluded bins are carried but never counted
    pub fn is_passive(&self) -> bool {
        self.cover_type.is_passive() || self.flags.is_excluded()
    }

    /// True when the hit count meets the at-least threshold
    pub fn is_covered(&self) -> bool {
        let threshold = u64::try_from(self.goal.max(1)).unwrap_or(1);
        self.count >= threshold
    }

    /// Add `hits`, saturating at the limit when one is set
    pub fn increment(&mut self, hits: u64) {
        let mut count = self.count.saturating_add(hits);
        if let Ok(limit) = u64::try_from(self.limit) {
            if self.limit > 0 {
                count = count.min(limit);
            }
        }
        self.count = count;
    }
}

/// A leaf measurement beneath a scope
#[derive(Debug, Clone, PartialEq)]
pub struct CoverItem {
    name: String,
    data: CoverData,
    source: Option<SourceInfo>,
    attributes: BTreeMap<String, String>,
}

impl CoverItem {
    pub(crate) fn new(name: impl Into<String>, data: CoverData, source: Option<SourceInfo>) -> Self {
        Self {
            name: name.into(),
            data,
            source,
            attributes: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &CoverData {
        &self.data
    }

    pub fn cover_type(&self) -> CoverType {
        self.data.cover_type
    }

    pub fn count(&self) -> u64 {
        self.data.count
    }

    pub fn source(&self) -> Option<&SourceInfo> {
        self.source.as_ref()
    }

    /// Add hits to this item
    pub fn increment(&mut self, hits: u64) {
        self.data.increment(hits);
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<String> {
        self.attributes.remove(key)
    }
}

fn set_goal(item: &mut CoverItem, value: i64) -> Result<()> {
    item.data.goal = value;
    item.data.flags.insert(CoverFlags::HAS_GOAL);
    Ok(())
}

fn set_limit(item: &mut CoverItem, value: i64) -> Result<()> {
    item.data.limit = value;
    item.data.flags.insert(CoverFlags::HAS_LIMIT);
    Ok(())
}

fn set_weight(item: &mut CoverItem, value: i64) -> Result<()> {
    item.data.weight = narrow(value, "cover weight")?;
    item.data.flags.insert(CoverFlags::HAS_WEIGHT);
    Ok(())
}

fn set_flags(item: &mut CoverItem, value: i64) -> Result<()> {
    item.data.flags = CoverFlags::from_bits(narrow(value, "cover flags")?);
    Ok(())
}

pub(crate) static COVER_INT: Table<CoverItem, IntProperty, i64> = &[
    Accessor {
        id: IntProperty::CoverGoal,
        get: |item| Some(item.data.goal),
        set: Some(set_goal),
    },
    Accessor {
        id: IntProperty::CoverLimit,
        get: |item| Some(item.data.limit),
        set: Some(set_limit),
    },
    Accessor {
        id: IntProperty::CoverWeight,
        get: |item| Some(i64::from(item.data.weight)),
        set: Some(set_weight),
    },
    Accessor {
        id: IntProperty::CoverFlags,
        get: |item| Some(i64::from(item.data.flags.bits())),
        set: Some(set_flags),
    },
];

pub(crate) static COVER_STR: Table<CoverItem, StrProperty, String> = &[Accessor {
    id: StrProperty::ScopeName,
    get: |item| Some(item.name.clone()),
    set: None,
}];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_by_type() {
        let bin = CoverData::new(CoverType::CvgBin, 0);
        assert_eq!(bin.goal, 1);
        assert_eq!(bin.weight, 1);
        assert!(!bin.is_covered());

        let stmt = CoverData::new(CoverType::StmtBin, 1);
        assert_eq!(stmt.goal, 0);
        assert!(stmt.is_covered());
    }

    #[test]
    fn test_increment_saturates() {
        let mut data = CoverData::new(CoverType::CvgBin, u64::MAX - 1);
        data.increment(5);
        assert_eq!(data.count, u64::MAX);
    }

    #[test]
    fn test_increment_respects_limit() {
        let mut data = CoverData::new(CoverType::CvgBin, 0).with_limit(10);
        data.increment(7);
        data.increment(7);
        assert_eq!(data.count, 10);
    }

    #[test]
    fn test_goal_threshold() {
        let mut data = CoverData::new(CoverType::CvgBin, 0).with_goal(4);
        data.increment(3);
        assert!(!data.is_covered());
        data.increment(1);
        assert!(data.is_covered());
    }

    #[test]
    fn test_passive_bins() {
        assert!(CoverData::new(CoverType::IllegalBin, 0).is_passive());
        assert!(CoverData::new(CoverType::CvgBin, 0)
            .with_flags(CoverFlags::EXCLUDE_PRAGMA)
            .is_passive());
        assert!(!CoverData::new(CoverType::CvgBin, 0).is_passive());
    }
}
