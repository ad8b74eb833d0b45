//! Typed property interface shared by every object in the model
//!
//! Each object type answers property requests from a per-variant accessor
//! table first and a shared default table second. A miss in both tables is
//! [`CovError::UnsupportedProperty`].

use super::error::{CovError, Result};
use super::history::HistoryId;
use super::scope::ScopeId;

/// Cover index addressing the object itself rather than one of its cover items
pub const SCOPE_LEVEL: i32 = -1;

/// Integer properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntProperty {
    IsModified,
    NumTests,
    ScopeWeight,
    ScopeGoal,
    ScopeSourceType,
    ScopeFlags,
    NumCrossedCvps,
    ScopeIsUnderDu,
    ScopeIsUnderCoverInstance,
    ScopeNumCoverItems,
    ToggleType,
    ToggleDir,
    ToggleMetric,
    CoverGoal,
    CoverLimit,
    CoverWeight,
    CoverFlags,
    TestStatus,
    TestCompulsory,
    CvgAtLeast,
    CvgPerInstance,
}

/// Real-valued properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RealProperty {
    SimTime,
    CpuTime,
    Cost,
}

/// String properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrProperty {
    FileName,
    ScopeName,
    ScopeHierName,
    InstanceDuName,
    VerStandard,
    VerStandardVersion,
    VerVendorId,
    VerVendorTool,
    VerVendorVersion,
    Comment,
    HistCmdline,
    HistRunCwd,
    HistToolCategory,
    HistLogName,
    HistPhysName,
    TestTimeUnit,
    TestDate,
    TestSimArgs,
    TestUserName,
    TestName,
    TestSeed,
    ToggleCanonName,
    DuSignature,
}

/// Handle (object reference) properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleProperty {
    Parent,
    InstanceDu,
}

/// Reference to any object owned by a database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjRef {
    Root,
    Scope(ScopeId),
    History(HistoryId),
}

impl From<ScopeId> for ObjRef {
    fn from(id: ScopeId) -> Self {
        ObjRef::Scope(id)
    }
}

impl From<HistoryId> for ObjRef {
    fn from(id: HistoryId) -> Self {
        ObjRef::History(id)
    }
}

/// One row of a property table
pub(crate) struct Accessor<T, P, V> {
    pub id: P,
    pub get: fn(&T) -> Option<V>,
    pub set: Option<fn(&mut T, V) -> Result<()>>,
}

pub(crate) type Table<T, P, V> = &'static [Accessor<T, P, V>];

fn find<T, P: PartialEq + Copy, V>(
    tables: &[Table<T, P, V>],
    id: P,
) -> Option<&'static Accessor<T, P, V>> {
    tables
        .iter()
        .flat_map(|table| table.iter())
        .find(|accessor| accessor.id == id)
}

/// Read a property through the first table that knows it
pub(crate) fn get_from<T, P, V>(
    tables: &[Table<T, P, V>],
    target: &T,
    id: P,
    object: &str,
) -> Result<V>
where
    P: PartialEq + Copy + std::fmt::Debug,
{
    find(tables, id)
        .and_then(|accessor| (accessor.get)(target))
        .ok_or_else(|| CovError::unsupported_property(id, object))
}

/// Write a property through the first table that knows it
pub(crate) fn set_into<T, P, V>(
    tables: &[Table<T, P, V>],
    target: &mut T,
    id: P,
    value: V,
    object: &str,
) -> Result<()>
where
    P: PartialEq + Copy + std::fmt::Debug,
{
    match find(tables, id).and_then(|accessor| accessor.set) {
        Some(set) => set(target, value),
        None => Err(CovError::unsupported_property(id, format!("{} (read-only)", object))),
    }
}

/// Check that a cover index is in range, mapping [`SCOPE_LEVEL`] to `None`
pub(crate) fn resolve_cover_index(cover_index: i32, len: usize) -> Result<Option<usize>> {
    if cover_index == SCOPE_LEVEL {
        return Ok(None);
    }
    usize::try_from(cover_index)
        .ok()
        .filter(|index| *index < len)
        .map(Some)
        .ok_or_else(|| {
            CovError::invalid_argument(format!(
                "cover index {} out of range (0..{})",
                cover_index, len
            ))
        })
}

/// Convert a property value to the narrower field type it is stored in
pub(crate) fn narrow<T: TryFrom<i64>>(value: i64, what: &str) -> Result<T> {
    T::try_from(value)
        .map_err(|_| CovError::invalid_argument(format!("{} out of range: {}", what, value)))
}

/// Uniform property interface
///
/// `cover_index` is [`SCOPE_LEVEL`] for the object itself, or the position of
/// a cover item beneath it. Every method defaults to `UnsupportedProperty`.
pub trait Properties {
    /// Short description used in error messages
    fn object_kind(&self) -> &'static str;

    fn int_property(&self, cover_index: i32, property: IntProperty) -> Result<i64> {
        let _ = cover_index;
        Err(CovError::unsupported_property(property, self.object_kind()))
    }

    fn set_int_property(&mut self, cover_index: i32, property: IntProperty, value: i64) -> Result<()> {
        let _ = (cover_index, value);
        Err(CovError::unsupported_property(property, self.object_kind()))
    }

    fn real_property(&self, cover_index: i32, property: RealProperty) -> Result<f64> {
        let _ = cover_index;
        Err(CovError::unsupported_property(property, self.object_kind()))
    }

    fn set_real_property(&mut self, cover_index: i32, property: RealProperty, value: f64) -> Result<()> {
        let _ = (cover_index, value);
        Err(CovError::unsupported_property(property, self.object_kind()))
    }

    fn string_property(&self, cover_index: i32, property: StrProperty) -> Result<String> {
        let _ = cover_index;
        Err(CovError::unsupported_property(property, self.object_kind()))
    }

    fn set_string_property(&mut self, cover_index: i32, property: StrProperty, value: &str) -> Result<()> {
        let _ = (cover_index, value);
        Err(CovError::unsupported_property(property, self.object_kind()))
    }

    fn handle_property(&self, property: HandleProperty) -> Result<ObjRef> {
        Err(CovError::unsupported_property(property, self.object_kind()))
    }

    fn set_handle_property(&mut self, property: HandleProperty, value: ObjRef) -> Result<()> {
        let _ = value;
        Err(CovError::unsupported_property(property, self.object_kind()))
    }
}
