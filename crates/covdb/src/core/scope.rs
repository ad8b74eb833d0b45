//! Scopes: the named, typed nodes of the coverage hierarchy
//!
//! Every scope carries the attributes common to all kinds (name, type, weight,
//! goal, flags, source location) plus a [`ScopeKind`] payload holding what only
//! its kind understands. Property requests consult the kind's accessor table
//! first and the shared scope table second.

use std::collections::BTreeMap;

use super::cover::{CoverItem, COVER_INT, COVER_STR};
use super::error::{CovError, Result};
use super::property::{
    get_from, narrow, resolve_cover_index, set_into, Accessor, HandleProperty, IntProperty,
    ObjRef, Properties, StrProperty, Table,
};
use super::source::SourceInfo;
use super::types::{ScopeFlags, ScopeType, SourceLanguage, ToggleDir, ToggleMetric, ToggleType};

/// Handle to a scope within one database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub(crate) u32);

impl ScopeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Covergroup options shared by covergroups, their instances, coverpoints and crosses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvgOptions {
    pub at_least: i64,
    pub per_instance: bool,
    pub comment: Option<String>,
}

impl Default for CvgOptions {
    fn default() -> Self {
        Self {
            at_least: 1,
            per_instance: false,
            comment: None,
        }
    }
}

impl CvgOptions {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Kind-specific payload of a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    /// Design unit (module, architecture, package, program, interface)
    DesignUnit { signature: Option<String> },
    /// Elaborated design instance
    Instance {
        du_name: Option<String>,
        du_scope: Option<ScopeId>,
    },
    /// Covergroup, covergroup instance or coverpoint
    Covergroup(CvgOptions),
    Cross {
        options: CvgOptions,
        crossed: Vec<String>,
    },
    Toggle {
        canonical_name: Option<String>,
        metric: ToggleMetric,
        toggle_type: ToggleType,
        dir: ToggleDir,
    },
    Fsm,
    /// Branch, block, statement, expression, condition and assertion scopes
    CodeCoverage,
    /// Other HDL scopes (process, function, generate, package, ...)
    Hdl,
}

impl ScopeKind {
    /// Default payload for a freshly created scope of `scope_type`
    pub fn for_type(scope_type: ScopeType) -> Self {
        use ScopeType::*;
        match scope_type {
            DuModule | DuArch | DuPackage | DuProgram | DuInterface => {
                ScopeKind::DesignUnit { signature: None }
            }
            Instance => ScopeKind::Instance {
                du_name: None,
                du_scope: None,
            },
            Covergroup | CoverInstance | Coverpoint => ScopeKind::Covergroup(CvgOptions::default()),
            Cross => ScopeKind::Cross {
                options: CvgOptions::default(),
                crossed: Vec::new(),
            },
            Toggle => ScopeKind::Toggle {
                canonical_name: None,
                metric: ToggleMetric::default(),
                toggle_type: ToggleType::default(),
                dir: ToggleDir::default(),
            },
            Fsm | FsmStates | FsmTrans => ScopeKind::Fsm,
            Branch | Expr | Cond | Block | CovBlock | Cover | Assert | CvgBinScope
            | IllegalBinScope | IgnoreBinScope => ScopeKind::CodeCoverage,
            _ => ScopeKind::Hdl,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScopeKind::DesignUnit { .. } => "design unit",
            ScopeKind::Instance { .. } => "instance",
            ScopeKind::Covergroup(_) => "covergroup scope",
            ScopeKind::Cross { .. } => "cross",
            ScopeKind::Toggle { .. } => "toggle",
            ScopeKind::Fsm => "fsm",
            ScopeKind::CodeCoverage => "code coverage scope",
            ScopeKind::Hdl => "hdl scope",
        }
    }

    pub fn cvg_options(&self) -> Option<&CvgOptions> {
        match self {
            ScopeKind::Covergroup(options) | ScopeKind::Cross { options, .. } => Some(options),
            _ => None,
        }
    }

    pub fn cvg_options_mut(&mut self) -> Option<&mut CvgOptions> {
        match self {
            ScopeKind::Covergroup(options) | ScopeKind::Cross { options, .. } => Some(options),
            _ => None,
        }
    }

    /// True when the payload carries nothing beyond the defaults for `scope_type`
    pub fn is_default_for(&self, scope_type: ScopeType) -> bool {
        match self {
            ScopeKind::Instance { du_name, .. } => du_name.is_none(),
            other => *other == ScopeKind::for_type(scope_type),
        }
    }
}

/// Default goal of a scope that has none set
pub const DEFAULT_SCOPE_GOAL: i64 = -1;

/// A named, typed node of the coverage hierarchy
#[derive(Debug, Clone)]
pub struct Scope {
    pub(crate) name: String,
    pub(crate) scope_type: ScopeType,
    pub(crate) kind: ScopeKind,
    pub(crate) weight: u32,
    pub(crate) goal: i64,
    pub(crate) source_language: SourceLanguage,
    pub(crate) flags: ScopeFlags,
    pub(crate) source: Option<SourceInfo>,
    pub(crate) parent: Option<ScopeId>,
    pub(crate) children: Vec<ScopeId>,
    pub(crate) items: Vec<CoverItem>,
    pub(crate) attributes: BTreeMap<String, String>,
}

impl Scope {
    pub(crate) fn new(
        parent: Option<ScopeId>,
        name: impl Into<String>,
        scope_type: ScopeType,
        source: Option<SourceInfo>,
        weight: u32,
        source_language: SourceLanguage,
        flags: ScopeFlags,
    ) -> Self {
        Self {
            name: name.into(),
            scope_type,
            kind: ScopeKind::for_type(scope_type),
            weight,
            goal: DEFAULT_SCOPE_GOAL,
            source_language,
            flags,
            source,
            parent,
            children: Vec::new(),
            items: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope_type(&self) -> ScopeType {
        self.scope_type
    }

    pub fn kind(&self) -> &ScopeKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut ScopeKind {
        &mut self.kind
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: u32) {
        self.weight = weight;
    }

    pub fn goal(&self) -> i64 {
        self.goal
    }

    pub fn set_goal(&mut self, goal: i64) {
        self.goal = goal;
    }

    pub fn source_language(&self) -> SourceLanguage {
        self.source_language
    }

    pub fn set_source_language(&mut self, language: SourceLanguage) {
        self.source_language = language;
    }

    pub fn flags(&self) -> ScopeFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: ScopeFlags) {
        self.flags = flags;
    }

    pub fn source(&self) -> Option<&SourceInfo> {
        self.source.as_ref()
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// Child scope handles in insertion order
    pub fn children(&self) -> &[ScopeId] {
        &self.children
    }

    /// Cover items in insertion order
    pub fn items(&self) -> &[CoverItem] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&CoverItem> {
        self.items.get(index)
    }

    pub fn item_mut(&mut self, index: usize) -> Option<&mut CoverItem> {
        self.items.get_mut(index)
    }

    /// Position of the first cover item called `name`
    pub fn find_item(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|item| item.name() == name)
    }

    /// Design-unit signature, if this is a design unit that has one
    pub fn signature(&self) -> Option<&str> {
        match &self.kind {
            ScopeKind::DesignUnit { signature } => signature.as_deref(),
            _ => None,
        }
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

fn set_weight(scope: &mut Scope, value: i64) -> Result<()> {
    scope.weight = narrow(value, "scope weight")?;
    Ok(())
}

fn set_goal(scope: &mut Scope, value: i64) -> Result<()> {
    scope.goal = value;
    Ok(())
}

fn set_source_type(scope: &mut Scope, value: i64) -> Result<()> {
    let bits: u32 = narrow(value, "source type")?;
    scope.source_language = SourceLanguage::from_bits(bits)
        .ok_or_else(|| CovError::invalid_argument(format!("unknown source type {}", value)))?;
    Ok(())
}

fn set_flags(scope: &mut Scope, value: i64) -> Result<()> {
    scope.flags = ScopeFlags::from_bits(narrow(value, "scope flags")?);
    Ok(())
}

static SCOPE_INT: Table<Scope, IntProperty, i64> = &[
    Accessor {
        id: IntProperty::ScopeWeight,
        get: |scope| Some(i64::from(scope.weight)),
        set: Some(set_weight),
    },
    Accessor {
        id: IntProperty::ScopeGoal,
        get: |scope| Some(scope.goal),
        set: Some(set_goal),
    },
    Accessor {
        id: IntProperty::ScopeSourceType,
        get: |scope| Some(i64::from(scope.source_language.bits())),
        set: Some(set_source_type),
    },
    Accessor {
        id: IntProperty::ScopeFlags,
        get: |scope| Some(i64::from(scope.flags.bits())),
        set: Some(set_flags),
    },
    Accessor {
        id: IntProperty::ScopeIsUnderDu,
        get: |scope| Some(i64::from(scope.flags.contains(ScopeFlags::SCOPE_UNDER_DU))),
        set: None,
    },
    Accessor {
        id: IntProperty::ScopeNumCoverItems,
        get: |scope| i64::try_from(scope.items.len()).ok(),
        set: None,
    },
];

fn set_at_least(scope: &mut Scope, value: i64) -> Result<()> {
    let options = scope
        .kind
        .cvg_options_mut()
        .ok_or_else(|| CovError::unsupported_property(IntProperty::CvgAtLeast, "scope"))?;
    options.at_least = value;
    Ok(())
}

fn set_per_instance(scope: &mut Scope, value: i64) -> Result<()> {
    let options = scope
        .kind
        .cvg_options_mut()
        .ok_or_else(|| CovError::unsupported_property(IntProperty::CvgPerInstance, "scope"))?;
    options.per_instance = value != 0;
    Ok(())
}

static CVG_INT: Table<Scope, IntProperty, i64> = &[
    Accessor {
        id: IntProperty::CvgAtLeast,
        get: |scope| scope.kind.cvg_options().map(|o| o.at_least),
        set: Some(set_at_least),
    },
    Accessor {
        id: IntProperty::CvgPerInstance,
        get: |scope| scope.kind.cvg_options().map(|o| i64::from(o.per_instance)),
        set: Some(set_per_instance),
    },
];

static CROSS_INT: Table<Scope, IntProperty, i64> = &[Accessor {
    id: IntProperty::NumCrossedCvps,
    get: |scope| match &scope.kind {
        ScopeKind::Cross { crossed, .. } => i64::try_from(crossed.len()).ok(),
        _ => None,
    },
    set: None,
}];

fn set_toggle_type(scope: &mut Scope, value: i64) -> Result<()> {
    let parsed = narrow::<u32>(value, "toggle type")
        .ok()
        .and_then(ToggleType::from_bits)
        .ok_or_else(|| CovError::invalid_argument(format!("unknown toggle type {}", value)))?;
    match &mut scope.kind {
        ScopeKind::Toggle { toggle_type, .. } => *toggle_type = parsed,
        _ => return Err(CovError::unsupported_property(IntProperty::ToggleType, "scope")),
    }
    Ok(())
}

fn set_toggle_dir(scope: &mut Scope, value: i64) -> Result<()> {
    let parsed = narrow::<u32>(value, "toggle direction")
        .ok()
        .and_then(ToggleDir::from_bits)
        .ok_or_else(|| CovError::invalid_argument(format!("unknown toggle direction {}", value)))?;
    match &mut scope.kind {
        ScopeKind::Toggle { dir, .. } => *dir = parsed,
        _ => return Err(CovError::unsupported_property(IntProperty::ToggleDir, "scope")),
    }
    Ok(())
}

fn set_toggle_metric(scope: &mut Scope, value: i64) -> Result<()> {
    let parsed = narrow::<u32>(value, "toggle metric")
        .ok()
        .and_then(ToggleMetric::from_bits)
        .ok_or_else(|| CovError::invalid_argument(format!("unknown toggle metric {}", value)))?;
    match &mut scope.kind {
        ScopeKind::Toggle { metric, .. } => *metric = parsed,
        _ => return Err(CovError::unsupported_property(IntProperty::ToggleMetric, "scope")),
    }
    Ok(())
}

static TOGGLE_INT: Table<Scope, IntProperty, i64> = &[
    Accessor {
        id: IntProperty::ToggleType,
        get: |scope| match &scope.kind {
            ScopeKind::Toggle { toggle_type, .. } => Some(i64::from(toggle_type.bits())),
            _ => None,
        },
        set: Some(set_toggle_type),
    },
    Accessor {
        id: IntProperty::ToggleDir,
        get: |scope| match &scope.kind {
            ScopeKind::Toggle { dir, .. } => Some(i64::from(dir.bits())),
            _ => None,
        },
        set: Some(set_toggle_dir),
    },
    Accessor {
        id: IntProperty::ToggleMetric,
        get: |scope| match &scope.kind {
            ScopeKind::Toggle { metric, .. } => Some(i64::from(metric.bits())),
            _ => None,
        },
        set: Some(set_toggle_metric),
    },
];

static SCOPE_STR: Table<Scope, StrProperty, String> = &[Accessor {
    id: StrProperty::ScopeName,
    get: |scope| Some(scope.name.clone()),
    set: None,
}];

static DU_STR: Table<Scope, StrProperty, String> = &[Accessor {
    id: StrProperty::DuSignature,
    get: |scope| scope.signature().map(str::to_string),
    set: Some(|scope: &mut Scope, value: String| {
        if let ScopeKind::DesignUnit { signature } = &mut scope.kind {
            *signature = Some(value);
        }
        Ok(())
    }),
}];

static INSTANCE_STR: Table<Scope, StrProperty, String> = &[Accessor {
    id: StrProperty::InstanceDuName,
    get: |scope| match &scope.kind {
        ScopeKind::Instance { du_name, .. } => du_name.clone(),
        _ => None,
    },
    set: Some(|scope: &mut Scope, value: String| {
        if let ScopeKind::Instance { du_name, .. } = &mut scope.kind {
            *du_name = Some(value);
        }
        Ok(())
    }),
}];

static CVG_STR: Table<Scope, StrProperty, String> = &[Accessor {
    id: StrProperty::Comment,
    get: |scope| scope.kind.cvg_options().and_then(|o| o.comment.clone()),
    set: Some(|scope: &mut Scope, value: String| {
        if let Some(options) = scope.kind.cvg_options_mut() {
            options.comment = Some(value);
        }
        Ok(())
    }),
}];

static TOGGLE_STR: Table<Scope, StrProperty, String> = &[Accessor {
    id: StrProperty::ToggleCanonName,
    get: |scope| match &scope.kind {
        ScopeKind::Toggle { canonical_name, .. } => canonical_name.clone(),
        _ => None,
    },
    set: Some(|scope: &mut Scope, value: String| {
        if let ScopeKind::Toggle { canonical_name, .. } = &mut scope.kind {
            *canonical_name = Some(value);
        }
        Ok(())
    }),
}];

static NO_INT: Table<Scope, IntProperty, i64> = &[];
static NO_STR: Table<Scope, StrProperty, String> = &[];

impl Scope {
    fn int_tables(&self) -> [Table<Scope, IntProperty, i64>; 3] {
        match &self.kind {
            ScopeKind::Covergroup(_) => [CVG_INT, NO_INT, SCOPE_INT],
            ScopeKind::Cross { .. } => [CROSS_INT, CVG_INT, SCOPE_INT],
            ScopeKind::Toggle { .. } => [TOGGLE_INT, NO_INT, SCOPE_INT],
            _ => [NO_INT, NO_INT, SCOPE_INT],
        }
    }

    fn str_tables(&self) -> [Table<Scope, StrProperty, String>; 2] {
        match &self.kind {
            ScopeKind::DesignUnit { .. } => [DU_STR, SCOPE_STR],
            ScopeKind::Instance { .. } => [INSTANCE_STR, SCOPE_STR],
            ScopeKind::Covergroup(_) | ScopeKind::Cross { .. } => [CVG_STR, SCOPE_STR],
            ScopeKind::Toggle { .. } => [TOGGLE_STR, SCOPE_STR],
            _ => [NO_STR, SCOPE_STR],
        }
    }

    fn item_at(&self, index: usize) -> Result<&CoverItem> {
        self.items
            .get(index)
            .ok_or_else(|| CovError::invalid_argument(format!("no cover item {}", index)))
    }

    fn item_at_mut(&mut self, index: usize) -> Result<&mut CoverItem> {
        self.items
            .get_mut(index)
            .ok_or_else(|| CovError::invalid_argument(format!("no cover item {}", index)))
    }
}

impl Properties for Scope {
    fn object_kind(&self) -> &'static str {
        self.kind.label()
    }

    fn int_property(&self, cover_index: i32, property: IntProperty) -> Result<i64> {
        match resolve_cover_index(cover_index, self.items.len())? {
            Some(index) => get_from(&[COVER_INT], self.item_at(index)?, property, "cover item"),
            None => get_from(&self.int_tables(), self, property, self.object_kind()),
        }
    }

    fn set_int_property(&mut self, cover_index: i32, property: IntProperty, value: i64) -> Result<()> {
        match resolve_cover_index(cover_index, self.items.len())? {
            Some(index) => set_into(&[COVER_INT], self.item_at_mut(index)?, property, value, "cover item"),
            None => {
                let tables = self.int_tables();
                let kind = self.object_kind();
                set_into(&tables, self, property, value, kind)
            }
        }
    }

    fn string_property(&self, cover_index: i32, property: StrProperty) -> Result<String> {
        match resolve_cover_index(cover_index, self.items.len())? {
            Some(index) => get_from(&[COVER_STR], self.item_at(index)?, property, "cover item"),
            None => get_from(&self.str_tables(), self, property, self.object_kind()),
        }
    }

    fn set_string_property(&mut self, cover_index: i32, property: StrProperty, value: &str) -> Result<()> {
        match resolve_cover_index(cover_index, self.items.len())? {
            Some(index) => set_into(
                &[COVER_STR],
                self.item_at_mut(index)?,
                property,
                value.to_string(),
                "cover item",
            ),
            None => {
                let tables = self.str_tables();
                let kind = self.object_kind();
                set_into(&tables, self, property, value.to_string(), kind)
            }
        }
    }

    fn handle_property(&self, property: HandleProperty) -> Result<ObjRef> {
        match (property, &self.kind) {
            (HandleProperty::Parent, _) => Ok(self.parent.map(ObjRef::Scope).unwrap_or(ObjRef::Root)),
            (HandleProperty::InstanceDu, ScopeKind::Instance { du_scope: Some(du), .. }) => {
                Ok(ObjRef::Scope(*du))
            }
            (other, _) => Err(CovError::unsupported_property(other, self.object_kind())),
        }
    }

    fn set_handle_property(&mut self, property: HandleProperty, value: ObjRef) -> Result<()> {
        match (property, &mut self.kind, value) {
            (HandleProperty::InstanceDu, ScopeKind::Instance { du_scope, .. }, ObjRef::Scope(du)) => {
                *du_scope = Some(du);
                Ok(())
            }
            (other, _, _) => Err(CovError::unsupported_property(other, self.object_kind())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cover::CoverData;
    use crate::core::property::SCOPE_LEVEL;
    use crate::core::types::CoverType;

    fn scope(scope_type: ScopeType) -> Scope {
        Scope::new(
            None,
            "s",
            scope_type,
            None,
            1,
            SourceLanguage::SystemVerilog,
            ScopeFlags::empty(),
        )
    }

    #[test]
    fn test_kind_for_type() {
        assert!(matches!(ScopeKind::for_type(ScopeType::DuModule), ScopeKind::DesignUnit { .. }));
        assert!(matches!(ScopeKind::for_type(ScopeType::Coverpoint), ScopeKind::Covergroup(_)));
        assert!(matches!(ScopeKind::for_type(ScopeType::Branch), ScopeKind::CodeCoverage));
        assert!(matches!(ScopeKind::for_type(ScopeType::Function), ScopeKind::Hdl));
    }

    #[test]
    fn test_shared_properties() {
        let mut scope = scope(ScopeType::Block);
        scope.set_int_property(SCOPE_LEVEL, IntProperty::ScopeWeight, 4).unwrap();
        assert_eq!(scope.weight(), 4);
        assert_eq!(scope.int_property(SCOPE_LEVEL, IntProperty::ScopeGoal).unwrap(), -1);
        assert_eq!(
            scope.int_property(SCOPE_LEVEL, IntProperty::ScopeSourceType).unwrap(),
            i64::from(SourceLanguage::SystemVerilog.bits())
        );
        assert!(scope.set_int_property(SCOPE_LEVEL, IntProperty::ScopeWeight, -3).is_err());
    }

    #[test]
    fn test_variant_properties() {
        let mut toggle = scope(ScopeType::Toggle);
        toggle
            .set_int_property(SCOPE_LEVEL, IntProperty::ToggleDir, i64::from(ToggleDir::Out.bits()))
            .unwrap();
        assert_eq!(
            toggle.int_property(SCOPE_LEVEL, IntProperty::ToggleDir).unwrap(),
            i64::from(ToggleDir::Out.bits())
        );

        let block = scope(ScopeType::Block);
        let err = block.int_property(SCOPE_LEVEL, IntProperty::ToggleDir);
        assert!(matches!(err, Err(CovError::UnsupportedProperty { .. })));
    }

    #[test]
    fn test_covergroup_options() {
        let mut cp = scope(ScopeType::Coverpoint);
        assert_eq!(cp.int_property(SCOPE_LEVEL, IntProperty::CvgAtLeast).unwrap(), 1);
        cp.set_int_property(SCOPE_LEVEL, IntProperty::CvgAtLeast, 8).unwrap();
        cp.set_string_property(SCOPE_LEVEL, StrProperty::Comment, "addr ranges").unwrap();
        assert_eq!(cp.kind().cvg_options().map(|o| o.at_least), Some(8));
        assert_eq!(
            cp.string_property(SCOPE_LEVEL, StrProperty::Comment).unwrap(),
            "addr ranges"
        );
    }

    #[test]
    fn test_cover_index_properties() {
        let mut cp = scope(ScopeType::Coverpoint);
        cp.items.push(CoverItem::new("b0", CoverData::new(CoverType::CvgBin, 3), None));
        assert_eq!(cp.int_property(0, IntProperty::CoverGoal).unwrap(), 1);
        cp.set_int_property(0, IntProperty::CoverGoal, 5).unwrap();
        assert_eq!(cp.items()[0].data().goal, 5);
        assert_eq!(cp.string_property(0, StrProperty::ScopeName).unwrap(), "b0");
        assert!(cp.int_property(1, IntProperty::CoverGoal).is_err());
        assert!(matches!(
            cp.int_property(0, IntProperty::ScopeWeight),
            Err(CovError::UnsupportedProperty { .. })
        ));
    }

    #[test]
    fn test_handle_properties() {
        let mut inst = scope(ScopeType::Instance);
        assert_eq!(inst.handle_property(HandleProperty::Parent).unwrap(), ObjRef::Root);
        inst.set_handle_property(HandleProperty::InstanceDu, ObjRef::Scope(ScopeId(7)))
            .unwrap();
        assert_eq!(
            inst.handle_property(HandleProperty::InstanceDu).unwrap(),
            ObjRef::Scope(ScopeId(7))
        );
        assert!(scope(ScopeType::Block)
            .handle_property(HandleProperty::InstanceDu)
            .is_err());
    }
}
