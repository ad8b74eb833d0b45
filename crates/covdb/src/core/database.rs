//! The coverage database root
//!
//! A [`Database`] owns every scope, cover item, history node and file handle
//! it contains. Objects are addressed by copyable handles ([`ScopeId`],
//! [`CoverId`], [`HistoryId`], [`FileHandle`]) that are only meaningful for the
//! database that issued them. After [`Database::close`] every operation fails
//! with [`CovError::InvalidState`].

use std::collections::HashMap;

use tracing::{debug, trace};

use super::cover::{CoverData, CoverId, CoverItem};
use super::error::{CovError, Result};
use super::history::{HistoryId, HistoryNode};
use super::property::{
    get_from, set_into, Accessor, HandleProperty, IntProperty, ObjRef, Properties, RealProperty,
    StrProperty, Table, SCOPE_LEVEL,
};
use super::scope::{Scope, ScopeId, ScopeKind};
use super::source::{FileHandle, SourceFile, SourceInfo};
use super::types::{
    CoverMask, HistoryKind, ScopeFlags, ScopeMask, ScopeType, SourceLanguage, ToggleDir,
    ToggleMetric, ToggleType,
};

/// API version recorded in new databases
pub const API_VERSION: &str = "1.0";

/// Default hierarchical path separator
pub const DEFAULT_PATH_SEPARATOR: char = '/';

/// Covered/total bin tally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coverage {
    pub covered: u64,
    pub total: u64,
}

impl Coverage {
    /// Percentage covered, 100 when there is nothing to cover
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.covered as f64 * 100.0 / self.total as f64
        }
    }
}

/// In-memory coverage database
#[derive(Debug, Clone)]
pub struct Database {
    api_version: String,
    written_by: String,
    written_time: String,
    path_separator: char,
    scopes: Vec<Scope>,
    roots: Vec<ScopeId>,
    history: Vec<HistoryNode>,
    files: Vec<SourceFile>,
    file_lookup: HashMap<(String, String), FileHandle>,
    modified: bool,
    open: bool,
}

impl Database {
    /// Create a new empty database
    pub fn new() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            written_by: String::new(),
            written_time: String::new(),
            path_separator: DEFAULT_PATH_SEPARATOR,
            scopes: Vec::new(),
            roots: Vec::new(),
            history: Vec::new(),
            files: Vec::new(),
            file_lookup: HashMap::new(),
            modified: false,
            open: true,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(CovError::invalid_state("database is closed"))
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Close the database, releasing its contents
    ///
    /// Every handle derived from this database becomes invalid.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        debug!(scopes = self.scopes.len(), "Closing database");
        self.scopes.clear();
        self.roots.clear();
        self.history.clear();
        self.files.clear();
        self.file_lookup.clear();
        self.open = false;
        Ok(())
    }

    /// True when the database was changed since it was created or loaded
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub(crate) fn clear_modified(&mut self) {
        self.modified = false;
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn set_api_version(&mut self, version: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        self.api_version = version.into();
        Ok(())
    }

    pub fn written_by(&self) -> &str {
        &self.written_by
    }

    pub fn set_written_by(&mut self, tool: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        self.written_by = tool.into();
        Ok(())
    }

    pub fn written_time(&self) -> &str {
        &self.written_time
    }

    pub fn set_written_time(&mut self, time: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        self.written_time = time.into();
        Ok(())
    }

    pub fn path_separator(&self) -> char {
        self.path_separator
    }

    /// Set the path separator; it must be exactly one character
    pub fn set_path_separator(&mut self, separator: &str) -> Result<()> {
        self.ensure_open()?;
        let mut chars = separator.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                self.path_separator = c;
                Ok(())
            }
            _ => Err(CovError::invalid_argument(format!(
                "path separator must be a single character, got {:?}",
                separator
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    /// Intern a `(filename, workdir)` pair, returning the existing handle if known
    pub fn create_file_handle(&mut self, filename: &str, workdir: &str) -> Result<FileHandle> {
        self.ensure_open()?;
        let key = (filename.to_string(), workdir.to_string());
        if let Some(handle) = self.file_lookup.get(&key) {
            return Ok(*handle);
        }
        let handle = FileHandle(index_u32(self.files.len(), "file table")?);
        self.files.push(SourceFile::new(filename, workdir));
        self.file_lookup.insert(key, handle);
        trace!(filename, "Interned source file");
        Ok(handle)
    }

    pub fn file(&self, handle: FileHandle) -> Result<&SourceFile> {
        self.ensure_open()?;
        self.files
            .get(handle.index())
            .ok_or_else(|| CovError::invalid_argument(format!("unknown file handle {:?}", handle)))
    }

    /// Interned files in creation order
    pub fn files(&self) -> Result<impl Iterator<Item = (FileHandle, &SourceFile)> + '_> {
        self.ensure_open()?;
        Ok(self
            .files
            .iter()
            .enumerate()
            .map(|(i, file)| (FileHandle(i as u32), file)))
    }

    fn check_source(&self, source: Option<&SourceInfo>) -> Result<()> {
        if let Some(SourceInfo { file: Some(handle), .. }) = source {
            self.file(*handle)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scope construction
    // ------------------------------------------------------------------

    /// Create a scope of any type beneath `parent` (or at top level)
    #[allow(clippy::too_many_arguments)]
    pub fn create_scope(
        &mut self,
        parent: Option<ScopeId>,
        name: &str,
        source: Option<SourceInfo>,
        weight: u32,
        language: SourceLanguage,
        scope_type: ScopeType,
        flags: ScopeFlags,
    ) -> Result<ScopeId> {
        self.ensure_open()?;
        self.check_source(source.as_ref())?;
        if let Some(existing) = self.find_child(parent, name)? {
            return Err(CovError::invalid_argument(format!(
                "scope '{}' already exists as {}",
                self.hier_name(existing)?,
                self.scopes[existing.index()].scope_type
            )));
        }

        let id = ScopeId(index_u32(self.scopes.len(), "scope table")?);
        let mut flags = flags;
        if let Some(parent_id) = parent {
            let parent_scope = self.scope(parent_id)?;
            if parent_scope.scope_type.is_design_unit()
                || parent_scope.flags.contains(ScopeFlags::SCOPE_UNDER_DU)
            {
                flags.insert(ScopeFlags::SCOPE_UNDER_DU);
            }
        }
        self.scopes
            .push(Scope::new(parent, name, scope_type, source, weight, language, flags));
        match parent {
            Some(parent_id) => self.scopes[parent_id.index()].children.push(id),
            None => self.roots.push(id),
        }
        self.modified = true;
        trace!(name, scope_type = %scope_type, "Created scope");
        Ok(id)
    }

    /// Create an instance of the design unit `du_scope`
    pub fn create_instance(
        &mut self,
        parent: Option<ScopeId>,
        name: &str,
        source: Option<SourceInfo>,
        weight: u32,
        language: SourceLanguage,
        du_scope: Option<ScopeId>,
        flags: ScopeFlags,
    ) -> Result<ScopeId> {
        let du_name = match du_scope {
            Some(du) => {
                let du_ref = self.scope(du)?;
                if !du_ref.scope_type.is_design_unit() {
                    return Err(CovError::invalid_argument(format!(
                        "'{}' is not a design unit",
                        du_ref.name
                    )));
                }
                Some(du_ref.name.clone())
            }
            None => None,
        };
        let id = self.create_scope(parent, name, source, weight, language, ScopeType::Instance, flags)?;
        self.scopes[id.index()].kind = ScopeKind::Instance { du_name, du_scope };
        Ok(id)
    }

    /// Create a covergroup beneath an instance or design unit
    pub fn create_covergroup(
        &mut self,
        parent: Option<ScopeId>,
        name: &str,
        source: Option<SourceInfo>,
        weight: u32,
        language: SourceLanguage,
    ) -> Result<ScopeId> {
        self.create_scope(
            parent,
            name,
            source,
            weight,
            language,
            ScopeType::Covergroup,
            ScopeFlags::empty(),
        )
    }

    /// Create a coverpoint beneath a covergroup or covergroup instance
    pub fn create_coverpoint(
        &mut self,
        parent: ScopeId,
        name: &str,
        source: Option<SourceInfo>,
        weight: u32,
        language: SourceLanguage,
    ) -> Result<ScopeId> {
        self.create_scope(
            Some(parent),
            name,
            source,
            weight,
            language,
            ScopeType::Coverpoint,
            ScopeFlags::empty(),
        )
    }

    /// Create a cross of sibling coverpoints
    pub fn create_cross(
        &mut self,
        parent: ScopeId,
        name: &str,
        source: Option<SourceInfo>,
        weight: u32,
        language: SourceLanguage,
        coverpoints: &[ScopeId],
    ) -> Result<ScopeId> {
        let crossed = coverpoints
            .iter()
            .map(|cp| self.scope(*cp).map(|scope| scope.name.clone()))
            .collect::<Result<Vec<_>>>()?;
        let id = self.create_scope(
            Some(parent),
            name,
            source,
            weight,
            language,
            ScopeType::Cross,
            ScopeFlags::empty(),
        )?;
        if let ScopeKind::Cross { crossed: names, .. } = &mut self.scopes[id.index()].kind {
            *names = crossed;
        }
        Ok(id)
    }

    /// Create a toggle scope for one signal
    #[allow(clippy::too_many_arguments)]
    pub fn create_toggle(
        &mut self,
        parent: ScopeId,
        name: &str,
        canonical_name: Option<&str>,
        flags: ScopeFlags,
        metric: ToggleMetric,
        toggle_type: ToggleType,
        dir: ToggleDir,
    ) -> Result<ScopeId> {
        let language = self.scope(parent)?.source_language;
        let id = self.create_scope(Some(parent), name, None, 1, language, ScopeType::Toggle, flags)?;
        self.scopes[id.index()].kind = ScopeKind::Toggle {
            canonical_name: canonical_name.map(str::to_string),
            metric,
            toggle_type,
            dir,
        };
        Ok(id)
    }

    /// Append a cover item to `parent`
    pub fn create_next_cover(
        &mut self,
        parent: ScopeId,
        name: &str,
        data: CoverData,
        source: Option<SourceInfo>,
    ) -> Result<CoverId> {
        self.ensure_open()?;
        self.check_source(source.as_ref())?;
        let scope = self.scope_mut(parent)?;
        let index = scope.items.len();
        scope.items.push(CoverItem::new(name, data, source));
        trace!(name, index, "Created cover item");
        Ok(CoverId {
            scope: parent,
            index,
        })
    }

    // ------------------------------------------------------------------
    // Scope access
    // ------------------------------------------------------------------

    pub fn scope(&self, id: ScopeId) -> Result<&Scope> {
        self.ensure_open()?;
        self.scopes
            .get(id.index())
            .ok_or_else(|| CovError::invalid_argument(format!("unknown scope {:?}", id)))
    }

    /// Mutable access to a scope; marks the database modified
    pub fn scope_mut(&mut self, id: ScopeId) -> Result<&mut Scope> {
        self.ensure_open()?;
        self.modified = true;
        self.scopes
            .get_mut(id.index())
            .ok_or_else(|| CovError::invalid_argument(format!("unknown scope {:?}", id)))
    }

    pub fn cover_item(&self, id: CoverId) -> Result<&CoverItem> {
        self.scope(id.scope)?
            .items
            .get(id.index)
            .ok_or_else(|| CovError::invalid_argument(format!("unknown cover item {:?}", id)))
    }

    pub fn cover_item_mut(&mut self, id: CoverId) -> Result<&mut CoverItem> {
        self.scope_mut(id.scope)?
            .items
            .get_mut(id.index)
            .ok_or_else(|| CovError::invalid_argument(format!("unknown cover item {:?}", id)))
    }

    /// Top-level scopes matching `mask`, in insertion order
    pub fn root_scopes(&self, mask: ScopeMask) -> Result<impl Iterator<Item = ScopeId> + '_> {
        self.ensure_open()?;
        Ok(self
            .roots
            .iter()
            .copied()
            .filter(move |id| mask.matches(self.scopes[id.index()].scope_type)))
    }

    /// Immediate child scopes of `parent` matching `mask`, in insertion order
    pub fn scopes(
        &self,
        parent: ScopeId,
        mask: ScopeMask,
    ) -> Result<impl Iterator<Item = ScopeId> + '_> {
        let children = &self.scope(parent)?.children;
        Ok(children
            .iter()
            .copied()
            .filter(move |id| mask.matches(self.scopes[id.index()].scope_type)))
    }

    /// Children of `parent`, or the top-level scopes when `parent` is `None`
    pub fn child_scopes(
        &self,
        parent: Option<ScopeId>,
        mask: ScopeMask,
    ) -> Result<Box<dyn Iterator<Item = ScopeId> + '_>> {
        Ok(match parent {
            Some(parent) => Box::new(self.scopes(parent, mask)?),
            None => Box::new(self.root_scopes(mask)?),
        })
    }

    /// Cover items of `scope` matching `mask`, in insertion order
    pub fn cover_items(
        &self,
        scope: ScopeId,
        mask: CoverMask,
    ) -> Result<impl Iterator<Item = (CoverId, &CoverItem)> + '_> {
        let items = &self.scope(scope)?.items;
        Ok(items
            .iter()
            .enumerate()
            .filter(move |(_, item)| mask.matches(item.cover_type()))
            .map(move |(index, item)| (CoverId { scope, index }, item)))
    }

    /// Child of `parent` (or top-level scope) named `name`
    pub fn find_child(&self, parent: Option<ScopeId>, name: &str) -> Result<Option<ScopeId>> {
        let siblings = match parent {
            Some(parent) => &self.scope(parent)?.children,
            None => {
                self.ensure_open()?;
                &self.roots
            }
        };
        Ok(siblings
            .iter()
            .copied()
            .find(|id| self.scopes[id.index()].name == name))
    }

    /// Resolve a separator-delimited path such as `top/dut/cp1`
    pub fn find_scope(&self, path: &str) -> Result<Option<ScopeId>> {
        let mut current: Option<ScopeId> = None;
        for part in path.split(self.path_separator).filter(|p| !p.is_empty()) {
            match self.find_child(current, part)? {
                Some(id) => current = Some(id),
                None => return Ok(None),
            }
        }
        Ok(current)
    }

    /// Hierarchical name of `id` rendered with the path separator
    pub fn hier_name(&self, id: ScopeId) -> Result<String> {
        let mut parts = vec![self.scope(id)?.name.as_str()];
        let mut cursor = self.scopes[id.index()].parent;
        while let Some(parent) = cursor {
            let scope = &self.scopes[parent.index()];
            parts.push(&scope.name);
            cursor = scope.parent;
        }
        parts.reverse();
        Ok(parts.join(&self.path_separator.to_string()))
    }

    /// Pre-order walk of every scope in the database
    pub fn walk(&self) -> Result<Vec<ScopeId>> {
        self.ensure_open()?;
        let mut order = Vec::with_capacity(self.scopes.len());
        let mut stack: Vec<ScopeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.scopes[id.index()].children.iter().rev().copied());
        }
        Ok(order)
    }

    /// Point instances that only know their design unit by name at the
    /// top-level design-unit scope of that name
    pub fn resolve_du_links(&mut self) -> Result<usize> {
        self.ensure_open()?;
        let mut resolved = 0;
        for index in 0..self.scopes.len() {
            let du_name = match &self.scopes[index].kind {
                ScopeKind::Instance {
                    du_name: Some(name),
                    du_scope: None,
                } => name.clone(),
                _ => continue,
            };
            let target = self.roots.iter().copied().find(|id| {
                let scope = &self.scopes[id.index()];
                scope.name == du_name && scope.scope_type.is_design_unit()
            });
            if let (Some(target), ScopeKind::Instance { du_scope, .. }) =
                (target, &mut self.scopes[index].kind)
            {
                *du_scope = Some(target);
                resolved += 1;
            }
        }
        Ok(resolved)
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Record a test or merge event
    pub fn create_history_node(
        &mut self,
        parent: Option<HistoryId>,
        logical_name: &str,
        physical_name: &str,
        kind: HistoryKind,
    ) -> Result<HistoryId> {
        self.ensure_open()?;
        if let Some(parent) = parent {
            self.history_node(parent)?;
        }
        let id = HistoryId(index_u32(self.history.len(), "history table")?);
        self.history.push(HistoryNode::new(
            parent,
            logical_name,
            physical_name,
            kind,
            self.api_version.clone(),
        ));
        self.modified = true;
        debug!(logical_name, kind = %kind, "Created history node");
        Ok(id)
    }

    pub fn history_node(&self, id: HistoryId) -> Result<&HistoryNode> {
        self.ensure_open()?;
        self.history
            .get(id.index())
            .ok_or_else(|| CovError::invalid_argument(format!("unknown history node {:?}", id)))
    }

    pub fn history_node_mut(&mut self, id: HistoryId) -> Result<&mut HistoryNode> {
        self.ensure_open()?;
        self.modified = true;
        self.history
            .get_mut(id.index())
            .ok_or_else(|| CovError::invalid_argument(format!("unknown history node {:?}", id)))
    }

    /// History nodes of `kind` (all kinds when `None`) in creation order
    pub fn history_nodes(
        &self,
        kind: Option<HistoryKind>,
    ) -> Result<impl Iterator<Item = HistoryId> + '_> {
        self.ensure_open()?;
        Ok(self
            .history
            .iter()
            .enumerate()
            .filter(move |(_, node)| kind.map_or(true, |k| node.kind() == k))
            .map(|(i, _)| HistoryId(i as u32)))
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn cover_item_count(&self) -> usize {
        self.scopes.iter().map(|s| s.items.len()).sum()
    }

    pub fn test_count(&self) -> usize {
        self.history
            .iter()
            .filter(|node| node.kind() == HistoryKind::Test)
            .count()
    }

    /// Sum of all hit counts, saturating
    pub fn total_hits(&self) -> u64 {
        self.scopes
            .iter()
            .flat_map(|s| s.items.iter())
            .fold(0u64, |acc, item| acc.saturating_add(item.count()))
    }

    /// Covered/total bins beneath `scope` (recursively), or the whole database
    pub fn coverage(&self, scope: Option<ScopeId>) -> Result<Coverage> {
        let mut stack: Vec<ScopeId> = match scope {
            Some(id) => {
                self.scope(id)?;
                vec![id]
            }
            None => {
                self.ensure_open()?;
                self.roots.clone()
            }
        };
        let mut tally = Coverage::default();
        while let Some(id) = stack.pop() {
            let scope = &self.scopes[id.index()];
            for item in scope.items.iter().filter(|item| !item.data().is_passive()) {
                tally.total += 1;
                if item.data().is_covered() {
                    tally.covered += 1;
                }
            }
            stack.extend(scope.children.iter().copied());
        }
        Ok(tally)
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    pub fn int_property(&self, obj: impl Into<ObjRef>, cover_index: i32, property: IntProperty) -> Result<i64> {
        match obj.into() {
            ObjRef::Root => {
                self.ensure_open()?;
                get_from(&[ROOT_INT], self, property, "database")
            }
            ObjRef::Scope(id) => match property {
                IntProperty::ScopeIsUnderCoverInstance if cover_index == SCOPE_LEVEL => {
                    Ok(i64::from(self.has_ancestor(id, ScopeType::CoverInstance)?))
                }
                _ => self.scope(id)?.int_property(cover_index, property),
            },
            ObjRef::History(id) => self.history_node(id)?.int_property(cover_index, property),
        }
    }

    pub fn set_int_property(
        &mut self,
        obj: impl Into<ObjRef>,
        cover_index: i32,
        property: IntProperty,
        value: i64,
    ) -> Result<()> {
        match obj.into() {
            ObjRef::Root => {
                self.ensure_open()?;
                set_into(&[ROOT_INT], self, property, value, "database")
            }
            ObjRef::Scope(id) => self.scope_mut(id)?.set_int_property(cover_index, property, value),
            ObjRef::History(id) => self
                .history_node_mut(id)?
                .set_int_property(cover_index, property, value),
        }
    }

    pub fn real_property(&self, obj: impl Into<ObjRef>, cover_index: i32, property: RealProperty) -> Result<f64> {
        match obj.into() {
            ObjRef::Root => {
                self.ensure_open()?;
                Err(CovError::unsupported_property(property, "database"))
            }
            ObjRef::Scope(id) => self.scope(id)?.real_property(cover_index, property),
            ObjRef::History(id) => self.history_node(id)?.real_property(cover_index, property),
        }
    }

    pub fn set_real_property(
        &mut self,
        obj: impl Into<ObjRef>,
        cover_index: i32,
        property: RealProperty,
        value: f64,
    ) -> Result<()> {
        match obj.into() {
            ObjRef::Root => {
                self.ensure_open()?;
                Err(CovError::unsupported_property(property, "database"))
            }
            ObjRef::Scope(id) => self.scope_mut(id)?.set_real_property(cover_index, property, value),
            ObjRef::History(id) => self
                .history_node_mut(id)?
                .set_real_property(cover_index, property, value),
        }
    }

    pub fn string_property(
        &self,
        obj: impl Into<ObjRef>,
        cover_index: i32,
        property: StrProperty,
    ) -> Result<String> {
        match obj.into() {
            ObjRef::Root => {
                self.ensure_open()?;
                get_from(&[ROOT_STR], self, property, "database")
            }
            ObjRef::Scope(id) => match property {
                StrProperty::ScopeHierName if cover_index == SCOPE_LEVEL => self.hier_name(id),
                StrProperty::FileName => {
                    let scope = self.scope(id)?;
                    let source = match usize::try_from(cover_index) {
                        Ok(index) => scope.item(index).and_then(|item| item.source()),
                        Err(_) => scope.source(),
                    };
                    match source.and_then(|s| s.file) {
                        Some(file) => Ok(self.file(file)?.filename().to_string()),
                        None => Err(CovError::unsupported_property(property, scope.object_kind())),
                    }
                }
                _ => self.scope(id)?.string_property(cover_index, property),
            },
            ObjRef::History(id) => self.history_node(id)?.string_property(cover_index, property),
        }
    }

    pub fn set_string_property(
        &mut self,
        obj: impl Into<ObjRef>,
        cover_index: i32,
        property: StrProperty,
        value: &str,
    ) -> Result<()> {
        match obj.into() {
            ObjRef::Root => {
                self.ensure_open()?;
                set_into(&[ROOT_STR], self, property, value.to_string(), "database")
            }
            ObjRef::Scope(id) => self
                .scope_mut(id)?
                .set_string_property(cover_index, property, value),
            ObjRef::History(id) => self
                .history_node_mut(id)?
                .set_string_property(cover_index, property, value),
        }
    }

    pub fn handle_property(&self, obj: impl Into<ObjRef>, property: HandleProperty) -> Result<ObjRef> {
        match obj.into() {
            ObjRef::Root => {
                self.ensure_open()?;
                Err(CovError::unsupported_property(property, "database"))
            }
            ObjRef::Scope(id) => self.scope(id)?.handle_property(property),
            ObjRef::History(id) => self.history_node(id)?.handle_property(property),
        }
    }

    pub fn set_handle_property(
        &mut self,
        obj: impl Into<ObjRef>,
        property: HandleProperty,
        value: ObjRef,
    ) -> Result<()> {
        if let ObjRef::Scope(target) = value {
            self.scope(target)?;
        }
        match obj.into() {
            ObjRef::Root => {
                self.ensure_open()?;
                Err(CovError::unsupported_property(property, "database"))
            }
            ObjRef::Scope(id) => self.scope_mut(id)?.set_handle_property(property, value),
            ObjRef::History(id) => self.history_node_mut(id)?.set_handle_property(property, value),
        }
    }

    fn has_ancestor(&self, id: ScopeId, scope_type: ScopeType) -> Result<bool> {
        let mut cursor = self.scope(id)?.parent;
        while let Some(parent) = cursor {
            let scope = &self.scopes[parent.index()];
            if scope.scope_type == scope_type {
                return Ok(true);
            }
            cursor = scope.parent;
        }
        Ok(false)
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

fn index_u32(len: usize, table: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| CovError::invalid_state(format!("{} is full", table)))
}

static ROOT_INT: Table<Database, IntProperty, i64> = &[
    Accessor {
        id: IntProperty::IsModified,
        get: |db| Some(i64::from(db.modified)),
        set: None,
    },
    Accessor {
        id: IntProperty::NumTests,
        get: |db| i64::try_from(db.test_count()).ok(),
        set: None,
    },
];

static ROOT_STR: Table<Database, StrProperty, String> = &[
    Accessor {
        id: StrProperty::VerStandard,
        get: |_| Some("UCIS".to_string()),
        set: None,
    },
    Accessor {
        id: StrProperty::VerStandardVersion,
        get: |db| Some(db.api_version.clone()),
        set: Some(|db: &mut Database, value: String| {
            db.api_version = value;
            Ok(())
        }),
    },
    Accessor {
        id: StrProperty::VerVendorTool,
        get: |db| Some(db.written_by.clone()),
        set: Some(|db: &mut Database, value: String| {
            db.written_by = value;
            Ok(())
        }),
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CoverType;

    fn sample() -> (Database, ScopeId, ScopeId) {
        let mut db = Database::new();
        let top = db
            .create_instance(None, "top", None, 1, SourceLanguage::SystemVerilog, None, ScopeFlags::empty())
            .unwrap();
        let cg = db
            .create_covergroup(Some(top), "cg", None, 1, SourceLanguage::SystemVerilog)
            .unwrap();
        let cp = db
            .create_coverpoint(cg, "cp", None, 1, SourceLanguage::SystemVerilog)
            .unwrap();
        db.create_next_cover(cp, "b0", CoverData::new(CoverType::CvgBin, 3), None)
            .unwrap();
        db.create_next_cover(cp, "b1", CoverData::new(CoverType::CvgBin, 0), None)
            .unwrap();
        (db, top, cp)
    }

    #[test]
    fn test_hierarchy_and_names() {
        let (db, top, cp) = sample();
        assert_eq!(db.hier_name(cp).unwrap(), "top/cg/cp");
        assert_eq!(db.find_scope("top/cg/cp").unwrap(), Some(cp));
        assert_eq!(db.find_scope("top/nope").unwrap(), None);
        assert_eq!(db.root_scopes(ScopeMask::ALL).unwrap().collect::<Vec<_>>(), vec![top]);
        assert_eq!(db.scope_count(), 3);
        assert_eq!(db.cover_item_count(), 2);
    }

    #[test]
    fn test_duplicate_sibling_rejected() {
        let (mut db, top, _) = sample();
        let err = db.create_covergroup(Some(top), "cg", None, 1, SourceLanguage::SystemVerilog);
        assert!(matches!(err, Err(CovError::InvalidArgument { .. })));
    }

    #[test]
    fn test_scope_iteration_filter() {
        let (mut db, top, _) = sample();
        db.create_scope(
            Some(top),
            "blk",
            None,
            1,
            SourceLanguage::SystemVerilog,
            ScopeType::Block,
            ScopeFlags::empty(),
        )
        .unwrap();
        let all: Vec<_> = db.scopes(top, ScopeMask::ALL).unwrap().collect();
        assert_eq!(all.len(), 2);
        let blocks: Vec<_> = db.scopes(top, ScopeType::Block.into()).unwrap().collect();
        assert_eq!(blocks.len(), 1);
        // restartable
        assert_eq!(db.scopes(top, ScopeMask::ALL).unwrap().count(), 2);
    }

    #[test]
    fn test_file_handles_deduplicated() {
        let mut db = Database::new();
        let a = db.create_file_handle("top.sv", "/work").unwrap();
        let b = db.create_file_handle("top.sv", "/work").unwrap();
        let c = db.create_file_handle("top.sv", "/other").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(db.files().unwrap().count(), 2);
    }

    #[test]
    fn test_path_separator_validation() {
        let mut db = Database::new();
        assert!(db.set_path_separator("::").is_err());
        assert!(db.set_path_separator("").is_err());
        db.set_path_separator(".").unwrap();
        let top = db
            .create_scope(None, "top", None, 1, SourceLanguage::Verilog, ScopeType::Instance, ScopeFlags::empty())
            .unwrap();
        let child = db
            .create_scope(Some(top), "u0", None, 1, SourceLanguage::Verilog, ScopeType::Instance, ScopeFlags::empty())
            .unwrap();
        assert_eq!(db.hier_name(child).unwrap(), "top.u0");
    }

    #[test]
    fn test_closed_database_rejects_use() {
        let (mut db, top, cp) = sample();
        db.close().unwrap();
        assert!(matches!(db.scope(top), Err(CovError::InvalidState { .. })));
        assert!(matches!(
            db.create_next_cover(cp, "b2", CoverData::new(CoverType::CvgBin, 0), None),
            Err(CovError::InvalidState { .. })
        ));
        assert!(matches!(
            db.create_covergroup(None, "cg2", None, 1, SourceLanguage::None),
            Err(CovError::InvalidState { .. })
        ));
        assert!(db.root_scopes(ScopeMask::ALL).is_err());
        assert!(db.close().is_err());
    }

    #[test]
    fn test_under_du_flag_propagates() {
        let mut db = Database::new();
        let du = db
            .create_scope(None, "work.top", None, 1, SourceLanguage::SystemVerilog, ScopeType::DuModule, ScopeFlags::empty())
            .unwrap();
        let blk = db
            .create_scope(Some(du), "b", None, 1, SourceLanguage::SystemVerilog, ScopeType::Block, ScopeFlags::empty())
            .unwrap();
        assert_eq!(db.int_property(blk, SCOPE_LEVEL, IntProperty::ScopeIsUnderDu).unwrap(), 1);
        let inst = db
            .create_instance(None, "top", None, 1, SourceLanguage::SystemVerilog, Some(du), ScopeFlags::empty())
            .unwrap();
        assert_eq!(
            db.string_property(inst, SCOPE_LEVEL, StrProperty::InstanceDuName).unwrap(),
            "work.top"
        );
        assert_eq!(
            db.handle_property(inst, HandleProperty::InstanceDu).unwrap(),
            ObjRef::Scope(du)
        );
    }

    #[test]
    fn test_root_properties() {
        let (mut db, _, cp) = sample();
        db.create_history_node(None, "t1", "t1.cdb", HistoryKind::Test).unwrap();
        assert_eq!(db.int_property(ObjRef::Root, SCOPE_LEVEL, IntProperty::NumTests).unwrap(), 1);
        assert_eq!(db.int_property(ObjRef::Root, SCOPE_LEVEL, IntProperty::IsModified).unwrap(), 1);
        assert_eq!(
            db.string_property(cp, SCOPE_LEVEL, StrProperty::ScopeHierName).unwrap(),
            "top/cg/cp"
        );
        assert!(matches!(
            db.real_property(ObjRef::Root, SCOPE_LEVEL, RealProperty::SimTime),
            Err(CovError::UnsupportedProperty { .. })
        ));
    }

    #[test]
    fn test_coverage_tally() {
        let (mut db, _, cp) = sample();
        db.create_next_cover(cp, "ign", CoverData::new(CoverType::IgnoreBin, 9), None)
            .unwrap();
        let coverage = db.coverage(None).unwrap();
        assert_eq!(coverage, Coverage { covered: 1, total: 2 });
        assert_eq!(db.total_hits(), 12);
        assert_eq!(db.coverage(Some(cp)).unwrap().percent(), 50.0);
    }

    #[test]
    fn test_walk_is_preorder() {
        let (db, top, cp) = sample();
        let order = db.walk().unwrap();
        assert_eq!(order.first(), Some(&top));
        assert_eq!(order.last(), Some(&cp));
    }
}
