//! Scope-tree member codec
//!
//! `scope_tree.bin` is the string table followed by `[root count varint]` and
//! one record per scope in pre-order. Hit counts are not part of the tree;
//! they are collected in the same pre-order (each scope's items, then its
//! children) for `counts.bin`, which keeps the tree bytes, and therefore the
//! schema hash, independent of how often anything was hit.
//!
//! A regular record is
//!
//! ```text
//! 0x00 type name presence [flags] [file line token] [weight] [goal]
//!      [language] [cvg options] [kind extra] children items
//!      [default item type (items > 0)] item*
//! ```
//!
//! and an item is `name presence [type] [flags] [goal] [weight] [limit]
//! [bitlen] [file line token]`. Optional fields appear only when their
//! presence bit is set. Branch scopes holding nothing but the two default
//! toggle bins collapse to `0x01 name language`.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::constants::*;
use super::string_table::StringTable;
use super::varint::{encode_signed, encode_varint, ByteReader};
use crate::core::{
    CovError, CoverData, CoverFlags, CoverType, CvgOptions, Database, FileHandle, Result, Scope,
    ScopeFlags, ScopeId, ScopeKind, ScopeMask, ScopeType, SourceInfo, SourceLanguage, ToggleDir,
    ToggleMetric, ToggleType, DEFAULT_SCOPE_GOAL,
};
use crate::plugins::records::AttributeRecord;

/// Output of [`encode_tree`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTree {
    /// Contents of `scope_tree.bin`
    pub bytes: Vec<u8>,
    /// Hit counts in pre-order
    pub counts: Vec<u64>,
    /// Referenced files in first-use order
    pub files: Vec<FileHandle>,
    /// Non-empty attribute maps
    pub attributes: Vec<AttributeRecord>,
}

/// Serialize the scope forest of `db`
pub fn encode_tree(db: &Database) -> Result<EncodedTree> {
    let mut encoder = TreeEncoder {
        db,
        strings: StringTable::new(),
        body: Vec::new(),
        counts: Vec::new(),
        files: Vec::new(),
        file_ids: HashMap::new(),
        attributes: Vec::new(),
        next_index: 0,
    };
    let roots: Vec<ScopeId> = db.root_scopes(ScopeMask::ALL)?.collect();
    encode_varint(roots.len() as u64, &mut encoder.body);
    // (scope, depth), popped in pre-order
    let mut stack: Vec<(ScopeId, usize)> = roots.into_iter().rev().map(|id| (id, 0)).collect();
    while let Some((id, depth)) = stack.pop() {
        if depth >= MAX_SCOPE_DEPTH {
            return Err(CovError::invalid_argument(format!(
                "scope '{}' is nested deeper than {} levels",
                db.hier_name(id)?,
                MAX_SCOPE_DEPTH
            )));
        }
        let children = encoder.scope(id)?;
        stack.extend(children.iter().rev().map(|child| (*child, depth + 1)));
    }

    let mut bytes = encoder.strings.to_bytes();
    bytes.extend_from_slice(&encoder.body);
    debug!(
        scopes = encoder.next_index,
        strings = encoder.strings.len(),
        bytes = bytes.len(),
        "Encoded scope tree"
    );
    Ok(EncodedTree {
        bytes,
        counts: encoder.counts,
        files: encoder.files,
        attributes: encoder.attributes,
    })
}

struct TreeEncoder<'a> {
    db: &'a Database,
    strings: StringTable,
    body: Vec<u8>,
    counts: Vec<u64>,
    files: Vec<FileHandle>,
    file_ids: HashMap<FileHandle, u64>,
    attributes: Vec<AttributeRecord>,
    next_index: usize,
}

impl<'a> TreeEncoder<'a> {
    fn varint(&mut self, value: u64) {
        encode_varint(value, &mut self.body);
    }

    fn string(&mut self, s: &str) {
        let index = self.strings.add(s);
        self.varint(u64::from(index));
    }

    /// 0 for `None`, otherwise the string index plus one
    fn opt_string(&mut self, s: Option<&str>) {
        match s {
            Some(s) => {
                let index = self.strings.add(s);
                self.varint(u64::from(index) + 1);
            }
            None => self.varint(0),
        }
    }

    fn source(&mut self, source: &SourceInfo) {
        let file_ref = match source.file {
            Some(handle) => {
                let next = self.files.len() as u64 + 1;
                let id = *self.file_ids.entry(handle).or_insert(next);
                if id == next {
                    self.files.push(handle);
                }
                id
            }
            None => 0,
        };
        self.varint(file_ref);
        self.varint(u64::from(source.line));
        self.varint(u64::from(source.token));
    }

    /// Write the record of `id` and return the children still to encode
    fn scope(&mut self, id: ScopeId) -> Result<&'a [ScopeId]> {
        let db = self.db;
        let scope = db.scope(id)?;
        let index = self.next_index;
        self.next_index += 1;
        self.collect_attributes(index, scope);

        if is_toggle_pair(db, scope)? {
            trace!(name = scope.name(), "Compacting toggle pair");
            self.body.push(SCOPE_MARKER_TOGGLE_PAIR);
            self.string(scope.name());
            self.varint(u64::from(scope.source_language().bits()));
            self.counts.extend(scope.items().iter().map(|item| item.count()));
            return Ok(&[]);
        }

        self.body.push(SCOPE_MARKER_REGULAR);
        self.varint(scope.scope_type().bits());
        self.string(scope.name());

        let kind = scope.kind();
        let options = kind.cvg_options().filter(|o| !o.is_default());
        let has_extra = !kind.is_default_for(scope.scope_type());
        let mut presence = 0;
        if !scope.flags().is_empty() {
            presence |= PRESENCE_FLAGS;
        }
        if scope.source().is_some() {
            presence |= PRESENCE_SOURCE;
        }
        if scope.weight() != 1 {
            presence |= PRESENCE_WEIGHT;
        }
        if scope.goal() != DEFAULT_SCOPE_GOAL {
            presence |= PRESENCE_GOAL;
        }
        if scope.source_language() != SourceLanguage::None {
            presence |= PRESENCE_SOURCE_TYPE;
        }
        if options.is_some() {
            presence |= PRESENCE_CVG_OPTS;
        }
        if has_extra {
            presence |= PRESENCE_KIND_EXTRA;
        }
        self.varint(presence);

        if presence & PRESENCE_FLAGS != 0 {
            self.varint(u64::from(scope.flags().bits()));
        }
        if let Some(source) = scope.source() {
            self.source(source);
        }
        if presence & PRESENCE_WEIGHT != 0 {
            self.varint(u64::from(scope.weight()));
        }
        if presence & PRESENCE_GOAL != 0 {
            encode_signed(scope.goal(), &mut self.body);
        }
        if presence & PRESENCE_SOURCE_TYPE != 0 {
            self.varint(u64::from(scope.source_language().bits()));
        }
        if let Some(options) = options {
            encode_signed(options.at_least, &mut self.body);
            self.body.push(u8::from(options.per_instance));
            self.opt_string(options.comment.as_deref());
        }
        if has_extra {
            self.kind_extra(kind);
        }

        self.varint(scope.children().len() as u64);
        self.varint(scope.items().len() as u64);
        if let Some(first) = scope.items().first() {
            let default_type = first.cover_type();
            self.varint(default_type.bits());
            for item in scope.items() {
                self.item(item.name(), item.data(), item.source(), default_type);
                self.counts.push(item.count());
            }
        }
        Ok(scope.children())
    }

    fn kind_extra(&mut self, kind: &ScopeKind) {
        match kind {
            ScopeKind::DesignUnit { signature } => self.opt_string(signature.as_deref()),
            ScopeKind::Instance { du_name, .. } => self.opt_string(du_name.as_deref()),
            ScopeKind::Cross { crossed, .. } => {
                self.varint(crossed.len() as u64);
                for name in crossed {
                    self.string(name);
                }
            }
            ScopeKind::Toggle {
                canonical_name,
                metric,
                toggle_type,
                dir,
            } => {
                self.opt_string(canonical_name.as_deref());
                self.varint(u64::from(metric.bits()));
                self.varint(u64::from(toggle_type.bits()));
                self.varint(u64::from(dir.bits()));
            }
            // covergroup options travel in their own field
            ScopeKind::Covergroup(_) | ScopeKind::Fsm | ScopeKind::CodeCoverage | ScopeKind::Hdl => {}
        }
    }

    fn item(&mut self, name: &str, data: &CoverData, source: Option<&SourceInfo>, default_type: CoverType) {
        self.string(name);
        let base = CoverData::new(data.cover_type, data.count);
        let mut presence = 0;
        if data.cover_type != default_type {
            presence |= ITEM_TYPE;
        }
        if data.flags != base.flags {
            presence |= ITEM_FLAGS;
        }
        if data.goal != base.goal {
            presence |= ITEM_GOAL;
        }
        if data.weight != base.weight {
            presence |= ITEM_WEIGHT;
        }
        if data.limit != base.limit {
            presence |= ITEM_LIMIT;
        }
        if data.bitlen != base.bitlen {
            presence |= ITEM_BITLEN;
        }
        if source.is_some() {
            presence |= ITEM_SOURCE;
        }
        self.varint(presence);

        if presence & ITEM_TYPE != 0 {
            self.varint(data.cover_type.bits());
        }
        if presence & ITEM_FLAGS != 0 {
            self.varint(u64::from(data.flags.bits()));
        }
        if presence & ITEM_GOAL != 0 {
            encode_signed(data.goal, &mut self.body);
        }
        if presence & ITEM_WEIGHT != 0 {
            self.varint(u64::from(data.weight));
        }
        if presence & ITEM_LIMIT != 0 {
            encode_signed(data.limit, &mut self.body);
        }
        if presence & ITEM_BITLEN != 0 {
            self.varint(u64::from(data.bitlen));
        }
        if let Some(source) = source {
            self.source(source);
        }
    }

    fn collect_attributes(&mut self, index: usize, scope: &Scope) {
        if !scope.attributes().is_empty() {
            self.attributes.push(AttributeRecord {
                scope: index,
                item: None,
                attributes: scope.attributes().clone(),
            });
        }
        for (item_index, item) in scope.items().iter().enumerate() {
            if !item.attributes().is_empty() {
                self.attributes.push(AttributeRecord {
                    scope: index,
                    item: Some(item_index),
                    attributes: item.attributes().clone(),
                });
            }
        }
    }
}

/// Flags a freshly created child of `parent` starts with
fn inherited_flags(db: &Database, parent: Option<ScopeId>) -> Result<ScopeFlags> {
    let mut flags = ScopeFlags::empty();
    if let Some(parent) = parent {
        let parent = db.scope(parent)?;
        if parent.scope_type().is_design_unit() || parent.flags().contains(ScopeFlags::SCOPE_UNDER_DU) {
            flags.insert(ScopeFlags::SCOPE_UNDER_DU);
        }
    }
    Ok(flags)
}

/// A branch scope holding only the two default toggle bins
fn is_toggle_pair(db: &Database, scope: &Scope) -> Result<bool> {
    if scope.scope_type() != ScopeType::Branch
        || !scope.children().is_empty()
        || scope.source().is_some()
        || scope.weight() != 1
        || scope.goal() != DEFAULT_SCOPE_GOAL
        || !scope.attributes().is_empty()
        || !scope.kind().is_default_for(ScopeType::Branch)
    {
        return Ok(false);
    }
    let items = scope.items();
    let bins_match = items.len() == 2
        && items[0].name() == TOGGLE_BIN_0_TO_1
        && items[1].name() == TOGGLE_BIN_1_TO_0
        && items.iter().all(|item| {
            item.source().is_none()
                && item.attributes().is_empty()
                && *item.data() == CoverData::new(CoverType::ToggleBin, item.count())
        });
    Ok(bins_match && scope.flags() == inherited_flags(db, scope.parent())?)
}

/// Rebuild the forest in `bytes` beneath the top level of `db`
///
/// `counts` is the decoded `counts.bin`; `files` maps the tree's file
/// references (in first-use order) to handles already interned in `db`.
/// Returns every created scope in pre-order.
pub fn decode_tree(
    bytes: &[u8],
    counts: &[u64],
    files: &[FileHandle],
    db: &mut Database,
) -> Result<Vec<ScopeId>> {
    let mut reader = ByteReader::new(bytes, MEMBER_SCOPE_TREE);
    let strings = StringTable::read_from(&mut reader)?;
    let mut decoder = TreeDecoder {
        reader,
        strings,
        counts,
        next_count: 0,
        files,
        order: Vec::new(),
    };
    let roots = decoder.reader.varint_usize()?;
    // (parent, records still to read beneath it, their depth)
    let mut pending: Vec<(Option<ScopeId>, usize, usize)> = vec![(None, roots, 0)];
    while let Some(top) = pending.last_mut() {
        if top.1 == 0 {
            pending.pop();
            continue;
        }
        top.1 -= 1;
        let (parent, depth) = (top.0, top.2);
        if depth >= MAX_SCOPE_DEPTH {
            return Err(CovError::corrupt(
                MEMBER_SCOPE_TREE,
                format!(
                    "scope nesting deeper than {} at offset {}",
                    MAX_SCOPE_DEPTH,
                    decoder.reader.position()
                ),
            ));
        }
        let (id, children) = decoder.scope(db, parent)?;
        if children > 0 {
            pending.push((Some(id), children, depth + 1));
        }
    }
    if !decoder.reader.is_at_end() {
        return Err(CovError::corrupt(
            MEMBER_SCOPE_TREE,
            format!("trailing bytes after offset {}", decoder.reader.position()),
        ));
    }
    if decoder.next_count != counts.len() {
        return Err(CovError::corrupt(
            MEMBER_COUNTS,
            format!(
                "{} counts for {} cover items",
                counts.len(),
                decoder.next_count
            ),
        ));
    }
    let linked = db.resolve_du_links()?;
    debug!(scopes = decoder.order.len(), linked, "Decoded scope tree");
    Ok(decoder.order)
}

struct TreeDecoder<'a> {
    reader: ByteReader<'a>,
    strings: StringTable,
    counts: &'a [u64],
    next_count: usize,
    files: &'a [FileHandle],
    order: Vec<ScopeId>,
}

impl TreeDecoder<'_> {
    fn string(&mut self) -> Result<String> {
        let index = self.reader.varint()?;
        Ok(self.strings.resolve(index)?.to_string())
    }

    fn opt_string(&mut self) -> Result<Option<String>> {
        match self.reader.varint()? {
            0 => Ok(None),
            n => Ok(Some(self.strings.resolve(n - 1)?.to_string())),
        }
    }

    fn count(&mut self) -> Result<u64> {
        let count = self.counts.get(self.next_count).copied().ok_or_else(|| {
            CovError::corrupt(MEMBER_COUNTS, "fewer counts than cover items")
        })?;
        self.next_count += 1;
        Ok(count)
    }

    fn source(&mut self) -> Result<SourceInfo> {
        let file_ref = self.reader.varint_usize()?;
        let file = match file_ref {
            0 => None,
            n => Some(*self.files.get(n - 1).ok_or_else(|| {
                CovError::corrupt(
                    MEMBER_SCOPE_TREE,
                    format!("file reference {} out of range (1..={})", n, self.files.len()),
                )
            })?),
        };
        let line = self.reader.varint_u32()?;
        let token = self.reader.varint_u32()?;
        Ok(SourceInfo { file, line, token })
    }

    fn code<T>(&mut self, what: &str, parse: impl Fn(u64) -> Option<T>) -> Result<T> {
        let at = self.reader.position();
        let raw = self.reader.varint()?;
        parse(raw).ok_or_else(|| {
            CovError::corrupt(MEMBER_SCOPE_TREE, format!("unknown {} {} at offset {}", what, raw, at))
        })
    }

    fn language(&mut self) -> Result<SourceLanguage> {
        self.code("source language", |raw| {
            u32::try_from(raw).ok().and_then(SourceLanguage::from_bits)
        })
    }

    /// Read one record, returning the created scope and its child count
    fn scope(&mut self, db: &mut Database, parent: Option<ScopeId>) -> Result<(ScopeId, usize)> {
        let at = self.reader.position();
        match self.reader.byte()? {
            SCOPE_MARKER_TOGGLE_PAIR => Ok((self.toggle_pair(db, parent)?, 0)),
            SCOPE_MARKER_REGULAR => self.regular(db, parent),
            other => Err(CovError::corrupt(
                MEMBER_SCOPE_TREE,
                format!("unknown scope marker 0x{:02x} at offset {}", other, at),
            )),
        }
    }

    fn toggle_pair(&mut self, db: &mut Database, parent: Option<ScopeId>) -> Result<ScopeId> {
        let name = self.string()?;
        let language = self.language()?;
        let id = db.create_scope(
            parent,
            &name,
            None,
            1,
            language,
            ScopeType::Branch,
            ScopeFlags::empty(),
        )?;
        self.order.push(id);
        for bin in [TOGGLE_BIN_0_TO_1, TOGGLE_BIN_1_TO_0] {
            let count = self.count()?;
            db.create_next_cover(id, bin, CoverData::new(CoverType::ToggleBin, count), None)?;
        }
        Ok(id)
    }

    fn regular(&mut self, db: &mut Database, parent: Option<ScopeId>) -> Result<(ScopeId, usize)> {
        let scope_type = self.code("scope type", ScopeType::from_bits)?;
        let name = self.string()?;
        let presence = self.reader.varint()?;

        let flags = if presence & PRESENCE_FLAGS != 0 {
            ScopeFlags::from_bits(self.reader.varint_u32()?)
        } else {
            ScopeFlags::empty()
        };
        let source = if presence & PRESENCE_SOURCE != 0 {
            Some(self.source()?)
        } else {
            None
        };
        let weight = if presence & PRESENCE_WEIGHT != 0 {
            self.reader.varint_u32()?
        } else {
            1
        };
        let goal = if presence & PRESENCE_GOAL != 0 {
            self.reader.signed()?
        } else {
            DEFAULT_SCOPE_GOAL
        };
        let language = if presence & PRESENCE_SOURCE_TYPE != 0 {
            self.language()?
        } else {
            SourceLanguage::None
        };

        let mut kind = ScopeKind::for_type(scope_type);
        if presence & PRESENCE_CVG_OPTS != 0 {
            let options = CvgOptions {
                at_least: self.reader.signed()?,
                per_instance: self.reader.byte()? != 0,
                comment: self.opt_string()?,
            };
            match kind.cvg_options_mut() {
                Some(slot) => *slot = options,
                None => {
                    return Err(CovError::corrupt(
                        MEMBER_SCOPE_TREE,
                        format!("covergroup options on {} scope '{}'", scope_type, name),
                    ))
                }
            }
        }
        if presence & PRESENCE_KIND_EXTRA != 0 {
            self.kind_extra(&mut kind)?;
        }

        let id = db.create_scope(parent, &name, source, weight, language, scope_type, flags)?;
        {
            let scope = db.scope_mut(id)?;
            scope.set_flags(flags);
            scope.set_goal(goal);
            *scope.kind_mut() = kind;
        }
        self.order.push(id);

        let children = self.reader.varint_usize()?;
        let items = self.reader.varint_usize()?;
        if items > 0 {
            let default_type = self.code("cover type", CoverType::from_bits)?;
            for _ in 0..items {
                self.item(db, id, default_type)?;
            }
        }
        Ok((id, children))
    }

    fn kind_extra(&mut self, kind: &mut ScopeKind) -> Result<()> {
        match kind {
            ScopeKind::DesignUnit { signature } => *signature = self.opt_string()?,
            ScopeKind::Instance { du_name, .. } => *du_name = self.opt_string()?,
            ScopeKind::Cross { crossed, .. } => {
                let n = self.reader.varint_usize()?;
                for _ in 0..n {
                    crossed.push(self.string()?);
                }
            }
            ScopeKind::Toggle {
                canonical_name,
                metric,
                toggle_type,
                dir,
            } => {
                *canonical_name = self.opt_string()?;
                *metric = self.code("toggle metric", |raw| {
                    u32::try_from(raw).ok().and_then(ToggleMetric::from_bits)
                })?;
                *toggle_type = self.code("toggle type", |raw| {
                    u32::try_from(raw).ok().and_then(ToggleType::from_bits)
                })?;
                *dir = self.code("toggle direction", |raw| {
                    u32::try_from(raw).ok().and_then(ToggleDir::from_bits)
                })?;
            }
            other => {
                return Err(CovError::corrupt(
                    MEMBER_SCOPE_TREE,
                    format!("unexpected extra fields on {}", other.label()),
                ))
            }
        }
        Ok(())
    }

    fn item(&mut self, db: &mut Database, scope: ScopeId, default_type: CoverType) -> Result<()> {
        let name = self.string()?;
        let presence = self.reader.varint()?;
        let cover_type = if presence & ITEM_TYPE != 0 {
            self.code("cover type", CoverType::from_bits)?
        } else {
            default_type
        };
        let mut data = CoverData::new(cover_type, 0);
        if presence & ITEM_FLAGS != 0 {
            data.flags = CoverFlags::from_bits(self.reader.varint_u32()?);
        }
        if presence & ITEM_GOAL != 0 {
            data.goal = self.reader.signed()?;
        }
        if presence & ITEM_WEIGHT != 0 {
            data.weight = self.reader.varint_u32()?;
        }
        if presence & ITEM_LIMIT != 0 {
            data.limit = self.reader.signed()?;
        }
        if presence & ITEM_BITLEN != 0 {
            data.bitlen = self.reader.varint_u32()?;
        }
        let source = if presence & ITEM_SOURCE != 0 {
            Some(self.source()?)
        } else {
            None
        };
        data.count = self.count()?;
        db.create_next_cover(scope, &name, data, source)?;
        Ok(())
    }
}
