//! Scope-by-scope merge of arbitrary databases

use std::collections::HashMap;

use tracing::{debug, info, span, trace, warn, Level};

use super::history::{adopt_history, create_merge_node, record_squashed_tests};
use super::{MergeOptions, MergeReport, MergeSource, MetadataPolicy};
use crate::core::{
    ConversionContext, CovError, Database, FileHandle, HistoryKind, Result, ScopeId, ScopeKind,
    ScopeMask, SourceInfo,
};
use crate::plugins::records::history_records;

/// Merges source databases into a destination through the public database API
#[derive(Debug, Clone, Default)]
pub struct Merger {
    options: MergeOptions,
}

impl Merger {
    pub fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Merge `sources`, in order, into `dst`
    ///
    /// Counts of unified bins are summed. A scope that exists in `dst` under
    /// the same name but with another type aborts the merge with
    /// [`CovError::StructuralConflict`]; `dst` is then left partially merged.
    pub fn merge(
        &self,
        dst: &mut Database,
        sources: &[MergeSource<'_>],
        ctx: &mut ConversionContext,
    ) -> Result<MergeReport> {
        if sources.is_empty() {
            return Err(CovError::invalid_argument("no merge sources given"));
        }
        let span = span!(Level::INFO, "merge", sources = sources.len());
        let _enter = span.enter();

        let mut report = MergeReport {
            sources: sources.len(),
            ..MergeReport::default()
        };

        {
            let mut phase = ctx.phase("merge", Some(sources.len() as u64));
            for source in sources {
                debug!(source = source.name, "Merging source");
                merge_tree(&self.options, dst, source, &mut phase, &mut report)?;
                phase.item(Some(source.name), 1);
            }
        }
        dst.resolve_du_links()?;

        let names: Vec<&str> = sources.iter().map(|s| s.name).collect();
        let merge_node = create_merge_node(dst, &self.options.merge_node_name, &names)?;
        if self.options.squash_history {
            let tests = sources
                .iter()
                .map(|s| s.database.history_nodes(Some(HistoryKind::Test)).map(Iterator::count))
                .sum::<Result<usize>>()?;
            record_squashed_tests(dst, merge_node, tests)?;
        } else {
            for source in sources {
                let records = history_records(source.database)?;
                report.history_nodes_copied += adopt_history(dst, merge_node, &records, source.name)?;
            }
        }

        info!(
            scopes_matched = report.scopes_matched,
            scopes_created = report.scopes_created,
            items_merged = report.items_merged,
            items_created = report.items_created,
            conflicts = report.metadata_conflicts,
            "Merge complete"
        );
        Ok(report)
    }
}

/// Source file handles already interned in the destination
type FileMap = HashMap<FileHandle, FileHandle>;

fn remap_source(
    src: &Database,
    dst: &mut Database,
    files: &mut FileMap,
    source: Option<&SourceInfo>,
) -> Result<Option<SourceInfo>> {
    let Some(info) = source else {
        return Ok(None);
    };
    let file = match info.file {
        Some(handle) => Some(match files.get(&handle) {
            Some(mapped) => *mapped,
            None => {
                let file = src.file(handle)?;
                let mapped = dst.create_file_handle(file.filename(), file.workdir())?;
                files.insert(handle, mapped);
                mapped
            }
        }),
        None => None,
    };
    Ok(Some(SourceInfo { file, ..*info }))
}

fn merge_tree(
    options: &MergeOptions,
    dst: &mut Database,
    source: &MergeSource<'_>,
    ctx: &mut ConversionContext,
    report: &mut MergeReport,
) -> Result<()> {
    let src = source.database;
    let mut files = FileMap::new();
    // (source scope, destination parent), popped in pre-order
    let mut stack: Vec<(ScopeId, Option<ScopeId>)> = src
        .root_scopes(ScopeMask::ALL)?
        .map(|id| (id, None))
        .collect();
    stack.reverse();

    while let Some((src_id, dst_parent)) = stack.pop() {
        let dst_id = match dst.find_child(dst_parent, src.scope(src_id)?.name())? {
            Some(existing) => {
                unify_scope(options, src, src_id, dst, existing, ctx, report)?;
                report.scopes_matched += 1;
                existing
            }
            None => {
                let created = copy_scope(src, src_id, dst, dst_parent, &mut files)?;
                report.scopes_created += 1;
                created
            }
        };
        merge_items(src, src_id, dst, dst_id, &mut files, report)?;
        stack.extend(
            src.scope(src_id)?
                .children()
                .iter()
                .rev()
                .map(|child| (*child, Some(dst_id))),
        );
    }
    Ok(())
}

/// Check an existing destination scope against its source counterpart
fn unify_scope(
    options: &MergeOptions,
    src: &Database,
    src_id: ScopeId,
    dst: &mut Database,
    dst_id: ScopeId,
    ctx: &mut ConversionContext,
    report: &mut MergeReport,
) -> Result<()> {
    let incoming = src.scope(src_id)?;
    let existing = dst.scope(dst_id)?;
    if incoming.scope_type() != existing.scope_type() {
        return Err(CovError::structural_conflict(
            src.hier_name(src_id)?,
            existing.scope_type().name(),
            incoming.scope_type().name(),
        ));
    }
    trace!(name = incoming.name(), "Matched scope");

    let (weight, goal) = (existing.weight(), existing.goal());
    let signature = existing.signature().map(str::to_string);
    let missing: Vec<(String, String)> = incoming
        .attributes()
        .iter()
        .filter(|(key, _)| existing.attribute(key).is_none())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    if incoming.weight() != weight || incoming.goal() != goal {
        let path = dst.hier_name(dst_id)?;
        warn!(path = %path, "Scope metadata differs between merge sources");
        ctx.warn_recoverable(format!(
            "metadata mismatch at '{}': weight {} vs {}, goal {} vs {}",
            path,
            weight,
            incoming.weight(),
            goal,
            incoming.goal()
        ));
        report.metadata_conflicts += 1;
        if options.metadata_policy == MetadataPolicy::LastSourceWins {
            let scope = dst.scope_mut(dst_id)?;
            scope.set_weight(incoming.weight());
            scope.set_goal(incoming.goal());
        }
    }

    if let (Some(theirs), Some(ours)) = (incoming.signature(), signature.as_deref()) {
        if theirs != ours {
            let path = dst.hier_name(dst_id)?;
            warn!(path = %path, "Design unit signature differs between merge sources");
            ctx.warn_recoverable(format!(
                "design unit '{}' elaborated with different signatures ({} vs {})",
                path, ours, theirs
            ));
        }
    }

    if !missing.is_empty() {
        let scope = dst.scope_mut(dst_id)?;
        for (key, value) in missing {
            scope.set_attribute(key, value);
        }
    }
    Ok(())
}

/// Create a copy of `src_id` (without children or items) beneath `dst_parent`
fn copy_scope(
    src: &Database,
    src_id: ScopeId,
    dst: &mut Database,
    dst_parent: Option<ScopeId>,
    files: &mut FileMap,
) -> Result<ScopeId> {
    let scope = src.scope(src_id)?;
    let source = remap_source(src, dst, files, scope.source())?;
    let id = dst.create_scope(
        dst_parent,
        scope.name(),
        source,
        scope.weight(),
        scope.source_language(),
        scope.scope_type(),
        scope.flags(),
    )?;
    trace!(name = scope.name(), scope_type = %scope.scope_type(), "Copied scope");

    let mut kind = scope.kind().clone();
    // Design-unit links are re-resolved by name once every source is in
    if let ScopeKind::Instance { du_scope, .. } = &mut kind {
        *du_scope = None;
    }
    let created = dst.scope_mut(id)?;
    created.set_flags(scope.flags());
    created.set_goal(scope.goal());
    *created.kind_mut() = kind;
    for (key, value) in scope.attributes() {
        created.set_attribute(key.clone(), value.clone());
    }
    Ok(id)
}

/// Sum or copy the items of `src_id` into `dst_id`
///
/// Items are matched by name and by occurrence among items of that name, so
/// repeated bin names pair up positionally.
fn merge_items(
    src: &Database,
    src_id: ScopeId,
    dst: &mut Database,
    dst_id: ScopeId,
    files: &mut FileMap,
    report: &mut MergeReport,
) -> Result<()> {
    let incoming = src.scope(src_id)?.items();
    if incoming.is_empty() {
        return Ok(());
    }

    let mut occurrences: HashMap<String, usize> = HashMap::new();
    let mut existing: HashMap<(String, usize), usize> = HashMap::new();
    for (index, item) in dst.scope(dst_id)?.items().iter().enumerate() {
        let seen = occurrences.entry(item.name().to_string()).or_default();
        existing.insert((item.name().to_string(), *seen), index);
        *seen += 1;
    }

    occurrences.clear();
    for item in incoming {
        let seen = occurrences.entry(item.name().to_string()).or_default();
        let key = (item.name().to_string(), *seen);
        *seen += 1;

        match existing.get(&key) {
            Some(&index) => {
                let target = dst.scope_mut(dst_id)?.item_mut(index).ok_or_else(|| {
                    CovError::invalid_state(format!("cover item {} vanished during merge", index))
                })?;
                if target.data().is_passive() {
                    report.items_passive += 1;
                } else {
                    target.increment(item.count());
                    report.items_merged += 1;
                }
            }
            None => {
                let source = remap_source(src, dst, files, item.source())?;
                let id = dst.create_next_cover(dst_id, item.name(), item.data().clone(), source)?;
                let created = dst.cover_item_mut(id)?;
                for (key, value) in item.attributes() {
                    created.set_attribute(key.clone(), value.clone());
                }
                report.items_created += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CoverData, CoverType, ScopeFlags, ScopeType, SourceLanguage};

    const SV: SourceLanguage = SourceLanguage::SystemVerilog;

    /// `top/dut` instance holding covergroup `cg` with coverpoint `cp1`
    fn cvg_db(bins: &[(&str, u64)]) -> Database {
        let mut db = Database::new();
        let top = db
            .create_instance(None, "top", None, 1, SV, None, ScopeFlags::empty())
            .unwrap();
        let dut = db
            .create_instance(Some(top), "dut", None, 1, SV, None, ScopeFlags::empty())
            .unwrap();
        let cg = db.create_covergroup(Some(dut), "cg", None, 1, SV).unwrap();
        let cp = db.create_coverpoint(cg, "cp1", None, 1, SV).unwrap();
        for (name, count) in bins {
            db.create_next_cover(cp, name, CoverData::new(CoverType::CvgBin, *count), None)
                .unwrap();
        }
        db
    }

    fn bin_count(db: &Database, path: &str, bin: &str) -> u64 {
        let scope = db.find_scope(path).unwrap().unwrap();
        let scope = db.scope(scope).unwrap();
        scope.item(scope.find_item(bin).unwrap()).unwrap().count()
    }

    fn merge_all(dbs: &[&Database]) -> (Database, MergeReport) {
        let names: Vec<String> = (0..dbs.len()).map(|i| format!("src{}", i)).collect();
        let sources: Vec<MergeSource> = dbs
            .iter()
            .zip(&names)
            .map(|(db, name)| MergeSource::new(name, db))
            .collect();
        let mut dst = Database::new();
        let report = Merger::default()
            .merge(&mut dst, &sources, &mut ConversionContext::lenient())
            .unwrap();
        (dst, report)
    }

    #[test]
    fn test_counts_are_summed() {
        let a = cvg_db(&[("b0", 3)]);
        let b = cvg_db(&[("b0", 4)]);
        let (dst, report) = merge_all(&[&a, &b]);
        assert_eq!(bin_count(&dst, "top/dut/cg/cp1", "b0"), 7);
        assert_eq!(report.scopes_created, 4);
        assert_eq!(report.scopes_matched, 4);
        assert_eq!(report.items_merged, 1);
    }

    #[test]
    fn test_source_order_does_not_change_counts() {
        let a = cvg_db(&[("b0", 3), ("b1", 0)]);
        let b = cvg_db(&[("b0", 4), ("b2", 9)]);
        let (ab, _) = merge_all(&[&a, &b]);
        let (ba, _) = merge_all(&[&b, &a]);
        for bin in ["b0", "b1", "b2"] {
            assert_eq!(
                bin_count(&ab, "top/dut/cg/cp1", bin),
                bin_count(&ba, "top/dut/cg/cp1", bin)
            );
        }
    }

    #[test]
    fn test_same_source_twice_doubles() {
        let a = cvg_db(&[("b0", 5)]);
        let (dst, _) = merge_all(&[&a, &a]);
        assert_eq!(bin_count(&dst, "top/dut/cg/cp1", "b0"), 10);
    }

    #[test]
    fn test_identical_paths_unify() {
        let a = cvg_db(&[("b0", 1)]);
        let b = cvg_db(&[("b0", 1)]);
        let (dst, _) = merge_all(&[&a, &b]);
        assert_eq!(dst.scope_count(), 4);
        let dut = dst.find_scope("top/dut").unwrap().unwrap();
        assert_eq!(dst.scope(dut).unwrap().children().len(), 1);
    }

    #[test]
    fn test_type_conflict() {
        let a = cvg_db(&[("b0", 1)]);
        let mut b = Database::new();
        let top = b
            .create_instance(None, "top", None, 1, SV, None, ScopeFlags::empty())
            .unwrap();
        b.create_covergroup(Some(top), "dut", None, 1, SV).unwrap();

        let mut dst = Database::new();
        let err = Merger::default()
            .merge(
                &mut dst,
                &[MergeSource::new("a", &a), MergeSource::new("b", &b)],
                &mut ConversionContext::lenient(),
            )
            .unwrap_err();
        match err {
            CovError::StructuralConflict {
                path,
                existing,
                incoming,
            } => {
                assert_eq!(path, "top/dut");
                assert_eq!(existing, "INSTANCE");
                assert_eq!(incoming, "COVERGROUP");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_passive_bins_unchanged() {
        let mut a = cvg_db(&[("b0", 1)]);
        let cp = a.find_scope("top/dut/cg/cp1").unwrap().unwrap();
        a.create_next_cover(cp, "bad", CoverData::new(CoverType::IllegalBin, 2), None)
            .unwrap();
        let (dst, report) = merge_all(&[&a, &a]);
        assert_eq!(bin_count(&dst, "top/dut/cg/cp1", "bad"), 2);
        assert_eq!(bin_count(&dst, "top/dut/cg/cp1", "b0"), 2);
        assert_eq!(report.items_passive, 1);
    }

    #[test]
    fn test_repeated_bin_names_pair_by_occurrence() {
        let a = cvg_db(&[("dup", 1), ("dup", 10)]);
        let b = cvg_db(&[("dup", 2), ("dup", 20)]);
        let (dst, _) = merge_all(&[&a, &b]);
        let cp = dst.find_scope("top/dut/cg/cp1").unwrap().unwrap();
        let counts: Vec<u64> = dst.scope(cp).unwrap().items().iter().map(|i| i.count()).collect();
        assert_eq!(counts, vec![3, 30]);
    }

    #[test]
    fn test_metadata_mismatch_is_recovered_even_when_strict() {
        let a = cvg_db(&[("b0", 1)]);
        let mut b = cvg_db(&[("b0", 1)]);
        let cg = b.find_scope("top/dut/cg").unwrap().unwrap();
        b.scope_mut(cg).unwrap().set_weight(5);

        let mut dst = Database::new();
        let mut ctx = ConversionContext::strict();
        let report = Merger::default()
            .merge(
                &mut dst,
                &[MergeSource::new("a", &a), MergeSource::new("b", &b)],
                &mut ctx,
            )
            .unwrap();
        assert_eq!(report.metadata_conflicts, 1);
        assert_eq!(ctx.warnings().len(), 1);
        let cg = dst.find_scope("top/dut/cg").unwrap().unwrap();
        assert_eq!(dst.scope(cg).unwrap().weight(), 1);
    }

    #[test]
    fn test_last_source_wins_policy() {
        let a = cvg_db(&[("b0", 1)]);
        let mut b = cvg_db(&[("b0", 1)]);
        let cg = b.find_scope("top/dut/cg").unwrap().unwrap();
        b.scope_mut(cg).unwrap().set_goal(90);

        let mut dst = Database::new();
        Merger::new(MergeOptions::default().with_metadata_policy(MetadataPolicy::LastSourceWins))
            .merge(
                &mut dst,
                &[MergeSource::new("a", &a), MergeSource::new("b", &b)],
                &mut ConversionContext::lenient(),
            )
            .unwrap();
        let cg = dst.find_scope("top/dut/cg").unwrap().unwrap();
        assert_eq!(dst.scope(cg).unwrap().goal(), 90);
    }

    #[test]
    fn test_missing_subtree_is_deep_copied() {
        let mut a = Database::new();
        let file = a.create_file_handle("dut.sv", "/work").unwrap();
        let du = a
            .create_scope(None, "work.dut", None, 1, SV, ScopeType::DuModule, ScopeFlags::empty())
            .unwrap();
        let inst = a
            .create_instance(
                None,
                "top",
                Some(SourceInfo::new(file, 12, 0)),
                1,
                SV,
                Some(du),
                ScopeFlags::empty(),
            )
            .unwrap();
        let block = a
            .create_scope(Some(inst), "blk", None, 1, SV, ScopeType::Block, ScopeFlags::empty())
            .unwrap();
        let item = a
            .create_next_cover(block, "s1", CoverData::new(CoverType::StmtBin, 6), None)
            .unwrap();
        a.cover_item_mut(item).unwrap().set_attribute("owner", "alice");

        let (dst, report) = merge_all(&[&a]);
        assert_eq!(report.scopes_created, 3);
        let top = dst.find_scope("top").unwrap().unwrap();
        let top_scope = dst.scope(top).unwrap();
        let handle = top_scope.source().and_then(|s| s.file).unwrap();
        assert_eq!(dst.file(handle).unwrap().filename(), "dut.sv");
        match top_scope.kind() {
            ScopeKind::Instance { du_name, du_scope } => {
                assert_eq!(du_name.as_deref(), Some("work.dut"));
                assert_eq!(*du_scope, dst.find_scope("work.dut").unwrap());
            }
            other => panic!("unexpected kind {other:?}"),
        }
        let blk = dst.find_scope("top/blk").unwrap().unwrap();
        assert_eq!(dst.scope(blk).unwrap().items()[0].attribute("owner"), Some("alice"));
    }

    #[test]
    fn test_history_adopted_under_merge_node() {
        let mut a = cvg_db(&[("b0", 1)]);
        a.create_history_node(None, "t1", "t1.ucis", HistoryKind::Test).unwrap();
        let mut b = cvg_db(&[("b0", 1)]);
        b.create_history_node(None, "t2", "t2.ucis", HistoryKind::Test).unwrap();

        let (dst, report) = merge_all(&[&a, &b]);
        assert_eq!(report.history_nodes_copied, 2);
        let merges: Vec<_> = dst.history_nodes(Some(HistoryKind::Merge)).unwrap().collect();
        assert_eq!(merges.len(), 1);
        for test in dst.history_nodes(Some(HistoryKind::Test)).unwrap() {
            assert_eq!(dst.history_node(test).unwrap().parent(), Some(merges[0]));
        }
    }

    #[test]
    fn test_squash_keeps_only_merge_node() {
        let mut a = cvg_db(&[("b0", 1)]);
        a.create_history_node(None, "t1", "t1.ucis", HistoryKind::Test).unwrap();
        let mut dst = Database::new();
        let report = Merger::new(MergeOptions::squashed())
            .merge(&mut dst, &[MergeSource::new("a", &a)], &mut ConversionContext::lenient())
            .unwrap();
        assert_eq!(report.history_nodes_copied, 0);
        assert_eq!(dst.test_count(), 0);
        let merges: Vec<_> = dst.history_nodes(Some(HistoryKind::Merge)).unwrap().collect();
        assert_eq!(merges.len(), 1);
        assert_eq!(dst.history_node(merges[0]).unwrap().test.same_tests, 1);
        assert_eq!(bin_count(&dst, "top/dut/cg/cp1", "b0"), 1);
    }

    #[test]
    fn test_no_sources_rejected() {
        let err = Merger::default()
            .merge(&mut Database::new(), &[], &mut ConversionContext::lenient())
            .unwrap_err();
        assert!(matches!(err, CovError::InvalidArgument { .. }));
    }
}
