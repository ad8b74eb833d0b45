//! File-level merge of NCDB containers
//!
//! When every input carries the same `schema_hash` the scope trees are
//! byte-identical, so only the first tree is decoded and the other inputs
//! contribute their count arrays, summed element-wise in pre-order. Inputs
//! with differing schemas are loaded in full and merged scope by scope.

use std::path::Path;

use tracing::{debug, info, span, Level};

use super::constants::{MEMBER_COUNTS, MEMBER_SCOPE_TREE};
use super::container::{read_container, write_container, NcdbArchive, NcdbWriteOptions};
use super::manifest::Manifest;
use crate::core::{ConversionContext, CovError, CoverId, Database, HistoryKind, Result};
use crate::merge::{
    adopt_history, create_merge_node, record_squashed_tests, MergeOptions, MergeReport,
    MergeSource, Merger,
};

/// Merges NCDB files into a new NCDB file
#[derive(Debug, Clone, Default)]
pub struct NcdbMerger {
    options: MergeOptions,
    write_options: NcdbWriteOptions,
}

fn source_name(path: &Path) -> String {
    path.display().to_string()
}

/// Run a read against one input, reporting any failure against that input
fn read_source<T>(path: &Path, read: impl FnOnce() -> Result<T>) -> Result<T> {
    read().map_err(|e| CovError::source_read(source_name(path), e))
}

impl NcdbMerger {
    pub fn new(options: MergeOptions) -> Self {
        Self {
            options,
            write_options: NcdbWriteOptions::default(),
        }
    }

    pub fn with_write_options(mut self, write_options: NcdbWriteOptions) -> Self {
        self.write_options = write_options;
        self
    }

    /// Merge `sources` into a container at `target`
    ///
    /// Any input that cannot be read aborts the merge with
    /// [`CovError::SourceReadError`] before `target` is written.
    pub fn merge_files<P: AsRef<Path>>(
        &self,
        sources: &[P],
        target: &Path,
        ctx: &mut ConversionContext,
    ) -> Result<MergeReport> {
        if sources.is_empty() {
            return Err(CovError::invalid_argument("no merge sources given"));
        }
        let span = span!(Level::INFO, "merge_ncdb", sources = sources.len(), target = %target.display());
        let _enter = span.enter();

        let paths: Vec<&Path> = sources.iter().map(AsRef::as_ref).collect();
        let manifests = paths
            .iter()
            .map(|path| read_source(path, || NcdbArchive::open(path)?.manifest()))
            .collect::<Result<Vec<Manifest>>>()?;

        let same_schema = manifests
            .windows(2)
            .all(|pair| pair[0].schema_hash == pair[1].schema_hash);
        debug!(same_schema, "Compared input schemas");

        let (db, report) = if same_schema {
            self.merge_counts(&paths, ctx)?
        } else {
            self.merge_trees(&paths, ctx)?
        };

        write_container(&db, target, &self.write_options, ctx)?;
        info!(fast_path = report.fast_path, "{}", report.summary());
        Ok(report)
    }

    /// Same-schema path: one decoded tree plus everyone's counts
    fn merge_counts(&self, paths: &[&Path], ctx: &mut ConversionContext) -> Result<(Database, MergeReport)> {
        let first = paths[0];
        let mut db = read_source(first, || NcdbArchive::open(first)?.load_tree(ctx))?;

        let mut targets: Vec<CoverId> = Vec::with_capacity(db.cover_item_count());
        for scope in db.walk()? {
            let items = db.scope(scope)?.items().len();
            targets.extend((0..items).map(|index| CoverId { scope, index }));
        }

        let mut report = MergeReport {
            sources: paths.len(),
            fast_path: true,
            scopes_matched: db.scope_count() * (paths.len() - 1),
            ..MergeReport::default()
        };
        let mut histories = Vec::with_capacity(paths.len());
        {
            let mut phase = ctx.phase("merge counts", Some(paths.len() as u64));
            for (position, path) in paths.iter().enumerate() {
                let (counts, history) = read_source(path, || {
                    let mut archive = NcdbArchive::open(path)?;
                    let counts = if position == 0 {
                        Vec::new()
                    } else {
                        // Trees past the first are hashed, never decoded
                        let tree = archive.required(MEMBER_SCOPE_TREE)?;
                        archive.manifest()?.verify(&tree)?;
                        archive.counts()?
                    };
                    Ok((counts, archive.history()?))
                })?;
                histories.push(history);
                if position > 0 {
                    if counts.len() != targets.len() {
                        return Err(CovError::corrupt(
                            MEMBER_COUNTS,
                            format!(
                                "{} holds {} counts but the shared schema has {} cover items",
                                source_name(path),
                                counts.len(),
                                targets.len()
                            ),
                        ));
                    }
                    for (id, hits) in targets.iter().zip(counts) {
                        let item = db.cover_item_mut(*id)?;
                        if item.data().is_passive() {
                            report.items_passive += 1;
                        } else {
                            item.increment(hits);
                            report.items_merged += 1;
                        }
                    }
                }
                phase.item(Some(source_name(path).as_str()), 1);
            }
        }

        let names: Vec<String> = paths.iter().map(|p| source_name(p)).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let merge_node = create_merge_node(&mut db, &self.options.merge_node_name, &name_refs)?;
        if self.options.squash_history {
            let tests = histories
                .iter()
                .flatten()
                .filter(|record| record.kind == HistoryKind::Test.name())
                .count();
            record_squashed_tests(&mut db, merge_node, tests)?;
        } else {
            for (records, name) in histories.iter().zip(&name_refs) {
                report.history_nodes_copied += adopt_history(&mut db, merge_node, records, name)?;
            }
        }
        Ok((db, report))
    }

    /// Mixed-schema path: full loads merged with the generic engine
    fn merge_trees(&self, paths: &[&Path], ctx: &mut ConversionContext) -> Result<(Database, MergeReport)> {
        let names: Vec<String> = paths.iter().map(|p| source_name(p)).collect();
        let mut databases = Vec::with_capacity(paths.len());
        for path in paths {
            databases.push(read_source(path, || read_container(path, ctx))?);
        }
        let sources: Vec<MergeSource<'_>> = names
            .iter()
            .zip(&databases)
            .map(|(name, db)| MergeSource::new(name, db))
            .collect();

        let mut db = Database::new();
        let report = Merger::new(self.options.clone()).merge(&mut db, &sources, ctx)?;
        Ok((db, report))
    }
}
