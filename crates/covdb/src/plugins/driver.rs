//! Conversion and merge drivers
//!
//! Both drivers resolve adapters through a [`FormatRegistry`], report
//! progress through the [`ConversionContext`] and turn content the target
//! format cannot hold into context warnings (fatal in strict mode).

use std::path::Path;

use tracing::{debug, info, span, Level};

use super::ncdb::NcdbMerger;
use super::registry::FormatRegistry;
use crate::core::{
    ConversionContext, CovError, CoverType, Database, FormatAdapter, FormatCapabilities,
    FormatKind, Result, ScopeType,
};
use crate::merge::{MergeOptions, MergeReport, MergeSource, Merger};

/// Content found in a database, by representability category
#[derive(Debug, Default)]
struct ContentSummary {
    functional: bool,
    cross: bool,
    ignore_illegal: bool,
    code: bool,
    toggle: bool,
    fsm: bool,
    assertions: bool,
    history: bool,
}

impl ContentSummary {
    fn of(db: &Database) -> Result<Self> {
        let mut summary = Self {
            history: db.history_nodes(None)?.next().is_some(),
            ..Self::default()
        };
        for id in db.walk()? {
            let scope = db.scope(id)?;
            let scope_type = scope.scope_type();
            summary.functional |= scope_type.is_functional();
            summary.cross |= scope_type == ScopeType::Cross;
            summary.toggle |= scope_type == ScopeType::Toggle;
            summary.fsm |= matches!(scope_type, ScopeType::Fsm | ScopeType::FsmStates | ScopeType::FsmTrans);
            summary.assertions |= matches!(scope_type, ScopeType::Assert | ScopeType::Cover);
            summary.code |= scope_type.is_code_coverage();
            summary.ignore_illegal |= scope
                .items()
                .iter()
                .any(|item| matches!(item.cover_type(), CoverType::IgnoreBin | CoverType::IllegalBin));
        }
        Ok(summary)
    }

    /// Messages for content `caps` cannot represent
    fn unsupported(&self, caps: &FormatCapabilities) -> Vec<&'static str> {
        [
            (self.functional && !caps.functional_coverage, "functional coverage"),
            (self.cross && !caps.cross_coverage, "cross coverage"),
            (self.ignore_illegal && !caps.ignore_illegal_bins, "ignore and illegal bins"),
            (self.code && !caps.code_coverage, "code coverage"),
            (self.toggle && !caps.toggle_coverage, "toggle coverage"),
            (self.fsm && !caps.fsm_coverage, "FSM coverage"),
            (self.assertions && !caps.assertions, "assertions"),
            (self.history && !caps.history_nodes, "test history"),
        ]
        .into_iter()
        .filter_map(|(missing, what)| missing.then_some(what))
        .collect()
    }
}

/// Warn for everything in `db` that `target` cannot hold
fn check_representable(db: &Database, target: &dyn FormatAdapter, ctx: &mut ConversionContext) -> Result<()> {
    let caps = target.capabilities();
    if !caps.can_write {
        return Err(CovError::conversion(format!("format '{}' cannot be written", target.name())));
    }
    for what in ContentSummary::of(db)?.unsupported(&caps) {
        ctx.warn(format!("{} cannot be represented in the '{}' format", what, target.name()))?;
    }
    if !caps.lossless {
        ctx.warn(format!("the '{}' format does not preserve every attribute", target.name()))?;
    }
    Ok(())
}

fn resolve_input<'r>(
    registry: &'r FormatRegistry,
    path: &Path,
    format: Option<&str>,
) -> Result<&'r dyn FormatAdapter> {
    let adapter = match format {
        Some(name) => registry.get(name)?,
        None => registry.adapter_for(path)?,
    };
    if !adapter.capabilities().can_read {
        return Err(CovError::conversion(format!("format '{}' cannot be read", adapter.name())));
    }
    Ok(adapter)
}

fn read_input(
    registry: &FormatRegistry,
    path: &Path,
    format: Option<&str>,
    ctx: &mut ConversionContext,
) -> Result<Database> {
    let adapter = resolve_input(registry, path, format)
        .map_err(|e| CovError::source_read(path.display().to_string(), e))?;
    debug!(path = %path.display(), format = adapter.name(), "Reading input");
    adapter.read(path, ctx).map_err(|e| match e {
        CovError::SourceReadError { .. } => e,
        other => CovError::source_read(path.display().to_string(), other),
    })
}

/// Convert `input` to `output` in `output_format`
///
/// The input format is detected from content unless `input_format` names it.
pub fn convert_file(
    registry: &FormatRegistry,
    input: &Path,
    input_format: Option<&str>,
    output: &Path,
    output_format: &str,
    ctx: &mut ConversionContext,
) -> Result<()> {
    let span = span!(Level::INFO, "convert", input = %input.display(), output = %output.display(), output_format);
    let _enter = span.enter();

    let target = registry.get(output_format)?;
    let db = read_input(registry, input, input_format, ctx)?;
    check_representable(&db, target, ctx)?;
    target.write(&db, output, ctx)?;
    ctx.complete();

    info!(scopes = db.scope_count(), items = db.cover_item_count(), "Conversion complete");
    Ok(())
}

/// Merge `inputs` into `output` in `output_format`
///
/// NCDB inputs merged into NCDB output go through [`NcdbMerger`], which only
/// sums count arrays when every input shares one schema. Anything else is
/// loaded in full and merged with the generic engine.
pub fn merge_files<P: AsRef<Path>>(
    registry: &FormatRegistry,
    inputs: &[P],
    output: &Path,
    output_format: &str,
    options: &MergeOptions,
    ctx: &mut ConversionContext,
) -> Result<MergeReport> {
    let span = span!(Level::INFO, "merge_files", inputs = inputs.len(), output = %output.display(), output_format);
    let _enter = span.enter();

    if inputs.is_empty() {
        return Err(CovError::invalid_argument("no merge inputs given"));
    }
    let target = registry.get(output_format)?;

    let all_ncdb = output_format == FormatKind::Ncdb.as_str()
        && inputs
            .iter()
            .all(|path| registry.detect(path.as_ref()) == FormatKind::Ncdb);
    let report = if all_ncdb {
        debug!("Every input is NCDB, using the container merger");
        NcdbMerger::new(options.clone()).merge_files(inputs, output, ctx)?
    } else {
        let names: Vec<String> = inputs
            .iter()
            .map(|path| path.as_ref().display().to_string())
            .collect();
        let mut databases = Vec::with_capacity(inputs.len());
        for path in inputs {
            databases.push(read_input(registry, path.as_ref(), None, ctx)?);
        }
        let sources: Vec<MergeSource<'_>> = names
            .iter()
            .zip(&databases)
            .map(|(name, db)| MergeSource::new(name, db))
            .collect();

        let mut merged = target.create()?;
        let report = Merger::new(options.clone()).merge(&mut merged, &sources, ctx)?;
        check_representable(&merged, target, ctx)?;
        target.write(&merged, output, ctx)?;
        report
    };
    ctx.complete();

    info!("{}", report.summary());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CoverData, ScopeFlags, SourceLanguage};

    #[test]
    fn test_content_summary() {
        let mut db = Database::new();
        let top = db
            .create_instance(None, "top", None, 1, SourceLanguage::Verilog, None, ScopeFlags::empty())
            .unwrap();
        let cg = db
            .create_covergroup(Some(top), "cg", None, 1, SourceLanguage::Verilog)
            .unwrap();
        let cp = db.create_coverpoint(cg, "cp", None, 1, SourceLanguage::Verilog).unwrap();
        db.create_next_cover(cp, "bad", CoverData::new(CoverType::IllegalBin, 0), None)
            .unwrap();

        let summary = ContentSummary::of(&db).unwrap();
        assert!(summary.functional && summary.ignore_illegal);
        assert!(!summary.code && !summary.history);
        assert!(summary.unsupported(&FormatCapabilities::full()).is_empty());

        let caps = FormatCapabilities {
            ignore_illegal_bins: false,
            ..FormatCapabilities::full()
        };
        assert_eq!(summary.unsupported(&caps), vec!["ignore and illegal bins"]);
    }
}
