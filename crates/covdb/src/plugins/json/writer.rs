//! Database to covdb-json

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, span, Level};

use super::document::*;
use crate::core::{
    ConversionContext, CoverData, CoverItem, Database, FileHandle, Result, Scope, ScopeId,
    ScopeKind, ScopeMask, SourceInfo,
};
use crate::plugins::records::{history_records, SourceRecord};

struct DocumentBuilder<'a> {
    db: &'a Database,
    file_index: HashMap<FileHandle, usize>,
}

impl DocumentBuilder<'_> {
    fn source(&self, info: Option<&SourceInfo>) -> Option<SourceNode> {
        info.map(|info| SourceNode {
            file: info.file.and_then(|h| self.file_index.get(&h).copied()),
            line: info.line,
            token: info.token,
        })
    }

    fn item(&self, item: &CoverItem) -> ItemNode {
        let data = item.data();
        let base = CoverData::new(data.cover_type, data.count);
        ItemNode {
            name: item.name().to_string(),
            cover_type: data.cover_type.name().to_string(),
            count: data.count,
            flags: data.flags.bits(),
            goal: (data.goal != base.goal).then_some(data.goal),
            weight: (data.weight != base.weight).then_some(data.weight),
            limit: (data.limit != base.limit).then_some(data.limit),
            bitlen: data.bitlen,
            source: self.source(item.source()),
            attributes: item.attributes().clone(),
        }
    }

    fn scope(&self, id: ScopeId) -> Result<ScopeNode> {
        let scope: &Scope = self.db.scope(id)?;
        let mut node = ScopeNode {
            name: scope.name().to_string(),
            scope_type: scope.scope_type().name().to_string(),
            weight: scope.weight(),
            goal: scope.goal(),
            language: scope.source_language().name().to_string(),
            flags: scope.flags().bits(),
            source: self.source(scope.source()),
            signature: None,
            du_name: None,
            cvg: None,
            crossed: Vec::new(),
            toggle: None,
            attributes: scope.attributes().clone(),
            items: scope.items().iter().map(|item| self.item(item)).collect(),
            children: Vec::with_capacity(scope.children().len()),
        };
        match scope.kind() {
            ScopeKind::DesignUnit { signature } => node.signature = signature.clone(),
            ScopeKind::Instance { du_name, .. } => node.du_name = du_name.clone(),
            ScopeKind::Covergroup(options) | ScopeKind::Cross { options, .. } => {
                if !options.is_default() {
                    node.cvg = Some(CvgNode {
                        at_least: options.at_least,
                        per_instance: options.per_instance,
                        comment: options.comment.clone(),
                    });
                }
                if let ScopeKind::Cross { crossed, .. } = scope.kind() {
                    node.crossed = crossed.clone();
                }
            }
            ScopeKind::Toggle {
                canonical_name,
                metric,
                toggle_type,
                dir,
            } => {
                node.toggle = Some(ToggleNode {
                    canonical_name: canonical_name.clone(),
                    metric: metric.name().to_string(),
                    toggle_type: toggle_type.name().to_string(),
                    dir: dir.name().to_string(),
                });
            }
            ScopeKind::Fsm | ScopeKind::CodeCoverage | ScopeKind::Hdl => {}
        }
        for child in scope.children() {
            node.children.push(self.scope(*child)?);
        }
        Ok(node)
    }
}

/// Build the document for `db`
pub fn to_document(db: &Database) -> Result<JsonDocument> {
    let mut files = Vec::new();
    let mut file_index = HashMap::new();
    for (handle, file) in db.files()? {
        file_index.insert(handle, files.len());
        files.push(SourceRecord {
            filename: file.filename().to_string(),
            workdir: file.workdir().to_string(),
        });
    }

    let builder = DocumentBuilder { db, file_index };
    let scopes = db
        .root_scopes(ScopeMask::ALL)?
        .map(|id| builder.scope(id))
        .collect::<Result<Vec<_>>>()?;

    Ok(JsonDocument {
        format: JSON_FORMAT.to_string(),
        version: JSON_VERSION,
        api_version: db.api_version().to_string(),
        written_by: db.written_by().to_string(),
        written_time: db.written_time().to_string(),
        path_separator: db.path_separator().to_string(),
        files,
        history: history_records(db)?,
        scopes,
    })
}

/// Write `db` to `path` as pretty-printed covdb-json
pub fn write_json(db: &Database, path: &Path, ctx: &mut ConversionContext) -> Result<()> {
    let span = span!(Level::INFO, "write_json", path = %path.display());
    let _enter = span.enter();

    let document = {
        let mut phase = ctx.phase("write json", Some(db.scope_count() as u64));
        let document = to_document(db)?;
        phase.item(None, db.scope_count() as u64);
        document
    };
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, &document)?;
    out.write_all(b"\n")?;
    out.flush()?;
    debug!(scopes = db.scope_count(), "Wrote covdb-json document");
    Ok(())
}
