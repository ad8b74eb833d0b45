//! covdb-json to database

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::{debug, span, Level};

use super::document::*;
use crate::core::{
    ConversionContext, CovError, CoverData, CoverFlags, CoverType, CvgOptions, Database,
    FileHandle, Result, ScopeFlags, ScopeId, ScopeKind, ScopeType, SourceInfo, SourceLanguage,
    ToggleDir, ToggleMetric, ToggleType,
};
use crate::plugins::records::restore_history;

/// Name used for this format in corruption errors
const DOCUMENT: &str = "covdb-json";

fn parse_code<T>(what: &str, name: &str, parse: impl Fn(&str) -> Option<T>) -> Result<T> {
    parse(name).ok_or_else(|| CovError::corrupt(DOCUMENT, format!("unknown {} '{}'", what, name)))
}

fn source_info(files: &[FileHandle], node: Option<&SourceNode>) -> Result<Option<SourceInfo>> {
    let Some(node) = node else {
        return Ok(None);
    };
    let file = match node.file {
        Some(index) => Some(*files.get(index).ok_or_else(|| {
            CovError::corrupt(DOCUMENT, format!("file index {} out of range", index))
        })?),
        None => None,
    };
    Ok(Some(SourceInfo {
        file,
        line: node.line,
        token: node.token,
    }))
}

fn scope_kind(node: &ScopeNode, scope_type: ScopeType) -> Result<ScopeKind> {
    let mut kind = ScopeKind::for_type(scope_type);
    match &mut kind {
        ScopeKind::DesignUnit { signature } => *signature = node.signature.clone(),
        ScopeKind::Instance { du_name, .. } => *du_name = node.du_name.clone(),
        ScopeKind::Covergroup(options) | ScopeKind::Cross { options, .. } => {
            if let Some(cvg) = &node.cvg {
                *options = CvgOptions {
                    at_least: cvg.at_least,
                    per_instance: cvg.per_instance,
                    comment: cvg.comment.clone(),
                };
            }
        }
        ScopeKind::Toggle {
            canonical_name,
            metric,
            toggle_type,
            dir,
        } => {
            if let Some(toggle) = &node.toggle {
                *canonical_name = toggle.canonical_name.clone();
                *metric = parse_code("toggle metric", &toggle.metric, ToggleMetric::from_name)?;
                *toggle_type = parse_code("toggle type", &toggle.toggle_type, ToggleType::from_name)?;
                *dir = parse_code("toggle direction", &toggle.dir, ToggleDir::from_name)?;
            }
        }
        ScopeKind::Fsm | ScopeKind::CodeCoverage | ScopeKind::Hdl => {}
    }
    if let ScopeKind::Cross { crossed, .. } = &mut kind {
        *crossed = node.crossed.clone();
    }
    Ok(kind)
}

fn item_data(node: &ItemNode) -> Result<CoverData> {
    let cover_type = parse_code("cover type", &node.cover_type, CoverType::from_name)?;
    let mut data = CoverData::new(cover_type, node.count);
    data.flags = CoverFlags::from_bits(node.flags);
    if let Some(goal) = node.goal {
        data.goal = goal;
    }
    if let Some(weight) = node.weight {
        data.weight = weight;
    }
    if let Some(limit) = node.limit {
        data.limit = limit;
    }
    data.bitlen = node.bitlen;
    Ok(data)
}

/// Rebuild a database from a parsed document
pub fn from_document(document: &JsonDocument) -> Result<Database> {
    if document.format != JSON_FORMAT {
        return Err(CovError::corrupt(
            DOCUMENT,
            format!("format is '{}', expected '{}'", document.format, JSON_FORMAT),
        ));
    }
    if document.version > JSON_VERSION {
        return Err(CovError::corrupt(
            DOCUMENT,
            format!("document version {} is newer than {}", document.version, JSON_VERSION),
        ));
    }

    let mut db = Database::new();
    db.set_path_separator(&document.path_separator)?;
    if !document.api_version.is_empty() {
        db.set_api_version(document.api_version.clone())?;
    }
    db.set_written_by(document.written_by.clone())?;
    db.set_written_time(document.written_time.clone())?;

    let files = document
        .files
        .iter()
        .map(|f| db.create_file_handle(&f.filename, &f.workdir))
        .collect::<Result<Vec<_>>>()?;

    // (node, destination parent), popped in pre-order
    let mut stack: Vec<(&ScopeNode, Option<ScopeId>)> =
        document.scopes.iter().rev().map(|node| (node, None)).collect();
    while let Some((node, parent)) = stack.pop() {
        let scope_type = parse_code("scope type", &node.scope_type, ScopeType::from_name)?;
        let language = parse_code("source language", &node.language, SourceLanguage::from_name)?;
        let flags = ScopeFlags::from_bits(node.flags);
        let id = db.create_scope(
            parent,
            &node.name,
            source_info(&files, node.source.as_ref())?,
            node.weight,
            language,
            scope_type,
            flags,
        )?;
        let kind = scope_kind(node, scope_type)?;
        let scope = db.scope_mut(id)?;
        scope.set_flags(flags);
        scope.set_goal(node.goal);
        *scope.kind_mut() = kind;
        for (key, value) in &node.attributes {
            scope.set_attribute(key.clone(), value.clone());
        }

        for item in &node.items {
            let cover = db.create_next_cover(
                id,
                &item.name,
                item_data(item)?,
                source_info(&files, item.source.as_ref())?,
            )?;
            let created = db.cover_item_mut(cover)?;
            for (key, value) in &item.attributes {
                created.set_attribute(key.clone(), value.clone());
            }
        }
        stack.extend(node.children.iter().rev().map(|child| (child, Some(id))));
    }
    db.resolve_du_links()?;

    restore_history(&mut db, &document.history, None, DOCUMENT)?;
    db.clear_modified();
    Ok(db)
}

/// Load a covdb-json file
pub fn read_json(path: &Path, ctx: &mut ConversionContext) -> Result<Database> {
    let span = span!(Level::INFO, "read_json", path = %path.display());
    let _enter = span.enter();

    let mut phase = ctx.phase("read json", None);
    let document: JsonDocument = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    let db = from_document(&document)?;
    phase.item(None, db.scope_count() as u64);
    debug!(scopes = db.scope_count(), items = db.cover_item_count(), "Read covdb-json document");
    Ok(db)
}
