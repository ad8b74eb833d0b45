//! NCDB container reader and writer
//!
//! The container is a ZIP archive. Members are written in dependency order:
//! the scope tree (string table first), its counts, the history, source and
//! attribute side tables, and finally the manifest that hashes the tree.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use tracing::{debug, info, span, trace, Level};
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::constants::*;
use super::counts::{decode_counts, encode_counts};
use super::manifest::Manifest;
use super::scope_tree::{decode_tree, encode_tree};
use crate::core::{ConversionContext, CovError, Database, FileHandle, Result, ScopeId};
use crate::plugins::records::{
    history_records, restore_history, AttributeRecord, HistoryRecord, SourceRecord,
};

/// Member compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    Deflated,
    Stored,
}

impl Compression {
    fn method(self) -> CompressionMethod {
        match self {
            Compression::Deflated => CompressionMethod::Deflated,
            Compression::Stored => CompressionMethod::Stored,
        }
    }
}

/// Options for writing a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NcdbWriteOptions {
    pub compression: Compression,
    /// Recorded as the manifest's `generator`
    pub generator: String,
}

impl Default for NcdbWriteOptions {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            generator: DEFAULT_GENERATOR.to_string(),
        }
    }
}

/// Write `db` to `path`, returning the manifest that was stored
pub fn write_container(
    db: &Database,
    path: &Path,
    options: &NcdbWriteOptions,
    ctx: &mut ConversionContext,
) -> Result<Manifest> {
    let span = span!(Level::INFO, "write_ncdb", path = %path.display());
    let _enter = span.enter();

    let tree = encode_tree(db)?;
    let counts = encode_counts(&tree.counts);
    let history = serde_json::to_vec_pretty(&history_records(db)?)?;
    let sources = tree
        .files
        .iter()
        .map(|handle| {
            let file = db.file(*handle)?;
            Ok(SourceRecord {
                filename: file.filename().to_string(),
                workdir: file.workdir().to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let sources = serde_json::to_vec_pretty(&sources)?;
    let attrs = if tree.attributes.is_empty() {
        None
    } else {
        Some(serde_json::to_vec_pretty(&tree.attributes)?)
    };
    let manifest = Manifest::for_database(db, &tree.bytes, &options.generator)?;
    let manifest_json = manifest.to_json()?;

    let mut members: Vec<(&str, &[u8])> = vec![
        (MEMBER_SCOPE_TREE, tree.bytes.as_slice()),
        (MEMBER_COUNTS, counts.as_slice()),
        (MEMBER_HISTORY, history.as_slice()),
        (MEMBER_SOURCES, sources.as_slice()),
    ];
    if let Some(attrs) = &attrs {
        members.push((MEMBER_ATTRS, attrs.as_slice()));
    }
    members.push((MEMBER_MANIFEST, manifest_json.as_bytes()));

    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let zip_options = FileOptions::<()>::default().compression_method(options.compression.method());
    {
        let mut phase = ctx.phase("write ncdb", Some(members.len() as u64));
        for (name, bytes) in members {
            zip.start_file(name, zip_options)?;
            zip.write_all(bytes)?;
            trace!(member = name, bytes = bytes.len(), "Wrote member");
            phase.item(Some(name), 1);
        }
    }
    zip.finish()?;

    info!(
        scopes = manifest.scope_count,
        items = manifest.coveritem_count,
        tree_bytes = tree.bytes.len(),
        "Wrote NCDB container"
    );
    Ok(manifest)
}

/// An open container whose members are read on demand
pub struct NcdbArchive {
    archive: ZipArchive<File>,
}

impl NcdbArchive {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(file)?;
        Ok(Self { archive })
    }

    /// Bytes of `name`, or `None` when the archive has no such member
    pub fn member(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut entry = match self.archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut bytes = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }

    /// Bytes of `name`, which must exist
    pub fn required(&mut self, name: &str) -> Result<Vec<u8>> {
        self.member(name)?
            .ok_or_else(|| CovError::corrupt(name, "member is missing"))
    }

    /// Parse and validate the manifest
    pub fn manifest(&mut self) -> Result<Manifest> {
        let bytes = self.required(MEMBER_MANIFEST)?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| CovError::corrupt(MEMBER_MANIFEST, format!("invalid utf-8: {}", e)))?;
        let manifest = Manifest::from_json(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Decoded `counts.bin`
    pub fn counts(&mut self) -> Result<Vec<u64>> {
        decode_counts(&self.required(MEMBER_COUNTS)?)
    }

    fn json_member<T: serde::de::DeserializeOwned>(&mut self, name: &str) -> Result<Option<T>> {
        match self.member(name)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| CovError::corrupt(name, format!("invalid JSON: {}", e))),
            None => Ok(None),
        }
    }

    /// History records, empty when the member is absent
    pub fn history(&mut self) -> Result<Vec<HistoryRecord>> {
        Ok(self.json_member(MEMBER_HISTORY)?.unwrap_or_default())
    }

    /// Decode everything except the history into a new database
    pub fn load_tree(&mut self, ctx: &mut ConversionContext) -> Result<Database> {
        let mut phase = ctx.phase("read ncdb", None);

        let manifest = self.manifest()?;
        let tree = self.required(MEMBER_SCOPE_TREE)?;
        manifest.verify(&tree)?;
        let counts = self.counts()?;
        phase.item(Some(MEMBER_COUNTS), 1);

        let mut db = Database::new();
        let sources: Vec<SourceRecord> = self.json_member(MEMBER_SOURCES)?.unwrap_or_default();
        let files = sources
            .iter()
            .map(|s| db.create_file_handle(&s.filename, &s.workdir))
            .collect::<Result<Vec<FileHandle>>>()?;

        let order = decode_tree(&tree, &counts, &files, &mut db)?;
        phase.item(Some(MEMBER_SCOPE_TREE), 1);

        let attrs: Vec<AttributeRecord> = self.json_member(MEMBER_ATTRS)?.unwrap_or_default();
        apply_attributes(&mut db, &order, &attrs)?;

        db.set_path_separator(&manifest.separator()?.to_string())?;
        if !manifest.ucis_version.is_empty() {
            db.set_api_version(manifest.ucis_version.clone())?;
        }
        db.set_written_by(manifest.generator.clone())?;
        db.set_written_time(manifest.created.clone())?;
        Ok(db)
    }
}

/// Read the manifest of the container at `path`
pub fn read_manifest(path: &Path) -> Result<Manifest> {
    NcdbArchive::open(path)?.manifest()
}

/// Load the container at `path` into a new database
pub fn read_container(path: &Path, ctx: &mut ConversionContext) -> Result<Database> {
    let span = span!(Level::INFO, "read_ncdb", path = %path.display());
    let _enter = span.enter();

    let mut archive = NcdbArchive::open(path)?;
    let mut db = archive.load_tree(ctx)?;
    let history = archive.history()?;
    restore_history(&mut db, &history, None, MEMBER_HISTORY)?;
    db.clear_modified();

    debug!(
        scopes = db.scope_count(),
        items = db.cover_item_count(),
        tests = db.test_count(),
        "Read NCDB container"
    );
    Ok(db)
}

fn apply_attributes(db: &mut Database, order: &[ScopeId], attrs: &[AttributeRecord]) -> Result<()> {
    for record in attrs {
        let scope_id = *order.get(record.scope).ok_or_else(|| {
            CovError::corrupt(MEMBER_ATTRS, format!("scope index {} out of range", record.scope))
        })?;
        let scope = db.scope_mut(scope_id)?;
        match record.item {
            None => {
                for (key, value) in &record.attributes {
                    scope.set_attribute(key.clone(), value.clone());
                }
            }
            Some(index) => {
                let item = scope.item_mut(index).ok_or_else(|| {
                    CovError::corrupt(
                        MEMBER_ATTRS,
                        format!("cover item {} of scope {} out of range", index, record.scope),
                    )
                })?;
                for (key, value) in &record.attributes {
                    item.set_attribute(key.clone(), value.clone());
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        CoverData, CoverId, CoverType, HistoryKind, ScopeFlags, ScopeType, SourceInfo,
        SourceLanguage,
    };
    use tempfile::TempDir;

    fn sample() -> Database {
        let mut db = Database::new();
        let file = db.create_file_handle("rtl/alu.sv", "/proj").unwrap();
        let top = db
            .create_instance(None, "top", Some(SourceInfo::new(file, 1, 0)), 1, SourceLanguage::SystemVerilog, None, ScopeFlags::empty())
            .unwrap();
        let blk = db
            .create_scope(Some(top), "always_1", None, 1, SourceLanguage::SystemVerilog, ScopeType::Block, ScopeFlags::empty())
            .unwrap();
        db.create_next_cover(blk, "stmt_3", CoverData::new(CoverType::StmtBin, 17), Some(SourceInfo::new(file, 3, 2)))
            .unwrap();
        db.scope_mut(blk).unwrap().set_attribute("reviewed", "yes");
        db.cover_item_mut(CoverId { scope: blk, index: 0 })
            .unwrap()
            .set_attribute("waiver", "none");
        let test = db
            .create_history_node(None, "regress_1", "regress_1.ucis", HistoryKind::Test)
            .unwrap();
        db.history_node_mut(test).unwrap().test.seed = "7".to_string();
        db.set_path_separator(".").unwrap();
        db
    }

    #[test]
    fn test_container_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cov.ncdb");
        let db = sample();
        let mut ctx = ConversionContext::lenient();
        let manifest = write_container(&db, &path, &NcdbWriteOptions::default(), &mut ctx).unwrap();
        assert_eq!(manifest.total_hits, 17);
        assert_eq!(manifest.test_count, 1);
        assert_eq!(manifest.covered_bins, 1);

        let restored = read_container(&path, &mut ctx).unwrap();
        assert_eq!(restored.path_separator(), '.');
        let blk = restored.find_scope("top.always_1").unwrap().unwrap();
        let scope = restored.scope(blk).unwrap();
        assert_eq!(scope.attribute("reviewed"), Some("yes"));
        assert_eq!(scope.items()[0].attribute("waiver"), Some("none"));
        assert_eq!(scope.items()[0].count(), 17);
        let source = scope.items()[0].source().copied().unwrap();
        assert_eq!(restored.file(source.file.unwrap()).unwrap().filename(), "rtl/alu.sv");
        assert_eq!(restored.test_count(), 1);
        assert!(!restored.is_modified());
        assert_eq!(restored.written_by(), DEFAULT_GENERATOR);
    }

    #[test]
    fn test_stored_compression() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stored.ncdb");
        let options = NcdbWriteOptions {
            compression: Compression::Stored,
            generator: "stored-test".to_string(),
        };
        write_container(&sample(), &path, &options, &mut ConversionContext::lenient()).unwrap();
        let manifest = read_manifest(&path).unwrap();
        assert_eq!(manifest.generator, "stored-test");
    }

    #[test]
    fn test_attrs_member_omitted_when_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.ncdb");
        let mut db = Database::new();
        db.create_scope(None, "top", None, 1, SourceLanguage::Verilog, ScopeType::Block, ScopeFlags::empty())
            .unwrap();
        write_container(&db, &path, &NcdbWriteOptions::default(), &mut ConversionContext::lenient()).unwrap();
        let mut archive = NcdbArchive::open(&path).unwrap();
        assert!(archive.member(MEMBER_ATTRS).unwrap().is_none());
        assert!(archive.member(MEMBER_SCOPE_TREE).unwrap().is_some());
    }

    #[test]
    fn test_missing_member_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.ncdb");
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        let options = FileOptions::<()>::default();
        zip.start_file(MEMBER_MANIFEST, options).unwrap();
        zip.write_all(Manifest::default().to_json().unwrap().as_bytes()).unwrap();
        zip.finish().unwrap();

        let err = read_container(&path, &mut ConversionContext::lenient()).unwrap_err();
        assert!(matches!(err, CovError::CorruptContainer { ref member, .. } if member == MEMBER_SCOPE_TREE));
    }

    #[test]
    fn test_tampered_tree_rejected() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.ncdb");
        write_container(&sample(), &good, &NcdbWriteOptions::default(), &mut ConversionContext::lenient()).unwrap();

        let mut archive = NcdbArchive::open(&good).unwrap();
        let manifest = archive.required(MEMBER_MANIFEST).unwrap();
        let mut tree = archive.required(MEMBER_SCOPE_TREE).unwrap();
        let counts = archive.required(MEMBER_COUNTS).unwrap();
        let last = tree.len() - 1;
        tree[last] ^= 0x01;

        let bad = dir.path().join("bad.ncdb");
        let mut zip = ZipWriter::new(File::create(&bad).unwrap());
        let options = FileOptions::<()>::default();
        for (name, bytes) in [
            (MEMBER_SCOPE_TREE, &tree),
            (MEMBER_COUNTS, &counts),
            (MEMBER_MANIFEST, &manifest),
        ] {
            zip.start_file(name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();

        let err = read_container(&bad, &mut ConversionContext::lenient()).unwrap_err();
        assert!(format!("{}", err).contains("schema hash mismatch"));
    }

    #[test]
    fn test_not_a_zip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk.ncdb");
        std::fs::write(&path, b"definitely not a zip archive").unwrap();
        let err = read_container(&path, &mut ConversionContext::lenient()).unwrap_err();
        assert!(matches!(err, CovError::ZipError { .. }));
    }
}
