//! Container manifest (`manifest.json`)

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::constants::{DEFAULT_GENERATOR, MEMBER_MANIFEST, NCDB_FORMAT, NCDB_VERSION};
use crate::core::{CovError, Database, Result, DEFAULT_PATH_SEPARATOR};

/// Prefix of every schema hash
pub const SCHEMA_HASH_PREFIX: &str = "sha256:";

/// `"sha256:" + hex(sha256(bytes))`
pub fn compute_schema_hash(tree_bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tree_bytes);
    format!("{}{}", SCHEMA_HASH_PREFIX, hex::encode(hasher.finalize()))
}

/// UTC timestamp in the manifest's `created` format
pub fn timestamp_now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[derive(Deserialize)]
struct FormatTag {
    format: String,
}

/// The `format` key of raw manifest bytes, ignoring every other field
pub fn manifest_format(bytes: &[u8]) -> Option<String> {
    serde_json::from_slice::<FormatTag>(bytes)
        .ok()
        .map(|tag| tag.format)
}

/// Container metadata, written last and read first
///
/// Missing keys take their defaults and unknown keys are ignored, so older
/// and newer writers stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub format: String,
    pub version: String,
    pub ucis_version: String,
    pub created: String,
    pub path_separator: String,
    pub scope_count: u64,
    pub coveritem_count: u64,
    pub test_count: u64,
    pub total_hits: u64,
    pub covered_bins: u64,
    pub schema_hash: String,
    pub generator: String,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            format: NCDB_FORMAT.to_string(),
            version: NCDB_VERSION.to_string(),
            ucis_version: String::new(),
            created: String::new(),
            path_separator: DEFAULT_PATH_SEPARATOR.to_string(),
            scope_count: 0,
            coveritem_count: 0,
            test_count: 0,
            total_hits: 0,
            covered_bins: 0,
            schema_hash: String::new(),
            generator: DEFAULT_GENERATOR.to_string(),
        }
    }
}

impl Manifest {
    /// Describe `db`, whose scope tree serialized to `tree_bytes`
    pub fn for_database(db: &Database, tree_bytes: &[u8], generator: &str) -> Result<Self> {
        let coverage = db.coverage(None)?;
        Ok(Self {
            ucis_version: db.api_version().to_string(),
            created: timestamp_now(),
            path_separator: db.path_separator().to_string(),
            scope_count: db.scope_count() as u64,
            coveritem_count: db.cover_item_count() as u64,
            test_count: db.test_count() as u64,
            total_hits: db.total_hits(),
            covered_bins: coverage.covered,
            schema_hash: compute_schema_hash(tree_bytes),
            generator: generator.to_string(),
            ..Self::default()
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| CovError::corrupt(MEMBER_MANIFEST, format!("invalid JSON: {}", e)))
    }

    pub fn is_ncdb(&self) -> bool {
        self.format == NCDB_FORMAT
    }

    /// Reject manifests of other formats or unsupported major versions
    pub fn validate(&self) -> Result<()> {
        if !self.is_ncdb() {
            return Err(CovError::corrupt(
                MEMBER_MANIFEST,
                format!("format is '{}', expected '{}'", self.format, NCDB_FORMAT),
            ));
        }
        let major = |v: &str| v.split('.').next().map(str::to_string);
        if major(&self.version) != major(NCDB_VERSION) {
            return Err(CovError::corrupt(
                MEMBER_MANIFEST,
                format!("unsupported version '{}'", self.version),
            ));
        }
        Ok(())
    }

    /// Check `tree_bytes` against the recorded schema hash
    pub fn verify(&self, tree_bytes: &[u8]) -> Result<()> {
        let actual = compute_schema_hash(tree_bytes);
        if actual != self.schema_hash {
            return Err(CovError::corrupt(
                MEMBER_MANIFEST,
                format!("schema hash mismatch: manifest has '{}', tree hashes to '{}'", self.schema_hash, actual),
            ));
        }
        Ok(())
    }

    /// The path separator as a single character
    pub fn separator(&self) -> Result<char> {
        let mut chars = self.path_separator.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(CovError::corrupt(
                MEMBER_MANIFEST,
                format!("invalid path separator {:?}", self.path_separator),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ScopeFlags, ScopeType, SourceLanguage};
    use crate::plugins::ncdb::scope_tree::encode_tree;

    fn single_block(names: &[&str]) -> Database {
        let mut db = Database::new();
        for name in names {
            db.create_scope(None, name, None, 1, SourceLanguage::Verilog, ScopeType::Block, ScopeFlags::empty())
                .unwrap();
        }
        db
    }

    fn hash_of(db: &Database) -> String {
        compute_schema_hash(&encode_tree(db).unwrap().bytes)
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_schema_hash(b"");
        assert_eq!(
            hash,
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash_determinism() {
        assert_eq!(hash_of(&single_block(&["top"])), hash_of(&single_block(&["top"])));
        assert_ne!(hash_of(&single_block(&["top"])), hash_of(&single_block(&["top", "other"])));
        assert_ne!(hash_of(&single_block(&["top"])), hash_of(&single_block(&["tap"])));
    }

    #[test]
    fn test_json_roundtrip_keeps_every_field() {
        let db = single_block(&["top"]);
        let tree = encode_tree(&db).unwrap();
        let manifest = Manifest::for_database(&db, &tree.bytes, "unit-test").unwrap();
        assert_eq!(manifest.scope_count, 1);
        assert_eq!(manifest.generator, "unit-test");

        let parsed = Manifest::from_json(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(parsed, manifest);

        let empty = Manifest {
            created: String::new(),
            schema_hash: String::new(),
            ..Manifest::default()
        };
        assert_eq!(Manifest::from_json(&empty.to_json().unwrap()).unwrap(), empty);
    }

    #[test]
    fn test_unknown_keys_and_defaults() {
        let parsed = Manifest::from_json(r#"{"format":"NCDB","schema_hash":"sha256:00","extra":1}"#).unwrap();
        assert_eq!(parsed.version, NCDB_VERSION);
        assert_eq!(parsed.path_separator, "/");
        parsed.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_other_formats() {
        let other = Manifest {
            format: "XML".to_string(),
            ..Manifest::default()
        };
        assert!(matches!(other.validate(), Err(CovError::CorruptContainer { .. })));
        let future = Manifest {
            version: "2.0".to_string(),
            ..Manifest::default()
        };
        assert!(future.validate().is_err());
        assert!(Manifest::from_json("not json").is_err());
    }

    #[test]
    fn test_verify_and_separator() {
        let bytes = b"tree";
        let manifest = Manifest {
            schema_hash: compute_schema_hash(bytes),
            path_separator: ".".to_string(),
            ..Manifest::default()
        };
        manifest.verify(bytes).unwrap();
        assert!(manifest.verify(b"tref").is_err());
        assert_eq!(manifest.separator().unwrap(), '.');
    }
}
