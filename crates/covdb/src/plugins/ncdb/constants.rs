//! NCDB container constants

/// `format` field of every NCDB manifest
pub const NCDB_FORMAT: &str = "NCDB";

/// Container layout version written by this crate
pub const NCDB_VERSION: &str = "1.0";

/// Generator recorded in manifests by default
pub const DEFAULT_GENERATOR: &str = concat!("covdb-", env!("CARGO_PKG_VERSION"));

/// First 16 bytes of an SQLite database file
pub const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\x00";

/// ZIP local-file-header signature
pub const ZIP_LOCAL_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// ZIP end-of-central-directory signature (empty archive)
pub const ZIP_EMPTY_MAGIC: &[u8; 4] = b"PK\x05\x06";

// Container members
pub const MEMBER_MANIFEST: &str = "manifest.json";
pub const MEMBER_SCOPE_TREE: &str = "scope_tree.bin";
pub const MEMBER_COUNTS: &str = "counts.bin";
pub const MEMBER_HISTORY: &str = "history.json";
pub const MEMBER_SOURCES: &str = "sources.json";
pub const MEMBER_ATTRS: &str = "attrs.json";

// Scope record markers
pub const SCOPE_MARKER_REGULAR: u8 = 0x00;
pub const SCOPE_MARKER_TOGGLE_PAIR: u8 = 0x01;

// Scope presence bits
pub const PRESENCE_FLAGS: u64 = 0x01;
pub const PRESENCE_SOURCE: u64 = 0x02;
pub const PRESENCE_WEIGHT: u64 = 0x04;
pub const PRESENCE_GOAL: u64 = 0x08;
pub const PRESENCE_SOURCE_TYPE: u64 = 0x10;
pub const PRESENCE_CVG_OPTS: u64 = 0x20;
pub const PRESENCE_KIND_EXTRA: u64 = 0x40;

// Cover item presence bits
pub const ITEM_TYPE: u64 = 0x01;
pub const ITEM_FLAGS: u64 = 0x02;
pub const ITEM_GOAL: u64 = 0x04;
pub const ITEM_WEIGHT: u64 = 0x08;
pub const ITEM_LIMIT: u64 = 0x10;
pub const ITEM_BITLEN: u64 = 0x20;
pub const ITEM_SOURCE: u64 = 0x40;

/// Toggle bin names
pub const TOGGLE_BIN_0_TO_1: &str = "0 -> 1";
pub const TOGGLE_BIN_1_TO_0: &str = "1 -> 0";

/// Deepest scope nesting the tree writer and reader accept
pub const MAX_SCOPE_DEPTH: usize = 1024;
