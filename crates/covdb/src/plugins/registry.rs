//! Format registry
//!
//! Maps format names to adapters and file content to format kinds. A registry
//! is an ordinary value: build one with [`FormatRegistry::with_default_formats`]
//! and pass it down, or borrow the shared [`default_registry`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use tracing::{debug, info, span, trace, warn, Level};

use crate::core::{CovError, FormatAdapter, FormatDetector, FormatKind, Result};
use crate::plugins::json::JsonFormat;
use crate::plugins::ncdb::{NcdbFormat, SqliteDetector};

/// Registered adapters and content detectors
pub struct FormatRegistry {
    formats: BTreeMap<&'static str, Box<dyn FormatAdapter>>,
    detectors: Vec<Box<dyn FormatDetector>>,
}

impl FormatRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            formats: BTreeMap::new(),
            detectors: Vec::new(),
        }
    }

    /// Registry with the NCDB and covdb-json adapters and the SQLite detector
    pub fn with_default_formats() -> Self {
        let mut registry = Self::new();
        registry.register_detector(Box::new(SqliteDetector::new()));
        registry.register(NcdbFormat::new());
        registry.register(JsonFormat::new());
        registry
    }

    /// Register an adapter under its name, along with its detector
    ///
    /// A later adapter with the same name replaces the earlier one.
    pub fn register(&mut self, adapter: impl FormatAdapter + 'static) {
        let name = adapter.name();
        if let Some(detector) = adapter.detector() {
            self.register_detector(detector);
        }
        if self.formats.insert(name, Box::new(adapter)).is_some() {
            warn!(format = name, "Replaced registered format adapter");
        } else {
            debug!(format = name, "Registered format adapter");
        }
    }

    /// Register a detector for a format that may have no adapter
    ///
    /// A detector for an already covered kind takes the earlier one's place
    /// in the detection order.
    pub fn register_detector(&mut self, detector: Box<dyn FormatDetector>) {
        let kind = detector.kind();
        match self.detectors.iter_mut().find(|existing| existing.kind() == kind) {
            Some(slot) => {
                trace!(kind = %kind, "Replaced detector");
                *slot = detector;
            }
            None => {
                trace!(kind = %kind, "Registered detector");
                self.detectors.push(detector);
            }
        }
    }

    /// Kinds tried by [`detect`](Self::detect), in order
    pub fn detector_kinds(&self) -> Vec<FormatKind> {
        self.detectors.iter().map(|detector| detector.kind()).collect()
    }

    pub fn has_format(&self, name: &str) -> bool {
        self.formats.contains_key(name)
    }

    /// Registered format names in sorted order
    pub fn formats(&self) -> Vec<&'static str> {
        self.formats.keys().copied().collect()
    }

    /// Adapter registered as `name`
    pub fn get(&self, name: &str) -> Result<&dyn FormatAdapter> {
        self.formats
            .get(name)
            .map(|adapter| adapter.as_ref())
            .ok_or_else(|| CovError::unknown_format(name))
    }

    pub fn description(&self, name: &str) -> Option<&'static str> {
        self.formats.get(name).map(|adapter| adapter.description())
    }

    /// Classify `path` by content; the first matching detector wins
    pub fn detect(&self, path: &Path) -> FormatKind {
        let span = span!(Level::DEBUG, "detect_format", path = %path.display());
        let _enter = span.enter();

        for detector in &self.detectors {
            if detector.detect(path) {
                info!(kind = %detector.kind(), "Detected format");
                return detector.kind();
            }
        }
        debug!("No detector matched");
        FormatKind::Unknown
    }

    /// Adapter for the detected format of `path`
    ///
    /// Fails with [`CovError::UnknownFormat`] when nothing matches or when the
    /// detected kind has no adapter (SQLite stores, for instance).
    pub fn adapter_for(&self, path: &Path) -> Result<&dyn FormatAdapter> {
        match self.detect(path) {
            FormatKind::Unknown => Err(CovError::unknown_format(format!(
                "unrecognised content in {}",
                path.display()
            ))),
            kind => self.get(kind.as_str()),
        }
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.formats())
            .field("detectors", &self.detectors.len())
            .finish()
    }
}

/// Process-wide registry with the default formats, built on first use
pub fn default_registry() -> &'static FormatRegistry {
    static REGISTRY: OnceLock<FormatRegistry> = OnceLock::new();
    REGISTRY.get_or_init(FormatRegistry::with_default_formats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConversionContext, Database};
    use crate::plugins::ncdb::{write_container, NcdbWriteOptions, SQLITE_MAGIC};
    use tempfile::TempDir;

    #[test]
    fn test_registry_creation() {
        let registry = FormatRegistry::new();
        assert!(registry.formats().is_empty());
        assert!(!registry.has_format("ncdb"));
    }

    #[test]
    fn test_default_formats() {
        let registry = FormatRegistry::with_default_formats();
        assert_eq!(registry.formats(), vec!["json", "ncdb"]);
        assert!(registry.description("ncdb").is_some());
        assert!(registry.get("ncdb").unwrap().capabilities().lossless);
    }

    #[test]
    fn test_unknown_format() {
        let err = FormatRegistry::with_default_formats().get("yaml").err().unwrap();
        assert!(matches!(err, CovError::UnknownFormat { ref format } if format == "yaml"));
    }

    #[test]
    fn test_detect_and_resolve() {
        let dir = TempDir::new().unwrap();
        let registry = default_registry();

        let ncdb = dir.path().join("a.cov");
        write_container(&Database::new(), &ncdb, &NcdbWriteOptions::default(), &mut ConversionContext::lenient())
            .unwrap();
        assert_eq!(registry.detect(&ncdb), FormatKind::Ncdb);
        assert_eq!(registry.adapter_for(&ncdb).unwrap().name(), "ncdb");

        let sqlite = dir.path().join("b.cov");
        std::fs::write(&sqlite, SQLITE_MAGIC).unwrap();
        assert_eq!(registry.detect(&sqlite), FormatKind::Sqlite);
        let err = registry.adapter_for(&sqlite).err().unwrap();
        assert!(matches!(err, CovError::UnknownFormat { ref format } if format == "sqlite"));

        assert_eq!(registry.detect(&dir.path().join("none")), FormatKind::Unknown);
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = FormatRegistry::new();
        registry.register(JsonFormat::new());
        registry.register(JsonFormat::new());
        assert_eq!(registry.formats(), vec!["json"]);
        assert_eq!(registry.detector_kinds(), vec![FormatKind::Json]);
    }

    #[test]
    fn test_reregistering_keeps_detection_order() {
        let mut registry = FormatRegistry::with_default_formats();
        let before = registry.detector_kinds();
        assert_eq!(before, vec![FormatKind::Sqlite, FormatKind::Ncdb, FormatKind::Json]);

        registry.register(NcdbFormat::new());
        registry.register_detector(Box::new(SqliteDetector::new()));
        assert_eq!(registry.detector_kinds(), before);
    }
}
