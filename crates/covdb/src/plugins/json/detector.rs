//! covdb-json detection
//!
//! Writers emit `format` as the first key, so a short prefix is enough.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::trace;

use super::document::JSON_FORMAT;
use crate::core::{FormatDetector, FormatKind};

const PREFIX_LEN: u64 = 256;

/// Recognises covdb-json documents by their leading `format` key
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDetector;

impl JsonDetector {
    pub fn new() -> Self {
        Self
    }

    fn matches(prefix: &str) -> bool {
        let Some(body) = prefix.trim_start().strip_prefix('{') else {
            return false;
        };
        let Some(rest) = body.trim_start().strip_prefix("\"format\"") else {
            return false;
        };
        let Some(value) = rest.trim_start().strip_prefix(':') else {
            return false;
        };
        value
            .trim_start()
            .strip_prefix('"')
            .and_then(|v| v.strip_prefix(JSON_FORMAT))
            .is_some_and(|v| v.starts_with('"'))
    }
}

impl FormatDetector for JsonDetector {
    fn detect(&self, path: &Path) -> bool {
        let Ok(file) = File::open(path) else {
            return false;
        };
        let mut prefix = Vec::new();
        if file.take(PREFIX_LEN).read_to_end(&mut prefix).is_err() {
            return false;
        }
        let text = String::from_utf8_lossy(&prefix);
        let found = Self::matches(&text);
        trace!(path = %path.display(), found, "Checked for covdb-json");
        found
    }

    fn kind(&self) -> FormatKind {
        FormatKind::Json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_matching() {
        assert!(JsonDetector::matches("{\n  \"format\": \"covdb-json\",\n  \"version\": 1"));
        assert!(JsonDetector::matches("{\"format\":\"covdb-json\"}"));
        assert!(!JsonDetector::matches("{\"format\":\"covdb-json-v2\"}"));
        assert!(!JsonDetector::matches("{\"name\":\"covdb-json\"}"));
        assert!(!JsonDetector::matches("[1, 2, 3]"));
        assert!(!JsonDetector::matches(""));
    }

    #[test]
    fn test_missing_file() {
        assert!(!JsonDetector::new().detect(Path::new("/nonexistent/cov.json")));
    }
}
