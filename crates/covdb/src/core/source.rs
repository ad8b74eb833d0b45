//! Source locations
//!
//! File names are interned once per database; every [`SourceInfo`] refers to
//! its file through a copyable [`FileHandle`].

use std::path::PathBuf;

/// Reference to an interned `(filename, workdir)` pair within one database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileHandle(pub(crate) u32);

impl FileHandle {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// An interned source file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    filename: String,
    workdir: String,
}

impl SourceFile {
    pub(crate) fn new(filename: impl Into<String>, workdir: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            workdir: workdir.into(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn workdir(&self) -> &str {
        &self.workdir
    }

    /// Filename resolved against the working directory when relative
    pub fn path(&self) -> PathBuf {
        let file = PathBuf::from(&self.filename);
        if file.is_absolute() || self.workdir.is_empty() {
            file
        } else {
            PathBuf::from(&self.workdir).join(file)
        }
    }
}

/// Location of a scope or cover item in HDL source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceInfo {
    pub file: Option<FileHandle>,
    pub line: u32,
    pub token: u32,
}

impl SourceInfo {
    pub fn new(file: FileHandle, line: u32, token: u32) -> Self {
        Self {
            file: Some(file),
            line,
            token,
        }
    }

    /// True when no location information is present
    pub fn is_empty(&self) -> bool {
        self.file.is_none() && self.line == 0 && self.token == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path_joins_workdir() {
        let file = SourceFile::new("rtl/top.sv", "/work");
        assert_eq!(file.path(), PathBuf::from("/work/rtl/top.sv"));
    }

    #[test]
    fn test_absolute_path_ignores_workdir() {
        let file = SourceFile::new("/src/top.sv", "/work");
        assert_eq!(file.path(), PathBuf::from("/src/top.sv"));
    }

    #[test]
    fn test_empty_source_info() {
        assert!(SourceInfo::default().is_empty());
        assert!(!SourceInfo::new(FileHandle(0), 12, 0).is_empty());
    }
}
