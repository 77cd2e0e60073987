// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Plain text document store.
//!
//! Load/store layer for course pages and the navigation meta file. Writes
//! are atomic: content lands in a temporary file beside the destination and
//! is renamed over it, so a crash mid-write never leaves a half-updated
//! document behind.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::debug;

/// Read a document into memory.
pub fn read(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Replace a document atomically.
pub fn write_atomic(path: impl AsRef<Path>, contents: &str) -> Result<()> {
    let path = path.as_ref();
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let write_error = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut staged = NamedTempFile::new_in(dir).map_err(write_error)?;
    staged.write_all(contents.as_bytes()).map_err(write_error)?;
    staged.persist(path).map_err(|err| write_error(err.error))?;
    debug!("wrote {:?}", path.display());

    Ok(())
}

/// Document store error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Document cannot be read.
    #[error("cannot read {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document cannot be replaced.
    #[error("cannot write {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Friendly result alias :3
type Result<T, E = StoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn write_then_read_round_trips() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("page.mdx");

        write_atomic(&path, "# 📚 数学分析B\n")?;
        assert_eq!(read(&path)?, "# 📚 数学分析B\n");

        write_atomic(&path, "# 📚 线性代数\n")?;
        assert_eq!(read(&path)?, "# 📚 线性代数\n");

        Ok(())
    }

    #[test]
    fn reading_a_missing_document_fails() {
        let result = read("/definitely/not/here.mdx");
        assert!(matches!(result, Err(StoreError::Read { .. })));
    }
}
