// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Staging directory handling.
//!
//! Users drop raw material files into the staging directory (optionally
//! grouped into per-course sub-directories). This module scans that
//! directory into [`Candidate`]s, places accepted files into the content
//! tree under their normalized names, and cleans processed files back out
//! of staging.

use crate::{config::SiteLayout, material::Candidate};

use ignore::WalkBuilder;
use std::{
    fs,
    path::{Path, PathBuf},
};
use time::OffsetDateTime;
use tracing::{debug, instrument};

/// Files never offered for submission.
const SKIPPED_FILES: [&str; 2] = ["README.md", ".gitkeep"];

/// A material file placed into the content tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedMaterial {
    /// Final filename inside the course's material directory.
    pub file_name: String,

    /// Site-absolute path for page references.
    pub site_path: String,
}

/// Scan the staging directory for candidate files.
///
/// Hidden files, `README.md`, and `.gitkeep` are skipped. Results come back
/// in stable filename order.
///
/// # Errors
///
/// - Return [`StagingError::MissingStagingDir`] if the directory is absent.
/// - Return [`StagingError::Walk`] if the directory walk fails.
pub fn scan(staging_root: &Path) -> Result<Vec<Candidate>> {
    if !staging_root.is_dir() {
        return Err(StagingError::MissingStagingDir {
            path: staging_root.to_path_buf(),
        });
    }

    let mut candidates = Vec::new();
    let walker = WalkBuilder::new(staging_root)
        .standard_filters(false)
        .hidden(true)
        .sort_by_file_name(|left, right| left.cmp(right))
        .build();

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_some_and(|kind| kind.is_file()) {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if SKIPPED_FILES.contains(&name.as_ref()) {
            continue;
        }

        let metadata = entry.metadata()?;
        let relative = entry
            .path()
            .strip_prefix(staging_root)
            .unwrap_or(entry.path())
            .to_path_buf();
        candidates.push(Candidate::new(entry.path(), relative, metadata.len()));
    }

    debug!("found {} staged files", candidates.len());

    Ok(candidates)
}

/// Copy a candidate into the course's material directory.
///
/// Creates the directory when needed. A name collision is disambiguated
/// with a time stamp instead of overwriting the existing material.
///
/// # Errors
///
/// - Return [`StagingError::CreateDir`] if the target directory cannot be
///   created.
/// - Return [`StagingError::Copy`] if the copy itself fails.
#[instrument(skip(candidate, layout, root), level = "debug")]
pub fn place(
    candidate: &Candidate,
    layout: &SiteLayout,
    root: &Path,
    course_name: &str,
    final_name: &str,
) -> Result<PlacedMaterial> {
    let target_dir = layout.course_resources(root, course_name);
    mkdirp::mkdirp(&target_dir).map_err(|source| StagingError::CreateDir {
        path: target_dir.clone(),
        source,
    })?;

    let mut file_name = final_name.to_string();
    let mut target = target_dir.join(&file_name);
    if target.exists() {
        file_name = stamped_name(final_name);
        target = target_dir.join(&file_name);
    }

    fs::copy(&candidate.path, &target).map_err(|source| StagingError::Copy {
        from: candidate.path.clone(),
        to: target.clone(),
        source,
    })?;
    debug!("placed {:?} at {:?}", candidate.path.display(), target.display());

    let site_path = layout.site_path(course_name, &file_name);
    Ok(PlacedMaterial {
        file_name,
        site_path,
    })
}

/// Delete a processed file from staging, pruning an emptied sub-directory.
///
/// # Errors
///
/// - Return [`StagingError::Remove`] if the file cannot be deleted.
pub fn remove(candidate: &Candidate, staging_root: &Path) -> Result<()> {
    fs::remove_file(&candidate.path).map_err(|source| StagingError::Remove {
        path: candidate.path.clone(),
        source,
    })?;

    if let Some(parent) = candidate.path.parent() {
        if parent != staging_root && is_empty_dir(parent) {
            let _ = fs::remove_dir(parent);
        }
    }

    Ok(())
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

fn stamped_name(final_name: &str) -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let stamp = format!("{:02}{:02}{:02}", now.hour(), now.minute(), now.second());

    match final_name.rsplit_once('.') {
        Some((stem, extension)) => format!("{stem}_{stamp}.{extension}"),
        None => format!("{final_name}_{stamp}"),
    }
}

/// Staging error types.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// Staging directory is absent.
    #[error("staging directory {path:?} does not exist")]
    MissingStagingDir { path: PathBuf },

    /// Directory walk failed.
    #[error(transparent)]
    Walk(#[from] ignore::Error),

    /// Target directory cannot be created.
    #[error("cannot create {path:?}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copy into the content tree failed.
    #[error("cannot copy {from:?} to {to:?}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Staged file cannot be deleted.
    #[error("cannot remove {path:?}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Friendly result alias :3
type Result<T, E = StagingError> = std::result::Result<T, E>;
