// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the content repository that Shareup contributes to:
//! where staged files wait, where materials and course pages live, and which
//! remote/branch pair pull requests target. Serialization and
//! deserialization are handled here; file I/O is left to the caller to
//! figure out.
//!
//! Every field has a default matching the standard content repository
//! layout, so a missing or partial `shareup.toml` still yields a usable
//! configuration.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Content repository layout and submission settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteLayout {
    /// Directory users drop files into, relative to the repository root.
    pub staging_dir: PathBuf,

    /// Static asset root of the site.
    pub public_dir: PathBuf,

    /// Material tree under the public dir.
    pub resources_dir: PathBuf,

    /// Course page directory.
    pub pages_dir: PathBuf,

    /// Navigation meta file inside the page directory.
    pub nav_file: String,

    /// Branch pull requests merge into on the upstream repository.
    pub default_branch: String,

    /// Remote the contribution branch is pushed to.
    pub remote: String,

    /// Base URL of the hosting platform, for manually composed links.
    pub platform_base_url: String,
}

impl SiteLayout {
    /// Configuration file name at the repository root.
    pub const FILE_NAME: &'static str = "shareup.toml";

    /// Absolute path of the staging directory.
    pub fn staging_root(&self, root: &Path) -> PathBuf {
        root.join(&self.staging_dir)
    }

    /// Absolute path of a course's material directory.
    pub fn course_resources(&self, root: &Path, course_name: &str) -> PathBuf {
        root.join(&self.public_dir)
            .join(&self.resources_dir)
            .join(course_name)
    }

    /// Absolute path of a course page.
    pub fn page_path(&self, root: &Path, slug: &str) -> PathBuf {
        root.join(&self.pages_dir).join(format!("{slug}.mdx"))
    }

    /// Absolute path of the navigation meta file.
    pub fn nav_path(&self, root: &Path) -> PathBuf {
        root.join(&self.pages_dir).join(&self.nav_file)
    }

    /// Site-absolute path a page entry references, rooted at the public dir.
    pub fn site_path(&self, course_name: &str, file_name: &str) -> String {
        format!(
            "/{}/{course_name}/{file_name}",
            self.resources_dir.display()
        )
    }

    /// Repository-relative path of a placed material file, for staging.
    pub fn material_repo_path(&self, course_name: &str, file_name: &str) -> PathBuf {
        self.public_dir
            .join(&self.resources_dir)
            .join(course_name)
            .join(file_name)
    }

    /// Repository-relative path of a course page, for staging.
    pub fn page_repo_path(&self, slug: &str) -> PathBuf {
        self.pages_dir.join(format!("{slug}.mdx"))
    }

    /// Repository-relative path of the navigation meta file, for staging.
    pub fn nav_repo_path(&self) -> PathBuf {
        self.pages_dir.join(&self.nav_file)
    }
}

impl Default for SiteLayout {
    fn default() -> Self {
        Self {
            staging_dir: "upload".into(),
            public_dir: "public".into(),
            resources_dir: "resources".into(),
            pages_dir: PathBuf::from("pages").join("courses"),
            nav_file: "_meta.ts".into(),
            default_branch: "master".into(),
            remote: "origin".into(),
            platform_base_url: "https://github.com".into(),
        }
    }
}

impl FromStr for SiteLayout {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut layout: SiteLayout = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on staging dir field.
        layout.staging_dir = PathBuf::from(
            shellexpand::full(layout.staging_dir.to_string_lossy().as_ref())
                .map_err(ConfigError::ShellExpansion)?
                .into_owned(),
        );

        Ok(layout)
    }
}

impl Display for SiteLayout {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("DROPBOX", "/home/blah/dropbox")])]
    fn deserialize_site_layout() -> anyhow::Result<()> {
        let result: SiteLayout = r#"
            staging_dir = "$DROPBOX"
            default_branch = "main"
        "#
        .parse()?;

        let expect = SiteLayout {
            staging_dir: "/home/blah/dropbox".into(),
            default_branch: "main".into(),
            ..SiteLayout::default()
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn serialized_layout_round_trips() -> anyhow::Result<()> {
        let layout = SiteLayout::default();
        let reparsed: SiteLayout = layout.to_string().parse()?;
        assert_eq!(reparsed, layout);

        Ok(())
    }

    #[test]
    fn paths_follow_the_content_tree() {
        let layout = SiteLayout::default();
        let root = Path::new("/repo");

        assert_eq!(layout.staging_root(root), Path::new("/repo/upload"));
        assert_eq!(
            layout.course_resources(root, "数学分析B"),
            Path::new("/repo/public/resources/数学分析B")
        );
        assert_eq!(
            layout.page_path(root, "shuxuefenxiB"),
            Path::new("/repo/pages/courses/shuxuefenxiB.mdx")
        );
        assert_eq!(
            layout.site_path("数学分析B", "2023-期末-试卷.pdf"),
            "/resources/数学分析B/2023-期末-试卷.pdf"
        );
        assert_eq!(
            layout.material_repo_path("数学分析B", "2023-期末-试卷.pdf"),
            Path::new("public/resources/数学分析B/2023-期末-试卷.pdf")
        );
    }
}
