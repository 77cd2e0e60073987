// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Course catalog management.
//!
//! The set of known courses lives in the site's navigation meta file, which
//! maps a URL slug to a decorated display label. This module loads that
//! mapping, offers fuzzy lookup for classification hints, and creates the
//! three artifacts a new course needs: a material directory, a templated
//! course page, and a navigation entry.
//!
//! The meta file is TypeScript owned by the content site, not by this tool,
//! so it is edited line-wise and conservatively: entries are matched by
//! pattern, unknown content is left alone, and a file too odd to edit is
//! reported and skipped rather than mangled.

use crate::{config::SiteLayout, page::CoursePage, store};

use regex::Regex;
use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};
use tracing::{info, warn};

/// One known course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    /// URL-safe identifier keying the page file and nav entry.
    pub slug: String,

    /// Chinese display name, also the material directory name.
    pub name: String,
}

/// Catalog of known courses, loaded from the navigation meta file.
#[derive(Debug)]
pub struct CourseCatalog {
    root: PathBuf,
    layout: SiteLayout,
    courses: Vec<Course>,
}

static NAV_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'([^']+)':\s*'([^']*)'").expect("hand-written pattern"));

static LABEL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\p{Han}A-Za-z]+\s*").expect("hand-written pattern"));

impl CourseCatalog {
    /// Load the catalog for a content repository.
    ///
    /// A missing meta file degrades to an empty catalog with a warning; the
    /// user can still create courses.
    ///
    /// # Errors
    ///
    /// - Return [`CatalogError::Store`] if the meta file exists but cannot
    ///   be read.
    pub fn load(root: impl Into<PathBuf>, layout: &SiteLayout) -> Result<Self> {
        let root = root.into();
        let nav_path = layout.nav_path(&root);
        let mut courses = Vec::new();

        if nav_path.is_file() {
            let content = store::read(&nav_path)?;
            for captures in NAV_ENTRY.captures_iter(&content) {
                let slug = captures[1].to_string();
                let name = LABEL_PREFIX.replace(&captures[2], "").trim().to_string();
                if name.is_empty() {
                    continue;
                }
                courses.push(Course { slug, name });
            }
            info!("loaded {} known courses", courses.len());
        } else {
            warn!(
                "navigation meta file {:?} is missing, starting with an empty catalog",
                nav_path.display()
            );
        }

        Ok(Self {
            root,
            layout: layout.clone(),
            courses,
        })
    }

    /// Known courses sorted by display name.
    pub fn sorted_courses(&self) -> Vec<&Course> {
        let mut courses: Vec<&Course> = self.courses.iter().collect();
        courses.sort_by(|left, right| left.name.cmp(&right.name));
        courses
    }

    /// Look a course up by name or slug, tolerating partial matches.
    pub fn find(&self, query: &str) -> Option<&Course> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        self.courses
            .iter()
            .find(|course| course.name == query)
            .or_else(|| self.courses.iter().find(|course| course.slug == query))
            .or_else(|| {
                self.courses
                    .iter()
                    .find(|course| course.name.contains(query) || query.contains(&course.name))
            })
            .or_else(|| self.courses.iter().find(|course| course.slug.contains(query)))
    }

    /// Absolute path of a course's page.
    pub fn page_path(&self, slug: &str) -> PathBuf {
        self.layout.page_path(&self.root, slug)
    }

    /// Whether the course already has a page file.
    pub fn has_page(&self, slug: &str) -> bool {
        self.page_path(slug).is_file()
    }

    /// Whether the course already has a material directory.
    pub fn has_resources(&self, name: &str) -> bool {
        self.layout.course_resources(&self.root, name).is_dir()
    }

    /// Create a new course: material directory, templated page, nav entry.
    ///
    /// An existing page is kept as-is; an existing nav entry is not
    /// duplicated.
    ///
    /// # Errors
    ///
    /// - Return [`CatalogError::CreateDir`] if a directory cannot be made.
    /// - Return [`CatalogError::Store`] if the page or meta file cannot be
    ///   written.
    pub fn create(&mut self, name: &str, slug: &str, emoji: &str) -> Result<Course> {
        let resources = self.layout.course_resources(&self.root, name);
        mkdirp::mkdirp(&resources).map_err(|source| CatalogError::CreateDir {
            path: resources.clone(),
            source,
        })?;

        let page_path = self.page_path(slug);
        if page_path.is_file() {
            info!("course page {:?} already exists", page_path.display());
        } else {
            if let Some(parent) = page_path.parent() {
                mkdirp::mkdirp(parent).map_err(|source| CatalogError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            store::write_atomic(&page_path, &CoursePage::template(name).to_string())?;
            info!("created course page {:?}", page_path.display());
        }

        self.register_nav_entry(slug, name, emoji)?;

        let course = Course {
            slug: slug.to_string(),
            name: name.to_string(),
        };
        self.courses.push(course.clone());

        Ok(course)
    }

    /// Insert a nav entry ahead of the meta file's closing brace.
    fn register_nav_entry(&self, slug: &str, name: &str, emoji: &str) -> Result<()> {
        let nav_path = self.layout.nav_path(&self.root);
        if !nav_path.is_file() {
            warn!(
                "navigation meta file {:?} is missing, add the entry by hand",
                nav_path.display()
            );
            return Ok(());
        }

        let content = store::read(&nav_path)?;
        if content.contains(&format!("'{slug}'")) {
            info!("course {slug} is already in the navigation");
            return Ok(());
        }

        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
        let Some(close) = lines
            .iter()
            .rposition(|line| line.contains('}') && !line.contains("export default"))
        else {
            warn!(
                "cannot find the closing brace of {:?}, add the entry by hand",
                nav_path.display()
            );
            return Ok(());
        };

        // INVARIANT: The previous entry needs a trailing comma before a new
        // entry can follow it.
        if close > 0 {
            let previous = lines[close - 1].trim_end().to_string();
            if !previous.is_empty() && !previous.ends_with(',') && !previous.ends_with('{') {
                lines[close - 1] = previous + ",";
            }
        }

        lines.insert(close, format!("  '{slug}': '{emoji} {name}',"));
        store::write_atomic(&nav_path, &(lines.join("\n") + "\n"))?;
        info!("added {emoji} {name} to the navigation");

        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Course catalog error types.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Document store interaction failed.
    #[error(transparent)]
    Store(#[from] store::StoreError),

    /// Course directory cannot be created.
    #[error("cannot create {path:?}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Friendly result alias :3
type Result<T, E = CatalogError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const NAV: &str = indoc! {r#"
        export default {
          'shujujiegou': '🌲 数据结构',
          'gaoshu': '🔢 高等数学'
        }
    "#};

    fn seeded_catalog(root: &Path) -> anyhow::Result<CourseCatalog> {
        let layout = SiteLayout::default();
        let nav_path = layout.nav_path(root);
        std::fs::create_dir_all(nav_path.parent().unwrap())?;
        std::fs::write(&nav_path, NAV)?;

        Ok(CourseCatalog::load(root, &layout)?)
    }

    #[test]
    fn loads_courses_and_strips_label_decoration() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = seeded_catalog(dir.path())?;

        let names: Vec<&str> = catalog
            .sorted_courses()
            .iter()
            .map(|course| course.name.as_str())
            .collect();
        assert_eq!(names, ["数据结构", "高等数学"]);

        Ok(())
    }

    #[test]
    fn missing_meta_file_degrades_to_empty_catalog() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = CourseCatalog::load(dir.path(), &SiteLayout::default())?;
        assert!(catalog.sorted_courses().is_empty());

        Ok(())
    }

    #[test]
    fn finds_courses_by_name_slug_and_containment() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let catalog = seeded_catalog(dir.path())?;

        assert_eq!(catalog.find("数据结构").unwrap().slug, "shujujiegou");
        assert_eq!(catalog.find("gaoshu").unwrap().name, "高等数学");
        assert_eq!(catalog.find("数据").unwrap().slug, "shujujiegou");
        assert_eq!(catalog.find("jiegou").unwrap().slug, "shujujiegou");
        assert!(catalog.find("不存在的课程").is_none());
        assert!(catalog.find("").is_none());

        Ok(())
    }

    #[test]
    fn creates_course_artifacts_and_nav_entry() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut catalog = seeded_catalog(dir.path())?;
        let layout = SiteLayout::default();

        catalog.create("数学分析B", "shuxuefenxiB", "📚")?;

        assert!(layout.course_resources(dir.path(), "数学分析B").is_dir());

        let page: CoursePage = store::read(catalog.page_path("shuxuefenxiB"))?.parse()?;
        assert_eq!(page, CoursePage::template("数学分析B"));

        let nav = store::read(layout.nav_path(dir.path()))?;
        assert!(nav.contains("'gaoshu': '🔢 高等数学',"));
        assert!(nav.contains("  'shuxuefenxiB': '📚 数学分析B',"));

        let reloaded = CourseCatalog::load(dir.path(), &layout)?;
        assert_eq!(reloaded.sorted_courses().len(), 3);

        Ok(())
    }

    #[test]
    fn nav_entry_is_not_duplicated() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut catalog = seeded_catalog(dir.path())?;
        let layout = SiteLayout::default();

        catalog.create("数据结构", "shujujiegou", "🌲")?;
        let nav = store::read(layout.nav_path(dir.path()))?;
        assert_eq!(nav.matches("'shujujiegou'").count(), 1);

        Ok(())
    }
}
