// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Course page parsing and editing.
//!
//! Every course owns one MDX page that lists its materials grouped by
//! category. This module treats that page as a typed parse tree instead of
//! loose text, so that inserting a file reference is a structural operation
//! with structural guarantees.
//!
//! # Page Layout
//!
//! A page has three regions:
//!
//! 1. A __preamble__: component imports, the page title, and any prose before
//!    the first material section. Preserved verbatim.
//! 2. An ordered run of __material sections__, one per [`Category`], each
//!    introduced by its fixed heading and closed by a horizontal rule. A
//!    section holds `<FileDownload>` component blocks (the entries) and may
//!    hold free-form prose, which is preserved verbatim ahead of the entries.
//! 3. A __trailer__: everything from the first unrecognized heading or the
//!    `<Comments />` component onwards. Preserved verbatim. New sections are
//!    appended after the existing ones, ahead of the trailer.
//!
//! Blank lines and section rules are canonical: the parser discards them and
//! the serializer regenerates them, so a page the serializer produced parses
//! back to an identical tree. Updating a page is therefore parse, mutate,
//! re-serialize, with unrelated sections untouched.
//!
//! # Merge Semantics
//!
//! [`CoursePage::apply_entries`] is idempotent per entry: a path already
//! listed under the same category is skipped, and sections are only created
//! when an entry actually lands in them. A path listed under a *different*
//! category is refused loudly, since one material belonging to two categories
//! is always a contributor mistake.

use crate::material::{Category, MaterialEntry};

use regex::Regex;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
    sync::LazyLock,
};
use tracing::debug;

/// Parsed course page.
///
/// Obtained through [`FromStr`], mutated with [`CoursePage::apply_entries`],
/// and serialized back through [`Display`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoursePage {
    preamble: Vec<String>,
    sections: Vec<Section>,
    trailer: Vec<String>,
}

/// One material section of a course page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Category owning this section's heading.
    pub category: Category,

    /// Free-form lines preserved verbatim ahead of the entries.
    pub notes: Vec<String>,

    /// File references in document order.
    pub entries: Vec<MaterialEntry>,
}

impl Section {
    fn new(category: Category) -> Self {
        Self {
            category,
            notes: Vec::new(),
            entries: Vec::new(),
        }
    }
}

impl CoursePage {
    /// Fresh page for a newly created course.
    ///
    /// Carries the standard component imports, a title, and the five default
    /// sections contributors expect to find, all empty.
    pub fn template(course_name: &str) -> Self {
        let preamble = vec![
            "import { FileDownload } from '@/components/FileDownload'".to_string(),
            "import { Comments } from '@/components/Comments'".to_string(),
            String::new(),
            format!("# 📚 {course_name}"),
            String::new(),
            format!("> 本页面收集了{course_name}课程的相关资料"),
            String::new(),
        ];

        let sections = [
            Category::FinalExam,
            Category::MidtermExam,
            Category::Review,
            Category::LectureNotes,
            Category::Homework,
        ]
        .into_iter()
        .map(Section::new)
        .collect();

        Self {
            preamble,
            sections,
            trailer: vec!["<Comments />".to_string()],
        }
    }

    /// Material sections in document order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Merge entries into the page.
    ///
    /// Entries are processed in input order. For each one the matching
    /// section is looked up, or created at the end of the existing section
    /// run when absent. An entry whose path is already listed under the same
    /// category is skipped. Returns how many entries were actually inserted.
    ///
    /// # Errors
    ///
    /// - Return [`PageError::CategoryConflict`] if an entry's path is already
    ///   listed under a different category. Entries processed before the
    ///   conflicting one remain applied.
    pub fn apply_entries(
        &mut self,
        entries: impl IntoIterator<Item = MaterialEntry>,
    ) -> Result<usize> {
        let mut inserted = 0;
        for entry in entries {
            match self.category_of(&entry.relative_path) {
                Some(existing) if existing == entry.category => {
                    debug!("already listed, skipping: {}", entry.relative_path);
                    continue;
                }
                Some(existing) => {
                    return Err(PageError::CategoryConflict {
                        path: entry.relative_path,
                        existing,
                    });
                }
                None => {}
            }

            self.section_mut(entry.category).entries.push(entry);
            inserted += 1;
        }

        Ok(inserted)
    }

    /// Category a path is currently listed under, if any.
    fn category_of(&self, path: &str) -> Option<Category> {
        self.sections.iter().find_map(|section| {
            section
                .entries
                .iter()
                .any(|entry| entry.relative_path == path)
                .then_some(section.category)
        })
    }

    fn section_mut(&mut self, category: Category) -> &mut Section {
        let index = match self
            .sections
            .iter()
            .position(|section| section.category == category)
        {
            Some(index) => index,
            None => {
                self.sections.push(Section::new(category));
                self.sections.len() - 1
            }
        };

        &mut self.sections[index]
    }
}

static NAME_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name="([^"]*)""#).expect("hand-written pattern"));

static PATH_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"path="([^"]*)""#).expect("hand-written pattern"));

impl FromStr for CoursePage {
    type Err = PageError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let lines: Vec<&str> = text.lines().collect();
        let mut preamble = Vec::new();
        let mut sections: Vec<Section> = Vec::new();
        let mut trailer = Vec::new();
        let mut current: Option<Section> = None;
        let mut in_trailer = false;

        let mut index = 0;
        while index < lines.len() {
            let line = lines[index];
            let trimmed = line.trim();

            if in_trailer {
                // INVARIANT: The trailer is the final region; a material
                // section heading past it cannot be re-serialized in place.
                if Category::from_heading(trimmed).is_some() {
                    return Err(PageError::SectionAfterTrailer);
                }
                trailer.push(line.to_string());
                index += 1;
                continue;
            }

            if let Some(category) = Category::from_heading(trimmed) {
                let already_seen = sections
                    .iter()
                    .chain(current.as_ref())
                    .any(|section| section.category == category);
                if already_seen {
                    return Err(PageError::DuplicateSection {
                        heading: category.heading(),
                    });
                }

                if let Some(section) = current.take() {
                    sections.push(section);
                }
                current = Some(Section::new(category));
                index += 1;
                continue;
            }

            // Unrecognized headings before any material section are ordinary
            // preamble; after one they open the trailer.
            if current.is_some() && (trimmed.starts_with("##") || trimmed.starts_with("<Comments"))
            {
                if let Some(section) = current.take() {
                    sections.push(section);
                }
                in_trailer = true;
                continue;
            }

            match current.as_mut() {
                None => {
                    preamble.push(line.to_string());
                    index += 1;
                }
                Some(section) => {
                    if trimmed.is_empty() || trimmed == "---" {
                        index += 1;
                    } else if trimmed.starts_with("<FileDownload") {
                        let (entry, next) = parse_component(&lines, index, section.category)?;
                        section.entries.push(entry);
                        index = next;
                    } else {
                        section.notes.push(line.to_string());
                        index += 1;
                    }
                }
            }
        }

        if let Some(section) = current.take() {
            sections.push(section);
        }

        Ok(Self {
            preamble,
            sections,
            trailer,
        })
    }
}

/// Parse one `<FileDownload ... />` block starting at `start`.
///
/// Returns the entry and the index of the first line past the block.
fn parse_component(
    lines: &[&str],
    start: usize,
    category: Category,
) -> Result<(MaterialEntry, usize)> {
    let mut block = String::new();
    let mut end = None;
    for (offset, line) in lines[start..].iter().enumerate() {
        block.push_str(line);
        block.push('\n');
        if line.trim_end().ends_with("/>") {
            end = Some(start + offset + 1);
            break;
        }
    }

    let Some(end) = end else {
        return Err(PageError::Component {
            line: start + 1,
            reason: "unterminated component",
        });
    };

    let attr = |pattern: &Regex, missing: &'static str| {
        pattern
            .captures(&block)
            .and_then(|captures| captures.get(1))
            .map(|found| found.as_str().to_string())
            .ok_or(PageError::Component {
                line: start + 1,
                reason: missing,
            })
    };

    let name = attr(&NAME_ATTR, "missing name attribute")?;
    let path = attr(&PATH_ATTR, "missing path attribute")?;

    Ok((MaterialEntry::new(name, path, category), end))
}

impl Display for CoursePage {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for line in &self.preamble {
            writeln!(fmt, "{line}")?;
        }

        for section in &self.sections {
            writeln!(fmt, "{}", section.category.heading())?;
            writeln!(fmt)?;

            if !section.notes.is_empty() {
                for note in &section.notes {
                    writeln!(fmt, "{note}")?;
                }
                writeln!(fmt)?;
            }

            for entry in &section.entries {
                writeln!(fmt, "<FileDownload")?;
                writeln!(fmt, "  name=\"{}\"", entry.display_name)?;
                writeln!(fmt, "  path=\"{}\"", entry.relative_path)?;
                writeln!(fmt, "/>")?;
                writeln!(fmt)?;
            }

            writeln!(fmt, "---")?;
            writeln!(fmt)?;
        }

        for line in &self.trailer {
            writeln!(fmt, "{line}")?;
        }

        Ok(())
    }
}

/// Page parsing and editing error types.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    /// A `<FileDownload>` block could not be understood.
    #[error("malformed file reference at line {line}: {reason}")]
    Component { line: usize, reason: &'static str },

    /// The same material heading appears twice.
    #[error("duplicate {heading:?} section")]
    DuplicateSection { heading: &'static str },

    /// A material heading appears after the trailing page content.
    #[error("material section found after trailing page content")]
    SectionAfterTrailer,

    /// A path was proposed under two different categories.
    #[error("{path} is already listed under {existing}")]
    CategoryConflict { path: String, existing: Category },
}

/// Friendly result alias :3
type Result<T, E = PageError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn final_entry(path: &str) -> MaterialEntry {
        MaterialEntry::new("2024-期末-试卷", path, Category::FinalExam)
    }

    fn review_entry(path: &str) -> MaterialEntry {
        MaterialEntry::new("2024-复习-总结", path, Category::Review)
    }

    #[test]
    fn template_round_trips() -> anyhow::Result<()> {
        let page = CoursePage::template("数学分析B");
        let reparsed: CoursePage = page.to_string().parse()?;
        assert_eq!(reparsed, page);

        Ok(())
    }

    #[test]
    fn applying_same_entry_twice_is_textual_noop() -> anyhow::Result<()> {
        let entry = final_entry("/resources/数学分析B/2024-期末-试卷.pdf");

        let mut page = CoursePage::template("数学分析B");
        assert_eq!(page.apply_entries([entry.clone()])?, 1);
        let once = page.to_string();

        let mut reparsed: CoursePage = once.parse()?;
        assert_eq!(reparsed.apply_entries([entry])?, 0);
        assert_eq!(reparsed.to_string(), once);

        Ok(())
    }

    #[test]
    fn preserves_relative_order_of_existing_sections() -> anyhow::Result<()> {
        let mut page = CoursePage::template("线性代数");
        let order_before: Vec<Category> = page.sections().iter().map(|s| s.category).collect();

        page.apply_entries([
            review_entry("/resources/线性代数/2024-复习-总结.pdf"),
            final_entry("/resources/线性代数/2024-期末-试卷.pdf"),
        ])?;

        let order_after: Vec<Category> = page.sections().iter().map(|s| s.category).collect();
        assert_eq!(order_after, order_before);

        Ok(())
    }

    #[test]
    fn lazily_creates_exactly_the_touched_sections() -> anyhow::Result<()> {
        let mut page: CoursePage = "# 📚 新课程\n".parse()?;
        assert!(page.sections().is_empty());

        page.apply_entries([
            final_entry("/resources/新课程/a.pdf"),
            review_entry("/resources/新课程/b.pdf"),
        ])?;

        assert_eq!(page.sections().len(), 2);
        assert_eq!(page.sections()[0].category, Category::FinalExam);
        assert_eq!(page.sections()[0].entries.len(), 1);
        assert_eq!(page.sections()[1].category, Category::Review);
        assert_eq!(page.sections()[1].entries.len(), 1);

        Ok(())
    }

    #[test]
    fn new_section_lands_after_existing_ones() -> anyhow::Result<()> {
        let text = indoc! {r#"
            # 📚 数学分析B

            ## 📝 期末考试

            <FileDownload
              name="2023-期末-试卷"
              path="/resources/数学分析B/2023-期末-试卷.pdf"
            />

            ---

            <Comments />
        "#};

        let mut page: CoursePage = text.parse()?;
        page.apply_entries([
            final_entry("/resources/数学分析B/2024-期末-试卷.pdf"),
            review_entry("/resources/数学分析B/2024-复习-总结.pdf"),
        ])?;

        let sections = page.sections();
        assert_eq!(sections.len(), 2);

        assert_eq!(sections[0].category, Category::FinalExam);
        let paths: Vec<&str> = sections[0]
            .entries
            .iter()
            .map(|entry| entry.relative_path.as_str())
            .collect();
        assert_eq!(
            paths,
            [
                "/resources/数学分析B/2023-期末-试卷.pdf",
                "/resources/数学分析B/2024-期末-试卷.pdf",
            ]
        );

        assert_eq!(sections[1].category, Category::Review);
        assert_eq!(sections[1].entries.len(), 1);

        // The comments component survives past the appended section.
        let serialized = page.to_string();
        let review_at = serialized.find(Category::Review.heading()).unwrap();
        let comments_at = serialized.find("<Comments />").unwrap();
        assert!(review_at < comments_at);

        Ok(())
    }

    #[test]
    fn refuses_same_path_under_two_categories() -> anyhow::Result<()> {
        let mut page = CoursePage::template("数学分析B");
        page.apply_entries([final_entry("/resources/数学分析B/x.pdf")])?;

        let conflicting = MaterialEntry::new("x", "/resources/数学分析B/x.pdf", Category::Review);
        let result = page.apply_entries([conflicting]);
        assert!(matches!(
            result,
            Err(PageError::CategoryConflict {
                existing: Category::FinalExam,
                ..
            })
        ));

        Ok(())
    }

    #[test]
    fn prose_inside_a_section_survives_round_trip() -> anyhow::Result<()> {
        let text = indoc! {r#"
            # 📚 数学分析B

            ## 📚 复习资料

            推荐先看这份总结再刷题。

            <FileDownload
              name="2024-复习-总结"
              path="/resources/数学分析B/2024-复习-总结.pdf"
            />

            ---

            <Comments />
        "#};

        let page: CoursePage = text.parse()?;
        let reparsed: CoursePage = page.to_string().parse()?;
        assert_eq!(reparsed, page);
        assert_eq!(page.sections()[0].notes, ["推荐先看这份总结再刷题。"]);

        Ok(())
    }

    #[test]
    fn rejects_malformed_component_blocks() {
        let unterminated = indoc! {r#"
            ## 📝 期末考试

            <FileDownload
              name="x"
        "#};
        assert!(matches!(
            unterminated.parse::<CoursePage>(),
            Err(PageError::Component { .. })
        ));

        let missing_path = indoc! {r#"
            ## 📝 期末考试

            <FileDownload
              name="x"
            />
        "#};
        assert!(matches!(
            missing_path.parse::<CoursePage>(),
            Err(PageError::Component {
                reason: "missing path attribute",
                ..
            })
        ));
    }

    #[test]
    fn rejects_duplicate_and_misplaced_sections() {
        let duplicated = indoc! {r#"
            ## 📝 期末考试

            ---

            ## 📝 期末考试

            ---
        "#};
        assert!(matches!(
            duplicated.parse::<CoursePage>(),
            Err(PageError::DuplicateSection { .. })
        ));

        let misplaced = indoc! {r#"
            ## 📝 期末考试

            ---

            <Comments />

            ## 📝 期中考试
        "#};
        assert!(matches!(
            misplaced.parse::<CoursePage>(),
            Err(PageError::SectionAfterTrailer)
        ));
    }
}
