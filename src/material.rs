// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Course material classification.
//!
//! Every file this tool contributes is classified by a __category__: the
//! fixed material type (exam, notes, homework, etc.) that determines both the
//! section it lands in on a course page, and the prefix of its normalized
//! filename. Files waiting in the staging directory are represented as
//! [`Candidate`]s, which carry best-effort hints sniffed from the file path
//! so the interactive flow can pre-select sensible answers.

use regex::Regex;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    sync::LazyLock,
};

/// Maximum accepted size for a single material file.
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// File extensions accepted into the content tree.
pub const SUPPORTED_EXTENSIONS: [&str; 14] = [
    "pdf", "docx", "doc", "pptx", "ppt", "zip", "rar", "7z", "md", "txt", "xlsx", "xls", "png",
    "jpg",
];

/// Fixed classification of a course material.
///
/// Each category owns the exact section heading used on course pages. The
/// heading text is a convention of the content repository and must not drift,
/// otherwise existing pages stop round-tripping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    FinalExam,
    MidtermExam,
    Review,
    LectureNotes,
    Homework,
    Slides,
    Other,
}

impl Category {
    pub const ALL: [Self; 7] = [
        Self::FinalExam,
        Self::MidtermExam,
        Self::Review,
        Self::LectureNotes,
        Self::Homework,
        Self::Slides,
        Self::Other,
    ];

    /// Display label used in prompts, commit messages, and PR tables.
    pub fn label(self) -> &'static str {
        match self {
            Self::FinalExam => "期末考试",
            Self::MidtermExam => "期中考试",
            Self::Review => "复习资料",
            Self::LectureNotes => "课堂笔记",
            Self::Homework => "作业习题",
            Self::Slides => "PPT课件",
            Self::Other => "其他",
        }
    }

    /// Section heading on a course page.
    pub fn heading(self) -> &'static str {
        match self {
            Self::FinalExam => "## 📝 期末考试",
            Self::MidtermExam => "## 📝 期中考试",
            Self::Review => "## 📚 复习资料",
            Self::LectureNotes => "## 📖 课堂笔记",
            Self::Homework => "## 💡 作业习题",
            Self::Slides => "## 📊 PPT课件",
            Self::Other => "## 📦 其他资料",
        }
    }

    /// Reverse lookup of [`Category::heading`] for the page parser.
    pub fn from_heading(line: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| line.trim() == category.heading())
    }

    /// Short form used in normalized filenames, e.g. "期末" for 期末考试.
    pub fn short_label(self) -> &'static str {
        match self {
            Self::FinalExam => "期末",
            Self::MidtermExam => "期中",
            Self::Review => "复习",
            Self::LectureNotes => "课堂笔记",
            Self::Homework => "作业",
            Self::Slides => "PPT课件",
            Self::Other => "其他",
        }
    }

    /// Description stem to fall back on when nothing usable survives
    /// filename cleanup.
    fn fallback_stem(self) -> &'static str {
        match self {
            Self::FinalExam | Self::MidtermExam => "试卷",
            Self::Review => "总结",
            Self::LectureNotes => "笔记",
            Self::Homework => "作业",
            Self::Slides => "PPT",
            Self::Other => "资料",
        }
    }
}

impl Display for Category {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.label())
    }
}

/// One file reference recorded on a course page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialEntry {
    /// Name shown to readers (filename without extension).
    pub display_name: String,

    /// Site-absolute path under the public dir, e.g. "/resources/高数/x.pdf".
    pub relative_path: String,

    /// Section the entry belongs to.
    pub category: Category,
}

impl MaterialEntry {
    pub fn new(
        display_name: impl Into<String>,
        relative_path: impl Into<String>,
        category: Category,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            relative_path: relative_path.into(),
            category,
        }
    }
}

/// A file found in the staging directory, plus classification hints.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Absolute path of the staged file.
    pub path: PathBuf,

    /// Bare filename.
    pub file_name: String,

    /// Path relative to the staging root.
    pub relative: PathBuf,

    /// File size in bytes.
    pub size: u64,

    /// Course guessed from the sub-directory or filename.
    pub course_hint: Option<String>,

    /// Category guessed from filename keywords.
    pub category_hint: Option<Category>,

    /// Year guessed from the filename.
    pub year_hint: Option<String>,
}

impl Candidate {
    pub fn new(path: impl Into<PathBuf>, relative: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let relative = relative.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let course_hint = guess_course(&relative, &stem);
        let category_hint = guess_category(&file_name);
        let year_hint = guess_year(&file_name);

        Self {
            path,
            file_name,
            relative,
            size,
            course_hint,
            category_hint,
            year_hint,
        }
    }

    /// Check the candidate against the size limit and format allowlist.
    pub fn validate(&self) -> Result<(), RejectReason> {
        if self.size >= MAX_FILE_SIZE {
            return Err(RejectReason::TooLarge {
                size: human_size(self.size),
            });
        }

        let extension = self
            .path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !is_supported_extension(&extension) {
            return Err(RejectReason::UnsupportedFormat { extension });
        }

        if !self.path.exists() {
            return Err(RejectReason::Missing);
        }

        Ok(())
    }

    /// One-line rendering for pick lists: name, size, and sniffed hints.
    pub fn display_line(&self) -> String {
        let mut hints = Vec::new();
        if let Some(course) = &self.course_hint {
            hints.push(format!("课程:{course}"));
        }
        if let Some(year) = &self.year_hint {
            hints.push(format!("{year}年"));
        }
        if let Some(category) = self.category_hint {
            hints.push(category.label().to_string());
        }

        let hints = if hints.is_empty() {
            "待分类".to_string()
        } else {
            hints.join(" | ")
        };

        format!("{} ({}) [{hints}]", self.file_name, human_size(self.size))
    }
}

impl Display for Candidate {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.display_line().as_str())
    }
}

/// Reasons a staged file is refused.
#[derive(Debug, thiserror::Error)]
pub enum RejectReason {
    #[error("file exceeds the 100MB size limit ({size})")]
    TooLarge { size: String },

    #[error("unsupported file format: .{extension}")]
    UnsupportedFormat { extension: String },

    #[error("file vanished from the staging directory")]
    Missing,
}

fn is_supported_extension(extension: &str) -> bool {
    // "jpeg" shares the "jpg" slot in the allowlist.
    extension == "jpeg" || SUPPORTED_EXTENSIONS.contains(&extension)
}

/// Human readable size, e.g. "3.2MB".
pub fn human_size(size: u64) -> String {
    let mut size = size as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.1}{unit}");
        }
        size /= 1024.0;
    }

    format!("{size:.1}TB")
}

static COURSE_NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\d{4}-\d{4}学年",
        r"第[一二三四]学期[-_]?",
        r"[春秋夏冬]季?学期[-_]?",
        r"20\d{2}年?",
        r"(期末|期中|阶段性|小测|测验)(考试)?[-_]?",
        r"(试卷|答案|解答|复习|笔记|作业|课件|讲义)[-_]?",
        r"[ABC]卷?[-_]?",
        r"[（(][^（）()]*[）)]",
        r"^[-_\s]+",
        r"[-_\s]+$",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("hand-written pattern"))
    .collect()
});

static COURSE_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([\p{Han}A-Za-z][A-Za-z\p{Han}0-9ⅠⅡⅢⅣⅤ]*)").expect("hand-written pattern")
});

static SCHOOL_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(20\d{2})-20\d{2}学年").expect("hand-written pattern"));

static BARE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(20\d{2})").expect("hand-written pattern"));

/// Guess the course a staged file belongs to.
///
/// A leading sub-directory inside the staging dir wins. Otherwise the
/// filename stem is stripped of term, year, and material-type noise, and the
/// first remaining CJK or alphabetic run is taken as the course name.
pub fn guess_course(relative: &Path, stem: &str) -> Option<String> {
    let mut parts = relative.components();
    let first = parts.next()?;
    if parts.next().is_some() {
        return Some(first.as_os_str().to_string_lossy().into_owned());
    }

    let mut name = stem.to_string();
    for noise in COURSE_NOISE.iter() {
        name = noise.replace_all(&name, "").into_owned();
    }

    let word = COURSE_WORD.captures(&name)?.get(1)?.as_str().trim();
    const EXCLUDED: [&str; 9] = ["试卷", "答案", "解答", "复习", "笔记", "作业", "第", "章", "节"];
    if word.is_empty() || EXCLUDED.iter().any(|excluded| word.contains(excluded)) {
        return None;
    }

    Some(word.to_string())
}

/// Guess the material category from filename keywords.
///
/// Checks run in priority order; answer-sheet keywords defer to the exam
/// they belong to when the filename names one.
pub fn guess_category(file_name: &str) -> Option<Category> {
    let lower = file_name.to_lowercase();
    let contains_any =
        |words: &[&str]| words.iter().any(|word| file_name.contains(word));

    if file_name.contains("期末") || lower.contains("final") {
        Some(Category::FinalExam)
    } else if contains_any(&["期中", "阶段性考试", "段考"]) || lower.contains("midterm") {
        Some(Category::MidtermExam)
    } else if contains_any(&["小测", "测验"]) || lower.contains("quiz") {
        Some(Category::MidtermExam)
    } else if contains_any(&["复习", "总结"]) || lower.contains("review") {
        Some(Category::Review)
    } else if file_name.contains("笔记") || lower.contains("note") {
        Some(Category::LectureNotes)
    } else if file_name.contains("作业") || lower.contains("homework") || lower.contains("hw") {
        Some(Category::Homework)
    } else if lower.contains("ppt") || contains_any(&["课件", "讲义"]) {
        Some(Category::Slides)
    } else if contains_any(&["答案", "解答"])
        || lower.contains("solution")
        || lower.contains("answer")
    {
        if file_name.contains("期末") {
            Some(Category::FinalExam)
        } else if file_name.contains("期中") || file_name.contains("阶段") {
            Some(Category::MidtermExam)
        } else {
            Some(Category::Other)
        }
    } else {
        None
    }
}

/// Guess the year from the filename, preferring the school-year form.
pub fn guess_year(file_name: &str) -> Option<String> {
    SCHOOL_YEAR
        .captures(file_name)
        .or_else(|| BARE_YEAR.captures(file_name))
        .and_then(|captures| captures.get(1))
        .map(|year| year.as_str().to_string())
}

static STEM_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}[-_]?").expect("hand-written pattern"));

static STEM_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(期末|期中|复习|笔记|作业|试卷|答案)[-_]?").expect("hand-written pattern")
});

/// Suggest a normalized filename: `[year]-[type]-[description].ext`.
///
/// The description is the original stem with year and type keywords removed,
/// falling back to a category-specific stem when nothing is left.
/// `default_year` is used when the filename carries no year hint.
pub fn suggest_filename(candidate: &Candidate, category: Category, default_year: i32) -> String {
    let stem = candidate
        .path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = candidate
        .path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let stem = STEM_YEAR.replace_all(&stem, "");
    let stem = STEM_NOISE.replace_all(&stem, "");
    let stem = stem.trim_matches(['-', '_']);
    let stem = if stem.is_empty() {
        category.fallback_stem()
    } else {
        stem
    };

    let year = candidate
        .year_hint
        .clone()
        .unwrap_or_else(|| default_year.to_string());

    format!("{year}-{}-{stem}{suffix}", category.short_label())
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("2023期末试卷.pdf", Some(Category::FinalExam); "final exam keyword")]
    #[test_case("linear_algebra_final.pdf", Some(Category::FinalExam); "english final")]
    #[test_case("高数期中考试.pdf", Some(Category::MidtermExam); "midterm keyword")]
    #[test_case("第三周小测.pdf", Some(Category::MidtermExam); "quiz folds into midterm")]
    #[test_case("复习总结.md", Some(Category::Review); "review keyword")]
    #[test_case("课堂笔记第二章.pdf", Some(Category::LectureNotes); "notes keyword")]
    #[test_case("hw3.pdf", Some(Category::Homework); "homework abbreviation")]
    #[test_case("第一章PPT.pptx", Some(Category::Slides); "slides keyword")]
    #[test_case("期末答案.pdf", Some(Category::FinalExam); "answers defer to final")]
    #[test_case("阶段考答案.pdf", Some(Category::MidtermExam); "answers defer to midterm")]
    #[test_case("习题解答.pdf", Some(Category::Other); "bare answers fall to other")]
    #[test_case("数学分析B.pdf", None; "no keyword")]
    #[test]
    fn guesses_category(name: &str, expect: Option<Category>) {
        assert_eq!(guess_category(name), expect);
    }

    #[test_case("2024-2025学年期末.pdf", Some("2024"); "school year form")]
    #[test_case("高数2023期中.pdf", Some("2023"); "bare year")]
    #[test_case("数学分析B.pdf", None; "no year")]
    #[test]
    fn guesses_year(name: &str, expect: Option<&str>) {
        assert_eq!(guess_year(name).as_deref(), expect);
    }

    #[test]
    fn course_hint_prefers_subdirectory() {
        let result = guess_course(Path::new("数学分析B/期末2023.pdf"), "期末2023");
        assert_eq!(result.as_deref(), Some("数学分析B"));
    }

    #[test]
    fn course_hint_from_cleaned_filename() {
        let result = guess_course(
            Path::new("2023年线性代数期末试卷.pdf"),
            "2023年线性代数期末试卷",
        );
        assert_eq!(result.as_deref(), Some("线性代数"));
    }

    #[test]
    fn course_hint_drops_exam_sheet_letters() {
        let result = guess_course(Path::new("高等数学2024期末A卷.pdf"), "高等数学2024期末A卷");
        assert_eq!(result.as_deref(), Some("高等数学"));
    }

    #[test]
    fn course_hint_rejects_type_only_names() {
        let result = guess_course(Path::new("期末试卷.pdf"), "期末试卷");
        assert_eq!(result, None);
    }

    #[test]
    fn heading_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_heading(category.heading()), Some(category));
        }
        assert_eq!(Category::from_heading("## 📝 不存在的章节"), None);
    }

    #[test]
    fn suggested_name_follows_convention() {
        let candidate = Candidate::new("/staging/2023期末试卷.pdf", "2023期末试卷.pdf", 1024);
        let result = suggest_filename(&candidate, Category::FinalExam, 2026);
        assert_eq!(result, "2023-期末-试卷.pdf");
    }

    #[test]
    fn suggested_name_falls_back_to_default_year_and_stem() {
        let candidate = Candidate::new("/staging/作业.pdf", "作业.pdf", 1024);
        let result = suggest_filename(&candidate, Category::Homework, 2026);
        assert_eq!(result, "2026-作业-作业.pdf");
    }

    #[test]
    fn validation_rejects_oversized_and_unknown_formats() {
        let oversized = Candidate::new("/staging/big.pdf", "big.pdf", MAX_FILE_SIZE);
        assert!(matches!(
            oversized.validate(),
            Err(RejectReason::TooLarge { .. })
        ));

        let unknown = Candidate::new("/staging/tool.exe", "tool.exe", 10);
        assert!(matches!(
            unknown.validate(),
            Err(RejectReason::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn human_size_scales_units() {
        assert_eq!(human_size(512), "512.0B");
        assert_eq!(human_size(2048), "2.0KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0MB");
    }
}
