// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Branch, commit, and pull request text composition.

use crate::material::Category;

use time::OffsetDateTime;

/// Contribution branch name: `add/<course>-<YYYYMMDD>-<HHMMSS>`.
///
/// Spaces and slashes in the course name are flattened so the result is
/// always a valid reference name. The caller supplies the clock.
pub fn branch_name(course: &str, now: OffsetDateTime) -> String {
    let safe = course.replace([' ', '/'], "-");
    format!(
        "add/{safe}-{:04}{:02}{:02}-{:02}{:02}{:02}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

/// Commit message for one submission.
pub fn commit_message(courses: &[String], file_count: usize) -> String {
    match courses {
        [only] => format!("添加: {only} - {file_count}个文件"),
        _ => {
            let mut list = courses
                .iter()
                .take(3)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("、");
            if courses.len() > 3 {
                list.push_str(&format!("等{}门课程", courses.len()));
            }

            format!("添加: {list} - 共{file_count}个文件")
        }
    }
}

/// Pull request title for one submission.
pub fn pr_title(courses: &[String], file_count: usize) -> String {
    match courses {
        [only] => format!("添加: {only} - {file_count}个资料"),
        _ => {
            let named = courses
                .iter()
                .take(2)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            let more = if courses.len() > 2 { "等" } else { "" };

            format!("添加: {named}{more} - {file_count}个资料")
        }
    }
}

/// Pull request body: submission type, per-course manifest tables, and the
/// contributor checklist the upstream repository expects.
pub fn pr_body(rows: &[(String, String, Category)]) -> String {
    let mut grouped: Vec<(&str, Vec<(&str, Category)>)> = Vec::new();
    for (course, file, category) in rows {
        match grouped.iter_mut().find(|(name, _)| *name == course) {
            Some((_, files)) => files.push((file, *category)),
            None => grouped.push((course, vec![(file, *category)])),
        }
    }

    let mut body = String::new();
    body.push_str("## 📝 PR 说明\n\n");
    body.push_str("### 本次提交类型\n\n");
    body.push_str("- [x] 📚 添加新资料\n");
    body.push_str("- [ ] ✏️ 修正错误\n");
    body.push_str("- [ ] 🆕 添加新课程\n");
    body.push_str("- [ ] 🔧 其他改进\n\n");

    body.push_str("### 资料清单\n\n");
    for (course, files) in &grouped {
        body.push_str(&format!("#### 📘 {course}\n\n"));
        body.push_str("| 文件名 | 类型 |\n");
        body.push_str("|--------|------|\n");
        for (file, category) in files {
            body.push_str(&format!("| {file} | {category} |\n"));
        }
        body.push('\n');
    }

    body.push_str("### Checklist\n\n");
    body.push_str("- [x] 文件已放入正确的目录\n");
    body.push_str("- [x] 已在对应的 `.mdx` 文件中添加下载链接\n");
    body.push_str("- [x] 资料内容清晰可读\n");
    body.push_str("- [x] 确认无版权问题\n\n");
    body.push_str("---\n\n");
    body.push_str("*此PR由 shareup 自动生成*\n");

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use time::{Date, Month, Time};

    fn scenario_clock() -> OffsetDateTime {
        Date::from_calendar_date(2026, Month::January, 20)
            .unwrap()
            .with_time(Time::from_hms(14, 32, 33).unwrap())
            .assume_utc()
    }

    #[test]
    fn branch_name_embeds_course_and_stamp() {
        let result = branch_name("数学分析B", scenario_clock());
        assert_eq!(result, "add/数学分析B-20260120-143233");
    }

    #[test]
    fn branch_name_flattens_awkward_characters() {
        let result = branch_name("数据结构 与算法/进阶", scenario_clock());
        assert_eq!(result, "add/数据结构-与算法-进阶-20260120-143233");
    }

    #[test]
    fn commit_message_for_one_and_many_courses() {
        assert_eq!(
            commit_message(&["数学分析B".to_string()], 2),
            "添加: 数学分析B - 2个文件"
        );

        let many: Vec<String> = ["高数", "线代", "概率论", "大物"]
            .map(String::from)
            .to_vec();
        assert_eq!(
            commit_message(&many, 7),
            "添加: 高数、线代、概率论等4门课程 - 共7个文件"
        );
    }

    #[test]
    fn pr_title_truncates_the_course_list() {
        assert_eq!(
            pr_title(&["数学分析B".to_string()], 1),
            "添加: 数学分析B - 1个资料"
        );

        let many: Vec<String> = ["高数", "线代", "概率论"].map(String::from).to_vec();
        assert_eq!(pr_title(&many, 5), "添加: 高数, 线代等 - 5个资料");
    }

    #[test]
    fn pr_body_groups_files_per_course() {
        let rows = vec![
            (
                "数学分析B".to_string(),
                "2023-期末-试卷.pdf".to_string(),
                Category::FinalExam,
            ),
            (
                "数学分析B".to_string(),
                "2024-复习-总结.pdf".to_string(),
                Category::Review,
            ),
            (
                "线性代数".to_string(),
                "2024-作业-第三章.pdf".to_string(),
                Category::Homework,
            ),
        ];

        let body = pr_body(&rows);
        assert_eq!(body.matches("#### 📘 数学分析B").count(), 1);
        assert!(body.contains("| 2023-期末-试卷.pdf | 期末考试 |"));
        assert!(body.contains("| 2024-复习-总结.pdf | 复习资料 |"));
        assert!(body.contains("#### 📘 线性代数"));
        assert!(body.contains("- [x] 确认无版权问题"));
    }
}
