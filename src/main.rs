// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use shareup::{
    build_route, compose, fork_compare_url, manual_compare_url,
    material::{self, Category},
    page::CoursePage,
    platform::PlatformError,
    resolve_topology,
    staging::{self, PlacedMaterial},
    store, Candidate, Course, CourseCatalog, GhCli, MaterialEntry, PlatformClient, RepoId,
    SiteLayout, Workspace,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use inquire::{validator::Validation, Confirm, InquireError, MultiSelect, Select, Text};
use std::{path::PathBuf, process::exit};
use time::OffsetDateTime;
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  shareup submit\n  shareup <scan|courses>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Submit => run_submit(),
            Command::Scan => run_scan(),
            Command::Courses => run_courses(),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Classify staged files and ship them as a pull request.
    #[command(override_usage = "shareup submit")]
    Submit,

    /// List the files waiting in the staging directory.
    Scan,

    /// List the known courses.
    Courses,
}

fn main() {
    let layer = fmt::layer().compact();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry().with(layer).with(filter).init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

/// Open the enclosing repository and load its layout configuration.
fn load_session() -> Result<(Workspace, SiteLayout)> {
    let workspace = Workspace::discover(".")?;
    let config_path = workspace.root().join(SiteLayout::FILE_NAME);

    let layout = if config_path.is_file() {
        std::fs::read_to_string(&config_path)?
            .parse::<SiteLayout>()
            .with_context(|| format!("cannot parse {}", config_path.display()))?
    } else {
        SiteLayout::default()
    };

    Ok((workspace, layout))
}

/// Unwrap a prompt result, mapping Esc and Ctrl-C to `None`.
fn cancellable<T>(result: Result<T, InquireError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

fn aborted() -> Result<()> {
    println!("\n⚠️  操作已取消");
    Ok(())
}

fn banner() {
    println!("\n{}", "=".repeat(60));
    println!("  🎓 课程资料共享 PR 工具");
    println!("{}\n", "=".repeat(60));
}

fn step(number: usize, message: &str) {
    println!("\n[{number}/6] {message}");
}

fn run_scan() -> Result<()> {
    let (workspace, layout) = load_session()?;
    let candidates = staging::scan(&layout.staging_root(workspace.root()))?;

    if candidates.is_empty() {
        println!("{} 中没有文件", layout.staging_dir.display());
        return Ok(());
    }

    for (number, candidate) in candidates.iter().enumerate() {
        match candidate.validate() {
            Ok(()) => println!("  ✓ {}. {}", number + 1, candidate.display_line()),
            Err(reason) => {
                println!("  ✗ {}. {}", number + 1, candidate.display_line());
                println!("       {reason}");
            }
        }
    }

    Ok(())
}

fn run_courses() -> Result<()> {
    let (workspace, layout) = load_session()?;
    let catalog = CourseCatalog::load(workspace.root(), &layout)?;

    let courses = catalog.sorted_courses();
    if courses.is_empty() {
        println!("目录中还没有课程");
        return Ok(());
    }

    for course in courses {
        let ready = catalog.has_resources(&course.name) && catalog.has_page(&course.slug);
        let marker = if ready { "✅" } else { "📝" };
        println!("{marker} {} ({})", course.name, course.slug);
    }

    Ok(())
}

/// A staged file that made it through classification and placement.
struct Processed {
    candidate: Candidate,
    course: Course,
    category: Category,
    file_name: String,
}

fn run_submit() -> Result<()> {
    banner();

    let (workspace, layout) = load_session()?;
    let root = workspace.root().to_path_buf();
    let mut catalog = CourseCatalog::load(&root, &layout)?;

    step(1, "扫描上传目录...");
    let staging_root = layout.staging_root(&root);
    let candidates = staging::scan(&staging_root)?;

    if candidates.is_empty() {
        println!("❌ {} 目录中没有找到文件", layout.staging_dir.display());
        println!("💡 请将要上传的资料放入该目录");
        return Ok(());
    }
    println!("✅ 找到 {} 个文件\n", candidates.len());

    let mut valid = Vec::new();
    let mut invalid = 0usize;
    for (number, candidate) in candidates.into_iter().enumerate() {
        match candidate.validate() {
            Ok(()) => {
                println!("  ✓ {}. {}", number + 1, candidate.display_line());
                valid.push(candidate);
            }
            Err(reason) => {
                println!("  ✗ {}. {}", number + 1, candidate.display_line());
                println!("       {reason}");
                invalid += 1;
            }
        }
    }
    println!();

    if valid.is_empty() {
        println!("❌ 没有有效的文件可以处理");
        return Ok(());
    }

    if invalid > 0 {
        let question = format!("发现 {invalid} 个无效文件，是否继续处理其他文件？");
        let Some(go_on) = cancellable(Confirm::new(&question).with_default(true).prompt())? else {
            return aborted();
        };
        if !go_on {
            return aborted();
        }
    }

    step(2, "选择要处理的文件");
    let preselected: Vec<usize> = (0..valid.len()).collect();
    let Some(selected) = cancellable(
        MultiSelect::new("选择文件（空格选择，回车确认）:", valid)
            .with_default(&preselected)
            .prompt(),
    )?
    else {
        return aborted();
    };

    if selected.is_empty() {
        println!("⚠️  未选择任何文件，退出");
        return Ok(());
    }
    println!("✅ 已选择 {} 个文件", selected.len());

    step(3, "配置文件信息");
    let mut processed: Vec<Processed> = Vec::new();
    for candidate in &selected {
        match classify(candidate, &mut catalog, &layout, &root)? {
            Some(item) => processed.push(item),
            None => {
                let Some(go_on) = cancellable(
                    Confirm::new("处理失败，是否继续处理其他文件？")
                        .with_default(true)
                        .prompt(),
                )?
                else {
                    return aborted();
                };
                if !go_on {
                    return aborted();
                }
            }
        }
    }

    if processed.is_empty() {
        println!("❌ 没有成功处理的文件");
        return Ok(());
    }

    step(4, "预览操作");
    preview(&processed);
    let Some(confirmed) =
        cancellable(Confirm::new("确认执行以上操作？").with_default(true).prompt())?
    else {
        return aborted();
    };
    if !confirmed {
        return aborted();
    }

    step(5, "创建Git分支并提交");
    let branch = commit_and_push(&workspace, &layout, &processed)?;

    step(6, "创建Pull Request");
    let courses = distinct_courses(&processed);
    let title = compose::pr_title(&courses, processed.len());
    let rows: Vec<(String, String, Category)> = processed
        .iter()
        .map(|item| (item.course.name.clone(), item.file_name.clone(), item.category))
        .collect();
    let body = compose::pr_body(&rows);

    match open_pull_request(&workspace, &layout, &branch, &title, &body)? {
        Some(url) => {
            println!("\n{}", "=".repeat(60));
            println!("  ✅ 成功！PR已创建: {url}");
            println!("{}\n", "=".repeat(60));

            if let Some(true) = cancellable(
                Confirm::new("是否删除已处理的文件？")
                    .with_default(false)
                    .prompt(),
            )? {
                for item in &processed {
                    if let Err(reason) = staging::remove(&item.candidate, &staging_root) {
                        warn!("cannot clean staged file: {reason}");
                    }
                }
                println!("✅ 已清理上传目录");
            }
        }
        None => {
            println!("\n⚠️  PR创建失败，但文件已提交到分支");
            println!("ℹ️  你的更改已成功推送到分支: {branch}");
            println!("   可以稍后手动创建PR，或按上述链接操作");
        }
    }

    Ok(())
}

/// Selection entry for the course picker.
enum CourseChoice {
    Existing { course: Course, marker: &'static str },
    CreateNew,
}

impl std::fmt::Display for CourseChoice {
    fn fmt(&self, out: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Existing { course, marker } => {
                write!(out, "{marker} {} ({})", course.name, course.slug)
            }
            Self::CreateNew => out.write_str("➕ 创建新课程"),
        }
    }
}

/// Walk one candidate through course, category, and filename selection,
/// then place it and record it on the course page.
///
/// `None` means the file did not make it through, either because the user
/// backed out or a step failed; the cause has already been reported.
fn classify(
    candidate: &Candidate,
    catalog: &mut CourseCatalog,
    layout: &SiteLayout,
    root: &std::path::Path,
) -> Result<Option<Processed>> {
    println!("\n📄 处理文件: {}", candidate.file_name);

    let mut choices: Vec<CourseChoice> = catalog
        .sorted_courses()
        .into_iter()
        .map(|course| CourseChoice::Existing {
            marker: if catalog.has_resources(&course.name) && catalog.has_page(&course.slug) {
                "✅"
            } else {
                "📝"
            },
            course: course.clone(),
        })
        .collect();
    choices.push(CourseChoice::CreateNew);

    let starting_cursor = candidate
        .course_hint
        .as_deref()
        .and_then(|hint| catalog.find(hint))
        .map(|hit| hit.slug.clone())
        .and_then(|slug| {
            choices.iter().position(
                |choice| matches!(choice, CourseChoice::Existing { course, .. } if course.slug == slug),
            )
        })
        .unwrap_or(0);

    let Some(choice) = cancellable(
        Select::new("选择课程:", choices)
            .with_starting_cursor(starting_cursor)
            .prompt(),
    )?
    else {
        return Ok(None);
    };

    let course = match choice {
        CourseChoice::Existing { course, .. } => course,
        CourseChoice::CreateNew => match create_course_dialog(candidate, catalog)? {
            Some(course) => course,
            None => return Ok(None),
        },
    };

    let category_cursor = candidate
        .category_hint
        .and_then(|hint| Category::ALL.iter().position(|category| *category == hint))
        .unwrap_or(0);
    let Some(category) = cancellable(
        Select::new("选择资料类型:", Category::ALL.to_vec())
            .with_starting_cursor(category_cursor)
            .prompt(),
    )?
    else {
        return Ok(None);
    };

    let current_year = OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .year();
    let suggested = material::suggest_filename(candidate, category, current_year);
    let Some(final_name) = cancellable(
        Text::new("确认文件名:")
            .with_initial_value(&suggested)
            .prompt(),
    )?
    else {
        return Ok(None);
    };
    let final_name = final_name.trim();
    if final_name.is_empty() {
        return Ok(None);
    }

    let placed = match staging::place(candidate, layout, root, &course.name, final_name) {
        Ok(placed) => placed,
        Err(reason) => {
            println!("❌ {reason}");
            return Ok(None);
        }
    };
    println!("✅ 文件已移动: {}", placed.site_path);

    if let Err(reason) = update_course_page(catalog, &course, &placed, category) {
        println!("❌ 更新课程页面失败: {reason}");
        return Ok(None);
    }
    println!("✅ 已更新课程页面");

    Ok(Some(Processed {
        candidate: candidate.clone(),
        course,
        category,
        file_name: placed.file_name,
    }))
}

/// Prompt for the details of a brand-new course and create it.
fn create_course_dialog(
    candidate: &Candidate,
    catalog: &mut CourseCatalog,
) -> Result<Option<Course>> {
    let Some(name) = cancellable(
        Text::new("输入课程中文名:")
            .with_initial_value(candidate.course_hint.as_deref().unwrap_or(""))
            .prompt(),
    )?
    else {
        return Ok(None);
    };
    let name = name.trim().to_string();
    if name.is_empty() {
        return Ok(None);
    }

    let slug_validator = |input: &str| {
        let acceptable = !input.trim().is_empty()
            && input
                .trim()
                .chars()
                .all(|symbol| symbol.is_ascii_alphanumeric() || symbol == '_' || symbol == '-');
        if acceptable {
            Ok(Validation::Valid)
        } else {
            Ok(Validation::Invalid(
                "拼音名只能包含字母、数字、下划线和连字符".into(),
            ))
        }
    };
    let Some(slug) = cancellable(
        Text::new("输入课程拼音名（用于URL）:")
            .with_validator(slug_validator)
            .prompt(),
    )?
    else {
        return Ok(None);
    };

    let Some(emoji) = cancellable(
        Text::new("输入课程emoji（可选）:")
            .with_initial_value("📚")
            .prompt(),
    )?
    else {
        return Ok(None);
    };
    let emoji = if emoji.trim().is_empty() {
        "📚"
    } else {
        emoji.trim()
    };

    Ok(Some(catalog.create(&name, slug.trim(), emoji)?))
}

/// Record a placed material on its course page, writing only on change.
fn update_course_page(
    catalog: &CourseCatalog,
    course: &Course,
    placed: &PlacedMaterial,
    category: Category,
) -> Result<()> {
    let page_path = catalog.page_path(&course.slug);
    let mut page: CoursePage = store::read(&page_path)?.parse()?;

    let display_name = placed
        .file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(&placed.file_name)
        .to_string();
    let entry = MaterialEntry::new(display_name, placed.site_path.clone(), category);

    if page.apply_entries([entry])? > 0 {
        store::write_atomic(&page_path, &page.to_string())?;
    } else {
        println!("ℹ️  页面已收录该文件");
    }

    Ok(())
}

fn preview(processed: &[Processed]) {
    println!("\n📋 操作预览:\n");

    let mut grouped: Vec<(&str, Vec<&Processed>)> = Vec::new();
    for item in processed {
        match grouped.iter_mut().find(|(name, _)| *name == item.course.name) {
            Some((_, files)) => files.push(item),
            None => grouped.push((&item.course.name, vec![item])),
        }
    }

    for (course, files) in grouped {
        println!("📘 {course}");
        for item in files {
            println!("   ├─ {} ({})", item.file_name, item.category);
        }
    }
    println!();
}

fn distinct_courses(processed: &[Processed]) -> Vec<String> {
    let mut courses = Vec::new();
    for item in processed {
        if !courses.contains(&item.course.name) {
            courses.push(item.course.name.clone());
        }
    }

    courses
}

/// Branch, stage, commit, and push the submission.
///
/// A staging or commit failure restores the original branch and deletes the
/// throwaway one; a push failure leaves the branch in place so the user can
/// push by hand.
fn commit_and_push(
    workspace: &Workspace,
    layout: &SiteLayout,
    processed: &[Processed],
) -> Result<String> {
    let original_branch = workspace.current_branch()?;
    let courses = distinct_courses(processed);

    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let branch = compose::branch_name(&courses[0], now);
    println!("📌 创建分支: {branch}");
    workspace.create_branch(&branch)?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for item in processed {
        paths.push(layout.material_repo_path(&item.course.name, &item.file_name));
    }
    for item in processed {
        let page = layout.page_repo_path(&item.course.slug);
        if !paths.contains(&page) {
            paths.push(page);
        }
    }
    if layout.nav_path(workspace.root()).is_file() {
        paths.push(layout.nav_repo_path());
    }

    let message = compose::commit_message(&courses, processed.len());
    println!("📝 添加文件到暂存区...");
    println!("💾 提交更改: {message}");

    let committed = workspace
        .stage(&paths)
        .and_then(|()| workspace.commit(&message).map(|_| ()));
    if let Err(reason) = committed {
        println!("❌ {reason}");
        if let Err(restore) = workspace.checkout_branch(&original_branch) {
            warn!("cannot restore branch {original_branch}: {restore}");
        }
        if let Err(cleanup) = workspace.delete_branch(&branch) {
            warn!("cannot delete branch {branch}: {cleanup}");
        }
        bail!("Git 操作失败");
    }

    println!("🚀 推送到远程...");
    if let Err(reason) = workspace.push(&layout.remote, &branch, ProgressBar::new(0)) {
        println!("❌ {reason}");
        println!("💡 请检查是否有权限推送到 {} 远程", layout.remote);
        bail!("推送失败");
    }
    println!("✅ Git操作完成");

    Ok(branch)
}

/// Route and open the pull request.
///
/// `None` means automatic creation is off the table and the manual fallback
/// has already been shown; the condition is terminal, so nothing retries.
fn open_pull_request(
    workspace: &Workspace,
    layout: &SiteLayout,
    branch: &str,
    title: &str,
    body: &str,
) -> Result<Option<String>> {
    let remote_url = workspace.remote_url(&layout.remote)?;
    let Some(origin) = RepoId::from_remote_url(&remote_url) else {
        println!("⚠️  无法从 {remote_url} 解析仓库信息，请手动在平台上创建PR");
        return Ok(None);
    };

    let client = match GhCli::try_new() {
        Ok(client) => client,
        Err(reason) => {
            println!("⚠️  {reason}");
            return Ok(None);
        }
    };

    let topology = match resolve_topology(&client, origin) {
        Ok(topology) => topology,
        Err(reason) => {
            println!("⚠️  {reason}");
            return Ok(None);
        }
    };

    let route = match build_route(&topology, branch, &layout.default_branch) {
        Ok(route) => route,
        Err(PlatformError::NotAFork { origin }) => {
            println!("⚠️  当前仓库不是fork，无法自动创建PR\n");
            println!("请按以下步骤操作：");
            println!("1. 访问 {}/{origin}", layout.platform_base_url);
            println!("2. 点击右上角 'Fork' 按钮创建你的fork");
            println!("3. 将你的更改推送到fork");
            println!("4. 在平台上手动创建Pull Request\n");
            println!("或者直接访问：");
            println!(
                "{}",
                manual_compare_url(
                    &layout.platform_base_url,
                    &origin,
                    &layout.default_branch,
                    branch,
                )
            );
            return Ok(None);
        }
        Err(reason) => return Err(reason.into()),
    };

    println!("📬 创建Pull Request...");
    match client.create_pull_request(&route, title, body) {
        Ok(url) => {
            println!("✅ PR已创建: {url}");
            Ok(Some(url))
        }
        Err(PlatformError::Creation { message }) => {
            println!("❌ 创建PR失败: {message}\n");
            println!("你可以手动创建PR：");
            println!(
                "{}",
                fork_compare_url(
                    &layout.platform_base_url,
                    &route.base,
                    &route.base_branch,
                    &route.head_owner,
                    &route.head_branch,
                )
            );
            Ok(None)
        }
        Err(reason) => Err(reason.into()),
    }
}
