// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository topology resolution and pull request routing.
//!
//! Contributions flow through a fork: the user pushes a branch to their own
//! copy of the content repository, and the pull request is opened against
//! the shared upstream. Opening a pull request therefore needs a __route__,
//! the (base repository, base branch) × (head owner, head branch) pair. The
//! single recurring failure this module exists to prevent is routing a pull
//! request at the same repository on both sides: the platform rejects a
//! same-repository pull request whose target branch is a strict ancestor of
//! the source branch, which is always the case for a branch this tool just
//! created. So the fork/upstream __topology__ is resolved up front, before
//! any creation attempt, never as error recovery after one.
//!
//! # Topology
//!
//! [`RepositoryTopology`] is resolved once per run from the hosting
//! platform's metadata and stays immutable: either the local clone's origin
//! is a [fork](RepositoryTopology::Fork) with a known upstream parent, or it
//! is [standalone](RepositoryTopology::Standalone). Only a fork yields a
//! route; a standalone origin is a terminal condition for automatic
//! creation, answered with fork instructions and a manually constructed
//! comparison URL instead of a retry.
//!
//! # Platform Access
//!
//! All platform queries go through the [`PlatformClient`] capability so the
//! resolver never reads ambient process state, and tests can substitute a
//! fake. The production implementation is [`GhCli`], a thin wrapper over the
//! authenticated GitHub CLI.

use serde::Deserialize;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    process::{Command, Output},
};
use tracing::{debug, info, instrument};

/// Identity of one repository on the hosting platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    /// Owning user or organization.
    pub owner: String,

    /// Repository name without the owner prefix.
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse the owner/name pair out of a git remote URL.
    ///
    /// Understands the https and scp-like ssh forms GitHub hands out, with
    /// or without the trailing ".git".
    pub fn from_remote_url(url: &str) -> Option<Self> {
        let rest = url
            .strip_prefix("https://github.com/")
            .or_else(|| url.strip_prefix("git@github.com:"))?;

        let rest = rest.strip_suffix(".git").unwrap_or(rest);
        let (owner, name) = rest.split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }

        Some(Self::new(owner, name))
    }
}

impl Display for RepoId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}/{}", self.owner, self.name)
    }
}

/// Fork relationship of the local clone's origin, resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryTopology {
    /// Origin is a fork of a known upstream parent.
    Fork { origin: RepoId, upstream: RepoId },

    /// Origin has no upstream parent to route a pull request at.
    Standalone { origin: RepoId },
}

impl RepositoryTopology {
    pub fn origin(&self) -> &RepoId {
        match self {
            Self::Fork { origin, .. } | Self::Standalone { origin } => origin,
        }
    }
}

/// Resolved pull request route.
///
/// Only constructible from a fork topology, so the base and head sides are
/// guaranteed to name different repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRoute {
    /// Repository the pull request is opened against.
    pub base: RepoId,

    /// Branch on the base repository to merge into.
    pub base_branch: String,

    /// Owner of the fork holding the contribution branch.
    pub head_owner: String,

    /// Contribution branch on the fork.
    pub head_branch: String,
}

/// Access to the hosting platform's metadata and pull request API.
///
/// Implementations are assumed to already be authenticated; credential
/// management is out of scope here.
pub trait PlatformClient {
    /// Whether the repository is a platform-level fork.
    fn query_is_fork(&self, repo: &RepoId) -> Result<bool>;

    /// Upstream parent of the repository, when it has one.
    fn query_upstream(&self, repo: &RepoId) -> Result<Option<RepoId>>;

    /// Open a pull request along the given route, returning its URL.
    ///
    /// # Errors
    ///
    /// - Return [`PlatformError::Creation`] carrying the platform's raw
    ///   message when the pull request is rejected. The condition is
    ///   terminal for this route; callers fall back to a manual link
    ///   instead of retrying.
    fn create_pull_request(
        &self,
        route: &PullRequestRoute,
        title: &str,
        body: &str,
    ) -> Result<String>;
}

/// Determine the fork/upstream topology of `origin`.
///
/// # Errors
///
/// - Return [`PlatformError::Query`] if a platform query fails, or if the
///   platform reports a fork whose parent it cannot name.
pub fn resolve_topology(
    client: &impl PlatformClient,
    origin: RepoId,
) -> Result<RepositoryTopology> {
    if !client.query_is_fork(&origin)? {
        debug!("{origin} is not a fork");
        return Ok(RepositoryTopology::Standalone { origin });
    }

    match client.query_upstream(&origin)? {
        Some(upstream) => {
            debug!("{origin} forks {upstream}");
            Ok(RepositoryTopology::Fork { origin, upstream })
        }
        None => Err(PlatformError::Query {
            reason: format!("{origin} reports as a fork, but its parent repository is unknown"),
        }),
    }
}

/// Build the pull request route for a contribution branch.
///
/// The base side is the upstream repository at `base_branch`; the head side
/// is the fork owner's `local_branch`.
///
/// # Errors
///
/// - Return [`PlatformError::NotAFork`] if the topology is standalone. The
///   condition is terminal for automatic creation: callers must present
///   fork instructions plus a manual comparison URL, never retry.
pub fn build_route(
    topology: &RepositoryTopology,
    local_branch: &str,
    base_branch: &str,
) -> Result<PullRequestRoute> {
    match topology {
        RepositoryTopology::Fork { origin, upstream } => Ok(PullRequestRoute {
            base: upstream.clone(),
            base_branch: base_branch.to_string(),
            head_owner: origin.owner.clone(),
            head_branch: local_branch.to_string(),
        }),
        RepositoryTopology::Standalone { origin } => Err(PlatformError::NotAFork {
            origin: origin.clone(),
        }),
    }
}

/// Comparison URL for manually opening a pull request on a repository.
pub fn manual_compare_url(base_url: &str, repo: &RepoId, base_branch: &str, branch: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/{repo}/compare/{base_branch}...{branch}")
}

/// Comparison URL for manually opening a cross-fork pull request.
pub fn fork_compare_url(
    base_url: &str,
    upstream: &RepoId,
    base_branch: &str,
    head_owner: &str,
    branch: &str,
) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/{upstream}/compare/{base_branch}...{head_owner}:{branch}")
}

/// Platform access through the GitHub CLI.
#[derive(Debug, Default)]
pub struct GhCli;

impl GhCli {
    /// Construct a client, verifying the CLI is installed and authenticated.
    ///
    /// # Errors
    ///
    /// - Return [`PlatformError::CliMissing`] if `gh` cannot be spawned.
    /// - Return [`PlatformError::Unauthenticated`] if `gh auth status`
    ///   reports no usable login.
    pub fn try_new() -> Result<Self> {
        gh_output(["--version"])?;

        let status = gh_output(["auth", "status"])?;
        if !status.status.success() {
            return Err(PlatformError::Unauthenticated);
        }

        Ok(Self)
    }
}

impl PlatformClient for GhCli {
    #[instrument(skip(self), level = "debug")]
    fn query_is_fork(&self, repo: &RepoId) -> Result<bool> {
        let target = repo.to_string();
        let raw = gh(["repo", "view", target.as_str(), "--json", "isFork"])?;
        let view: RepoView = serde_json::from_str(&raw).map_err(|err| PlatformError::Query {
            reason: format!("unexpected repository metadata: {err}"),
        })?;

        Ok(view.is_fork)
    }

    #[instrument(skip(self), level = "debug")]
    fn query_upstream(&self, repo: &RepoId) -> Result<Option<RepoId>> {
        let target = repo.to_string();
        let raw = gh(["repo", "view", target.as_str(), "--json", "parent"])?;
        let view: RepoView = serde_json::from_str(&raw).map_err(|err| PlatformError::Query {
            reason: format!("unexpected repository metadata: {err}"),
        })?;

        Ok(view
            .parent
            .map(|parent| RepoId::new(parent.owner.login, parent.name)))
    }

    #[instrument(skip(self, title, body), level = "debug")]
    fn create_pull_request(
        &self,
        route: &PullRequestRoute,
        title: &str,
        body: &str,
    ) -> Result<String> {
        let base_repo = route.base.to_string();
        let head = format!("{}:{}", route.head_owner, route.head_branch);
        info!("open pull request {head} -> {base_repo}:{}", route.base_branch);

        let output = gh_output([
            "pr",
            "create",
            "--repo",
            base_repo.as_str(),
            "--base",
            route.base_branch.as_str(),
            "--head",
            head.as_str(),
            "--title",
            title,
            "--body",
            body,
        ])?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(PlatformError::Creation {
                message: if stderr.is_empty() { stdout } else { stderr },
            });
        }

        // INVARIANT: The CLI prints the new pull request URL last.
        let url = stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or_default()
            .trim()
            .to_string();

        Ok(url)
    }
}

/// Repository metadata slice returned by `gh repo view --json`.
#[derive(Debug, Deserialize)]
struct RepoView {
    #[serde(rename = "isFork", default)]
    is_fork: bool,

    #[serde(default)]
    parent: Option<RepoParent>,
}

#[derive(Debug, Deserialize)]
struct RepoParent {
    name: String,
    owner: RepoOwner,
}

#[derive(Debug, Deserialize)]
struct RepoOwner {
    login: String,
}

fn gh_output(args: impl IntoIterator<Item = impl AsRef<std::ffi::OsStr>>) -> Result<Output> {
    Command::new("gh")
        .args(args)
        .output()
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => PlatformError::CliMissing,
            _ => PlatformError::Query {
                reason: err.to_string(),
            },
        })
}

fn gh(args: impl IntoIterator<Item = impl AsRef<std::ffi::OsStr>>) -> Result<String> {
    let output = gh_output(args)?;
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
        return Err(PlatformError::Query {
            reason: if stderr.is_empty() { stdout } else { stderr },
        });
    }

    Ok(stdout)
}

/// Platform interaction error types.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The GitHub CLI is not installed.
    #[error("GitHub CLI (gh) is not installed, see https://cli.github.com")]
    CliMissing,

    /// The GitHub CLI has no usable login.
    #[error("GitHub CLI is not authenticated, run `gh auth login` first")]
    Unauthenticated,

    /// A metadata query failed.
    #[error("platform query failed: {reason}")]
    Query { reason: String },

    /// The origin repository has no upstream to route a pull request at.
    #[error("{origin} is not a fork, cannot route a pull request automatically")]
    NotAFork { origin: RepoId },

    /// The platform rejected the pull request.
    #[error("pull request creation was rejected: {message}")]
    Creation { message: String },
}

/// Friendly result alias :3
type Result<T, E = PlatformError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    struct FakePlatform {
        is_fork: bool,
        upstream: Option<RepoId>,
    }

    impl PlatformClient for FakePlatform {
        fn query_is_fork(&self, _repo: &RepoId) -> Result<bool> {
            Ok(self.is_fork)
        }

        fn query_upstream(&self, _repo: &RepoId) -> Result<Option<RepoId>> {
            Ok(self.upstream.clone())
        }

        fn create_pull_request(
            &self,
            _route: &PullRequestRoute,
            _title: &str,
            _body: &str,
        ) -> Result<String> {
            Err(PlatformError::Creation {
                message: "No commits between master and master".to_string(),
            })
        }
    }

    #[test_case(
        "https://github.com/victkk/FDU-Sharing.git",
        Some(("victkk", "FDU-Sharing"));
        "https with git suffix"
    )]
    #[test_case(
        "https://github.com/victkk/FDU-Sharing",
        Some(("victkk", "FDU-Sharing"));
        "https without git suffix"
    )]
    #[test_case(
        "git@github.com:Kevin589981/FDU-Sharing.git",
        Some(("Kevin589981", "FDU-Sharing"));
        "scp like ssh"
    )]
    #[test_case("https://gitlab.com/owner/repo.git", None; "foreign host")]
    #[test_case("https://github.com/lonely", None; "missing name")]
    #[test]
    fn parses_remote_urls(url: &str, expect: Option<(&str, &str)>) {
        let expect = expect.map(|(owner, name)| RepoId::new(owner, name));
        assert_eq!(RepoId::from_remote_url(url), expect);
    }

    #[test]
    fn resolves_fork_topology() -> anyhow::Result<()> {
        let client = FakePlatform {
            is_fork: true,
            upstream: Some(RepoId::new("victkk", "FDU-Sharing")),
        };

        let result = resolve_topology(&client, RepoId::new("Kevin589981", "FDU-Sharing"))?;
        assert_eq!(
            result,
            RepositoryTopology::Fork {
                origin: RepoId::new("Kevin589981", "FDU-Sharing"),
                upstream: RepoId::new("victkk", "FDU-Sharing"),
            }
        );

        Ok(())
    }

    #[test]
    fn resolves_standalone_topology() -> anyhow::Result<()> {
        let client = FakePlatform {
            is_fork: false,
            upstream: None,
        };

        let result = resolve_topology(&client, RepoId::new("victkk", "FDU-Sharing"))?;
        assert_eq!(
            result,
            RepositoryTopology::Standalone {
                origin: RepoId::new("victkk", "FDU-Sharing"),
            }
        );

        Ok(())
    }

    #[test]
    fn fork_without_known_parent_is_a_query_failure() {
        let client = FakePlatform {
            is_fork: true,
            upstream: None,
        };

        let result = resolve_topology(&client, RepoId::new("Kevin589981", "FDU-Sharing"));
        assert!(matches!(result, Err(PlatformError::Query { .. })));
    }

    #[test]
    fn routes_fork_at_upstream() -> anyhow::Result<()> {
        let topology = RepositoryTopology::Fork {
            origin: RepoId::new("Kevin589981", "FDU-Sharing"),
            upstream: RepoId::new("victkk", "FDU-Sharing"),
        };

        let route = build_route(&topology, "add/数学分析B-20260120-143233", "master")?;
        assert_eq!(
            route,
            PullRequestRoute {
                base: RepoId::new("victkk", "FDU-Sharing"),
                base_branch: "master".to_string(),
                head_owner: "Kevin589981".to_string(),
                head_branch: "add/数学分析B-20260120-143233".to_string(),
            }
        );

        Ok(())
    }

    #[test]
    fn standalone_origin_never_yields_a_route() {
        let topology = RepositoryTopology::Standalone {
            origin: RepoId::new("victkk", "FDU-Sharing"),
        };

        for branch in ["add/数学分析B-20260120-143233", "main", "任意分支"] {
            let result = build_route(&topology, branch, "master");
            assert!(matches!(result, Err(PlatformError::NotAFork { .. })));
        }
    }

    #[test]
    fn manual_compare_url_matches_platform_form() {
        let url = manual_compare_url(
            "https://github.com",
            &RepoId::new("victkk", "FDU-Sharing"),
            "master",
            "add/数学分析B-20260120-143233",
        );
        assert_eq!(
            url,
            "https://github.com/victkk/FDU-Sharing/compare/master...add/数学分析B-20260120-143233"
        );
    }

    #[test]
    fn fork_compare_url_names_the_head_owner() {
        let url = fork_compare_url(
            "https://github.com/",
            &RepoId::new("victkk", "FDU-Sharing"),
            "master",
            "Kevin589981",
            "add/数学分析B-20260120-143233",
        );
        assert_eq!(
            url,
            "https://github.com/victkk/FDU-Sharing/compare/master...Kevin589981:add/数学分析B-20260120-143233"
        );
    }

    #[test]
    fn rejected_creation_surfaces_raw_message() {
        let client = FakePlatform {
            is_fork: true,
            upstream: Some(RepoId::new("victkk", "FDU-Sharing")),
        };
        let route = PullRequestRoute {
            base: RepoId::new("victkk", "FDU-Sharing"),
            base_branch: "master".to_string(),
            head_owner: "Kevin589981".to_string(),
            head_branch: "add/test".to_string(),
        };

        let result = client.create_pull_request(&route, "标题", "正文");
        assert!(matches!(
            result,
            Err(PlatformError::Creation { message }) if message.contains("No commits")
        ));
    }
}
