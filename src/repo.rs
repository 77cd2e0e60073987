// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Local git workspace operations.
//!
//! Everything the submission flow needs from the working copy: a throwaway
//! contribution branch, staging and committing the placed files, and an
//! authenticated push of the branch to the user's remote. All operations go
//! through libgit2; authentication for the push reuses whatever credential
//! machinery the user's git setup already has, prompting interactively only
//! when that machinery asks for input.
//!
//! The workspace assumes exclusive ownership of the working copy for the
//! duration of one invocation. Nothing here locks against a second
//! concurrent run.

use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    build::CheckoutBuilder, BranchType, Oid, PushOptions, RemoteCallbacks, Repository,
};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Handle on the local clone of the content repository.
pub struct Workspace {
    repository: Repository,
    root: PathBuf,
}

impl Workspace {
    /// Open the repository containing `path`.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::Git2`] if no repository contains the path.
    /// - Return [`RepoError::Bare`] if the repository has no working tree.
    pub fn discover(path: impl AsRef<Path>) -> Result<Self> {
        let repository = Repository::discover(path.as_ref())?;
        let root = repository
            .workdir()
            .ok_or(RepoError::Bare)?
            .to_path_buf();

        Ok(Self { repository, root })
    }

    /// Top-level directory of the working tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of the branch HEAD points at.
    pub fn current_branch(&self) -> Result<String> {
        let head = self.repository.head()?;
        head.shorthand()
            .map(ToString::to_string)
            .ok_or(RepoError::UnnamedHead)
    }

    pub fn branch_exists(&self, name: &str) -> bool {
        self.repository.find_branch(name, BranchType::Local).is_ok()
    }

    /// Create a branch at HEAD and switch to it.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::BranchExists`] if the name is taken.
    #[instrument(skip(self), level = "debug")]
    pub fn create_branch(&self, name: &str) -> Result<()> {
        if self.branch_exists(name) {
            return Err(RepoError::BranchExists {
                name: name.to_string(),
            });
        }

        let head = self.repository.head()?.peel_to_commit()?;
        self.repository.branch(name, &head, false)?;
        info!("created branch {name}");

        self.checkout_branch(name)
    }

    /// Switch HEAD to an existing branch.
    pub fn checkout_branch(&self, name: &str) -> Result<()> {
        self.repository.set_head(&format!("refs/heads/{name}"))?;
        self.repository
            .checkout_head(Some(CheckoutBuilder::new().safe()))?;
        debug!("checked out {name}");

        Ok(())
    }

    /// Delete a local branch.
    pub fn delete_branch(&self, name: &str) -> Result<()> {
        let mut branch = self.repository.find_branch(name, BranchType::Local)?;
        branch.delete()?;
        debug!("deleted branch {name}");

        Ok(())
    }

    /// Stage working-tree paths, relative to the repository root.
    #[instrument(skip(self, paths), level = "debug")]
    pub fn stage(&self, paths: impl IntoIterator<Item = impl AsRef<Path>>) -> Result<()> {
        let mut index = self.repository.index()?;
        for path in paths {
            debug!("stage {:?}", path.as_ref().display());
            index.add_path(path.as_ref())?;
        }
        index.write()?;

        Ok(())
    }

    /// Commit the index onto HEAD.
    pub fn commit(&self, message: &str) -> Result<Oid> {
        let mut index = self.repository.index()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repository.find_tree(tree_oid)?;
        let signature = self.repository.signature()?;

        // INVARIANT: Always determine latest parent commits to append to.
        let mut parents = Vec::new();
        if let Some(target) = self.repository.head().ok().and_then(|head| head.target()) {
            parents.push(self.repository.find_commit(target)?);
        }
        let parents: Vec<&git2::Commit<'_>> = parents.iter().collect();

        let oid = self.repository.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;
        info!("created commit {oid}");

        Ok(oid)
    }

    /// URL of a configured remote.
    pub fn remote_url(&self, name: &str) -> Result<String> {
        let remote = self.repository.find_remote(name)?;
        remote
            .url()
            .map(ToString::to_string)
            .ok_or(RepoError::RemoteUrlNotUtf8)
    }

    /// Push a branch to a remote, reporting progress on the given bar.
    ///
    /// If any credentials are required for the push to continue, then the
    /// user will be prompted for that information accordingly. The progress
    /// bar will be blocked for user input.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::Git2`] if libgit2 operations fail, including a
    ///   per-reference rejection reported by the remote.
    #[instrument(skip(self, bar), level = "debug")]
    pub fn push(&self, remote_name: &str, branch: &str, bar: ProgressBar) -> Result<()> {
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        bar.set_style(style);
        bar.set_message(format!("{remote_name}/{branch}"));
        bar.enable_steady_tick(std::time::Duration::from_millis(100));

        let prompter = BarPrompter::new(bar.clone());
        let authenticator = GitAuthenticator::default().set_prompter(prompter);
        let config = self.repository.config()?;

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(authenticator.credentials(&config));
        let progress_bar = bar.clone();
        callbacks.push_transfer_progress(move |current, total, _bytes| {
            if total > 0 {
                progress_bar.set_length(total as u64);
                progress_bar.set_position(current as u64);
            }
        });
        callbacks.push_update_reference(|refname, status| match status {
            Some(message) => Err(git2::Error::from_str(
                format!("{refname} was rejected: {message}").as_str(),
            )),
            None => Ok(()),
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);

        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        let mut remote = self.repository.find_remote(remote_name)?;
        remote.push(&[refspec.as_str()], Some(&mut options))?;
        bar.finish_and_clear();
        info!("pushed {branch} to {remote_name}");

        // Record the upstream so later git tooling lines up with the push.
        match self.repository.find_branch(branch, BranchType::Local) {
            Ok(mut local) => {
                if let Err(error) = local.set_upstream(Some(&format!("{remote_name}/{branch}"))) {
                    warn!("cannot record upstream tracking branch: {error}");
                }
            }
            Err(error) => warn!("cannot record upstream tracking branch: {error}"),
        }

        Ok(())
    }
}

/// Git2 authentication prompter that suspends a progress bar.
#[derive(Debug, Clone)]
struct BarPrompter {
    bar: ProgressBar,
}

impl BarPrompter {
    fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for BarPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().unwrap();
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .unwrap();
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .unwrap();
            Some(password)
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .unwrap();
            Some(password)
        })
    }
}

/// Git workspace error types.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Repository has no working tree to operate on.
    #[error("repository has no working tree")]
    Bare,

    /// HEAD is detached or otherwise unnamed.
    #[error("HEAD does not point at a named branch")]
    UnnamedHead,

    /// Contribution branch name is already taken.
    #[error("branch {name} already exists")]
    BranchExists { name: String },

    /// Remote URL is unusable.
    #[error("remote URL is not valid UTF-8")]
    RemoteUrlNotUtf8,

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
type Result<T, E = RepoError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use git2::RepositoryInitOptions;
    use pretty_assertions::assert_eq;

    fn fixture(path: &Path) -> anyhow::Result<Workspace> {
        let mut options = RepositoryInitOptions::new();
        options.initial_head("master");
        let repository = Repository::init_opts(path, &options)?;

        // INVARIANT: Always provide valid name and email.
        //   - Git will complain if this is not set in CI/CD environments.
        let mut config = repository.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;

        Ok(Workspace::discover(path)?)
    }

    fn seed_commit(workspace: &Workspace, file: &str, contents: &str) -> anyhow::Result<Oid> {
        std::fs::write(workspace.root().join(file), contents)?;
        workspace.stage([file])?;
        Ok(workspace.commit(&format!("add {file}"))?)
    }

    #[test]
    fn stages_and_commits_onto_head() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let workspace = fixture(dir.path())?;

        seed_commit(&workspace, "a.txt", "first")?;
        assert_eq!(workspace.current_branch()?, "master");

        let second = seed_commit(&workspace, "b.txt", "second")?;
        let head = workspace.repository.head()?.target().unwrap();
        assert_eq!(head, second);

        Ok(())
    }

    #[test]
    fn branch_lifecycle() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let workspace = fixture(dir.path())?;
        seed_commit(&workspace, "a.txt", "first")?;

        workspace.create_branch("add/数学分析B-20260120-143233")?;
        assert_eq!(workspace.current_branch()?, "add/数学分析B-20260120-143233");
        assert!(workspace.branch_exists("add/数学分析B-20260120-143233"));

        let clash = workspace.create_branch("add/数学分析B-20260120-143233");
        assert!(matches!(clash, Err(RepoError::BranchExists { .. })));

        workspace.checkout_branch("master")?;
        workspace.delete_branch("add/数学分析B-20260120-143233")?;
        assert!(!workspace.branch_exists("add/数学分析B-20260120-143233"));

        Ok(())
    }

    #[test]
    fn reads_back_the_remote_url() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let workspace = fixture(dir.path())?;
        workspace
            .repository
            .remote("origin", "https://github.com/Kevin589981/FDU-Sharing.git")?;

        assert_eq!(
            workspace.remote_url("origin")?,
            "https://github.com/Kevin589981/FDU-Sharing.git"
        );
        assert!(workspace.remote_url("upstream").is_err());

        Ok(())
    }

    #[test]
    fn pushes_a_branch_to_a_local_remote() -> anyhow::Result<()> {
        let work = tempfile::tempdir()?;
        let bare = tempfile::tempdir()?;
        Repository::init_bare(bare.path())?;

        let workspace = fixture(work.path())?;
        seed_commit(&workspace, "a.txt", "first")?;
        workspace.create_branch("add/test")?;

        workspace
            .repository
            .remote("origin", bare.path().to_string_lossy().as_ref())?;
        workspace.push("origin", "add/test", ProgressBar::hidden())?;

        let mirror = Repository::open_bare(bare.path())?;
        assert!(mirror
            .find_reference("refs/heads/add/test")
            .is_ok_and(|reference| reference.target().is_some()));

        Ok(())
    }
}
