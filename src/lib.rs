// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shareup library internals.
//!
//! Shareup automates contributing course materials to a shared content
//! repository: staged files are classified interactively, renamed to the
//! site's naming convention, placed into the content tree, recorded on the
//! per-course pages, and shipped as a pull request from the user's fork to
//! the shared upstream.
//!
//! The interactive flow lives in the binary; this library holds everything
//! the flow orchestrates. The two load-bearing pieces are [`platform`]
//! (fork/upstream topology resolution and pull request routing) and
//! [`page`] (structural course page editing). The rest is the supporting
//! cast: configuration, staging, the course catalog, git plumbing, and text
//! composition.

pub mod catalog;
pub mod compose;
pub mod config;
pub mod material;
pub mod page;
pub mod platform;
pub mod repo;
pub mod staging;
pub mod store;

pub use catalog::{Course, CourseCatalog};
pub use config::SiteLayout;
pub use material::{Candidate, Category, MaterialEntry};
pub use page::CoursePage;
pub use platform::{
    build_route, fork_compare_url, manual_compare_url, resolve_topology, GhCli, PlatformClient,
    PlatformError, PullRequestRoute, RepoId, RepositoryTopology,
};
pub use repo::Workspace;
