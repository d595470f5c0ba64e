/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: scm/mod.rs
 *
 * The SCM provider driver contract (spec.md §6). Internal dispatch for a
 * given variant lives in `github.rs` / `fake.rs`; this module only defines
 * the provider-agnostic trait and the value types reconcilers pass across
 * it, following the `ApiProvider` trait shape from
 * `examples/phkaiser13-PeitchGIT/src/modules/api_client/src/github_handler.rs`
 * (same upstream repository as the teacher operator).
 *
 * SPDX-License-Identifier: Apache-2.0
 */

pub mod fake;
pub mod github;
pub mod registry;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScmError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("scm provider returned an error: {0}")]
    Provider(String),

    #[error("pull request not found")]
    NotFound,
}

/// A provider-agnostic reference to one pull request. `id` is the
/// provider-assigned identifier once the PR has been created.
#[derive(Debug, Clone)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub source_branch: String,
    pub target_branch: String,
    pub id: Option<String>,
}

/// The driver contract every SCM provider variant implements (spec.md §6):
/// `FindOpen`, `Create`, `Update`, `Merge`, `Close`.
#[async_trait]
pub trait ScmProvider: Send + Sync {
    /// Looks up an already-open PR matching `pr`'s source/target branches.
    async fn find_open(&self, pr: &PullRequestRef) -> Result<Option<PullRequestRef>, ScmError>;

    /// Opens a new PR, returning the provider-assigned id.
    async fn create(
        &self,
        title: &str,
        description: &str,
        pr: &PullRequestRef,
    ) -> Result<String, ScmError>;

    /// Updates title/description on an existing PR.
    async fn update(&self, title: &str, description: &str, pr: &PullRequestRef) -> Result<(), ScmError>;

    /// Merges an open PR.
    async fn merge(&self, commit_message: &str, pr: &PullRequestRef) -> Result<(), ScmError>;

    /// Closes a PR without merging. A no-op if already merged.
    async fn close(&self, pr: &PullRequestRef) -> Result<(), ScmError>;
}
