/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: scm/fake.rs
 *
 * An in-process fake `ScmProvider` used for testing, per spec.md §6
 * ("Variants: GitHub ..., and an in-process fake used for testing"). Keeps
 * pull request state in memory keyed by `(owner, repo, source, target)`.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use super::{PullRequestRef, ScmError, ScmProvider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeState {
    Open,
    Merged,
    Closed,
}

#[derive(Debug, Clone)]
struct FakePullRequest {
    id: String,
    state: FakeState,
    title: String,
    description: String,
}

fn key(pr: &PullRequestRef) -> String {
    format!("{}/{}/{}->{}", pr.owner, pr.repo, pr.source_branch, pr.target_branch)
}

/// In-memory fake SCM driver. Tests construct one, optionally seed it with
/// `seed_open`, then exercise a reconciler against it.
pub struct FakeScmProvider {
    next_id: AtomicU64,
    pulls: Mutex<HashMap<String, FakePullRequest>>,
}

impl Default for FakeScmProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeScmProvider {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pulls: Mutex::new(HashMap::new()),
        }
    }

    /// Pre-populates an open PR, as if a prior reconciliation had created it.
    pub fn seed_open(&self, pr: &PullRequestRef, title: &str) -> String {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.pulls.lock().unwrap().insert(
            key(pr),
            FakePullRequest {
                id: id.clone(),
                state: FakeState::Open,
                title: title.to_string(),
                description: String::new(),
            },
        );
        id
    }

    pub fn state_of(&self, pr: &PullRequestRef) -> Option<FakeState> {
        self.pulls.lock().unwrap().get(&key(pr)).map(|p| p.state)
    }

    /// Simulates the provider-side PR vanishing (e.g. deleted out of band).
    pub fn forget(&self, pr: &PullRequestRef) {
        self.pulls.lock().unwrap().remove(&key(pr));
    }
}

#[async_trait]
impl ScmProvider for FakeScmProvider {
    async fn find_open(&self, pr: &PullRequestRef) -> Result<Option<PullRequestRef>, ScmError> {
        let pulls = self.pulls.lock().unwrap();
        Ok(pulls.get(&key(pr)).and_then(|found| {
            (found.state == FakeState::Open).then(|| PullRequestRef {
                id: Some(found.id.clone()),
                ..pr.clone()
            })
        }))
    }

    async fn create(
        &self,
        title: &str,
        description: &str,
        pr: &PullRequestRef,
    ) -> Result<String, ScmError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.pulls.lock().unwrap().insert(
            key(pr),
            FakePullRequest {
                id: id.clone(),
                state: FakeState::Open,
                title: title.to_string(),
                description: description.to_string(),
            },
        );
        Ok(id)
    }

    async fn update(&self, title: &str, description: &str, pr: &PullRequestRef) -> Result<(), ScmError> {
        let mut pulls = self.pulls.lock().unwrap();
        let found = pulls.get_mut(&key(pr)).ok_or(ScmError::NotFound)?;
        found.title = title.to_string();
        found.description = description.to_string();
        Ok(())
    }

    async fn merge(&self, _commit_message: &str, pr: &PullRequestRef) -> Result<(), ScmError> {
        let mut pulls = self.pulls.lock().unwrap();
        let found = pulls.get_mut(&key(pr)).ok_or(ScmError::NotFound)?;
        found.state = FakeState::Merged;
        Ok(())
    }

    async fn close(&self, pr: &PullRequestRef) -> Result<(), ScmError> {
        let mut pulls = self.pulls.lock().unwrap();
        if let Some(found) = pulls.get_mut(&key(pr)) {
            if found.state != FakeState::Merged {
                found.state = FakeState::Closed;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pr_ref() -> PullRequestRef {
        PullRequestRef {
            owner: "acme".to_string(),
            repo: "gitops".to_string(),
            source_branch: "environments/dev-next".to_string(),
            target_branch: "environments/dev".to_string(),
            id: None,
        }
    }

    #[tokio::test]
    async fn create_then_find_open_round_trips() {
        let provider = FakeScmProvider::new();
        let pr = pr_ref();
        let id = provider.create("title", "desc", &pr).await.unwrap();
        let found = provider.find_open(&pr).await.unwrap().unwrap();
        assert_eq!(found.id, Some(id));
    }

    #[tokio::test]
    async fn merge_removes_it_from_find_open() {
        let provider = FakeScmProvider::new();
        let pr = pr_ref();
        provider.create("title", "desc", &pr).await.unwrap();
        provider.merge("merge commit", &pr).await.unwrap();
        assert!(provider.find_open(&pr).await.unwrap().is_none());
        assert_eq!(provider.state_of(&pr), Some(FakeState::Merged));
    }

    #[tokio::test]
    async fn close_is_a_no_op_once_merged() {
        let provider = FakeScmProvider::new();
        let pr = pr_ref();
        provider.create("title", "desc", &pr).await.unwrap();
        provider.merge("merge commit", &pr).await.unwrap();
        provider.close(&pr).await.unwrap();
        assert_eq!(provider.state_of(&pr), Some(FakeState::Merged));
    }

    #[tokio::test]
    async fn forget_simulates_provider_side_deletion() {
        let provider = FakeScmProvider::new();
        let pr = pr_ref();
        provider.create("title", "desc", &pr).await.unwrap();
        provider.forget(&pr);
        assert!(provider.find_open(&pr).await.unwrap().is_none());
    }
}
