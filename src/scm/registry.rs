/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: scm/registry.rs
 *
 * Resolves the `ScmProvider` driver for a `GitRepository` reference
 * (spec.md §3/§6: GitRepository binds owner/name to an ScmProvider, which
 * in turn names a driver variant and a credential Secret). Instances are
 * cached per `(namespace, ScmProvider name)` so repeated reconciliations
 * reuse the same `reqwest::Client` connection pool and the same in-memory
 * `FakeScmProvider` state.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use super::{fake::FakeScmProvider, github::GitHubScmProvider, PullRequestRef, ScmProvider};
use crate::crds::{GitRepository, ScmProvider as ScmProviderResource};
use k8s_openapi::ByteString;
use kube::api::Api;
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),

    #[error("GitRepository '{0}' has no matching ScmProvider")]
    MissingProviderVariant(String),

    #[error("Secret '{0}' has no 'token' key")]
    MissingTokenKey(String),
}

/// A resolved repository: the driver plus the `owner/name` to address it
/// with, bundled so callers don't need to re-fetch `GitRepository`.
pub struct ResolvedRepository {
    pub provider: Arc<dyn ScmProvider>,
    pub owner: String,
    pub name: String,
}

#[derive(Default)]
pub struct ScmProviderRegistry {
    cache: Mutex<HashMap<String, Arc<dyn ScmProvider>>>,
}

impl ScmProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn resolve(
        &self,
        client: &Client,
        namespace: &str,
        git_repository_name: &str,
    ) -> Result<ResolvedRepository, ResolveError> {
        let repos: Api<GitRepository> = Api::namespaced(client.clone(), namespace);
        let repo = repos.get(git_repository_name).await?;

        let cache_key = format!("{namespace}/{}", repo.spec.scm_provider_ref.name);
        if let Some(provider) = self.cache.lock().unwrap().get(&cache_key).cloned() {
            return Ok(ResolvedRepository {
                provider,
                owner: repo.spec.owner,
                name: repo.spec.name,
            });
        }

        let providers: Api<ScmProviderResource> = Api::namespaced(client.clone(), namespace);
        let provider_resource = providers.get(&repo.spec.scm_provider_ref.name).await?;

        let provider: Arc<dyn ScmProvider> = if let Some(github) = &provider_resource.spec.github {
            let token = fetch_secret_token(client, namespace, &github.secret_ref.name).await?;
            Arc::new(GitHubScmProvider::new(&github.domain, token))
        } else if provider_resource.spec.fake.is_some() {
            Arc::new(FakeScmProvider::new())
        } else {
            return Err(ResolveError::MissingProviderVariant(
                repo.spec.scm_provider_ref.name.clone(),
            ));
        };

        self.cache.lock().unwrap().insert(cache_key, provider.clone());
        Ok(ResolvedRepository {
            provider,
            owner: repo.spec.owner,
            name: repo.spec.name,
        })
    }
}

async fn fetch_secret_token(client: &Client, namespace: &str, secret_name: &str) -> Result<String, ResolveError> {
    let secrets: Api<k8s_openapi::api::core::v1::Secret> = Api::namespaced(client.clone(), namespace);
    let secret = secrets.get(secret_name).await?;
    let ByteString(bytes) = secret
        .data
        .as_ref()
        .and_then(|data| data.get("token"))
        .cloned()
        .ok_or_else(|| ResolveError::MissingTokenKey(secret_name.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Builds a `PullRequestRef` from a repository and the PullRequest spec's
/// branches — a small convenience shared by the PullRequest/CommitStatus
/// reconcilers.
pub fn pull_request_ref(resolved: &ResolvedRepository, source_branch: &str, target_branch: &str) -> PullRequestRef {
    PullRequestRef {
        owner: resolved.owner.clone(),
        repo: resolved.name.clone(),
        source_branch: source_branch.to_string(),
        target_branch: target_branch.to_string(),
        id: None,
    }
}
