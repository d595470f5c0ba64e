/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: scm/github.rs
 *
 * The GitHub driver for the `ScmProvider` contract. Uses a shared
 * `reqwest::Client` for connection pooling, exactly like the teacher
 * repository's own GitHub client (`api_client/src/github_handler.rs`):
 * a bearer token header, an explicit User-Agent (GitHub's API requires
 * one), and JSON (de)serialization via typed request/response structs.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use super::{PullRequestRef, ScmError, ScmProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const USER_AGENT: &str = "promoter-operator";

/// Talks to `github.com` or a GitHub Enterprise Server instance, per the
/// `domain` recorded on the owning `ScmProvider` (spec.md §3/§6).
pub struct GitHubScmProvider {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl GitHubScmProvider {
    pub fn new(domain: &str, token: String) -> Self {
        let base_url = if domain == "github.com" {
            "https://api.github.com".to_string()
        } else {
            format!("https://{domain}/api/v3")
        };
        Self {
            client: reqwest::Client::new(),
            base_url,
            token,
        }
    }

    fn pulls_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/repos/{}/{}/pulls", self.base_url, owner, repo)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(&self.token)
    }
}

#[derive(Deserialize, Debug)]
struct GitHubPullRequest {
    number: u64,
    state: String,
}

#[derive(Serialize)]
struct CreatePullRequestBody<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Serialize)]
struct UpdatePullRequestBody<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Serialize)]
struct ClosePullRequestBody<'a> {
    state: &'a str,
}

#[derive(Serialize)]
struct MergePullRequestBody<'a> {
    commit_message: &'a str,
}

#[async_trait]
impl ScmProvider for GitHubScmProvider {
    async fn find_open(&self, pr: &PullRequestRef) -> Result<Option<PullRequestRef>, ScmError> {
        let url = self.pulls_url(&pr.owner, &pr.repo);
        let head = format!("{}:{}", pr.owner, pr.source_branch);
        let response = self
            .authed(self.client.get(&url))
            .query(&[
                ("head", head.as_str()),
                ("base", pr.target_branch.as_str()),
                ("state", "open"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ScmError::Provider(format!(
                "list pulls failed with status {}",
                response.status()
            )));
        }

        let matches: Vec<GitHubPullRequest> = response.json().await?;
        Ok(matches.into_iter().next().map(|found| PullRequestRef {
            owner: pr.owner.clone(),
            repo: pr.repo.clone(),
            source_branch: pr.source_branch.clone(),
            target_branch: pr.target_branch.clone(),
            id: Some(found.number.to_string()),
        }))
    }

    async fn create(
        &self,
        title: &str,
        description: &str,
        pr: &PullRequestRef,
    ) -> Result<String, ScmError> {
        let url = self.pulls_url(&pr.owner, &pr.repo);
        let body = CreatePullRequestBody {
            title,
            body: description,
            head: &pr.source_branch,
            base: &pr.target_branch,
        };
        let response = self.authed(self.client.post(&url)).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(ScmError::Provider(format!(
                "create pull failed with status {}",
                response.status()
            )));
        }
        let created: GitHubPullRequest = response.json().await?;
        Ok(created.number.to_string())
    }

    async fn update(&self, title: &str, description: &str, pr: &PullRequestRef) -> Result<(), ScmError> {
        let id = pr.id.as_ref().ok_or(ScmError::NotFound)?;
        let url = format!("{}/{}", self.pulls_url(&pr.owner, &pr.repo), id);
        let body = UpdatePullRequestBody {
            title,
            body: description,
        };
        let response = self.authed(self.client.patch(&url)).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(ScmError::Provider(format!(
                "update pull failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn merge(&self, commit_message: &str, pr: &PullRequestRef) -> Result<(), ScmError> {
        let id = pr.id.as_ref().ok_or(ScmError::NotFound)?;
        let url = format!("{}/{}/merge", self.pulls_url(&pr.owner, &pr.repo), id);
        let body = MergePullRequestBody { commit_message };
        let response = self.authed(self.client.put(&url)).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(ScmError::Provider(format!(
                "merge pull failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn close(&self, pr: &PullRequestRef) -> Result<(), ScmError> {
        let Some(id) = pr.id.as_ref() else {
            return Ok(());
        };
        let url = format!("{}/{}", self.pulls_url(&pr.owner, &pr.repo), id);
        let body = ClosePullRequestBody { state: "closed" };
        let response = self.authed(self.client.patch(&url)).json(&body).send().await?;
        if !response.status().is_success() && response.status().as_u16() != 404 {
            return Err(ScmError::Provider(format!(
                "close pull failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
