/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: pull_request_controller.rs
 *
 * Converges one `PullRequest` record's observed `status.state` toward its
 * desired `spec.state` against an SCM provider (spec.md §4.3). Uses the
 * `kube::runtime::finalizer` helper the same way the teacher's
 * `preview_controller.rs` does, so the provider-side PR is closed before
 * the record is allowed to disappear.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::crds::{PullRequest, PullRequestState, PullRequestStatus, PULL_REQUEST_FINALIZER};
use crate::scm::registry::pull_request_ref;
use crate::scm::ScmError;
use crate::Context;
use chrono::Utc;
use kube::{
    api::{Api, Patch, PatchParams},
    runtime::{
        controller::Action,
        finalizer::{finalizer, Error as FinalizerError, Event as FinalizerEvent},
    },
    Error as KubeError, Resource, ResourceExt,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PullRequestError {
    #[error("kubernetes api error: {0}")]
    Kube(#[from] KubeError),

    #[error("finalizer error: {0}")]
    Finalizer(Box<FinalizerError<PullRequestError>>),

    #[error("scm provider error: {0}")]
    Scm(#[from] ScmError),

    #[error("scm provider resolution failed: {0}")]
    Resolve(#[from] crate::scm::registry::ResolveError),

    #[error("PullRequest has no namespace")]
    MissingNamespace,
}

pub async fn reconcile(pr: Arc<PullRequest>, ctx: Arc<Context>) -> Result<Action, PullRequestError> {
    let ns = pr.namespace().ok_or(PullRequestError::MissingNamespace)?;
    let api: Api<PullRequest> = Api::namespaced(ctx.client.clone(), &ns);

    finalizer(&api, PULL_REQUEST_FINALIZER, pr, |event| async {
        match event {
            FinalizerEvent::Apply(pr) => apply(pr, ctx.clone()).await,
            FinalizerEvent::Cleanup(pr) => cleanup(pr, ctx.clone()).await,
        }
    })
    .await
    .map_err(|err| PullRequestError::Finalizer(Box::new(err)))
}

async fn apply(pr: Arc<PullRequest>, ctx: Arc<Context>) -> Result<Action, PullRequestError> {
    let ns = pr.namespace().ok_or(PullRequestError::MissingNamespace)?;
    let api: Api<PullRequest> = Api::namespaced(ctx.client.clone(), &ns);

    let resolved = ctx
        .scm_registry
        .resolve(&ctx.client, &ns, &pr.spec.git_repository_ref.name)
        .await?;

    let mut scm_ref = pull_request_ref(&resolved, &pr.spec.source_branch, &pr.spec.target_branch);
    let status = pr.status.clone().unwrap_or_default();
    scm_ref.id = status.id.clone();

    let found = resolved.provider.find_open(&scm_ref).await?;

    // Provider has no open PR and we had previously observed one: the PR
    // vanished upstream (scenario F). Delete the record.
    if found.is_none() && status.state.is_some() {
        info!(name = %pr.name_any(), "pull request vanished from provider, deleting record");
        api.delete(&pr.name_any(), &Default::default()).await?;
        return Ok(Action::await_change());
    }

    let generation = pr.meta().generation.unwrap_or(0);
    let generation_matches = status.observed_generation == generation;

    if status.state == Some(pr.spec.state) && generation_matches {
        return Ok(Action::requeue(ctx.config.pull_request_requeue_after));
    }

    let mut next_status = status.clone();

    match pr.spec.state {
        PullRequestState::Open if status.state != Some(PullRequestState::Open) => {
            if let Some(existing) = &found {
                scm_ref.id = existing.id.clone();
                next_status.id = existing.id.clone();
            } else {
                let id = resolved
                    .provider
                    .create(&pr.spec.title, &pr.spec.description, &scm_ref)
                    .await?;
                next_status.id = Some(id);
            }
            next_status.state = Some(PullRequestState::Open);
            next_status.created_at = Some(Utc::now());
        }
        PullRequestState::Merged if status.state != Some(PullRequestState::Merged) => {
            resolved.provider.merge("promote", &scm_ref).await?;
            next_status.state = Some(PullRequestState::Merged);
        }
        PullRequestState::Closed if status.state != Some(PullRequestState::Closed) => {
            resolved.provider.close(&scm_ref).await?;
            next_status.state = Some(PullRequestState::Closed);
        }
        _ => {}
    }

    if !generation_matches {
        resolved
            .provider
            .update(&pr.spec.title, &pr.spec.description, &scm_ref)
            .await?;
    }

    next_status.observed_generation = generation;
    persist_status(&api, &pr.name_any(), &next_status).await?;

    // Merged/closed records are requeued promptly so the next invocation
    // notices the provider-side PR no longer being open and deletes them.
    let requeue_after = if next_status.state == Some(PullRequestState::Merged)
        || next_status.state == Some(PullRequestState::Closed)
    {
        Duration::from_secs(5)
    } else {
        ctx.config.pull_request_requeue_after
    };
    Ok(Action::requeue(requeue_after))
}

async fn cleanup(pr: Arc<PullRequest>, ctx: Arc<Context>) -> Result<Action, PullRequestError> {
    let ns = pr.namespace().ok_or(PullRequestError::MissingNamespace)?;
    let resolved = ctx
        .scm_registry
        .resolve(&ctx.client, &ns, &pr.spec.git_repository_ref.name)
        .await?;

    let mut scm_ref = pull_request_ref(&resolved, &pr.spec.source_branch, &pr.spec.target_branch);
    scm_ref.id = pr.status.as_ref().and_then(|s| s.id.clone());

    // Close is a no-op if the PR is already merged (spec.md §4.3).
    match resolved.provider.close(&scm_ref).await {
        Ok(()) | Err(ScmError::NotFound) => {}
        Err(other) => return Err(other.into()),
    }

    Ok(Action::await_change())
}

async fn persist_status(
    api: &Api<PullRequest>,
    name: &str,
    status: &PullRequestStatus,
) -> Result<(), PullRequestError> {
    let patch = json!({ "status": status });
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

pub fn error_policy(_pr: Arc<PullRequest>, error: &PullRequestError, _ctx: Arc<Context>) -> Action {
    warn!(error = %error, "pull request reconciliation failed");
    Action::requeue(Duration::from_secs(15))
}
