/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: commit_status_controller.rs
 *
 * Publishes one `CommitStatus` record to the SCM provider (spec.md §4.4).
 * The provider-side publish call itself is out of scope for this core (the
 * driver contract in §6 only specifies pull-request operations) — this
 * reconciler is deliberately a thin contract stub, in the style of the
 * teacher's `pipeline_controller.rs`: it documents the steps a full driver
 * dispatch would take and does the one thing the spec does require, namely
 * keeping `status.observedGeneration` converged with `.metadata.generation`.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::crds::{CommitStatus, CommitStatusResourceStatus};
use crate::Context;
use kube::{
    api::{Api, Patch, PatchParams},
    runtime::controller::Action,
    Error as KubeError, Resource, ResourceExt,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CommitStatusError {
    #[error("kubernetes api error: {0}")]
    Kube(#[from] KubeError),

    #[error("CommitStatus has no namespace")]
    MissingNamespace,
}

pub async fn reconcile(status: Arc<CommitStatus>, ctx: Arc<Context>) -> Result<Action, CommitStatusError> {
    let ns = status.namespace().ok_or(CommitStatusError::MissingNamespace)?;
    let api: Api<CommitStatus> = Api::namespaced(ctx.client.clone(), &ns);

    let generation = status.meta().generation.unwrap_or(0);
    let observed = status.status.as_ref().map(|s| s.observed_generation).unwrap_or(-1);
    if observed == generation {
        return Ok(Action::requeue(ctx.config.pull_request_requeue_after));
    }

    // TODO(scm-driver): dispatch spec.{sha, name, state, description, url} to
    // the provider named by spec.gitRepositoryRef, via a status-publish
    // operation not named in the driver contract this core depends on.
    info!(
        name = %status.name_any(),
        sha = %status.spec.sha,
        state = ?status.spec.state,
        "recording commit status (provider publish out of scope)",
    );

    let id = status
        .status
        .as_ref()
        .and_then(|s| s.id.clone())
        .unwrap_or_else(|| status.name_any());

    let next_status = CommitStatusResourceStatus {
        id: Some(id),
        observed_generation: generation,
    };
    let patch = json!({ "status": next_status });
    api.patch_status(&status.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
        .await?;

    Ok(Action::requeue(ctx.config.pull_request_requeue_after))
}

pub fn error_policy(_status: Arc<CommitStatus>, error: &CommitStatusError, _ctx: Arc<Context>) -> Action {
    warn!(error = %error, "commit status reconciliation failed");
    Action::requeue(Duration::from_secs(15))
}
