/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: promotion_strategy_controller.rs
 *
 * The top-level orchestrator (spec.md §4.1): for each declared environment,
 * ensures a ProposedCommit and a PullRequest exist, waits for the
 * ProposedCommit's SHAs to become observable, rolls up the gating
 * CommitStatus checks, copies prior-stage statuses forward onto the
 * proposed branch, and flips a PullRequest's desired state to merged once
 * its gates pass. This is the largest reconciler in the operator; the
 * per-environment decision logic is split into plain functions so it can be
 * exercised without a live API server, the way the teacher's
 * `blue_green.rs`-style strategy helpers are tested in the rest of the pack.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::crds::{
    CommitPairState, CommitStatus, CommitStatusState, Environment, EnvironmentStatus, GitRepository,
    ProposedCommit, ProposedCommitSpec, ProposedCommitStatus, PromotionStrategy, PullRequest, PullRequestSpec,
    PullRequestState, RolledUpCommitStatus, RolledUpState,
};
use crate::labels::{
    commit_status_key_selector, pull_request_labels, pull_request_selector, LABEL_COMMIT_STATUS_COPY,
    LABEL_COMMIT_STATUS_COPY_FROM, LABEL_COMMIT_STATUS_COPY_FROM_BRANCH, LABEL_COMMIT_STATUS_COPY_FROM_SHA,
};
use crate::util::environment::{ordered_environment_statuses, previous_environment_status, upsert_environment_status};
use crate::util::naming::kube_safe_unique_name;
use crate::util::retry::retry_on_conflict;
use crate::Context;
use kube::{
    api::{Api, ListParams, ObjectMeta, Patch, PatchParams, PostParams},
    runtime::controller::Action,
    Error as KubeError, Resource, ResourceExt,
};
use metrics::counter;
use rand::Rng;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PromotionStrategyError {
    #[error("kubernetes api error: {0}")]
    Kube(#[from] KubeError),

    #[error("PromotionStrategy has no namespace")]
    MissingNamespace,
}

pub async fn reconcile(
    strategy: Arc<PromotionStrategy>,
    ctx: Arc<Context>,
) -> Result<Action, PromotionStrategyError> {
    counter!("promoter_promotion_strategy_reconciliations_total").increment(1);

    let ns = strategy.namespace().ok_or(PromotionStrategyError::MissingNamespace)?;
    let strategies: Api<PromotionStrategy> = Api::namespaced(ctx.client.clone(), &ns);
    let proposed_commits: Api<ProposedCommit> = Api::namespaced(ctx.client.clone(), &ns);
    let pull_requests: Api<PullRequest> = Api::namespaced(ctx.client.clone(), &ns);
    let commit_statuses: Api<CommitStatus> = Api::namespaced(ctx.client.clone(), &ns);
    let repositories: Api<GitRepository> = Api::namespaced(ctx.client.clone(), &ns);

    let mut env_statuses: Vec<EnvironmentStatus> = strategy
        .status
        .as_ref()
        .map(|s| s.environments.clone())
        .unwrap_or_default();

    let strategy_name = strategy.name_any();

    for env in &strategy.spec.environments {
        let pc_name = kube_safe_unique_name(&format!("{strategy_name}-{}", env.branch));

        ensure_proposed_commit(&proposed_commits, &strategy, env, &pc_name).await?;
        ensure_pull_request(&pull_requests, &strategy, &pc_name, env).await?;
        let pc = wait_for_ready(&proposed_commits, &pc_name).await?;
        let pc_status = pc.status.expect("wait_for_ready only returns once status is populated");

        let previous = previous_environment_status(&strategy.spec.environments, &env_statuses, &env.branch).cloned();

        let active_keys = effective_keys(&env.active_commit_statuses, &strategy.spec.active_commit_statuses);
        let active_outcomes =
            fetch_key_outcomes(&commit_statuses, &active_keys, &pc_status.active.hydrated.sha).await?;
        let (active_rollup, active_collected) = roll_up(&active_outcomes, &pc_status.active.hydrated.sha);

        let proposed_keys = effective_keys(&env.proposed_commit_statuses, &strategy.spec.proposed_commit_statuses);
        let proposed_outcomes =
            fetch_key_outcomes(&commit_statuses, &proposed_keys, &pc_status.proposed.hydrated.sha).await?;
        let (mut proposed_rollup, _) = roll_up(&proposed_outcomes, &pc_status.proposed.hydrated.sha);
        // Known quirk preserved from the source implementation: the override
        // scan below re-examines the *active* collected list rather than the
        // proposed one just computed.
        if proposed_rollup.state == RolledUpState::Success {
            if let Some(overriding) = active_collected.iter().find(|m| m.state != CommitStatusState::Success) {
                proposed_rollup = RolledUpCommitStatus {
                    state: map_commit_status_state(overriding.state),
                    sha: overriding.sha.clone(),
                };
            }
        }

        let entry = EnvironmentStatus {
            branch: env.branch.clone(),
            active: pc_status.active.clone(),
            proposed: pc_status.proposed.clone(),
            active_commit_status: active_rollup,
            proposed_commit_status: proposed_rollup,
            // Never populated — see DESIGN.md's Open Question log.
            last_healthy_dry_shas: Vec::new(),
        };
        upsert_environment_status(&mut env_statuses, entry.clone());

        if let Some(prev) = &previous {
            if prev.active.dry.sha == entry.proposed.dry.sha {
                copy_statuses_forward(&commit_statuses, &repositories, &strategy, prev, &entry).await?;
            }
        }

        let active_checks_passed = previous.as_ref().is_some_and(|prev| {
            prev.active_commit_status.state == RolledUpState::Success
                && prev.active.dry.sha == entry.proposed.dry.sha
                && prev.active.dry.commit_time > entry.active.dry.commit_time
        });
        let proposed_checks_passed = entry.proposed_commit_status.state == RolledUpState::Success;
        let is_first_environment = previous.is_none();

        if env.auto_merge && (is_first_environment || (active_checks_passed && proposed_checks_passed)) {
            merge_if_open(&pull_requests, &strategy_name, &pc_name, &env.branch).await?;
        }
    }

    let ordered: Vec<EnvironmentStatus> =
        ordered_environment_statuses(&strategy.spec.environments, &env_statuses)
            .into_iter()
            .cloned()
            .collect();
    persist_status(&strategies, &strategy_name, &ordered).await?;
    Ok(Action::requeue(ctx.config.promotion_strategy_requeue_after))
}

/// `env.activeCommitStatuses ∪ spec.activeCommitStatuses` (concatenation,
/// duplicates preserved) — same shape for the proposed lists.
fn effective_keys(env_keys: &[String], strategy_keys: &[String]) -> Vec<String> {
    env_keys.iter().chain(strategy_keys.iter()).cloned().collect()
}

#[derive(Debug, Clone, PartialEq)]
struct CommitStatusMatch {
    state: CommitStatusState,
    sha: String,
}

#[derive(Debug, Clone)]
enum KeyOutcome {
    None,
    One(CommitStatusMatch),
    Many,
}

async fn fetch_key_outcomes(
    api: &Api<CommitStatus>,
    keys: &[String],
    target_sha: &str,
) -> Result<Vec<KeyOutcome>, PromotionStrategyError> {
    let mut outcomes = Vec::with_capacity(keys.len());
    for key in keys {
        let lp = ListParams::default().labels(&commit_status_key_selector(key));
        let list = api.list(&lp).await?;
        let matches: Vec<&CommitStatus> = list.items.iter().filter(|cs| cs.spec.sha == target_sha).collect();
        outcomes.push(match matches.len() {
            0 => KeyOutcome::None,
            1 => KeyOutcome::One(CommitStatusMatch {
                state: matches[0].spec.state,
                sha: matches[0].spec.sha.clone(),
            }),
            _ => KeyOutcome::Many,
        });
    }
    Ok(outcomes)
}

fn map_commit_status_state(state: CommitStatusState) -> RolledUpState {
    match state {
        CommitStatusState::Pending => RolledUpState::Pending,
        CommitStatusState::Success => RolledUpState::Success,
        CommitStatusState::Failure => RolledUpState::Failure,
    }
}

/// Implements spec.md §4.1 steps 4/5: classify each key's match cardinality,
/// then fold the result into one rolled-up state. A 0-match or >1-match key
/// sets a sentinel that is never overridden; only when no sentinel was ever
/// set does a non-success entry in the 1-match collection override the
/// default `success`.
fn roll_up(outcomes: &[KeyOutcome], hydrated_sha: &str) -> (RolledUpCommitStatus, Vec<CommitStatusMatch>) {
    let mut sentinel = None;
    let mut collected = Vec::new();

    for outcome in outcomes {
        match outcome {
            KeyOutcome::None => {
                sentinel = Some(RolledUpCommitStatus {
                    state: RolledUpState::NoCommitStatusFound,
                    sha: "no-commit-status-found".to_string(),
                });
            }
            KeyOutcome::Many => {
                sentinel = Some(RolledUpCommitStatus {
                    state: RolledUpState::ToManyMatchingSha,
                    sha: "to-many-matching-sha".to_string(),
                });
            }
            KeyOutcome::One(m) => collected.push(m.clone()),
        }
    }

    if let Some(sentinel) = sentinel {
        return (sentinel, collected);
    }

    let mut result = RolledUpCommitStatus {
        state: RolledUpState::Success,
        sha: hydrated_sha.to_string(),
    };
    if let Some(overriding) = collected.iter().find(|m| m.state != CommitStatusState::Success) {
        result = RolledUpCommitStatus {
            state: map_commit_status_state(overriding.state),
            sha: overriding.sha.clone(),
        };
    }
    (result, collected)
}

async fn ensure_proposed_commit(
    api: &Api<ProposedCommit>,
    strategy: &PromotionStrategy,
    env: &Environment,
    name: &str,
) -> Result<(), PromotionStrategyError> {
    match api.get(name).await {
        Ok(_) => Ok(()),
        Err(KubeError::Api(err)) if err.code == 404 => {
            let pc = ProposedCommit {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    owner_references: strategy.controller_owner_ref(&()).map(|r| vec![r]),
                    ..Default::default()
                },
                spec: ProposedCommitSpec {
                    git_repository_ref: strategy.spec.git_repository_ref.clone(),
                    active_branch: env.branch.clone(),
                    proposed_branch: format!("{}-next", env.branch),
                },
                status: None,
            };
            match api.create(&PostParams::default(), &pc).await {
                Ok(_) => Ok(()),
                Err(KubeError::Api(err)) if err.code == 409 => Ok(()),
                Err(err) => Err(err.into()),
            }
        }
        Err(err) => Err(err.into()),
    }
}

/// Blocks until the ProposedCommit's four SHAs are observable, re-reading
/// with a randomized backoff to absorb informer-cache lag (spec.md §4.1
/// step 2, §5 "Suspension points"). The only explicit poll loop in this
/// reconciler; it is cancellation-safe because dropping this future (on
/// reconciler timeout or shutdown) cancels the in-flight await.
async fn wait_for_ready(api: &Api<ProposedCommit>, name: &str) -> Result<ProposedCommit, PromotionStrategyError> {
    loop {
        let pc = api.get(name).await?;
        if pc.status.as_ref().is_some_and(ProposedCommitStatus::is_ready) {
            return Ok(pc);
        }
        let backoff = rand::thread_rng().gen_range(0..=1000);
        tokio::time::sleep(Duration::from_millis(backoff)).await;
    }
}

async fn ensure_pull_request(
    api: &Api<PullRequest>,
    strategy: &PromotionStrategy,
    pc_name: &str,
    env: &Environment,
) -> Result<(), PromotionStrategyError> {
    let selector = pull_request_selector(&strategy.name_any(), pc_name, &env.branch);
    let lp = ListParams::default().labels(&selector);
    if !api.list(&lp).await?.items.is_empty() {
        return Ok(());
    }

    let source_branch = format!("{}-next", env.branch);
    let name = kube_safe_unique_name(&format!("{}-{}", strategy.name_any(), env.branch));
    let pr = PullRequest {
        metadata: ObjectMeta {
            name: Some(name),
            owner_references: strategy.controller_owner_ref(&()).map(|r| vec![r]),
            labels: Some(pull_request_labels(&strategy.name_any(), pc_name, &env.branch)),
            ..Default::default()
        },
        spec: PullRequestSpec {
            title: format!("Promote {source_branch} to {}", env.branch),
            description: String::new(),
            source_branch,
            target_branch: env.branch.clone(),
            git_repository_ref: strategy.spec.git_repository_ref.clone(),
            state: PullRequestState::Open,
        },
        status: None,
    };
    match api.create(&PostParams::default(), &pr).await {
        Ok(_) => Ok(()),
        Err(KubeError::Api(err)) if err.code == 409 => Ok(()),
        Err(err) => Err(err.into()),
    }
}

async fn merge_if_open(
    api: &Api<PullRequest>,
    strategy_name: &str,
    pc_name: &str,
    branch: &str,
) -> Result<(), PromotionStrategyError> {
    let selector = pull_request_selector(strategy_name, pc_name, branch);
    let lp = ListParams::default().labels(&selector);
    let Some(pr) = api.list(&lp).await?.items.into_iter().next() else {
        return Ok(());
    };

    let observed_open = pr.status.as_ref().and_then(|s| s.state) == Some(PullRequestState::Open);
    if !observed_open || pr.spec.state != PullRequestState::Open {
        return Ok(());
    }

    let name = pr.name_any();
    retry_on_conflict(|| async {
        let mut current = api.get(&name).await?;
        current.spec.state = PullRequestState::Merged;
        api.replace(&name, &PostParams::default(), &current).await
    })
    .await?;
    counter!("promoter_pull_requests_merged_total").increment(1);
    info!(pull_request = %name, "flipped pull request to merged");
    Ok(())
}

/// Copies each non-copy active CommitStatus on `previous.active.hydrated.sha`
/// onto the current environment's proposed hydrated SHA (spec.md §4.1 step
/// 6). Preserves a known source quirk: processing stops as soon as one
/// missing copy is created, rather than continuing through the rest of the
/// matching list — copies that already exist are still updated in place
/// along the way.
async fn copy_statuses_forward(
    api: &Api<CommitStatus>,
    repositories: &Api<GitRepository>,
    strategy: &PromotionStrategy,
    previous: &EnvironmentStatus,
    current: &EnvironmentStatus,
) -> Result<(), PromotionStrategyError> {
    let lp = ListParams::default().labels(&format!("{LABEL_COMMIT_STATUS_COPY}!=true"));
    let list = api.list(&lp).await?;
    let source_sha = &previous.active.hydrated.sha;
    let matches: Vec<CommitStatus> = list.items.into_iter().filter(|cs| &cs.spec.sha == source_sha).collect();
    if matches.is_empty() {
        return Ok(());
    }

    let (owner, name) = repository_owner_name(repositories, &strategy.spec.git_repository_ref.name).await?;

    for source in matches {
        let copy_name = kube_safe_unique_name(&format!("proposed-{}", source.name_any()));
        match api.get(&copy_name).await {
            Ok(mut existing) => {
                existing.spec.sha = current.proposed.hydrated.sha.clone();
                existing.spec.state = source.spec.state;
                existing.spec.description = source.spec.description.clone();
                existing.spec.url = format!("https://github.com/{owner}/{name}/commit/{source_sha}");
                api.replace(&copy_name, &PostParams::default(), &existing).await?;
            }
            Err(KubeError::Api(err)) if err.code == 404 => {
                let mut labels = source.labels().clone();
                labels.insert(LABEL_COMMIT_STATUS_COPY.to_string(), "true".to_string());
                labels.insert(LABEL_COMMIT_STATUS_COPY_FROM.to_string(), source.name_any());
                labels.insert(LABEL_COMMIT_STATUS_COPY_FROM_SHA.to_string(), source_sha.clone());
                labels.insert(LABEL_COMMIT_STATUS_COPY_FROM_BRANCH.to_string(), previous.branch.clone());

                let copy = CommitStatus {
                    metadata: ObjectMeta {
                        name: Some(copy_name),
                        labels: Some(labels),
                        annotations: Some(source.annotations().clone()),
                        ..Default::default()
                    },
                    spec: crate::crds::CommitStatusSpec {
                        git_repository_ref: source.spec.git_repository_ref.clone(),
                        sha: current.proposed.hydrated.sha.clone(),
                        name: format!("{} - {}", current.branch, source.spec.name),
                        description: source.spec.description.clone(),
                        state: source.spec.state,
                        url: format!("https://github.com/{owner}/{name}/commit/{source_sha}"),
                    },
                    status: None,
                };
                api.create(&PostParams::default(), &copy).await?;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

async fn repository_owner_name(
    repositories: &Api<GitRepository>,
    name: &str,
) -> Result<(String, String), PromotionStrategyError> {
    let repo = repositories.get(name).await?;
    Ok((repo.spec.owner, repo.spec.name))
}

async fn persist_status(
    api: &Api<PromotionStrategy>,
    name: &str,
    environments: &[EnvironmentStatus],
) -> Result<(), PromotionStrategyError> {
    let patch = json!({ "status": { "environments": environments } });
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

pub fn error_policy(_strategy: Arc<PromotionStrategy>, error: &PromotionStrategyError, _ctx: Arc<Context>) -> Action {
    warn!(error = %error, "promotion strategy reconciliation failed");
    Action::requeue(Duration::from_secs(15))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(sha: &str) -> CommitStatusMatch {
        CommitStatusMatch {
            state: CommitStatusState::Success,
            sha: sha.to_string(),
        }
    }

    fn pending(sha: &str) -> CommitStatusMatch {
        CommitStatusMatch {
            state: CommitStatusState::Pending,
            sha: sha.to_string(),
        }
    }

    #[test]
    fn zero_effective_keys_rolls_up_to_success() {
        let (rollup, collected) = roll_up(&[], "hydrated-sha");
        assert_eq!(rollup.state, RolledUpState::Success);
        assert_eq!(rollup.sha, "hydrated-sha");
        assert!(collected.is_empty());
    }

    #[test]
    fn no_match_sets_sentinel() {
        let (rollup, _) = roll_up(&[KeyOutcome::None], "hydrated-sha");
        assert_eq!(rollup.state, RolledUpState::NoCommitStatusFound);
    }

    #[test]
    fn many_matches_sets_sentinel_scenario_d() {
        let (rollup, _) = roll_up(&[KeyOutcome::Many], "hydrated-sha");
        assert_eq!(rollup.state, RolledUpState::ToManyMatchingSha);
    }

    #[test]
    fn sentinel_is_not_overridden_by_other_successful_keys() {
        let outcomes = vec![KeyOutcome::None, KeyOutcome::One(success("h1"))];
        let (rollup, _) = roll_up(&outcomes, "hydrated-sha");
        assert_eq!(rollup.state, RolledUpState::NoCommitStatusFound);
    }

    #[test]
    fn all_success_keys_roll_up_to_success() {
        let outcomes = vec![KeyOutcome::One(success("h1")), KeyOutcome::One(success("h2"))];
        let (rollup, collected) = roll_up(&outcomes, "hydrated-sha");
        assert_eq!(rollup.state, RolledUpState::Success);
        assert_eq!(rollup.sha, "hydrated-sha");
        assert_eq!(collected.len(), 2);
    }

    #[test]
    fn first_non_success_key_overrides_the_rollup() {
        let outcomes = vec![KeyOutcome::One(success("h1")), KeyOutcome::One(pending("h2"))];
        let (rollup, _) = roll_up(&outcomes, "hydrated-sha");
        assert_eq!(rollup.state, RolledUpState::Pending);
        assert_eq!(rollup.sha, "h2");
    }

    #[test]
    fn effective_keys_concatenates_with_duplicates() {
        let env_keys = vec!["a".to_string(), "b".to_string()];
        let strategy_keys = vec!["b".to_string()];
        assert_eq!(effective_keys(&env_keys, &strategy_keys), vec!["a", "b", "b"]);
    }
}
