/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: labels.rs
 *
 * Reserved label keys used to cross-reference PromotionStrategy,
 * ProposedCommit, PullRequest, and CommitStatus records without an
 * in-process call graph (spec.md §6).
 *
 * SPDX-License-Identifier: Apache-2.0
 */

pub const LABEL_PROMOTION_STRATEGY: &str = "promoter.argoproj.io/promotion-strategy";
pub const LABEL_PROPOSED_COMMIT: &str = "promoter.argoproj.io/proposed-commit";
pub const LABEL_ENVIRONMENT: &str = "promoter.argoproj.io/environment";
pub const LABEL_COMMIT_STATUS: &str = "promoter.argoproj.io/commit-status";
pub const LABEL_COMMIT_STATUS_COPY: &str = "promoter.argoproj.io/commit-status-copy";
pub const LABEL_COMMIT_STATUS_COPY_FROM: &str = "promoter.argoproj.io/commit-status-copy-from";
pub const LABEL_COMMIT_STATUS_COPY_FROM_SHA: &str =
    "promoter.argoproj.io/commit-status-copy-from-sha";
pub const LABEL_COMMIT_STATUS_COPY_FROM_BRANCH: &str =
    "promoter.argoproj.io/commit-status-copy-from-branch";

/// Builds the label selector string `{promotion-strategy, proposed-commit,
/// environment}` used to locate the PullRequest owned by one environment of
/// one strategy (spec.md §4.1 step 7).
pub fn pull_request_selector(strategy_name: &str, proposed_commit_name: &str, environment: &str) -> String {
    use crate::util::naming::kube_safe_label;
    format!(
        "{}={},{}={},{}={}",
        LABEL_PROMOTION_STRATEGY,
        kube_safe_label(strategy_name),
        LABEL_PROPOSED_COMMIT,
        kube_safe_label(proposed_commit_name),
        LABEL_ENVIRONMENT,
        kube_safe_label(environment),
    )
}

/// Builds the labels a PullRequest owned by one environment of one strategy
/// must carry, per spec.md §3.
pub fn pull_request_labels(
    strategy_name: &str,
    proposed_commit_name: &str,
    environment: &str,
) -> std::collections::BTreeMap<String, String> {
    use crate::util::naming::kube_safe_label;
    std::collections::BTreeMap::from([
        (LABEL_PROMOTION_STRATEGY.to_string(), kube_safe_label(strategy_name)),
        (
            LABEL_PROPOSED_COMMIT.to_string(),
            kube_safe_label(proposed_commit_name),
        ),
        (LABEL_ENVIRONMENT.to_string(), kube_safe_label(environment)),
    ])
}

/// Builds the label selector used to list CommitStatus records for one
/// gating key, excluding forward-copies (spec.md §4.1 step 4).
pub fn commit_status_key_selector(key: &str) -> String {
    use crate::util::naming::kube_safe_label;
    format!(
        "{}={},{}!=true",
        LABEL_COMMIT_STATUS,
        kube_safe_label(key),
        LABEL_COMMIT_STATUS_COPY
    )
}
