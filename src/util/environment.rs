/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: util/environment.rs
 *
 * Spec-order-authoritative lookup and upsert helpers for
 * `PromotionStrategyStatus::environments` (spec.md §4.5).
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::crds::{Environment, EnvironmentStatus};

/// Returns the status entries for `spec.environments`, in spec order —
/// status order is never authoritative, only lookup-by-branch is.
pub fn ordered_environment_statuses<'a>(
    spec_environments: &[Environment],
    statuses: &'a [EnvironmentStatus],
) -> Vec<&'a EnvironmentStatus> {
    spec_environments
        .iter()
        .filter_map(|env| statuses.iter().find(|s| s.branch == env.branch))
        .collect()
}

/// Replaces the entry with a matching `branch`, or appends if none exists.
/// Idempotent: applying the same entry twice yields the same list.
pub fn upsert_environment_status(list: &mut Vec<EnvironmentStatus>, entry: EnvironmentStatus) {
    if let Some(existing) = list.iter_mut().find(|e| e.branch == entry.branch) {
        *existing = entry;
    } else {
        list.push(entry);
    }
}

/// The environment immediately preceding `branch` in spec order, or `None`
/// if `branch` is the first environment (spec.md §4.1 step 6/7). The
/// source's `GetPreviousEnvironmentStatusByBranch` additionally returns an
/// index that no caller ever uses (spec.md §9, Open Question 3) — that slot
/// is dropped here rather than carried into an idiomatic Rust signature.
pub fn previous_environment_status<'a>(
    spec_environments: &[Environment],
    statuses: &'a [EnvironmentStatus],
    branch: &str,
) -> Option<&'a EnvironmentStatus> {
    let position = spec_environments.iter().position(|e| e.branch == branch)?;
    if position == 0 {
        return None;
    }
    let previous_branch = &spec_environments[position - 1].branch;
    statuses.iter().find(|s| &s.branch == previous_branch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crds::{CommitPairState, RolledUpCommitStatus};

    fn status(branch: &str) -> EnvironmentStatus {
        EnvironmentStatus {
            branch: branch.to_string(),
            active: CommitPairState::default(),
            proposed: CommitPairState::default(),
            active_commit_status: RolledUpCommitStatus::default(),
            proposed_commit_status: RolledUpCommitStatus::default(),
            last_healthy_dry_shas: vec![],
        }
    }

    fn env(branch: &str) -> Environment {
        Environment {
            branch: branch.to_string(),
            auto_merge: true,
            active_commit_statuses: vec![],
            proposed_commit_statuses: vec![],
        }
    }

    #[test]
    fn orders_by_spec_not_status() {
        let specs = vec![env("dev"), env("test"), env("prod")];
        let statuses = vec![status("prod"), status("dev"), status("test")];
        let ordered = ordered_environment_statuses(&specs, &statuses);
        let branches: Vec<&str> = ordered.iter().map(|s| s.branch.as_str()).collect();
        assert_eq!(branches, vec!["dev", "test", "prod"]);
    }

    #[test]
    fn upsert_replaces_existing_branch() {
        let mut list = vec![status("dev")];
        let mut replacement = status("dev");
        replacement.active.dry.sha = "abc123".to_string();
        upsert_environment_status(&mut list, replacement);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].active.dry.sha, "abc123");
    }

    #[test]
    fn upsert_appends_new_branch() {
        let mut list = vec![status("dev")];
        upsert_environment_status(&mut list, status("test"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut list = vec![];
        upsert_environment_status(&mut list, status("dev"));
        let once = list.clone();
        upsert_environment_status(&mut list, status("dev"));
        assert_eq!(list.len(), once.len());
    }

    #[test]
    fn first_environment_has_no_previous() {
        let specs = vec![env("dev"), env("test")];
        let statuses = vec![status("dev"), status("test")];
        assert!(previous_environment_status(&specs, &statuses, "dev").is_none());
    }

    #[test]
    fn second_environment_previous_is_first() {
        let specs = vec![env("dev"), env("test")];
        let statuses = vec![status("dev"), status("test")];
        let previous = previous_environment_status(&specs, &statuses, "test").unwrap();
        assert_eq!(previous.branch, "dev");
    }
}
