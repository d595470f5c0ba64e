/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: util/naming.rs
 *
 * Stable, length-safe, collision-resistant name and label derivation
 * (spec.md §4.5). `kube_safe_unique_name` is used for ProposedCommit and
 * copied-CommitStatus names; `kube_safe_label` sanitizes every label value
 * written by this operator.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

const FNV_OFFSET_BASIS_32: u32 = 0x811c_9dc5;
const FNV_PRIME_32: u32 = 0x0100_0193;

/// 32-bit FNV-1a, matching the hash used by the source implementation's
/// `kubeSafeUniqueName`.
fn fnv1a32(data: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS_32;
    for byte in data.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME_32);
    }
    hash
}

/// Replaces every run of non-alphanumeric ASCII characters with a single
/// `-`. Does not change case.
fn collapse_non_alphanumeric_runs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_dash = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_was_dash = false;
        } else if !last_was_dash {
            out.push('-');
            last_was_dash = true;
        }
    }
    out
}

/// Kubernetes object names are limited to 253 (we use 255 per spec.md) DNS
/// subdomain characters. This derives a name from an arbitrary input string
/// that is: lowercase, dash-separated, and suffixed with a hex FNV-1a hash
/// so that truncation of the pre-hash portion can never silently collide
/// two distinct inputs.
pub fn kube_safe_unique_name(s: &str) -> String {
    let sanitized = collapse_non_alphanumeric_runs(s).to_lowercase();
    let hash = format!("{:x}", fnv1a32(&sanitized));
    let trimmed = sanitized.trim_end_matches('-');

    let max_prefix_len = 255usize.saturating_sub(hash.len()).saturating_sub(1);
    let prefix: String = if trimmed.len() > max_prefix_len {
        trimmed.chars().take(max_prefix_len).collect()
    } else {
        trimmed.to_string()
    };

    format!("{prefix}-{hash}")
}

/// Kubernetes label values are limited to 63 characters. Unlike
/// `kube_safe_unique_name`, truncation happens from the *front* so that any
/// uniqueness-bearing suffix (e.g. a hash or environment name) at the tail
/// of the input survives.
pub fn kube_safe_label(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let sanitized = collapse_non_alphanumeric_runs(s);
    let truncated: String = if sanitized.chars().count() > 63 {
        let skip = sanitized.chars().count() - 63;
        sanitized.chars().skip(skip).collect()
    } else {
        sanitized
    };
    truncated.trim_start_matches('-').to_string()
}

/// Deterministic name for the ProposedCommit owned by one
/// `(strategyName, branch)` pair (spec.md §3, ProposedCommit invariant).
pub fn proposed_commit_name(strategy_name: &str, branch: &str) -> String {
    kube_safe_unique_name(&format!("{strategy_name}-{branch}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_and_lowercases() {
        let name = kube_safe_unique_name("My Repo/env--dev!!");
        assert!(name.starts_with("my-repo-env-dev-"));
    }

    #[test]
    fn unique_name_is_idempotent_for_short_inputs() {
        let a = kube_safe_unique_name("strategy-a-env/dev");
        let b = kube_safe_unique_name("strategy-a-env/dev");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_short_inputs_hash_differently() {
        let a = kube_safe_unique_name("strategy-a-env/dev");
        let b = kube_safe_unique_name("strategy-a-env/test");
        assert_ne!(a, b);
    }

    #[test]
    fn unique_name_never_exceeds_255_chars() {
        let long_input = "x".repeat(1000);
        let name = kube_safe_unique_name(&long_input);
        assert!(name.len() <= 255);
        assert!(name.contains('-'));
    }

    #[test]
    fn unique_name_truncation_still_guards_against_collisions() {
        // Two distinct long inputs that share the same 255-9 char prefix
        // must still diverge because of the distinct FNV-1a suffix.
        let base = "a".repeat(300);
        let input_a = format!("{base}-one");
        let input_b = format!("{base}-two");
        assert_ne!(kube_safe_unique_name(&input_a), kube_safe_unique_name(&input_b));
    }

    #[test]
    fn label_truncates_from_the_front() {
        let long_input = format!("{}{}", "a".repeat(100), "env-dev");
        let label = kube_safe_label(&long_input);
        assert_eq!(label.len(), 63);
        assert!(label.ends_with("env-dev"));
    }

    #[test]
    fn label_strips_leading_dash_after_truncation() {
        let input = format!("{}-tail", "-".repeat(5));
        let label = kube_safe_label(&input);
        assert!(!label.starts_with('-'));
    }

    #[test]
    fn label_of_empty_string_is_empty() {
        assert_eq!(kube_safe_label(""), "");
    }

    #[test]
    fn label_contains_only_allowed_characters() {
        let label = kube_safe_label("Weird!!Chars***Here///123");
        assert!(label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
        assert!(label.len() <= 63);
    }
}
