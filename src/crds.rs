/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: crds.rs
 *
 * This file defines the Rust data structures that correspond to our Custom
 * Resource Definitions (CRDs). By using the `kube::CustomResource` derive
 * macro, we create a strongly-typed representation of our custom APIs,
 * enabling safe and idiomatic interaction with the Kubernetes API server.
 *
 * Architecture:
 * - Each top-level struct decorated with `#[derive(CustomResource)]` (e.g.
 *   `PromotionStrategy`) represents a single API Kind in Kubernetes, group
 *   `promoter.argoproj.io`, version `v1alpha1`.
 * - The standard Kubernetes object structure is followed by separating the
 *   user's desired state (`spec`) from the operator's observed state
 *   (`status`).
 * - `serde` attributes map idiomatic Rust `snake_case` field names to the
 *   idiomatic Kubernetes `camelCase` YAML field names.
 * - `schemars` generates the OpenAPI v3 schema embedded in the CRD manifest.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A same-namespace reference to a `GitRepository`.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
pub struct GitRepositoryReference {
    pub name: String,
}

// --- PromotionStrategy ---

/// # PromotionStrategy
/// Declares the Git repository to promote, the ordered list of environments
/// (branches) to promote through, and the status checks that gate each one.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "promoter.argoproj.io",
    version = "v1alpha1",
    kind = "PromotionStrategy",
    namespaced,
    status = "PromotionStrategyStatus",
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#,
    shortname = "promstrat"
)]
#[serde(rename_all = "camelCase")]
pub struct PromotionStrategySpec {
    #[serde(rename = "gitRepositoryRef")]
    pub git_repository_ref: GitRepositoryReference,

    pub environments: Vec<Environment>,

    /// Status-check keys that extend every environment's `activeCommitStatuses`.
    #[serde(default)]
    pub active_commit_statuses: Vec<String>,

    /// Status-check keys that extend every environment's `proposedCommitStatuses`.
    #[serde(default)]
    pub proposed_commit_statuses: Vec<String>,
}

/// One promoted environment: a branch, its merge policy, and its gates.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub branch: String,

    #[serde(default = "default_auto_merge")]
    pub auto_merge: bool,

    #[serde(default)]
    pub active_commit_statuses: Vec<String>,

    #[serde(default)]
    pub proposed_commit_statuses: Vec<String>,
}

pub fn default_auto_merge() -> bool {
    true
}

/// The observed state of a `PromotionStrategy`, one entry per spec environment.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
pub struct PromotionStrategyStatus {
    #[serde(default)]
    pub environments: Vec<EnvironmentStatus>,
}

/// Per-environment observed state: active/proposed SHAs, rolled-up checks,
/// and the capped history of healthy dry SHAs (see spec.md §9, Open
/// Question 1 — this list is never populated by any reconciler here,
/// matching the source behavior exactly).
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentStatus {
    pub branch: String,
    pub active: CommitPairState,
    pub proposed: CommitPairState,
    pub active_commit_status: RolledUpCommitStatus,
    pub proposed_commit_status: RolledUpCommitStatus,
    #[serde(default)]
    pub last_healthy_dry_shas: Vec<HealthyDrySha>,
}

/// A single retained healthy dry SHA with the time it was observed.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
pub struct HealthyDrySha {
    pub sha: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Maximum length of `EnvironmentStatus::last_healthy_dry_shas`. Unused for
/// now: no reconciler populates the list (see Open Question 1 in
/// DESIGN.md), so there's nothing yet to cap. Kept as the spec-mandated
/// constant for whichever reconciler starts appending to it.
#[allow(dead_code)]
pub const MAX_HEALTHY_DRY_SHAS: usize = 10;

/// Dry and hydrated SHA+time for one side (active or proposed) of an
/// environment.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
pub struct CommitPairState {
    pub dry: ShaState,
    pub hydrated: ShaState,
}

/// A single commit reference: SHA plus the commit's authored/committed time.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
pub struct ShaState {
    #[serde(default)]
    pub sha: String,
    pub commit_time: Option<chrono::DateTime<chrono::Utc>>,
}

impl ShaState {
    pub fn is_empty(&self) -> bool {
        self.sha.is_empty()
    }
}

/// Sentinel-aware rollup of a list of CommitStatus records into a single
/// observable state, per spec.md §3/§4.1.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
pub struct RolledUpCommitStatus {
    pub state: RolledUpState,
    pub sha: String,
}

impl Default for RolledUpCommitStatus {
    fn default() -> Self {
        Self {
            state: RolledUpState::Unknown,
            sha: "unknown".to_string(),
        }
    }
}

/// The state values a rolled-up commit status can take, including the three
/// sentinel states from spec.md §3 that block promotion without being
/// reconciliation errors.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RolledUpState {
    Success,
    Pending,
    Failure,
    Unknown,
    NoCommitStatusFound,
    ToManyMatchingSha,
}

impl RolledUpState {
    pub fn is_success(&self) -> bool {
        matches!(self, RolledUpState::Success)
    }
}

// --- ProposedCommit ---

/// # ProposedCommit
/// Owned one-per-environment by a `PromotionStrategy`. Tracks the dry and
/// hydrated SHA pair for both the active branch and its `-next` sibling.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "promoter.argoproj.io",
    version = "v1alpha1",
    kind = "ProposedCommit",
    namespaced,
    status = "ProposedCommitStatus",
    shortname = "pc"
)]
#[serde(rename_all = "camelCase")]
pub struct ProposedCommitSpec {
    #[serde(rename = "gitRepositoryRef")]
    pub git_repository_ref: GitRepositoryReference,
    pub active_branch: String,
    pub proposed_branch: String,
}

/// The four SHA fields this reconciler must eventually populate (see
/// spec.md §4.2). Until all four are non-empty, the PromotionStrategy
/// reconciler will not act on this environment.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
pub struct ProposedCommitStatus {
    pub active: CommitPairState,
    pub proposed: CommitPairState,
}

impl ProposedCommitStatus {
    /// True once all four dry/hydrated SHAs (active + proposed) are
    /// populated — the single gate the PromotionStrategy reconciler's wait
    /// loop polls for.
    pub fn is_ready(&self) -> bool {
        !self.active.dry.is_empty()
            && !self.active.hydrated.is_empty()
            && !self.proposed.dry.is_empty()
            && !self.proposed.hydrated.is_empty()
    }
}

// --- PullRequest ---

/// # PullRequest
/// Converges one pull request against an SCM provider: open, update, merge,
/// or close it to match `spec.state`.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "promoter.argoproj.io",
    version = "v1alpha1",
    kind = "PullRequest",
    namespaced,
    status = "PullRequestStatus",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.state"}"#,
    shortname = "pr"
)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub source_branch: String,
    pub target_branch: String,
    #[serde(rename = "gitRepositoryRef")]
    pub git_repository_ref: GitRepositoryReference,
    pub state: PullRequestState,
}

/// Desired/observed pull request lifecycle state.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestState {
    Open,
    Merged,
    Closed,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
pub struct PullRequestStatus {
    pub state: Option<PullRequestState>,
    pub id: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub observed_generation: i64,
}

/// Finalizer added to every `PullRequest` so the provider-side PR is closed
/// before the Kubernetes object is deleted. The literal misspelling
/// ("argoporoj") is intentional — see spec.md §9, Design Notes.
pub const PULL_REQUEST_FINALIZER: &str = "pullrequest.promoter.argoporoj.io/finalizer";

// --- CommitStatus ---

/// # CommitStatus
/// Publishes one named status check for one commit SHA to the SCM
/// provider. Records with `commit-status-copy=true` are forward-copies
/// created by the PromotionStrategy reconciler and are excluded from
/// gating evaluation.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "promoter.argoproj.io",
    version = "v1alpha1",
    kind = "CommitStatus",
    namespaced,
    status = "CommitStatusResourceStatus",
    shortname = "cs"
)]
#[serde(rename_all = "camelCase")]
pub struct CommitStatusSpec {
    #[serde(rename = "gitRepositoryRef")]
    pub git_repository_ref: GitRepositoryReference,
    pub sha: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub state: CommitStatusState,
    #[serde(default)]
    pub url: String,
}

/// The three states a single published commit status can take (not to be
/// confused with `RolledUpState`, which adds the sentinel values used only
/// on the strategy's aggregate status).
#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommitStatusState {
    Pending,
    Success,
    Failure,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
pub struct CommitStatusResourceStatus {
    pub id: Option<String>,
    #[serde(default)]
    pub observed_generation: i64,
}

// --- ScmProvider / GitRepository (metadata only, per spec.md §3) ---

/// # ScmProvider
/// Names the SCM driver variant to use and references the credential
/// Secret. Not independently reconciled by this core — consumed by
/// PullRequest/CommitStatus reconcilers through the driver contract in
/// `crate::scm`.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "promoter.argoproj.io",
    version = "v1alpha1",
    kind = "ScmProvider",
    namespaced,
    shortname = "scm"
)]
#[serde(rename_all = "camelCase")]
pub struct ScmProviderSpec {
    pub github: Option<GitHubProviderConfig>,
    pub fake: Option<FakeProviderConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitHubProviderConfig {
    #[serde(default = "default_github_domain")]
    pub domain: String,
    pub secret_ref: SecretReference,
}

pub fn default_github_domain() -> String {
    "github.com".to_string()
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
pub struct FakeProviderConfig {}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
pub struct SecretReference {
    pub name: String,
}

/// # GitRepository
/// Binds a repository owner/name to an `ScmProvider`.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "promoter.argoproj.io",
    version = "v1alpha1",
    kind = "GitRepository",
    namespaced,
    shortname = "gitrepo"
)]
#[serde(rename_all = "camelCase")]
pub struct GitRepositorySpec {
    pub owner: String,
    pub name: String,
    #[serde(rename = "scmProviderRef")]
    pub scm_provider_ref: GitRepositoryReference,
}
