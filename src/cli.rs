/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: cli.rs
 *
 * Command-line flags for the operator binary (spec.md §6, "CLI surface").
 * Styled after the pack's `clap::Parser`-derived `Args` struct
 * (`examples/vowstar-llm-git/src/main.rs`) — the teacher itself has no CLI
 * crate, so this is borrowed from the rest of the pack per the "enrich from
 * the rest of the pack" rule.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "promoter", about = "Promotes GitOps-rendered config across environments")]
pub struct Args {
    /// Address the Prometheus metrics endpoint binds to.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub metrics_bind_address: String,

    /// Address the liveness/readiness endpoints bind to.
    #[arg(long, default_value = "0.0.0.0:8081")]
    pub health_bind_address: String,

    /// Enables leader election so only one replica reconciles at a time.
    #[arg(long, default_value_t = false)]
    pub leader_election: bool,

    /// Enables HTTP/2 for the Kubernetes API client.
    #[arg(long, default_value_t = false)]
    pub http2: bool,

    /// How often the PromotionStrategy reconciler re-evaluates a strategy
    /// even with no observed change, as a duration string (e.g. "60s").
    #[arg(long, default_value = "60s")]
    pub promotion_strategy_requeue_after: String,

    /// How often the PullRequest reconciler re-evaluates a pull request
    /// even with no observed change, as a duration string (e.g. "60s").
    #[arg(long, default_value = "60s")]
    pub pull_request_requeue_after: String,
}
