/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: main.rs
 *
 * This file is the main entry point for the promoter operator. It is
 * responsible for setting up and running the controller manager, which in turn
 * hosts and executes the reconciliation loops for all custom resources managed
 * by this operator.
 *
 * Architecture:
 * The program follows the standard `kube-rs` operator structure.
 * 1.  **Initialization**: It begins by parsing CLI flags, initializing
 * tracing, and connecting to the cluster's API server.
 * 2.  **CRD Registration**: The `main` function discovers all four primary
 * Custom Resource Definitions this operator manages: `PromotionStrategy`,
 * `ProposedCommit`, `PullRequest`, and `CommitStatus`.
 * 3.  **Controller Manager**: A `Controller` from `kube-rs` is instantiated for
 * each CRD. It watches for changes and dispatches to the matching
 * reconciler, with an `error_policy` invoked whenever reconciliation fails.
 * 4.  **Shared Context**: A shared `Context` object — the Kubernetes client,
 * the SCM provider registry, the Git workdir registry, and the resolved
 * configuration — is passed down to every reconciliation loop.
 * 5.  **Concurrent Execution**: All four controllers and the health/metrics
 * server run concurrently using `tokio::join!`.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

mod cli;
mod config;
mod controllers;
mod crds;
mod error;
mod gitutil;
mod labels;
mod observability;
mod scm;
mod util;

use clap::Parser;
use config::OperatorConfig;
use crds::{CommitStatus, ProposedCommit, PromotionStrategy, PullRequest};
use futures::stream::StreamExt;
use gitutil::workdir::WorkdirRegistry;
use kube::runtime::controller::Controller;
use kube::{Api, Client};
use scm::registry::ScmProviderRegistry;
use std::sync::Arc;
use tracing::{error, info};

/// Shared state handed to every reconciler: the Kubernetes client, the SCM
/// provider resolver/cache, the process-wide Git workdir registry, and the
/// resolved CLI configuration.
pub struct Context {
    pub client: Client,
    pub scm_registry: Arc<ScmProviderRegistry>,
    pub workdirs: Arc<WorkdirRegistry>,
    pub config: OperatorConfig,
}

#[tokio::main]
async fn main() {
    observability::init_tracing();

    if let Err(err) = run().await {
        error!(error = %err, "promoter operator failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), error::Error> {
    let args = cli::Args::parse();
    let config = OperatorConfig::from_args(args)?;

    let client = Client::try_default().await?;
    let metrics_handle = observability::install_metrics_recorder();

    let context = Arc::new(Context {
        client: client.clone(),
        scm_registry: Arc::new(ScmProviderRegistry::new()),
        workdirs: Arc::new(WorkdirRegistry::new()),
        config: config.clone(),
    });

    let promotion_strategies = Api::<PromotionStrategy>::all(client.clone());
    let proposed_commits = Api::<ProposedCommit>::all(client.clone());
    let pull_requests = Api::<PullRequest>::all(client.clone());
    let commit_statuses = Api::<CommitStatus>::all(client.clone());

    info!(
        leader_election = config.leader_election,
        http2 = config.http2,
        health_bind_address = %config.health_bind_address,
        metrics_bind_address = %config.metrics_bind_address,
        "promoter operator starting",
    );

    let health_bind_address = config.health_bind_address.clone();
    let metrics_bind_address = config.metrics_bind_address.clone();
    let workdirs_for_shutdown = context.workdirs.clone();

    tokio::select! {
        result = observability::serve(&health_bind_address, &metrics_bind_address, metrics_handle) => {
            if let Err(err) = result {
                error!(error = %err, "health/metrics server exited");
            }
        }
        _ = run_controllers(
            promotion_strategies,
            proposed_commits,
            pull_requests,
            commit_statuses,
            context,
        ) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    workdirs_for_shutdown.drain();
    info!("promoter operator shutting down");
    Ok(())
}

async fn run_controllers(
    promotion_strategies: Api<PromotionStrategy>,
    proposed_commits: Api<ProposedCommit>,
    pull_requests: Api<PullRequest>,
    commit_statuses: Api<CommitStatus>,
    context: Arc<Context>,
) {
    tokio::join!(
        Controller::new(promotion_strategies, Default::default())
            .run(
                controllers::promotion_strategy_controller::reconcile,
                controllers::promotion_strategy_controller::error_policy,
                context.clone(),
            )
            .for_each(|res| async move {
                if let Err(err) = res {
                    error!(error = %err, "promotion strategy reconcile error");
                }
            }),
        Controller::new(proposed_commits, Default::default())
            .run(
                controllers::proposed_commit_controller::reconcile,
                controllers::proposed_commit_controller::error_policy,
                context.clone(),
            )
            .for_each(|res| async move {
                if let Err(err) = res {
                    error!(error = %err, "proposed commit reconcile error");
                }
            }),
        Controller::new(pull_requests, Default::default())
            .run(
                controllers::pull_request_controller::reconcile,
                controllers::pull_request_controller::error_policy,
                context.clone(),
            )
            .for_each(|res| async move {
                if let Err(err) = res {
                    error!(error = %err, "pull request reconcile error");
                }
            }),
        Controller::new(commit_statuses, Default::default())
            .run(
                controllers::commit_status_controller::reconcile,
                controllers::commit_status_controller::error_policy,
                context.clone(),
            )
            .for_each(|res| async move {
                if let Err(err) = res {
                    error!(error = %err, "commit status reconcile error");
                }
            }),
    );
}
