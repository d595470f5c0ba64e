/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: error.rs
 *
 * The operator's top-level error taxonomy. Individual reconcilers keep their
 * own narrower error enums (see `controllers::promotion_strategy_controller`,
 * `controllers::pull_request_controller`, etc., in the style of the
 * teacher's `ReleaseError`); this enum covers the errors that can surface
 * from setup/bootstrap before any reconciler runs.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
}
