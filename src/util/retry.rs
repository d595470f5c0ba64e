/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: util/retry.rs
 *
 * Bounded retry-on-conflict for spec/finalizer writes that may race other
 * actors (spec.md §5 "Write contention", §7 "Conflict"). Mirrors the
 * re-read-then-write dance in the teacher's finalizer patch calls
 * (`release_controller.rs`), generalized into a small combinator instead of
 * being inlined at every call site.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use kube::Error as KubeError;
use std::future::Future;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Runs `attempt` up to `DEFAULT_MAX_ATTEMPTS` times, retrying only on HTTP
/// 409 Conflict responses from the API server. Any other error — or
/// exhausting the attempt budget — is returned to the caller.
pub async fn retry_on_conflict<T, F, Fut>(mut attempt: F) -> Result<T, KubeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, KubeError>>,
{
    let mut last_err = None;
    for _ in 0..DEFAULT_MAX_ATTEMPTS {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(KubeError::Api(api_err)) if api_err.code == 409 => {
                last_err = Some(KubeError::Api(api_err));
                continue;
            }
            Err(other) => return Err(other),
        }
    }
    Err(last_err.expect("loop always runs at least once"))
}
