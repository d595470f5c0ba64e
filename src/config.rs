/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: config.rs
 *
 * The operator's runtime configuration, built by merging CLI flags over
 * built-in defaults (spec.md §6 CLI surface). No config-file format is
 * introduced since spec.md names only CLI flags as the external surface.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::cli::Args;
use crate::error::Error;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OperatorConfig {
    pub metrics_bind_address: String,
    pub health_bind_address: String,
    pub leader_election: bool,
    pub http2: bool,
    pub promotion_strategy_requeue_after: Duration,
    pub pull_request_requeue_after: Duration,
}

impl OperatorConfig {
    pub fn from_args(args: Args) -> Result<Self, Error> {
        Ok(Self {
            metrics_bind_address: args.metrics_bind_address,
            health_bind_address: args.health_bind_address,
            leader_election: args.leader_election,
            http2: args.http2,
            promotion_strategy_requeue_after: parse_duration(&args.promotion_strategy_requeue_after)?,
            pull_request_requeue_after: parse_duration(&args.pull_request_requeue_after)?,
        })
    }
}

/// Parses a Kubernetes-style duration string ("60s", "5m", "1h"). Only the
/// three units named in spec.md §6 are supported — this is not a general
/// ISO-8601 duration parser.
fn parse_duration(raw: &str) -> Result<Duration, Error> {
    let raw = raw.trim();
    let (number, unit) = raw.split_at(raw.len().saturating_sub(1));
    let value: u64 = number
        .parse()
        .map_err(|_| Error::Config(format!("invalid duration '{raw}'")))?;
    let seconds = match unit {
        "s" => value,
        "m" => value * 60,
        "h" => value * 3600,
        _ => return Err(Error::Config(format!("invalid duration unit in '{raw}'"))),
    };
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seconds_minutes_hours() {
        assert_eq!(parse_duration("60s").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(parse_duration("60x").is_err());
    }

    #[test]
    fn rejects_non_numeric_value() {
        assert!(parse_duration("fives").is_err());
    }
}
