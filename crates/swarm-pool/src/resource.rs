//! Human-readable resource-limit string parsing (SPEC_FULL.md "Resource-limit
//! parsing helpers").
//!
//! spec.md's `Agent` resource-limit record (§3) is a typed numeric record,
//! but real configs in this domain are authored as strings ("100MB", "50%",
//! "5m"). Parsing lives at the pool boundary, ported from
//! `toka-agent-runtime::resource`'s `parse_memory_string`/`parse_cpu_string`/
//! `parse_duration_string`; the numeric `swarm_types::ResourceLimits` the
//! core invariants operate over never carries a string representation.

use swarm_types::ResourceLimits;
use thiserror::Error;

/// Errors produced while parsing a human-readable resource-limit string.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResourceParseError {
    /// A memory string (e.g. `"100MB"`) could not be parsed.
    #[error("invalid memory string: {0}")]
    Memory(String),
    /// A duration string (e.g. `"5m"`) could not be parsed.
    #[error("invalid duration string: {0}")]
    Duration(String),
    /// A plain count string could not be parsed.
    #[error("invalid count string: {0}")]
    Count(String),
}

/// Parse a memory string (`"100MB"`, `"1GB"`, `"512KB"`, or a raw byte count)
/// into bytes.
pub fn parse_memory_bytes(raw: &str) -> Result<u64, ResourceParseError> {
    let upper = raw.trim().to_uppercase();
    let num = |slice: &str| -> Result<u64, ResourceParseError> {
        slice
            .trim()
            .parse::<u64>()
            .map_err(|_| ResourceParseError::Memory(raw.to_string()))
    };
    if let Some(pos) = upper.find("GB") {
        Ok(num(&upper[..pos])? * 1024 * 1024 * 1024)
    } else if let Some(pos) = upper.find("MB") {
        Ok(num(&upper[..pos])? * 1024 * 1024)
    } else if let Some(pos) = upper.find("KB") {
        Ok(num(&upper[..pos])? * 1024)
    } else if let Some(pos) = upper.find('B') {
        num(&upper[..pos])
    } else {
        num(&upper)
    }
}

/// Parse a duration string (`"5m"`, `"1h"`, `"30s"`, `"250ms"`, or a raw
/// second count) into milliseconds.
pub fn parse_duration_ms(raw: &str) -> Result<u64, ResourceParseError> {
    let lower = raw.trim().to_lowercase();
    let num = |slice: &str| -> Result<u64, ResourceParseError> {
        slice
            .trim()
            .parse::<u64>()
            .map_err(|_| ResourceParseError::Duration(raw.to_string()))
    };
    if let Some(pos) = lower.find("ms") {
        num(&lower[..pos])
    } else if let Some(pos) = lower.find('h') {
        Ok(num(&lower[..pos])? * 3_600_000)
    } else if let Some(pos) = lower.find('m') {
        Ok(num(&lower[..pos])? * 60_000)
    } else if let Some(pos) = lower.find('s') {
        Ok(num(&lower[..pos])? * 1_000)
    } else {
        Ok(num(&lower)? * 1_000)
    }
}

/// Parse a bare count string (network calls, file handles) into a `u32`.
pub fn parse_count(raw: &str) -> Result<u32, ResourceParseError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ResourceParseError::Count(raw.to_string()))
}

/// String-authored overrides for [`ResourceLimits`]; any field left `None`
/// keeps the value from the base record passed to [`resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceLimitStrings {
    /// Overrides `max_memory_bytes`, e.g. `"512MB"`.
    pub max_memory: Option<String>,
    /// Overrides `max_cpu_time_ms`, e.g. `"2m"`.
    pub max_cpu_time: Option<String>,
    /// Overrides `max_disk_bytes`, e.g. `"1GB"`.
    pub max_disk: Option<String>,
    /// Overrides `max_network_calls`, e.g. `"100"`.
    pub max_network_calls: Option<String>,
    /// Overrides `max_file_handles`, e.g. `"64"`.
    pub max_file_handles: Option<String>,
    /// Overrides `execution_timeout_ms`, e.g. `"5m"`.
    pub execution_timeout: Option<String>,
}

/// Resolve string overrides against a numeric base, producing the
/// [`ResourceLimits`] record agents actually carry.
pub fn resolve(
    base: ResourceLimits,
    overrides: &ResourceLimitStrings,
) -> Result<ResourceLimits, ResourceParseError> {
    Ok(ResourceLimits {
        max_memory_bytes: match &overrides.max_memory {
            Some(s) => parse_memory_bytes(s)?,
            None => base.max_memory_bytes,
        },
        max_cpu_time_ms: match &overrides.max_cpu_time {
            Some(s) => parse_duration_ms(s)?,
            None => base.max_cpu_time_ms,
        },
        max_disk_bytes: match &overrides.max_disk {
            Some(s) => parse_memory_bytes(s)?,
            None => base.max_disk_bytes,
        },
        max_network_calls: match &overrides.max_network_calls {
            Some(s) => parse_count(s)?,
            None => base.max_network_calls,
        },
        max_file_handles: match &overrides.max_file_handles {
            Some(s) => parse_count(s)?,
            None => base.max_file_handles,
        },
        execution_timeout_ms: match &overrides.execution_timeout {
            Some(s) => parse_duration_ms(s)?,
            None => base.execution_timeout_ms,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_memory_units() {
        assert_eq!(parse_memory_bytes("100MB").unwrap(), 100 * 1024 * 1024);
        assert_eq!(parse_memory_bytes("1GB").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_memory_bytes("512KB").unwrap(), 512 * 1024);
        assert_eq!(parse_memory_bytes("1024").unwrap(), 1024);
    }

    #[test]
    fn parses_duration_units() {
        assert_eq!(parse_duration_ms("5m").unwrap(), 300_000);
        assert_eq!(parse_duration_ms("1h").unwrap(), 3_600_000);
        assert_eq!(parse_duration_ms("30s").unwrap(), 30_000);
        assert_eq!(parse_duration_ms("250ms").unwrap(), 250);
        assert_eq!(parse_duration_ms("7").unwrap(), 7_000);
    }

    #[test]
    fn resolve_overrides_only_named_fields() {
        let base = ResourceLimits::default();
        let overrides = ResourceLimitStrings {
            max_memory: Some("256MB".to_string()),
            ..Default::default()
        };
        let resolved = resolve(base, &overrides).unwrap();
        assert_eq!(resolved.max_memory_bytes, 256 * 1024 * 1024);
        assert_eq!(resolved.max_cpu_time_ms, base.max_cpu_time_ms);
    }

    #[test]
    fn invalid_memory_string_errors() {
        assert!(parse_memory_bytes("not-a-number").is_err());
    }
}
