//! Parsing of probe output.

use super::ProbeError;
use regex::Regex;
use semver::Version;
use std::collections::HashMap;
use std::net::IpAddr;

/// Parse a semantic version from CLI output.
///
/// - `Docker version 24.0.7, build afdd53b` -> 24.0.7
/// - `Docker Compose version v2.23.0` -> 2.23.0
/// - `1.56.1\n  tailscale commit: ...` -> 1.56.1
/// - `git version 2.43.0` -> 2.43.0
pub(crate) fn parse_version(output: &str) -> Result<Version, ProbeError> {
    let re = Regex::new(r"(\d+)\.(\d+)\.(\d+)").expect("Invalid regex pattern");

    if let Some(caps) = re.captures(output) {
        let version_str = caps.get(0).expect("Capture group 0 should exist").as_str();
        Version::parse(version_str).map_err(|_| ProbeError::InvalidOutput)
    } else {
        Err(ProbeError::InvalidOutput)
    }
}

/// Parse `KEY=value` lines of an os-release file, unquoting values.
pub(crate) fn parse_os_release(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// Whether `tailscale status --json` reports a connected backend.
pub(crate) fn tailscale_connected(status_json: &str) -> Result<bool, ProbeError> {
    let value: serde_json::Value =
        serde_json::from_str(status_json).map_err(|_| ProbeError::InvalidOutput)?;
    let state = value
        .get("BackendState")
        .and_then(|v| v.as_str())
        .ok_or(ProbeError::InvalidOutput)?;
    Ok(state == "Running")
}

/// Total memory in GB from `/proc/meminfo` (`MemTotal:  16318412 kB`).
pub(crate) fn parse_meminfo_total_gb(content: &str) -> Result<f64, ProbeError> {
    let line = content
        .lines()
        .find(|line| line.starts_with("MemTotal:"))
        .ok_or(ProbeError::InvalidOutput)?;
    let kb: f64 = line
        .split_whitespace()
        .nth(1)
        .and_then(|v| v.parse().ok())
        .ok_or(ProbeError::InvalidOutput)?;
    Ok(kb / (1024.0 * 1024.0))
}

/// Total memory in GB from `sysctl -n hw.memsize` (bytes).
pub(crate) fn parse_memsize_gb(output: &str) -> Result<f64, ProbeError> {
    let bytes: f64 = output.trim().parse().map_err(|_| ProbeError::InvalidOutput)?;
    Ok(bytes / (1024.0 * 1024.0 * 1024.0))
}

/// Available space in GB from POSIX `df -Pk` output.
///
/// ```text
/// Filesystem     1024-blocks      Used Available Capacity Mounted on
/// /dev/sda1        102687672  43310224  54118484      45% /
/// ```
pub(crate) fn parse_df_available_gb(output: &str) -> Result<f64, ProbeError> {
    let row = output.lines().nth(1).ok_or(ProbeError::InvalidOutput)?;
    let kb: f64 = row
        .split_whitespace()
        .nth(3)
        .and_then(|v| v.parse().ok())
        .ok_or(ProbeError::InvalidOutput)?;
    Ok(kb / (1024.0 * 1024.0))
}

/// Local IPv4 addresses from `/proc/net/fib_trie`.
///
/// Addresses are the leaves followed by a `/32 host LOCAL` line.
pub(crate) fn parse_fib_trie(content: &str) -> Vec<IpAddr> {
    let mut addresses = Vec::new();
    let mut last_leaf: Option<&str> = None;

    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(leaf) = trimmed.strip_prefix("|-- ") {
            last_leaf = Some(leaf.trim());
        } else if trimmed.starts_with("/32 host LOCAL") {
            if let Some(addr) = last_leaf.and_then(|leaf| leaf.parse::<IpAddr>().ok()) {
                push_unique(&mut addresses, addr);
            }
        }
    }

    addresses.retain(|addr| !addr.is_loopback());
    addresses
}

/// Addresses from whitespace-separated tool output (`hostname -I`) or from
/// `ip -o -4 addr show` lines (`2: eth0    inet 10.0.0.5/24 brd ...`).
pub(crate) fn parse_address_list(output: &str) -> Vec<IpAddr> {
    let mut addresses = Vec::new();
    let tokens: Vec<&str> = output.split_whitespace().collect();
    let ip_style = tokens.iter().any(|t| *t == "inet" || *t == "inet6");

    for (i, token) in tokens.iter().enumerate() {
        if ip_style && !matches!(i.checked_sub(1).map(|p| tokens[p]), Some("inet" | "inet6")) {
            continue;
        }
        let candidate = token.split('/').next().unwrap_or(token);
        if let Ok(addr) = candidate.parse::<IpAddr>() {
            if !addr.is_loopback() && !addr.is_unspecified() {
                push_unique(&mut addresses, addr);
            }
        }
    }
    addresses
}

fn push_unique(addresses: &mut Vec<IpAddr>, addr: IpAddr) {
    if !addresses.contains(&addr) {
        addresses.push(addr);
    }
}
