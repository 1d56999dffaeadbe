// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ingress annotations understood by the controller.
//!
//! Annotations apply to every backend of the Ingress carrying them. Values that
//! cannot be parsed fall back to the default for that field and are reported as a
//! [`BuildIssue::MalformedAnnotation`] warning; they never abort a build.

use crate::appgw::types::Protocol;
use crate::constants::{
    DEFAULT_CONNECTION_DRAINING_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
    MAX_CONNECTION_DRAINING_TIMEOUT_SECS, MAX_PROBE_INTERVAL_SECS, MAX_PROBE_UNHEALTHY_THRESHOLD,
    MAX_REQUEST_TIMEOUT_SECS,
};
use crate::context::ResourceKey;
use crate::errors::BuildIssue;
use std::collections::BTreeMap;

// ============================================================================
// Ingress Class
// ============================================================================

/// Legacy annotation selecting the ingress controller
pub const INGRESS_CLASS: &str = "kubernetes.io/ingress.class";

// ============================================================================
// Application Gateway Annotations
// ============================================================================

/// Common prefix of all controller annotations
pub const PREFIX: &str = "appgw.ingress.kubernetes.io";

/// Path probed by the health probe (default `/`)
pub const HEALTH_PROBE_PATH: &str = "appgw.ingress.kubernetes.io/health-probe-path";

/// Host header sent by the health probe
pub const HEALTH_PROBE_HOSTNAME: &str = "appgw.ingress.kubernetes.io/health-probe-hostname";

/// Probe interval in seconds
pub const HEALTH_PROBE_INTERVAL: &str = "appgw.ingress.kubernetes.io/health-probe-interval";

/// Probe timeout in seconds
pub const HEALTH_PROBE_TIMEOUT: &str = "appgw.ingress.kubernetes.io/health-probe-timeout";

/// Consecutive failures before a backend is unhealthy
pub const HEALTH_PROBE_UNHEALTHY_THRESHOLD: &str =
    "appgw.ingress.kubernetes.io/health-probe-unhealthy-threshold";

/// Comma separated status codes or ranges accepted as healthy (e.g. `200-399,401`)
pub const HEALTH_PROBE_STATUS_CODES: &str = "appgw.ingress.kubernetes.io/health-probe-status-codes";

/// `true` to drain connections of removed backends
pub const CONNECTION_DRAINING: &str = "appgw.ingress.kubernetes.io/connection-draining";

/// Draining timeout in seconds
pub const CONNECTION_DRAINING_TIMEOUT: &str =
    "appgw.ingress.kubernetes.io/connection-draining-timeout";

/// `true` to pin clients to a backend with a gateway-managed cookie
pub const COOKIE_BASED_AFFINITY: &str = "appgw.ingress.kubernetes.io/cookie-based-affinity";

/// Backend request timeout in seconds
pub const REQUEST_TIMEOUT: &str = "appgw.ingress.kubernetes.io/request-timeout";

/// `http` or `https` towards the pods
pub const BACKEND_PROTOCOL: &str = "appgw.ingress.kubernetes.io/backend-protocol";

/// Host header sent to the pods
pub const BACKEND_HOSTNAME: &str = "appgw.ingress.kubernetes.io/backend-hostname";

/// Prefix replacing the matched path when forwarding
pub const BACKEND_PATH_PREFIX: &str = "appgw.ingress.kubernetes.io/backend-path-prefix";

/// `true` to redirect plain HTTP to the HTTPS listener of the same host
pub const SSL_REDIRECT: &str = "appgw.ingress.kubernetes.io/ssl-redirect";

/// Per-Ingress settings derived from annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressSettings {
    pub backend_protocol: Protocol,
    pub health_probe_path: Option<String>,
    pub health_probe_hostname: Option<String>,
    pub health_probe_interval: Option<i32>,
    pub health_probe_timeout: Option<i32>,
    pub health_probe_unhealthy_threshold: Option<i32>,
    pub health_probe_status_codes: Option<Vec<String>>,
    pub connection_draining: bool,
    pub connection_draining_timeout: i32,
    pub cookie_based_affinity: bool,
    pub request_timeout: i32,
    pub backend_hostname: Option<String>,
    pub backend_path_prefix: Option<String>,
    pub ssl_redirect: bool,
}

impl Default for IngressSettings {
    fn default() -> Self {
        Self {
            backend_protocol: Protocol::Http,
            health_probe_path: None,
            health_probe_hostname: None,
            health_probe_interval: None,
            health_probe_timeout: None,
            health_probe_unhealthy_threshold: None,
            health_probe_status_codes: None,
            connection_draining: false,
            connection_draining_timeout: DEFAULT_CONNECTION_DRAINING_TIMEOUT_SECS,
            cookie_based_affinity: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
            backend_hostname: None,
            backend_path_prefix: None,
            ssl_redirect: false,
        }
    }
}

/// Parse the controller annotations of one Ingress.
///
/// Unknown annotations are ignored. Every rejected value yields one warning and
/// leaves the corresponding field at its default.
#[must_use]
pub fn parse_settings(
    ingress: &ResourceKey,
    annotations: &BTreeMap<String, String>,
) -> (IngressSettings, Vec<BuildIssue>) {
    let mut parser = Parser {
        ingress,
        annotations,
        issues: Vec::new(),
    };
    let defaults = IngressSettings::default();

    let settings = IngressSettings {
        backend_protocol: parser
            .parse(BACKEND_PROTOCOL, parse_protocol)
            .unwrap_or(defaults.backend_protocol),
        health_probe_path: parser.parse(HEALTH_PROBE_PATH, parse_path),
        health_probe_hostname: parser.parse(HEALTH_PROBE_HOSTNAME, parse_hostname),
        health_probe_interval: parser.parse(HEALTH_PROBE_INTERVAL, |v| {
            parse_bounded(v, 1, MAX_PROBE_INTERVAL_SECS)
        }),
        health_probe_timeout: parser.parse(HEALTH_PROBE_TIMEOUT, |v| {
            parse_bounded(v, 1, MAX_PROBE_INTERVAL_SECS)
        }),
        health_probe_unhealthy_threshold: parser.parse(HEALTH_PROBE_UNHEALTHY_THRESHOLD, |v| {
            parse_bounded(v, 1, MAX_PROBE_UNHEALTHY_THRESHOLD)
        }),
        health_probe_status_codes: parser.parse(HEALTH_PROBE_STATUS_CODES, parse_status_codes),
        connection_draining: parser
            .parse(CONNECTION_DRAINING, parse_bool)
            .unwrap_or(defaults.connection_draining),
        connection_draining_timeout: parser
            .parse(CONNECTION_DRAINING_TIMEOUT, |v| {
                parse_bounded(v, 1, MAX_CONNECTION_DRAINING_TIMEOUT_SECS)
            })
            .unwrap_or(defaults.connection_draining_timeout),
        cookie_based_affinity: parser
            .parse(COOKIE_BASED_AFFINITY, parse_bool)
            .unwrap_or(defaults.cookie_based_affinity),
        request_timeout: parser
            .parse(REQUEST_TIMEOUT, |v| parse_bounded(v, 1, MAX_REQUEST_TIMEOUT_SECS))
            .unwrap_or(defaults.request_timeout),
        backend_hostname: parser.parse(BACKEND_HOSTNAME, parse_hostname),
        backend_path_prefix: parser.parse(BACKEND_PATH_PREFIX, parse_path),
        ssl_redirect: parser
            .parse(SSL_REDIRECT, parse_bool)
            .unwrap_or(defaults.ssl_redirect),
    };

    (settings, parser.issues)
}

struct Parser<'a> {
    ingress: &'a ResourceKey,
    annotations: &'a BTreeMap<String, String>,
    issues: Vec<BuildIssue>,
}

impl Parser<'_> {
    fn parse<T>(&mut self, key: &str, parse: impl FnOnce(&str) -> Result<T, String>) -> Option<T> {
        let raw = self.annotations.get(key)?;
        match parse(raw.trim()) {
            Ok(value) => Some(value),
            Err(reason) => {
                self.issues.push(BuildIssue::MalformedAnnotation {
                    ingress: self.ingress.clone(),
                    annotation: key.to_string(),
                    value: raw.clone(),
                    reason,
                });
                None
            }
        }
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err("expected 'true' or 'false'".to_string()),
    }
}

fn parse_bounded(value: &str, min: i32, max: i32) -> Result<i32, String> {
    let parsed: i32 = value
        .parse()
        .map_err(|_| "expected an integer".to_string())?;
    if (min..=max).contains(&parsed) {
        Ok(parsed)
    } else {
        Err(format!("must be between {min} and {max}"))
    }
}

fn parse_protocol(value: &str) -> Result<Protocol, String> {
    match value.to_ascii_lowercase().as_str() {
        "http" => Ok(Protocol::Http),
        "https" => Ok(Protocol::Https),
        _ => Err("expected 'http' or 'https'".to_string()),
    }
}

fn parse_path(value: &str) -> Result<String, String> {
    if !value.starts_with('/') {
        return Err("path must start with '/'".to_string());
    }
    if value.chars().any(char::is_whitespace) {
        return Err("path must not contain whitespace".to_string());
    }
    Ok(value.to_string())
}

fn parse_hostname(value: &str) -> Result<String, String> {
    if value.is_empty() {
        return Err("hostname must not be empty".to_string());
    }
    let valid = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | ':'));
    if !valid {
        return Err("hostname contains invalid characters".to_string());
    }
    Ok(value.to_ascii_lowercase())
}

/// Accepts `200`, `200-399` and comma separated lists of both.
fn parse_status_codes(value: &str) -> Result<Vec<String>, String> {
    let mut codes = Vec::new();
    for item in value.split(',').map(str::trim) {
        let (low, high) = match item.split_once('-') {
            Some((low, high)) => (parse_status(low)?, parse_status(high)?),
            None => {
                let code = parse_status(item)?;
                (code, code)
            }
        };
        if low > high {
            return Err(format!("range '{item}' is reversed"));
        }
        codes.push(item.to_string());
    }
    Ok(codes)
}

fn parse_status(value: &str) -> Result<u16, String> {
    match value.trim().parse::<u16>() {
        Ok(code) if (100..=599).contains(&code) => Ok(code),
        _ => Err(format!("'{value}' is not an HTTP status code")),
    }
}

#[cfg(test)]
#[path = "annotations_tests.rs"]
mod annotations_tests;
