// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Declarative gateway configuration produced by the builder.
//!
//! The document is flat: objects refer to each other by name only. The builder
//! guarantees that every such reference resolves, see
//! [`ConfigurationDocument::dangling_references`].

use crate::constants::MANAGED_PREFIX;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Application protocol spoken between the gateway and a backend or client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Http,
    Https,
}

/// How a routing rule path is compared with the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PathMatchKind {
    Exact,
    Prefix,
}

/// Path condition of a routing rule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathMatcher {
    pub kind: PathMatchKind,
    pub value: String,
}

impl std::fmt::Display for PathMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            PathMatchKind::Exact => write!(f, "exact {}", self.value),
            PathMatchKind::Prefix => write!(f, "prefix {}", self.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    pub name: String,
    pub protocol: Protocol,
    pub host: String,
    pub path: String,
    pub interval: i32,
    pub timeout: i32,
    pub unhealthy_threshold: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_status_codes: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendAddressPool {
    pub name: String,
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDraining {
    pub drain_timeout_secs: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendHttpSettings {
    pub name: String,
    pub port: i32,
    pub protocol: Protocol,
    /// Name of the probe checking this backend
    pub probe: String,
    pub cookie_based_affinity: bool,
    pub request_timeout: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_draining: Option<ConnectionDraining>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendPort {
    pub name: String,
    pub port: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslCertificate {
    pub name: String,
    /// Base64 encoded PEM certificate chain followed by the private key
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpListener {
    pub name: String,
    pub frontend_port: String,
    pub protocol: Protocol,
    /// `None` for a listener accepting any host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_certificate: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleAction {
    #[serde(rename_all = "camelCase")]
    Forward {
        backend_address_pool: String,
        backend_http_settings: String,
    },
    #[serde(rename_all = "camelCase")]
    Redirect {
        target_listener: String,
        include_path: bool,
        include_query_string: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRoutingRule {
    pub name: String,
    pub priority: u32,
    pub http_listener: String,
    /// `None` matches every path on the listener
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathMatcher>,
    pub action: RuleAction,
}

/// Complete desired state of the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationDocument {
    #[serde(default)]
    pub probes: Vec<Probe>,
    #[serde(default)]
    pub backend_address_pools: Vec<BackendAddressPool>,
    #[serde(default)]
    pub backend_http_settings: Vec<BackendHttpSettings>,
    #[serde(default)]
    pub frontend_ports: Vec<FrontendPort>,
    #[serde(default)]
    pub ssl_certificates: Vec<SslCertificate>,
    #[serde(default)]
    pub http_listeners: Vec<HttpListener>,
    #[serde(default)]
    pub request_routing_rules: Vec<RequestRoutingRule>,
}

/// Whether an object name belongs to this controller.
#[must_use]
pub fn is_managed_name(name: &str) -> bool {
    name.strip_prefix(MANAGED_PREFIX)
        .is_some_and(|rest| rest.starts_with('-'))
}

impl ConfigurationDocument {
    /// Sort every collection into its canonical order.
    ///
    /// Routing rules are ordered by priority, everything else by name.
    pub fn sort(&mut self) {
        self.probes.sort_by(|a, b| a.name.cmp(&b.name));
        self.backend_address_pools
            .sort_by(|a, b| a.name.cmp(&b.name));
        self.backend_http_settings
            .sort_by(|a, b| a.name.cmp(&b.name));
        self.frontend_ports.sort_by(|a, b| a.name.cmp(&b.name));
        self.ssl_certificates.sort_by(|a, b| a.name.cmp(&b.name));
        self.http_listeners.sort_by(|a, b| a.name.cmp(&b.name));
        self.request_routing_rules
            .sort_by(|a, b| (a.priority, &a.name).cmp(&(b.priority, &b.name)));
    }

    /// Every reference that does not resolve inside this document.
    ///
    /// An empty result means the document is self-consistent.
    #[must_use]
    pub fn dangling_references(&self) -> Vec<String> {
        let probes: BTreeSet<&str> = self.probes.iter().map(|p| p.name.as_str()).collect();
        let pools: BTreeSet<&str> = self
            .backend_address_pools
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        let settings: BTreeSet<&str> = self
            .backend_http_settings
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        let ports: BTreeSet<&str> = self
            .frontend_ports
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        let certificates: BTreeSet<&str> = self
            .ssl_certificates
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        let listeners: BTreeSet<&str> = self
            .http_listeners
            .iter()
            .map(|l| l.name.as_str())
            .collect();

        let mut dangling = Vec::new();
        for s in &self.backend_http_settings {
            if !probes.contains(s.probe.as_str()) {
                dangling.push(format!("http settings '{}' -> probe '{}'", s.name, s.probe));
            }
        }
        for l in &self.http_listeners {
            if !ports.contains(l.frontend_port.as_str()) {
                dangling.push(format!(
                    "listener '{}' -> frontend port '{}'",
                    l.name, l.frontend_port
                ));
            }
            if let Some(cert) = &l.ssl_certificate {
                if !certificates.contains(cert.as_str()) {
                    dangling.push(format!("listener '{}' -> certificate '{cert}'", l.name));
                }
            }
        }
        for r in &self.request_routing_rules {
            if !listeners.contains(r.http_listener.as_str()) {
                dangling.push(format!(
                    "routing rule '{}' -> listener '{}'",
                    r.name, r.http_listener
                ));
            }
            match &r.action {
                RuleAction::Forward {
                    backend_address_pool,
                    backend_http_settings,
                } => {
                    if !pools.contains(backend_address_pool.as_str()) {
                        dangling.push(format!(
                            "routing rule '{}' -> pool '{backend_address_pool}'",
                            r.name
                        ));
                    }
                    if !settings.contains(backend_http_settings.as_str()) {
                        dangling.push(format!(
                            "routing rule '{}' -> http settings '{backend_http_settings}'",
                            r.name
                        ));
                    }
                }
                RuleAction::Redirect {
                    target_listener, ..
                } => {
                    if !listeners.contains(target_listener.as_str()) {
                        dangling.push(format!(
                            "routing rule '{}' -> redirect listener '{target_listener}'",
                            r.name
                        ));
                    }
                }
            }
        }
        dangling
    }

    /// Object counts by kind, for logs and metrics.
    #[must_use]
    pub fn object_counts(&self) -> [(&'static str, usize); 7] {
        [
            ("probe", self.probes.len()),
            ("backend_address_pool", self.backend_address_pools.len()),
            ("backend_http_settings", self.backend_http_settings.len()),
            ("frontend_port", self.frontend_ports.len()),
            ("ssl_certificate", self.ssl_certificates.len()),
            ("http_listener", self.http_listeners.len()),
            ("request_routing_rule", self.request_routing_rules.len()),
        ]
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
