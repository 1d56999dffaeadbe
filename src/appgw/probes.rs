// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Health probe synthesis.
//!
//! Probes are deduplicated by [`ProbeKey`], the normalized `(host, path, protocol)`
//! triple: any number of backends sharing a host, path and protocol contribute
//! exactly one probe. The first backend (in resolution order) mapping to a key
//! decides the probe's timing fields.
//!
//! A catch-all probe for `(localhost, /, Http)` always exists so the default HTTP
//! settings have something to reference.

use crate::appgw::backends::ResolvedBackend;
use crate::appgw::naming::{default_probe_name, probe_name, NameRegistry};
use crate::appgw::types::{Probe, Protocol};
use crate::constants::{
    DEFAULT_PROBE_HOST, DEFAULT_PROBE_INTERVAL_SECS, DEFAULT_PROBE_PATH,
    DEFAULT_PROBE_TIMEOUT_SECS, DEFAULT_PROBE_UNHEALTHY_THRESHOLD,
};
use std::collections::BTreeMap;

/// Deduplication unit of probes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProbeKey {
    pub host: String,
    pub path: String,
    pub protocol: Protocol,
}

impl ProbeKey {
    /// Normalized key: lower-case host, path always starting with `/`.
    pub fn new(host: &str, path: &str, protocol: Protocol) -> Self {
        let host = host.trim().to_ascii_lowercase();
        let path = path.trim();
        Self {
            host: if host.is_empty() {
                DEFAULT_PROBE_HOST.to_string()
            } else {
                host
            },
            path: if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            },
            protocol,
        }
    }

    /// `(localhost, /, Http)`, the key of the catch-all probe.
    #[must_use]
    pub fn catch_all() -> Self {
        Self::new(DEFAULT_PROBE_HOST, DEFAULT_PROBE_PATH, Protocol::Http)
    }

    /// Key of the probe checking `backend`.
    ///
    /// Host: probe host annotation, else the rule host, else `localhost`.
    /// Path: probe path annotation, else the rule path without a trailing `*`,
    /// else `/`.
    #[must_use]
    pub fn for_backend(backend: &ResolvedBackend) -> Self {
        let host = backend
            .settings
            .health_probe_hostname
            .as_deref()
            .or(backend.host.as_deref())
            .unwrap_or(DEFAULT_PROBE_HOST);
        let path = backend
            .settings
            .health_probe_path
            .as_deref()
            .or_else(|| backend.path.as_deref().map(|p| p.trim_end_matches('*')))
            .unwrap_or(DEFAULT_PROBE_PATH);
        Self::new(host, path, backend.settings.backend_protocol)
    }

    /// Stable text form, e.g. `http://bye.com/a/b`.
    #[must_use]
    pub fn identity(&self) -> String {
        let scheme = match self.protocol {
            Protocol::Http => "http",
            Protocol::Https => "https",
        };
        format!("{scheme}://{}{}", self.host, self.path)
    }
}

/// Output of [`synthesize_probes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSynthesis {
    /// Probes sorted by name
    pub probes: Vec<Probe>,
    /// Probe name for every key, including the catch-all
    pub names_by_key: BTreeMap<ProbeKey, String>,
}

impl ProbeSynthesis {
    /// Name of the probe checking `backend`.
    #[must_use]
    pub fn name_for(&self, backend: &ResolvedBackend) -> Option<&str> {
        self.names_by_key
            .get(&ProbeKey::for_backend(backend))
            .map(String::as_str)
    }
}

/// Derive the distinct probes needed by `backends`.
#[must_use]
pub fn synthesize_probes(backends: &[ResolvedBackend]) -> ProbeSynthesis {
    let mut owners: BTreeMap<ProbeKey, Option<&ResolvedBackend>> = BTreeMap::new();
    owners.insert(ProbeKey::catch_all(), None);
    for backend in backends {
        owners
            .entry(ProbeKey::for_backend(backend))
            .or_insert(Some(backend));
    }

    let mut registry = NameRegistry::new();
    let default_name = default_probe_name();
    registry.reserve(&default_name);

    let mut probes = Vec::with_capacity(owners.len());
    let mut names_by_key = BTreeMap::new();
    for (key, owner) in owners {
        let probe = match owner {
            None => Probe {
                name: default_name.clone(),
                protocol: Protocol::Http,
                host: key.host.clone(),
                path: key.path.clone(),
                interval: DEFAULT_PROBE_INTERVAL_SECS,
                timeout: DEFAULT_PROBE_TIMEOUT_SECS,
                unhealthy_threshold: DEFAULT_PROBE_UNHEALTHY_THRESHOLD,
                match_status_codes: None,
            },
            Some(backend) => {
                let settings = &backend.settings;
                let identity = key.identity();
                Probe {
                    name: registry.claim(&probe_name(backend, &identity), &identity),
                    protocol: key.protocol,
                    host: key.host.clone(),
                    path: key.path.clone(),
                    interval: settings
                        .health_probe_interval
                        .unwrap_or(DEFAULT_PROBE_INTERVAL_SECS),
                    timeout: settings
                        .health_probe_timeout
                        .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS),
                    unhealthy_threshold: settings
                        .health_probe_unhealthy_threshold
                        .unwrap_or(DEFAULT_PROBE_UNHEALTHY_THRESHOLD),
                    match_status_codes: settings.health_probe_status_codes.clone(),
                }
            }
        };
        names_by_key.insert(key, probe.name.clone());
        probes.push(probe);
    }
    probes.sort_by(|a, b| a.name.cmp(&b.name));

    ProbeSynthesis {
        probes,
        names_by_key,
    }
}

#[cfg(test)]
#[path = "probes_tests.rs"]
mod probes_tests;
