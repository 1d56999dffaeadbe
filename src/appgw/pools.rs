// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backend address pool and HTTP settings synthesis.
//!
//! Both collections are deduplicated by content. Backends with identical
//! addresses share a pool; backends talking to the same pod port with the same
//! settings share an HTTP settings object. Objects are named after the first
//! backend owning their content.

use crate::appgw::backends::ResolvedBackend;
use crate::appgw::naming::{
    default_http_settings_name, default_pool_name, default_probe_name, http_settings_base_name,
    pool_base_name, NameRegistry,
};
use crate::appgw::probes::{ProbeKey, ProbeSynthesis};
use crate::appgw::types::{BackendAddressPool, BackendHttpSettings, ConnectionDraining, Protocol};
use crate::constants::{DEFAULT_BACKEND_PORT, DEFAULT_REQUEST_TIMEOUT_SECS};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct PoolKey {
    addresses: Vec<String>,
    protocol: Protocol,
    affinity: bool,
}

impl PoolKey {
    fn of(backend: &ResolvedBackend) -> Self {
        Self {
            addresses: backend.addresses.iter().cloned().collect(),
            protocol: backend.settings.backend_protocol,
            affinity: backend.settings.cookie_based_affinity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct SettingsKey {
    port: i32,
    protocol: Protocol,
    probe: ProbeKey,
    affinity: bool,
    draining: Option<i32>,
    request_timeout: i32,
    host_name: Option<String>,
    path: Option<String>,
}

impl SettingsKey {
    fn of(backend: &ResolvedBackend) -> Self {
        let settings = &backend.settings;
        Self {
            port: backend.backend_port,
            protocol: settings.backend_protocol,
            probe: ProbeKey::for_backend(backend),
            affinity: settings.cookie_based_affinity,
            draining: settings
                .connection_draining
                .then_some(settings.connection_draining_timeout),
            request_timeout: settings.request_timeout,
            host_name: settings.backend_hostname.clone(),
            path: settings.backend_path_prefix.clone(),
        }
    }
}

/// Pool and settings a backend forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub pool: String,
    pub settings: String,
}

/// Output of [`synthesize_pools`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSynthesis {
    /// Pools sorted by name, default pool included
    pub pools: Vec<BackendAddressPool>,
    /// HTTP settings sorted by name, default settings included
    pub settings: Vec<BackendHttpSettings>,
    /// `bindings[i]` belongs to the i-th backend passed in
    pub bindings: Vec<Binding>,
}

impl PoolSynthesis {
    /// Binding of the default pool and default settings.
    #[must_use]
    pub fn default_binding() -> Binding {
        Binding {
            pool: default_pool_name(),
            settings: default_http_settings_name(),
        }
    }
}

/// Derive the distinct pools and HTTP settings needed by `backends`.
///
/// `probes` must have been synthesized from the same backends.
#[must_use]
pub fn synthesize_pools(backends: &[ResolvedBackend], probes: &ProbeSynthesis) -> PoolSynthesis {
    let mut pool_owners: BTreeMap<PoolKey, &ResolvedBackend> = BTreeMap::new();
    let mut settings_owners: BTreeMap<SettingsKey, &ResolvedBackend> = BTreeMap::new();
    for backend in backends {
        pool_owners.entry(PoolKey::of(backend)).or_insert(backend);
        settings_owners
            .entry(SettingsKey::of(backend))
            .or_insert(backend);
    }

    let mut pool_registry = NameRegistry::new();
    pool_registry.reserve(&default_pool_name());
    let mut pools = vec![BackendAddressPool {
        name: default_pool_name(),
        addresses: Vec::new(),
    }];
    let mut pool_names = BTreeMap::new();
    for (key, owner) in pool_owners {
        let identity = format!("{}|{:?}|{}", key.addresses.join(","), key.protocol, key.affinity);
        let name = pool_registry.claim(&pool_base_name(owner), &identity);
        pools.push(BackendAddressPool {
            name: name.clone(),
            addresses: key.addresses.clone(),
        });
        pool_names.insert(key, name);
    }

    let mut settings_registry = NameRegistry::new();
    settings_registry.reserve(&default_http_settings_name());
    let mut settings = vec![default_http_settings()];
    let mut settings_names = BTreeMap::new();
    for (key, owner) in settings_owners {
        let identity = format!("{key:?}");
        let name = settings_registry.claim(&http_settings_base_name(owner), &identity);
        settings.push(BackendHttpSettings {
            name: name.clone(),
            port: key.port,
            protocol: key.protocol,
            probe: probes
                .name_for(owner)
                .map_or_else(default_probe_name, str::to_string),
            cookie_based_affinity: key.affinity,
            request_timeout: key.request_timeout,
            connection_draining: key.draining.map(|drain_timeout_secs| ConnectionDraining {
                drain_timeout_secs,
            }),
            host_name: key.host_name.clone(),
            path: key.path.clone(),
        });
        settings_names.insert(key, name);
    }

    let bindings = backends
        .iter()
        .map(|backend| Binding {
            pool: pool_names[&PoolKey::of(backend)].clone(),
            settings: settings_names[&SettingsKey::of(backend)].clone(),
        })
        .collect();

    pools.sort_by(|a, b| a.name.cmp(&b.name));
    settings.sort_by(|a, b| a.name.cmp(&b.name));

    PoolSynthesis {
        pools,
        settings,
        bindings,
    }
}

fn default_http_settings() -> BackendHttpSettings {
    BackendHttpSettings {
        name: default_http_settings_name(),
        port: DEFAULT_BACKEND_PORT,
        protocol: Protocol::Http,
        probe: default_probe_name(),
        cookie_based_affinity: false,
        request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
        connection_draining: None,
        host_name: None,
        path: None,
    }
}

#[cfg(test)]
#[path = "pools_tests.rs"]
mod pools_tests;
