// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backend resolution: Ingress backend reference → Service port → live addresses.
//!
//! Port matching follows Kubernetes semantics: a numeric reference only matches a
//! Service port with that number, a named reference only matches a Service port with
//! that name. Only TCP ports can sit behind a layer-7 gateway.
//!
//! A missing Endpoints object is not an error. It means the backend has no live
//! targets right now, so the backend resolves to an empty address set.

use crate::annotations::IngressSettings;
use crate::constants::PROTOCOL_TCP;
use crate::context::{ResourceCache, ResourceKey};
use crate::errors::BuildIssue;
use crate::ingress::{BackendPort, BackendRef, IngressModel, IngressPathType};
use k8s_openapi::api::core::v1::{Endpoints, ServicePort};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeSet;
use tracing::debug;

/// An Ingress backend bound to a concrete Service port and its ready addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBackend {
    pub ingress: ResourceKey,
    /// Rule host; `None` for host-less rules and the default backend
    pub host: Option<String>,
    /// Rule path; `None` for the default backend and rules without a path
    pub path: Option<String>,
    pub path_type: IngressPathType,
    pub service: ResourceKey,
    /// Port as written in the Ingress
    pub port_ref: BackendPort,
    /// Number of the matched Service port
    pub service_port: i32,
    /// Port the pods listen on
    pub backend_port: i32,
    pub addresses: BTreeSet<String>,
    pub settings: IngressSettings,
}

/// Resolve every backend of every Ingress, in Ingress order.
///
/// Backends that cannot be resolved are left out and reported.
pub fn resolve_backends(
    ingresses: &[IngressModel],
    cache: &impl ResourceCache,
) -> (Vec<ResolvedBackend>, Vec<BuildIssue>) {
    let mut resolved = Vec::new();
    let mut issues = Vec::new();

    for ingress in ingresses {
        let targets = ingress
            .rules
            .iter()
            .flat_map(|rule| {
                rule.paths.iter().map(move |path| {
                    (
                        rule.host.as_deref(),
                        path.path.as_deref(),
                        path.path_type,
                        &path.backend,
                    )
                })
            })
            .chain(
                ingress
                    .default_backend
                    .iter()
                    .map(|backend| (None, None, IngressPathType::Prefix, backend)),
            );

        for (host, path, path_type, backend) in targets {
            match resolve_backend(ingress, host, path, path_type, backend, cache) {
                Ok(backend) => resolved.push(backend),
                Err(issue) => issues.push(issue),
            }
        }
    }

    (resolved, issues)
}

/// Resolve one backend reference of `ingress`.
///
/// # Errors
///
/// Returns the [`BuildIssue`] explaining why the backend was skipped: the Service is
/// missing, no port matches, or the matching port is not TCP.
pub fn resolve_backend(
    ingress: &IngressModel,
    host: Option<&str>,
    path: Option<&str>,
    path_type: IngressPathType,
    backend: &BackendRef,
    cache: &impl ResourceCache,
) -> Result<ResolvedBackend, BuildIssue> {
    let service_key = ResourceKey::new(&ingress.key.namespace, &backend.service);

    let service = cache
        .get_service(&service_key)
        .ok_or_else(|| BuildIssue::ServiceNotFound {
            ingress: ingress.key.clone(),
            service: service_key.clone(),
        })?;

    let ports = service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_deref())
        .unwrap_or_default();
    let port = match_service_port(ports, &backend.port).map_err(|protocol| match protocol {
        Some(protocol) => BuildIssue::UnsupportedProtocol {
            ingress: ingress.key.clone(),
            service: service_key.clone(),
            port: backend.port.to_string(),
            protocol,
        },
        None => BuildIssue::PortNotFound {
            ingress: ingress.key.clone(),
            service: service_key.clone(),
            port: backend.port.to_string(),
        },
    })?;

    let (backend_port, addresses) = match cache.get_endpoints(&service_key) {
        Some(endpoints) => endpoint_addresses(&endpoints, port),
        None => {
            debug!(service = %service_key, "No endpoints cached, backend has no live targets");
            (fallback_backend_port(port), BTreeSet::new())
        }
    };

    Ok(ResolvedBackend {
        ingress: ingress.key.clone(),
        host: host.map(str::to_string),
        path: path.map(str::to_string),
        path_type,
        service: service_key,
        port_ref: backend.port.clone(),
        service_port: port.port,
        backend_port,
        addresses,
        settings: ingress.settings.clone(),
    })
}

/// Find the Service port a backend reference points at.
///
/// On failure returns the protocol of a non-TCP port that matched, or `None` when
/// nothing matched at all.
pub fn match_service_port<'a>(
    ports: &'a [ServicePort],
    reference: &BackendPort,
) -> Result<&'a ServicePort, Option<String>> {
    let matching = ports.iter().filter(|port| match reference {
        BackendPort::Number(number) => port.port == *number,
        BackendPort::Name(name) => port.name.as_deref() == Some(name.as_str()),
    });

    let mut rejected = None;
    for port in matching {
        let protocol = port.protocol.as_deref().unwrap_or(PROTOCOL_TCP);
        if protocol.eq_ignore_ascii_case(PROTOCOL_TCP) {
            return Ok(port);
        }
        rejected.get_or_insert_with(|| protocol.to_string());
    }
    Err(rejected)
}

fn fallback_backend_port(port: &ServicePort) -> i32 {
    match &port.target_port {
        Some(IntOrString::Int(target)) => *target,
        _ => port.port,
    }
}

/// Ready addresses serving `port`, plus the pod port they serve it on.
fn endpoint_addresses(endpoints: &Endpoints, port: &ServicePort) -> (i32, BTreeSet<String>) {
    let mut backend_port = None;
    let mut addresses = BTreeSet::new();

    for subset in endpoints.subsets.as_deref().unwrap_or_default() {
        let subset_ports = subset.ports.as_deref().unwrap_or_default();
        let subset_port = if subset_ports.is_empty() {
            fallback_backend_port(port)
        } else {
            match subset_ports
                .iter()
                .find(|p| p.name.as_deref().unwrap_or("") == port.name.as_deref().unwrap_or(""))
            {
                Some(endpoint_port) => endpoint_port.port,
                None => continue,
            }
        };

        match backend_port {
            None => backend_port = Some(subset_port),
            Some(chosen) if chosen != subset_port => {
                debug!(
                    endpoints = %ResourceKey::of(endpoints),
                    port = subset_port,
                    chosen,
                    "Ignoring endpoint subset serving a different port"
                );
                continue;
            }
            Some(_) => {}
        }

        addresses.extend(
            subset
                .addresses
                .iter()
                .flatten()
                .map(|address| address.ip.clone()),
        );
    }

    (
        backend_port.unwrap_or_else(|| fallback_backend_port(port)),
        addresses,
    )
}

#[cfg(test)]
#[path = "backends_tests.rs"]
mod backends_tests;
