// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Adapter from Kubernetes `Ingress` objects to the builder's internal model.
//!
//! Everything API-version specific stops here: the synthesizers only ever see
//! [`IngressModel`]. Hosts are normalized (trimmed, lower-cased, empty becomes
//! `None`) and each backend reference is validated once.

use crate::annotations::{parse_settings, IngressSettings, INGRESS_CLASS};
use crate::context::ResourceKey;
use crate::errors::BuildIssue;
use k8s_openapi::api::networking::v1::{Ingress, IngressBackend};
use std::fmt;

/// Port of a backend reference: a Service port number or a Service port name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BackendPort {
    Number(i32),
    Name(String),
}

impl fmt::Display for BackendPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendPort::Number(number) => write!(f, "{number}"),
            BackendPort::Name(name) => f.write_str(name),
        }
    }
}

/// Service backend named by an Ingress path or default backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRef {
    pub service: String,
    pub port: BackendPort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngressPathType {
    Exact,
    Prefix,
    ImplementationSpecific,
}

impl IngressPathType {
    fn parse(value: &str) -> Self {
        match value {
            "Exact" => IngressPathType::Exact,
            "Prefix" => IngressPathType::Prefix,
            _ => IngressPathType::ImplementationSpecific,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRule {
    pub path: Option<String>,
    pub path_type: IngressPathType,
    pub backend: BackendRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRule {
    /// `None` routes on the listener accepting any host
    pub host: Option<String>,
    pub paths: Vec<PathRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSection {
    pub hosts: Vec<String>,
    pub secret_name: Option<String>,
}

impl TlsSection {
    /// Whether this section applies to rules for `host`.
    ///
    /// A section without hosts covers host-less rules only.
    #[must_use]
    pub fn covers(&self, host: Option<&str>) -> bool {
        match host {
            Some(host) => self.hosts.iter().any(|h| h == host),
            None => self.hosts.is_empty(),
        }
    }
}

/// An Ingress reduced to what the builder needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressModel {
    pub key: ResourceKey,
    pub rules: Vec<HostRule>,
    pub default_backend: Option<BackendRef>,
    pub tls: Vec<TlsSection>,
    pub settings: IngressSettings,
}

impl IngressModel {
    /// Convert an Ingress, returning the problems found along the way.
    ///
    /// Path rules with an unusable backend are dropped; everything else is kept.
    #[must_use]
    pub fn from_ingress(ingress: &Ingress) -> (Self, Vec<BuildIssue>) {
        let key = ResourceKey::of(ingress);
        let empty = std::collections::BTreeMap::new();
        let annotations = ingress.metadata.annotations.as_ref().unwrap_or(&empty);
        let (settings, mut issues) = parse_settings(&key, annotations);

        let spec = ingress.spec.clone().unwrap_or_default();

        let default_backend = spec
            .default_backend
            .as_ref()
            .and_then(|backend| match convert_backend(&key, backend) {
                Ok(backend) => Some(backend),
                Err(issue) => {
                    issues.push(issue);
                    None
                }
            });

        let mut rules = Vec::new();
        for rule in spec.rules.unwrap_or_default() {
            let host = normalize_host(rule.host.as_deref());
            let mut paths = Vec::new();
            for http_path in rule.http.map(|http| http.paths).unwrap_or_default() {
                match convert_backend(&key, &http_path.backend) {
                    Ok(backend) => paths.push(PathRule {
                        path: http_path.path.filter(|p| !p.is_empty()),
                        path_type: IngressPathType::parse(&http_path.path_type),
                        backend,
                    }),
                    Err(issue) => issues.push(issue),
                }
            }
            if !paths.is_empty() {
                rules.push(HostRule { host, paths });
            }
        }

        let tls = spec
            .tls
            .unwrap_or_default()
            .into_iter()
            .map(|section| TlsSection {
                hosts: section
                    .hosts
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|h| normalize_host(Some(h)))
                    .collect(),
                secret_name: section.secret_name.filter(|s| !s.is_empty()),
            })
            .collect();

        (
            Self {
                key,
                rules,
                default_backend,
                tls,
                settings,
            },
            issues,
        )
    }
}

/// Whether the Ingress is addressed to the given ingress class.
///
/// `spec.ingressClassName` takes precedence over the legacy annotation.
#[must_use]
pub fn is_managed_ingress(ingress: &Ingress, ingress_class: &str) -> bool {
    let class_name = ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.ingress_class_name.as_deref());
    if let Some(class_name) = class_name {
        return class_name == ingress_class;
    }
    ingress
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(INGRESS_CLASS))
        .is_some_and(|class| class == ingress_class)
}

fn normalize_host(host: Option<&str>) -> Option<String> {
    host.map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_ascii_lowercase)
}

fn convert_backend(key: &ResourceKey, backend: &IngressBackend) -> Result<BackendRef, BuildIssue> {
    let invalid = |reason: String| BuildIssue::InvalidBackend {
        ingress: key.clone(),
        reason,
    };

    let Some(service) = backend.service.as_ref() else {
        return Err(invalid(
            "only service backends are supported".to_string(),
        ));
    };
    if service.name.is_empty() {
        return Err(invalid("backend service name is empty".to_string()));
    }

    let port = service.port.as_ref().ok_or_else(|| {
        invalid(format!("backend service '{}' has no port", service.name))
    })?;
    let port = match (port.number, port.name.as_deref()) {
        (Some(number), None) => BackendPort::Number(number),
        (None, Some(name)) if !name.is_empty() => BackendPort::Name(name.to_string()),
        (Some(_), Some(_)) => {
            return Err(invalid(format!(
                "backend service '{}' sets both port number and port name",
                service.name
            )))
        }
        _ => {
            return Err(invalid(format!(
                "backend service '{}' has no port",
                service.name
            )))
        }
    };

    Ok(BackendRef {
        service: service.name.clone(),
        port,
    })
}

#[cfg(test)]
#[path = "ingress_tests.rs"]
mod ingress_tests;
