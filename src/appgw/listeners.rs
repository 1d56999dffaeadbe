// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Frontend port, SSL certificate and HTTP listener synthesis.
//!
//! Every host an Ingress routes gets a plain HTTP listener. When one of the
//! Ingress TLS sections covers the host and its Secret is usable, the host also
//! gets an HTTPS listener bound to the certificate taken from that Secret.
//!
//! The synthesizer also records which listeners each `(ingress, host)` pair
//! attaches to. The rule synthesizer turns attachments into routing rules.

use crate::appgw::naming::{frontend_port_name, listener_name, ssl_certificate_name, NameRegistry};
use crate::appgw::types::{FrontendPort, HttpListener, Protocol, SslCertificate};
use crate::constants::{HTTPS_FRONTEND_PORT, HTTP_FRONTEND_PORT, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY};
use crate::context::{ResourceCache, ResourceKey};
use crate::errors::BuildIssue;
use crate::ingress::IngressModel;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use k8s_openapi::api::core::v1::Secret;
use std::collections::BTreeMap;
use tracing::debug;

/// Listener identity before naming.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ListenerKey {
    host: Option<String>,
    https: bool,
}

impl ListenerKey {
    fn port(&self) -> i32 {
        if self.https {
            HTTPS_FRONTEND_PORT
        } else {
            HTTP_FRONTEND_PORT
        }
    }
}

/// One listener an `(ingress, host)` pair routes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub listener: String,
    /// When set, requests are redirected to this listener instead of forwarded
    pub redirect_to: Option<String>,
}

/// `(ingress, host)` → listeners, `None` host being the any-host listeners.
pub type Attachments = BTreeMap<(ResourceKey, Option<String>), Vec<Attachment>>;

/// Output of [`synthesize_listeners`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSynthesis {
    pub frontend_ports: Vec<FrontendPort>,
    pub ssl_certificates: Vec<SslCertificate>,
    /// Listeners sorted by name, default HTTP listener included
    pub listeners: Vec<HttpListener>,
    pub attachments: Attachments,
    pub issues: Vec<BuildIssue>,
}

impl ListenerSynthesis {
    /// Listeners a rule of `ingress` for `host` attaches to.
    #[must_use]
    pub fn attachments_for(&self, ingress: &ResourceKey, host: Option<&str>) -> &[Attachment] {
        self.attachments
            .get(&(ingress.clone(), host.map(str::to_string)))
            .map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn listener(&self, name: &str) -> Option<&HttpListener> {
        self.listeners.iter().find(|listener| listener.name == name)
    }
}

/// Derive listeners, frontend ports and certificates for `ingresses`.
///
/// `ingresses` must be sorted by key: when two Ingresses bind the same HTTPS host
/// to different certificates, the first one wins.
pub fn synthesize_listeners(
    ingresses: &[IngressModel],
    cache: &impl ResourceCache,
) -> ListenerSynthesis {
    let mut issues = Vec::new();
    let mut certificates: BTreeMap<String, SslCertificate> = BTreeMap::new();
    let mut keys: BTreeMap<ListenerKey, Option<String>> = BTreeMap::new();
    keys.insert(
        ListenerKey {
            host: None,
            https: false,
        },
        None,
    );
    let mut pending: BTreeMap<(ResourceKey, Option<String>), (ListenerKey, Option<ListenerKey>)> =
        BTreeMap::new();

    for ingress in ingresses {
        // one lookup per TLS section, whatever the number of hosts it covers
        let section_certificates: Vec<Option<String>> = ingress
            .tls
            .iter()
            .map(|section| {
                let secret = section.secret_name.as_deref()?;
                match load_certificate(ingress, secret, cache) {
                    Ok(certificate) => {
                        let name = certificate.name.clone();
                        certificates.entry(name.clone()).or_insert(certificate);
                        Some(name)
                    }
                    Err(issue) => {
                        issues.push(issue);
                        None
                    }
                }
            })
            .collect();

        let hosts = ingress
            .rules
            .iter()
            .map(|rule| rule.host.clone())
            .chain(ingress.default_backend.iter().map(|_| None));

        for host in hosts {
            let pair = (ingress.key.clone(), host.clone());
            if pending.contains_key(&pair) {
                continue;
            }

            let http = ListenerKey {
                host: host.clone(),
                https: false,
            };
            keys.entry(http.clone()).or_insert(None);

            let certificate = ingress
                .tls
                .iter()
                .zip(&section_certificates)
                .filter(|(section, _)| section.covers(host.as_deref()))
                .find_map(|(_, certificate)| certificate.clone());
            let https = certificate.map(|certificate| {
                let key = ListenerKey {
                    host: host.clone(),
                    https: true,
                };
                keys.entry(key.clone()).or_insert(Some(certificate));
                key
            });

            pending.insert(pair, (http, https));
        }
    }

    let mut registry = NameRegistry::new();
    let names: BTreeMap<ListenerKey, String> = keys
        .keys()
        .map(|key| {
            let identity = format!("{}:{}", key.host.as_deref().unwrap_or("*"), key.port());
            let name = registry.claim(&listener_name(key.host.as_deref(), key.port()), &identity);
            (key.clone(), name)
        })
        .collect();

    let any_https = keys.keys().any(|key| key.https);
    let mut frontend_ports = vec![FrontendPort {
        name: frontend_port_name(HTTP_FRONTEND_PORT),
        port: HTTP_FRONTEND_PORT,
    }];
    if any_https {
        frontend_ports.push(FrontendPort {
            name: frontend_port_name(HTTPS_FRONTEND_PORT),
            port: HTTPS_FRONTEND_PORT,
        });
    }

    let mut listeners: Vec<HttpListener> = keys
        .iter()
        .map(|(key, certificate)| HttpListener {
            name: names[key].clone(),
            frontend_port: frontend_port_name(key.port()),
            protocol: if key.https {
                Protocol::Https
            } else {
                Protocol::Http
            },
            host_name: key.host.clone(),
            ssl_certificate: certificate.clone(),
        })
        .collect();
    listeners.sort_by(|a, b| a.name.cmp(&b.name));

    let redirecting: BTreeMap<&ResourceKey, bool> = ingresses
        .iter()
        .map(|ingress| (&ingress.key, ingress.settings.ssl_redirect))
        .collect();
    let attachments = pending
        .into_iter()
        .map(|(pair, (http, https))| {
            let http_name = names[&http].clone();
            let attached = match https {
                Some(https) => {
                    let https_name = names[&https].clone();
                    let redirect = redirecting.get(&pair.0).copied().unwrap_or(false);
                    vec![
                        Attachment {
                            listener: http_name,
                            redirect_to: redirect.then(|| https_name.clone()),
                        },
                        Attachment {
                            listener: https_name,
                            redirect_to: None,
                        },
                    ]
                }
                None => vec![Attachment {
                    listener: http_name,
                    redirect_to: None,
                }],
            };
            (pair, attached)
        })
        .collect();

    ListenerSynthesis {
        frontend_ports,
        ssl_certificates: certificates.into_values().collect(),
        listeners,
        attachments,
        issues,
    }
}

/// Build the gateway certificate from the TLS Secret `secret` of `ingress`.
///
/// # Errors
///
/// Returns [`BuildIssue::SecretNotFound`] when the Secret is not cached and
/// [`BuildIssue::InvalidSecret`] when it lacks the certificate or the key.
pub fn load_certificate(
    ingress: &IngressModel,
    secret: &str,
    cache: &impl ResourceCache,
) -> Result<SslCertificate, BuildIssue> {
    let key = ResourceKey::new(&ingress.key.namespace, secret);
    let Some(object) = cache.get_secret(&key) else {
        return Err(BuildIssue::SecretNotFound {
            ingress: ingress.key.clone(),
            secret: key,
        });
    };

    let invalid = |reason: String| BuildIssue::InvalidSecret {
        ingress: ingress.key.clone(),
        secret: key.clone(),
        reason,
    };
    let certificate = secret_entry(&object, TLS_CERT_KEY)
        .ok_or_else(|| invalid(format!("missing or empty '{TLS_CERT_KEY}'")))?;
    let private_key = secret_entry(&object, TLS_PRIVATE_KEY_KEY)
        .ok_or_else(|| invalid(format!("missing or empty '{TLS_PRIVATE_KEY_KEY}'")))?;

    debug!(ingress = %ingress.key, secret = %key, "Loaded TLS certificate");

    let mut pem = Vec::with_capacity(certificate.len() + private_key.len());
    pem.extend_from_slice(certificate);
    pem.extend_from_slice(private_key);
    Ok(SslCertificate {
        name: ssl_certificate_name(&key.namespace, &key.name),
        data: BASE64.encode(pem),
    })
}

fn secret_entry<'a>(secret: &'a Secret, entry: &str) -> Option<&'a [u8]> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(entry))
        .map(|bytes| bytes.0.as_slice())
        .filter(|bytes| !bytes.is_empty())
}

#[cfg(test)]
#[path = "listeners_tests.rs"]
mod listeners_tests;
