// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! End-to-end tests of the configuration builder through the public API.
//!
//! These tests need no cluster: every object is built in memory.
//!
//! Run with: cargo test --test build_integration

mod common;

use appgw_ingress::annotations::{HEALTH_PROBE_PATH, SSL_REDIRECT};
use appgw_ingress::appgw::types::{
    BackendAddressPool, FrontendPort, HttpListener, Probe, Protocol, RequestRoutingRule,
    RuleAction,
};
use appgw_ingress::appgw::{build, ConfigBuilder, ConfigurationDocument};
use common::*;
use serde_json::json;

const NS: &str = "shop";
const SERVICE: &str = "storefront";

fn two_host_ingress() -> k8s_openapi::api::networking::v1::Ingress {
    ingress(
        NS,
        "storefront",
        json!({}),
        json!({
            "rules": [
                host_rule("bye.com", "/a/b/c/d/e", SERVICE, json!(80)),
                host_rule("hello.com", "/a/b/c/d/e", SERVICE, json!("https")),
            ]
        }),
    )
}

fn probe(name: &str, host: &str, path: &str) -> Probe {
    Probe {
        name: name.to_string(),
        protocol: Protocol::Http,
        host: host.to_string(),
        path: path.to_string(),
        interval: 30,
        timeout: 30,
        unhealthy_threshold: 3,
        match_status_codes: None,
    }
}

#[test]
fn test_two_hosts_produce_three_probes() {
    let outcome = build(
        &[two_host_ingress()],
        &service_snapshot(NS, SERVICE, &["10.9.8.7"]),
    )
    .unwrap();

    assert!(outcome.issues.is_empty(), "unexpected issues: {:?}", outcome.issues);
    assert_eq!(
        outcome.document.probes,
        vec![
            probe("k8s-ag-ingress-defaultprobe", "localhost", "/"),
            probe(
                "k8s-ag-ingress-shop-storefront-443-pb-storefront-66a5f58a",
                "hello.com",
                "/a/b/c/d/e"
            ),
            probe(
                "k8s-ag-ingress-shop-storefront-80-pb-storefront-d057109e",
                "bye.com",
                "/a/b/c/d/e"
            ),
        ]
    );
}

#[test]
fn test_probe_path_annotation_overrides_rule_path() {
    let annotated = ingress(
        NS,
        "storefront",
        json!({ (HEALTH_PROBE_PATH): "/healthz" }),
        json!({ "rules": [host_rule("bye.com", "/a/b/c/d/e", SERVICE, json!(80))] }),
    );

    let outcome = build(&[annotated], &service_snapshot(NS, SERVICE, &["10.9.8.7"])).unwrap();

    let paths: Vec<&str> = outcome
        .document
        .probes
        .iter()
        .map(|probe| probe.path.as_str())
        .collect();
    assert_eq!(paths, vec!["/", "/healthz"]);
}

#[test]
fn test_two_hosts_pools_settings_and_listeners() {
    let outcome = build(
        &[two_host_ingress()],
        &service_snapshot(NS, SERVICE, &["10.9.8.7"]),
    )
    .unwrap();
    let document = &outcome.document;

    let pool = document
        .backend_address_pools
        .iter()
        .find(|pool| pool.name != "k8s-ag-ingress-defaultaddresspool")
        .unwrap();
    assert_eq!(pool.addresses, vec!["10.9.8.7".to_string()]);

    let ports: Vec<i32> = document
        .backend_http_settings
        .iter()
        .map(|settings| settings.port)
        .collect();
    assert!(ports.contains(&8181));
    assert!(ports.contains(&8443));

    let listeners: Vec<&str> = document
        .http_listeners
        .iter()
        .map(|listener| listener.name.as_str())
        .collect();
    assert_eq!(
        listeners,
        vec![
            "k8s-ag-ingress-fl-bye.com-80",
            "k8s-ag-ingress-fl-default-80",
            "k8s-ag-ingress-fl-hello.com-80",
        ]
    );
    assert_eq!(
        document.frontend_ports,
        vec![FrontendPort {
            name: "k8s-ag-ingress-fp-80".to_string(),
            port: 80,
        }]
    );
    assert!(document.dangling_references().is_empty());
}

#[test]
fn test_output_is_independent_of_input_order() {
    let second = ingress(
        "media",
        "streams",
        json!({}),
        json!({ "rules": [host_rule("media.example.com", "/", SERVICE, json!(554))] }),
    );
    let snapshot = service_snapshot(NS, SERVICE, &["10.9.8.7", "10.9.8.8"])
        .with_service(four_port_service("media", SERVICE))
        .with_endpoints(endpoints("media", SERVICE, &["10.1.1.1"]));

    let forward = build(&[two_host_ingress(), second.clone()], &snapshot).unwrap();
    let backward = build(&[second, two_host_ingress()], &snapshot).unwrap();

    assert_eq!(
        serde_json::to_string_pretty(&forward.document).unwrap(),
        serde_json::to_string_pretty(&backward.document).unwrap()
    );
}

#[test]
fn test_missing_service_only_excludes_its_ingress() {
    let broken = ingress(
        "broken",
        "web",
        json!({}),
        json!({ "rules": [host_rule("broken.example.com", "/", "gone", json!(80))] }),
    );
    let snapshot = service_snapshot(NS, SERVICE, &["10.9.8.7"]);

    let healthy = build(&[two_host_ingress()], &snapshot).unwrap();
    let mixed = build(&[broken, two_host_ingress()], &snapshot).unwrap();

    assert_eq!(mixed.issues.len(), 1);
    assert_eq!(mixed.issues[0].kind(), "service_not_found");
    assert!(mixed.issues[0].to_string().contains("broken/gone"));
    assert_eq!(healthy.document.probes, mixed.document.probes);
    assert_eq!(
        healthy.document.backend_http_settings,
        mixed.document.backend_http_settings
    );
    assert!(mixed.document.dangling_references().is_empty());
}

#[test]
fn test_tls_with_ssl_redirect() {
    let secure = ingress(
        NS,
        "secure",
        json!({ (SSL_REDIRECT): "true" }),
        json!({
            "tls": [{ "hosts": ["secure.example.com"], "secretName": "secure-tls" }],
            "rules": [host_rule("secure.example.com", "/", SERVICE, json!(80))]
        }),
    );
    let snapshot =
        service_snapshot(NS, SERVICE, &["10.9.8.7"]).with_secret(tls_secret(NS, "secure-tls"));

    let outcome = build(&[secure], &snapshot).unwrap();
    let document = &outcome.document;

    assert!(outcome.issues.is_empty(), "unexpected issues: {:?}", outcome.issues);
    assert_eq!(document.ssl_certificates.len(), 1);
    assert_eq!(document.ssl_certificates[0].name, "k8s-ag-ingress-shop-secure-tls");
    assert!(document
        .frontend_ports
        .iter()
        .any(|port| port.port == 443));

    let https = document
        .http_listeners
        .iter()
        .find(|listener| listener.protocol == Protocol::Https)
        .unwrap();
    assert_eq!(https.host_name.as_deref(), Some("secure.example.com"));
    assert_eq!(
        https.ssl_certificate.as_deref(),
        Some("k8s-ag-ingress-shop-secure-tls")
    );

    let redirect = document
        .request_routing_rules
        .iter()
        .find(|rule| matches!(rule.action, RuleAction::Redirect { .. }))
        .unwrap();
    assert_eq!(redirect.http_listener, "k8s-ag-ingress-fl-secure.example.com-80");
    assert!(document.dangling_references().is_empty());
}

#[test]
fn test_missing_tls_secret_serves_plain_http() {
    let secure = ingress(
        NS,
        "secure",
        json!({}),
        json!({
            "tls": [{ "hosts": ["secure.example.com"], "secretName": "not-there" }],
            "rules": [host_rule("secure.example.com", "/", SERVICE, json!(80))]
        }),
    );

    let outcome = build(&[secure], &service_snapshot(NS, SERVICE, &["10.9.8.7"])).unwrap();

    assert_eq!(outcome.issues.len(), 1);
    assert_eq!(outcome.issues[0].kind(), "secret_not_found");
    assert!(outcome.document.ssl_certificates.is_empty());
    assert!(outcome
        .document
        .http_listeners
        .iter()
        .all(|listener| listener.protocol == Protocol::Http));
}

#[test]
fn test_unmanaged_objects_survive_rebuild() {
    let existing = ConfigurationDocument {
        backend_address_pools: vec![BackendAddressPool {
            name: "legacy-pool".to_string(),
            addresses: vec!["192.0.2.1".to_string()],
        }],
        frontend_ports: vec![FrontendPort {
            name: "legacy-fp".to_string(),
            port: 8080,
        }],
        http_listeners: vec![HttpListener {
            name: "legacy-listener".to_string(),
            frontend_port: "legacy-fp".to_string(),
            protocol: Protocol::Http,
            host_name: None,
            ssl_certificate: None,
        }],
        request_routing_rules: vec![RequestRoutingRule {
            name: "legacy-rule".to_string(),
            priority: 5,
            http_listener: "legacy-listener".to_string(),
            path: None,
            action: RuleAction::Forward {
                backend_address_pool: "legacy-pool".to_string(),
                backend_http_settings: "k8s-ag-ingress-defaulthttpsetting".to_string(),
            },
        }],
        ..Default::default()
    };
    let snapshot = service_snapshot(NS, SERVICE, &["10.9.8.7"]);

    let outcome = ConfigBuilder::new(&snapshot)
        .with_existing(&existing)
        .build(&[two_host_ingress()])
        .unwrap();
    let document = &outcome.document;

    assert!(document
        .backend_address_pools
        .iter()
        .any(|pool| pool.name == "legacy-pool"));
    assert!(document
        .http_listeners
        .iter()
        .any(|listener| listener.name == "legacy-listener"));
    assert_eq!(document.request_routing_rules[0].name, "legacy-rule");
    assert!(document.dangling_references().is_empty());
}

#[test]
fn test_yaml_document_round_trip() {
    let outcome = build(
        &[two_host_ingress()],
        &service_snapshot(NS, SERVICE, &["10.9.8.7"]),
    )
    .unwrap();

    let text = serde_yaml::to_string(&outcome.document).unwrap();
    let parsed: ConfigurationDocument = serde_yaml::from_str(&text).unwrap();

    assert_eq!(parsed, outcome.document);
}
