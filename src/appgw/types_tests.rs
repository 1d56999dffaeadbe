// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `appgw/types.rs`

use super::*;

fn probe(name: &str) -> Probe {
    Probe {
        name: name.to_string(),
        protocol: Protocol::Http,
        host: "localhost".to_string(),
        path: "/".to_string(),
        interval: 30,
        timeout: 30,
        unhealthy_threshold: 3,
        match_status_codes: None,
    }
}

fn settings(name: &str, probe: &str) -> BackendHttpSettings {
    BackendHttpSettings {
        name: name.to_string(),
        port: 80,
        protocol: Protocol::Http,
        probe: probe.to_string(),
        cookie_based_affinity: false,
        request_timeout: 30,
        connection_draining: None,
        host_name: None,
        path: None,
    }
}

fn consistent_document() -> ConfigurationDocument {
    ConfigurationDocument {
        probes: vec![probe("p")],
        backend_address_pools: vec![BackendAddressPool {
            name: "pool".to_string(),
            addresses: vec!["10.0.0.1".to_string()],
        }],
        backend_http_settings: vec![settings("s", "p")],
        frontend_ports: vec![FrontendPort {
            name: "fp".to_string(),
            port: 80,
        }],
        ssl_certificates: vec![],
        http_listeners: vec![HttpListener {
            name: "l".to_string(),
            frontend_port: "fp".to_string(),
            protocol: Protocol::Http,
            host_name: None,
            ssl_certificate: None,
        }],
        request_routing_rules: vec![RequestRoutingRule {
            name: "r".to_string(),
            priority: 100,
            http_listener: "l".to_string(),
            path: None,
            action: RuleAction::Forward {
                backend_address_pool: "pool".to_string(),
                backend_http_settings: "s".to_string(),
            },
        }],
    }
}

#[test]
fn test_consistent_document_has_no_dangling_references() {
    assert!(consistent_document().dangling_references().is_empty());
}

#[test]
fn test_missing_probe_is_reported() {
    let mut doc = consistent_document();
    doc.backend_http_settings = vec![settings("s", "missing")];

    assert_eq!(
        doc.dangling_references(),
        vec!["http settings 's' -> probe 'missing'".to_string()]
    );
}

#[test]
fn test_missing_pool_listener_and_certificate_are_reported() {
    let mut doc = consistent_document();
    doc.backend_address_pools.clear();
    doc.http_listeners[0].ssl_certificate = Some("cert".to_string());
    doc.request_routing_rules.push(RequestRoutingRule {
        name: "redirect".to_string(),
        priority: 101,
        http_listener: "l".to_string(),
        path: None,
        action: RuleAction::Redirect {
            target_listener: "gone".to_string(),
            include_path: true,
            include_query_string: true,
        },
    });

    let dangling = doc.dangling_references();

    assert_eq!(dangling.len(), 3);
    assert!(dangling.contains(&"listener 'l' -> certificate 'cert'".to_string()));
    assert!(dangling.contains(&"routing rule 'r' -> pool 'pool'".to_string()));
    assert!(dangling.contains(&"routing rule 'redirect' -> redirect listener 'gone'".to_string()));
}

#[test]
fn test_sort_orders_rules_by_priority() {
    let mut doc = consistent_document();
    let mut late = doc.request_routing_rules[0].clone();
    late.name = "a-late".to_string();
    late.priority = 200;
    doc.request_routing_rules.insert(0, late);
    doc.probes.insert(0, probe("z"));

    doc.sort();

    assert_eq!(doc.request_routing_rules[0].name, "r");
    assert_eq!(doc.request_routing_rules[1].name, "a-late");
    assert_eq!(doc.probes[0].name, "p");
}

#[test]
fn test_is_managed_name() {
    assert!(is_managed_name("k8s-ag-ingress-defaultprobe"));
    assert!(!is_managed_name("k8s-ag-ingressx-probe"));
    assert!(!is_managed_name("manual-probe"));
    assert!(!is_managed_name("k8s-ag-ingress"));
}

#[test]
fn test_document_serializes_camel_case() {
    let json = serde_json::to_string(&consistent_document()).unwrap();

    assert!(json.contains("\"backendAddressPools\""));
    assert!(json.contains("\"unhealthyThreshold\":3"));
    assert!(json.contains("\"type\":\"forward\""));
    assert!(json.contains("\"backendHttpSettings\":\"s\""));
    assert!(!json.contains("matchStatusCodes"));
}

#[test]
fn test_document_parses_back() {
    let doc = consistent_document();
    let json = serde_json::to_string(&doc).unwrap();

    let parsed: ConfigurationDocument = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed, doc);
}
