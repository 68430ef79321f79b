// Model construction and JSON shape

mod common;

use common::*;
use portwatch::fetcher::{RawContainer, RawEndpoint};
use portwatch::models::*;

#[test]
fn resource_key_renders_composite_form() {
    assert_eq!(ResourceKey::endpoint("A", 1).to_string(), "A_1");
    assert_eq!(ResourceKey::container("A", 1, "web").to_string(), "A_1_web");
    assert_eq!(ResourceKey::stack("A", 2, 7).to_string(), "A_2_7");
    assert_eq!(
        serde_json::to_value(ResourceKey::container("A", 1, "web")).unwrap(),
        "A_1_web"
    );
}

#[test]
fn container_name_strips_slash_and_falls_back_to_id() {
    let raw = raw_container("abc123", "web", "running");
    assert_eq!(container_name(&raw), "web");
    let unnamed = RawContainer {
        id: "abc123".into(),
        ..Default::default()
    };
    assert_eq!(container_name(&unnamed), "container_abc123");
}

#[test]
fn container_summary_reads_compose_labels() {
    let raw = compose_container("m1", "media-app", "running", "media");
    let c = Container::from_summary("A", 1, "local", &raw);
    assert_eq!(c.key, ResourceKey::container("A", 1, "media-app"));
    assert_eq!(c.compose_stack, "media");
    assert_eq!(c.state, ContainerState::Running);
    assert_eq!(c.environment, "local");
    assert!(c.created.is_some());
    assert!(c.health.is_none());
}

#[test]
fn container_json_is_camel_case_and_omits_disabled_fields() {
    let c = Container::from_summary("A", 1, "local", &raw_container("c1", "web", "exited"));
    let json = serde_json::to_value(&c).unwrap();
    assert_eq!(json["key"], "A_1_web");
    assert_eq!(json["endpointId"], 1);
    assert_eq!(json["state"], "exited");
    assert_eq!(json["publishedPorts"], "none");
    assert!(json.get("health").is_none());
    assert!(json.get("restartPolicy").is_none());
}

#[test]
fn endpoint_counts_come_from_first_snapshot_only_when_up() {
    let up = Endpoint::from_raw("A", &raw_endpoint(1, "local", true));
    assert!(up.is_up());
    assert_eq!(up.docker_version, "27.0.1");
    assert_eq!(up.running_container_count, 2);
    assert_eq!(up.stopped_container_count, 1);

    let down = Endpoint::from_raw("A", &raw_endpoint(1, "local", false));
    assert_eq!(down.status, EndpointStatus::Down);
    assert_eq!(down.running_container_count, 0);
    assert_eq!(down.docker_version, "unknown");

    let bare = Endpoint::from_raw(
        "A",
        &RawEndpoint {
            id: 3,
            status: 1,
            ..Default::default()
        },
    );
    assert_eq!(bare.running_container_count, 0);
}

#[test]
fn stack_state_from_counts() {
    assert_eq!(StackState::from_counts(2, 2), StackState::Active);
    assert_eq!(StackState::from_counts(1, 2), StackState::Limited);
    assert_eq!(StackState::from_counts(0, 2), StackState::Inactive);
    assert_eq!(StackState::from_counts(0, 0), StackState::Inactive);
}

#[test]
fn stack_type_from_portainer_codes() {
    assert_eq!(StackType::from_portainer(1), StackType::Swarm);
    assert_eq!(StackType::from_portainer(2), StackType::Compose);
    assert_eq!(StackType::from_portainer(3), StackType::Kubernetes);
    assert_eq!(StackType::from_portainer(9), StackType::Unknown);
}

#[test]
fn health_status_from_docker() {
    assert_eq!(HealthStatus::from_docker("healthy"), HealthStatus::Healthy);
    assert_eq!(HealthStatus::from_docker("unhealthy"), HealthStatus::Unhealthy);
    assert_eq!(HealthStatus::from_docker("starting"), HealthStatus::Starting);
}

#[test]
fn repair_event_serializes_with_tag() {
    let issue = RepairIssue::new(ResourceKey::stack("A", 1, 7), "media".into());
    let json = serde_json::to_value(RepairEvent::Resolved(issue)).unwrap();
    assert_eq!(json["event"], "resolved");
    assert_eq!(json["issue"]["id"], "missing_stack_A_1_7");
    assert_eq!(json["issue"]["kind"], "stack");
    assert_eq!(json["issue"]["displayName"], "media");
}

#[test]
fn raw_records_decode_from_portainer_json() {
    let raw: RawContainer = serde_json::from_str(
        r#"{"Id":"abc","Names":["/web"],"Image":"nginx","State":"running","Created":1714558830,
            "Ports":[{"IP":"0.0.0.0","PrivatePort":80,"PublicPort":8080,"Type":"tcp"}],
            "Labels":{"com.docker.compose.project":"media"}}"#,
    )
    .unwrap();
    assert_eq!(container_name(&raw), "web");
    assert_eq!(compose_project(&raw), Some("media"));
    assert_eq!(raw.ports[0].public_port, Some(8080));

    let endpoint: RawEndpoint =
        serde_json::from_str(r#"{"Id":1,"Name":"local","Status":1,"Snapshots":[]}"#).unwrap();
    assert!(Endpoint::from_raw("A", &endpoint).is_up());
}
