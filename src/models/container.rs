// Docker container models (as seen through a Portainer endpoint)

use super::ResourceKey;
use crate::fetcher::{RawContainer, RawPort};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";
const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";
const COMPOSE_VERSION_LABEL: &str = "com.docker.compose.version";

/// Docker container state; serializes to lowercase JSON (e.g. "running").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    #[serde(other)]
    Unknown,
}

impl ContainerState {
    /// Parse from Docker API state string (e.g. "running", "exited").
    pub fn from_docker(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            "removing" => ContainerState::Removing,
            "exited" => ContainerState::Exited,
            "dead" => ContainerState::Dead,
            _ => ContainerState::Unknown,
        }
    }

    pub fn is_running(&self) -> bool {
        *self == ContainerState::Running
    }
}

/// Health as exposed to consumers. `Unavailable` means the container is not running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Starting,
    Unavailable,
    Unknown,
}

impl HealthStatus {
    /// Parse Docker's `State.Health.Status` ("healthy", "unhealthy", "starting", "none").
    pub fn from_docker(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "healthy" => HealthStatus::Healthy,
            "unhealthy" => HealthStatus::Unhealthy,
            "starting" => HealthStatus::Starting,
            _ => HealthStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortBinding {
    pub ip: Option<String>,
    pub private_port: Option<u16>,
    pub public_port: Option<u16>,
    pub protocol: String,
}

impl From<&RawPort> for PortBinding {
    fn from(p: &RawPort) -> Self {
        PortBinding {
            ip: p.ip.clone(),
            private_port: p.private_port,
            public_port: p.public_port,
            protocol: p.protocol.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub key: ResourceKey,
    pub id: String,
    pub name: String,
    pub endpoint_id: u64,
    /// Name of the owning endpoint.
    pub environment: String,
    pub image: String,
    pub state: ContainerState,
    pub created: Option<DateTime<Utc>>,
    pub ports: Vec<PortBinding>,
    pub compose_stack: String,
    pub compose_service: String,
    pub compose_version: String,

    // Filled in by the detail enricher.
    pub published_ports: String,
    pub network_mode: String,
    pub ip_address: String,
    pub mounts: String,
    pub image_id: String,
    pub exit_code: Option<i64>,
    pub privileged: bool,
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<String>,
}

impl Container {
    /// Builds the un-enriched record from a container listing entry.
    pub fn from_summary(
        config_id: &str,
        endpoint_id: u64,
        environment: &str,
        raw: &RawContainer,
    ) -> Self {
        let name = container_name(raw);
        let label = |k: &str| {
            raw.labels
                .as_ref()
                .and_then(|l| l.get(k))
                .cloned()
                .unwrap_or_default()
        };
        Container {
            key: ResourceKey::container(config_id, endpoint_id, &name),
            id: raw.id.clone(),
            endpoint_id,
            environment: environment.to_string(),
            image: raw.image.clone(),
            state: ContainerState::from_docker(&raw.state),
            created: DateTime::from_timestamp(raw.created, 0).filter(|_| raw.created > 0),
            ports: raw.ports.iter().map(PortBinding::from).collect(),
            compose_stack: label(COMPOSE_PROJECT_LABEL),
            compose_service: label(COMPOSE_SERVICE_LABEL),
            compose_version: label(COMPOSE_VERSION_LABEL),
            published_ports: "none".into(),
            network_mode: "unknown".into(),
            ip_address: "unknown".into(),
            mounts: "none".into(),
            image_id: "unknown".into(),
            exit_code: None,
            privileged: false,
            started_at: None,
            health: None,
            restart_policy: None,
            name,
        }
    }
}

/// First entry of `Names` without its leading `/`, or `container_<id>` when there is none.
pub fn container_name(raw: &RawContainer) -> String {
    raw.names
        .as_ref()
        .and_then(|n| n.first())
        .map(|n| n.strip_prefix('/').unwrap_or(n))
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("container_{}", raw.id))
}

/// Compose project label of a raw listing entry, used to count stack members.
pub fn compose_project(raw: &RawContainer) -> Option<&str> {
    raw.labels
        .as_ref()
        .and_then(|l| l.get(COMPOSE_PROJECT_LABEL))
        .map(String::as_str)
}
