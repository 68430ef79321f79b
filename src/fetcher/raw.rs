// Raw Portainer / Docker API records, deserialized from the service's PascalCase JSON.
// Every field defaults so a sparse record still decodes.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawEndpoint {
    pub id: u64,
    pub name: String,
    #[serde(rename = "Type")]
    pub endpoint_type: u32,
    pub status: i64,
    pub snapshots: Option<Vec<RawEndpointSnapshot>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawEndpointSnapshot {
    pub docker_version: String,
    pub swarm: bool,
    #[serde(rename = "TotalCPU")]
    pub total_cpu: u64,
    pub total_memory: u64,
    pub running_container_count: u64,
    pub stopped_container_count: u64,
    pub healthy_container_count: u64,
    pub unhealthy_container_count: u64,
    pub volume_count: u64,
    pub image_count: u64,
    pub service_count: u64,
    pub stack_count: u64,
}

/// One entry of `GET /containers/json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawContainer {
    pub id: String,
    pub names: Option<Vec<String>>,
    pub image: String,
    pub state: String,
    pub created: i64,
    pub ports: Vec<RawPort>,
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawPort {
    #[serde(rename = "IP")]
    pub ip: Option<String>,
    pub private_port: Option<u16>,
    pub public_port: Option<u16>,
    #[serde(rename = "Type")]
    pub protocol: String,
}

/// Subset of `GET /containers/{id}/json` the enricher reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerDetail {
    pub id: String,
    pub image: Option<String>,
    pub state: Option<DetailState>,
    pub host_config: Option<DetailHostConfig>,
    pub network_settings: Option<DetailNetworkSettings>,
    pub mounts: Option<Vec<DetailMount>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DetailState {
    pub status: Option<String>,
    pub exit_code: Option<i64>,
    pub started_at: Option<String>,
    pub health: Option<DetailHealth>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DetailHealth {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DetailHostConfig {
    pub network_mode: Option<String>,
    pub privileged: Option<bool>,
    pub restart_policy: Option<DetailRestartPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DetailRestartPolicy {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DetailNetworkSettings {
    pub networks: Option<HashMap<String, DetailNetwork>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DetailNetwork {
    #[serde(rename = "IPAddress")]
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DetailMount {
    pub source: Option<String>,
    pub name: Option<String>,
    pub destination: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawStack {
    pub id: u64,
    pub name: String,
    pub endpoint_id: u64,
    #[serde(rename = "Type")]
    pub stack_type: u32,
    pub status: i64,
}
