// Portainer endpoint (environment) models

use super::ResourceKey;
use crate::fetcher::RawEndpoint;
use serde::{Deserialize, Serialize};

/// Reachability as reported by Portainer; serializes to lowercase JSON ("up"/"down").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    Up,
    Down,
}

impl EndpointStatus {
    /// Portainer reports 1 for up and 2 for down; anything else is treated as down.
    pub fn from_portainer(code: i64) -> Self {
        if code == 1 {
            EndpointStatus::Up
        } else {
            EndpointStatus::Down
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub key: ResourceKey,
    pub id: u64,
    pub name: String,
    pub status: EndpointStatus,
    pub endpoint_type: u32,
    pub docker_version: String,
    pub swarm: bool,
    pub total_cpu: u64,
    pub total_memory: u64,
    pub running_container_count: u64,
    pub stopped_container_count: u64,
    pub healthy_container_count: u64,
    pub unhealthy_container_count: u64,
    pub image_count: u64,
    pub volume_count: u64,
    pub service_count: u64,
    pub stack_count: u64,
}

impl Endpoint {
    /// Builds an endpoint from the listing record. Aggregate counts come from the
    /// most recent snapshot and stay zero while the endpoint is down.
    pub fn from_raw(config_id: &str, raw: &RawEndpoint) -> Self {
        let status = EndpointStatus::from_portainer(raw.status);
        let mut endpoint = Endpoint {
            key: ResourceKey::endpoint(config_id, raw.id),
            id: raw.id,
            name: raw.name.clone(),
            status,
            endpoint_type: raw.endpoint_type,
            docker_version: "unknown".into(),
            swarm: false,
            total_cpu: 0,
            total_memory: 0,
            running_container_count: 0,
            stopped_container_count: 0,
            healthy_container_count: 0,
            unhealthy_container_count: 0,
            image_count: 0,
            volume_count: 0,
            service_count: 0,
            stack_count: 0,
        };
        if status != EndpointStatus::Up {
            return endpoint;
        }
        if let Some(s) = raw.snapshots.as_ref().and_then(|s| s.first()) {
            if !s.docker_version.is_empty() {
                endpoint.docker_version = s.docker_version.clone();
            }
            endpoint.swarm = s.swarm;
            endpoint.total_cpu = s.total_cpu;
            endpoint.total_memory = s.total_memory;
            endpoint.running_container_count = s.running_container_count;
            endpoint.stopped_container_count = s.stopped_container_count;
            endpoint.healthy_container_count = s.healthy_container_count;
            endpoint.unhealthy_container_count = s.unhealthy_container_count;
            endpoint.image_count = s.image_count;
            endpoint.volume_count = s.volume_count;
            endpoint.service_count = s.service_count;
            endpoint.stack_count = s.stack_count;
        }
        endpoint
    }

    pub fn is_up(&self) -> bool {
        self.status == EndpointStatus::Up
    }
}
