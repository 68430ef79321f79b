// Portainer stack models

use super::ResourceKey;
use super::container::compose_project;
use crate::fetcher::{RawContainer, RawStack};
use serde::{Deserialize, Serialize};

/// Derived from how many member containers are running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackState {
    Active,
    Inactive,
    Limited,
}

impl StackState {
    /// All running is active, none running (or no members) is inactive, anything between is limited.
    pub fn from_counts(running: usize, total: usize) -> Self {
        if total == 0 || running == 0 {
            StackState::Inactive
        } else if running >= total {
            StackState::Active
        } else {
            StackState::Limited
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackType {
    Swarm,
    Compose,
    Kubernetes,
    #[serde(other)]
    Unknown,
}

impl StackType {
    pub fn from_portainer(code: u32) -> Self {
        match code {
            1 => StackType::Swarm,
            2 => StackType::Compose,
            3 => StackType::Kubernetes,
            _ => StackType::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    pub key: ResourceKey,
    pub id: u64,
    pub name: String,
    pub endpoint_id: u64,
    pub stack_type: StackType,
    pub container_count: usize,
    pub running_count: usize,
    pub state: StackState,
}

impl Stack {
    /// Members are every container on the endpoint (selected or not) whose compose
    /// project label matches the stack name.
    pub fn from_raw(
        config_id: &str,
        endpoint_id: u64,
        raw: &RawStack,
        endpoint_containers: &[RawContainer],
    ) -> Self {
        let members: Vec<&RawContainer> = endpoint_containers
            .iter()
            .filter(|c| compose_project(c) == Some(raw.name.as_str()))
            .collect();
        let running = members
            .iter()
            .filter(|c| c.state.eq_ignore_ascii_case("running"))
            .count();
        Stack {
            key: ResourceKey::stack(config_id, endpoint_id, raw.id),
            id: raw.id,
            name: raw.name.clone(),
            endpoint_id,
            stack_type: StackType::from_portainer(raw.stack_type),
            container_count: members.len(),
            running_count: running,
            state: StackState::from_counts(running, members.len()),
        }
    }
}
