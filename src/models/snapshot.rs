// Published inventory snapshot: one flat map per resource kind

use super::{Container, Endpoint, ResourceKey, ResourceKind, Stack};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub endpoints: BTreeMap<ResourceKey, Endpoint>,
    pub containers: BTreeMap<ResourceKey, Container>,
    pub stacks: BTreeMap<ResourceKey, Stack>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty() && self.containers.is_empty() && self.stacks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len() + self.containers.len() + self.stacks.len()
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        match key.kind() {
            ResourceKind::Endpoint => self.endpoints.contains_key(key),
            ResourceKind::Container => self.containers.contains_key(key),
            ResourceKind::Stack => self.stacks.contains_key(key),
        }
    }

    pub fn display_name(&self, key: &ResourceKey) -> Option<&str> {
        match key.kind() {
            ResourceKind::Endpoint => self.endpoints.get(key).map(|e| e.name.as_str()),
            ResourceKind::Container => self.containers.get(key).map(|c| c.name.as_str()),
            ResourceKind::Stack => self.stacks.get(key).map(|s| s.name.as_str()),
        }
    }

    /// Every key in the snapshot, across all kinds.
    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.endpoints
            .keys()
            .chain(self.containers.keys())
            .chain(self.stacks.keys())
    }

    /// Looks up a container by the rendered form of its key.
    pub fn find_container(&self, key: &str) -> Option<&Container> {
        self.containers.values().find(|c| c.key.to_string() == key)
    }

    /// Looks up a stack by the rendered form of its key.
    pub fn find_stack(&self, key: &str) -> Option<&Stack> {
        self.stacks.values().find(|s| s.key.to_string() == key)
    }
}
