// Composite resource keys: the identity a resource keeps across cycles.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Kind of resource a key addresses; serializes to lowercase JSON (e.g. "container").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Endpoint,
    Container,
    Stack,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Endpoint => "endpoint",
            ResourceKind::Container => "container",
            ResourceKind::Stack => "stack",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(config id, endpoint id, name-or-id)`. Endpoint keys leave the name empty.
///
/// Renders as `{config_id}_{endpoint_id}` for endpoints and
/// `{config_id}_{endpoint_id}_{name}` otherwise, which is also the primary
/// selection encoding for containers and stacks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    kind: ResourceKind,
    config_id: String,
    endpoint_id: u64,
    name: String,
}

impl ResourceKey {
    pub fn endpoint(config_id: &str, endpoint_id: u64) -> Self {
        Self {
            kind: ResourceKind::Endpoint,
            config_id: config_id.to_string(),
            endpoint_id,
            name: String::new(),
        }
    }

    pub fn container(config_id: &str, endpoint_id: u64, name: &str) -> Self {
        Self {
            kind: ResourceKind::Container,
            config_id: config_id.to_string(),
            endpoint_id,
            name: name.to_string(),
        }
    }

    pub fn stack(config_id: &str, endpoint_id: u64, stack_id: u64) -> Self {
        Self {
            kind: ResourceKind::Stack,
            config_id: config_id.to_string(),
            endpoint_id,
            name: stack_id.to_string(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn config_id(&self) -> &str {
        &self.config_id
    }

    pub fn endpoint_id(&self) -> u64 {
        self.endpoint_id
    }

    /// Container name or stack id; empty for endpoints.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ResourceKind::Endpoint => write!(f, "{}_{}", self.config_id, self.endpoint_id),
            ResourceKind::Container | ResourceKind::Stack => {
                write!(f, "{}_{}_{}", self.config_id, self.endpoint_id, self.name)
            }
        }
    }
}

impl Serialize for ResourceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
