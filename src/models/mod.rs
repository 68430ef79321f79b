// Domain models: endpoints, containers, stacks and the published snapshot

mod container;
mod endpoint;
mod key;
mod repair;
mod snapshot;
mod stack;

pub use container::{
    Container, ContainerState, HealthStatus, PortBinding, compose_project, container_name,
};
pub use endpoint::{Endpoint, EndpointStatus};
pub use key::{ResourceKey, ResourceKind};
pub use repair::{RepairEvent, RepairIssue, issue_id};
pub use snapshot::Snapshot;
pub use stack::{Stack, StackState, StackType};
