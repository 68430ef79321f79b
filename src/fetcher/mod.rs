// Remote inventory access: the fetcher/control traits the coordinator consumes,
// the typed error taxonomy, and the Portainer HTTP implementation.

mod portainer;
mod raw;

pub use portainer::PortainerClient;
pub use raw::{
    ContainerDetail, DetailHealth, DetailHostConfig, DetailMount, DetailNetwork,
    DetailNetworkSettings, DetailRestartPolicy, DetailState, RawContainer, RawEndpoint,
    RawEndpointSnapshot, RawPort, RawStack,
};

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

/// Typed failure of a single fetch call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    /// Connection failures and timeouts.
    #[error("unreachable: {0}")]
    Unreachable(String),
    #[error("server error (HTTP {0})")]
    ServerError(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Read side of the remote service, one method per resource class.
#[async_trait]
pub trait InventoryFetcher: Send + Sync {
    async fn endpoints(&self) -> Result<Vec<RawEndpoint>, FetchError>;

    async fn containers(&self, endpoint_id: u64) -> Result<Vec<RawContainer>, FetchError>;

    async fn container_detail(
        &self,
        endpoint_id: u64,
        container_id: &str,
    ) -> Result<ContainerDetail, FetchError>;

    async fn stacks(&self, endpoint_id: u64) -> Result<Vec<RawStack>, FetchError>;
}

/// Write side: lifecycle actions behind the action-buttons feature.
#[async_trait]
pub trait ResourceControl: Send + Sync {
    async fn container_action(
        &self,
        endpoint_id: u64,
        container_id: &str,
        action: ContainerAction,
    ) -> Result<(), FetchError>;

    async fn stack_action(
        &self,
        endpoint_id: u64,
        stack_id: u64,
        action: StackAction,
    ) -> Result<(), FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerAction {
    Start,
    Stop,
    Restart,
    Pause,
    Unpause,
    Kill,
}

impl ContainerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerAction::Start => "start",
            ContainerAction::Stop => "stop",
            ContainerAction::Restart => "restart",
            ContainerAction::Pause => "pause",
            ContainerAction::Unpause => "unpause",
            ContainerAction::Kill => "kill",
        }
    }
}

impl FromStr for ContainerAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(ContainerAction::Start),
            "stop" => Ok(ContainerAction::Stop),
            "restart" => Ok(ContainerAction::Restart),
            "pause" => Ok(ContainerAction::Pause),
            "unpause" => Ok(ContainerAction::Unpause),
            "kill" => Ok(ContainerAction::Kill),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

impl fmt::Display for ContainerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackAction {
    Start,
    Stop,
}

impl StackAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StackAction::Start => "start",
            StackAction::Stop => "stop",
        }
    }
}

impl FromStr for StackAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(StackAction::Start),
            "stop" => Ok(StackAction::Stop),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

impl fmt::Display for StackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

/// Bounds a fetch call; an elapsed timeout is reported as `Unreachable`.
pub async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Unreachable(format!(
            "timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}
