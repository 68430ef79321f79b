// Shared test helpers: in-memory fetcher and raw record builders
#![allow(dead_code)]

use async_trait::async_trait;
use portwatch::config::Features;
use portwatch::coordinator::{Coordinator, CoordinatorContext};
use portwatch::fetcher::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CONFIG_ID: &str = "A";
pub const CONFIG_NAME: &str = "Home";

/// Scriptable fetcher. Missing container/stack listings answer with an empty list,
/// missing details with `NotFound`.
#[derive(Default)]
pub struct MockFetcher {
    endpoints: Mutex<Option<Result<Vec<RawEndpoint>, FetchError>>>,
    containers: Mutex<HashMap<u64, Result<Vec<RawContainer>, FetchError>>>,
    details: Mutex<HashMap<String, Result<ContainerDetail, FetchError>>>,
    stacks: Mutex<HashMap<u64, Result<Vec<RawStack>, FetchError>>>,
    endpoints_delay: Mutex<Option<Duration>>,
    detail_delay: Mutex<Option<Duration>>,
    pub endpoints_calls: AtomicUsize,
    endpoints_in_flight: AtomicUsize,
    pub max_endpoints_in_flight: AtomicUsize,
    pub detail_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub actions: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_endpoints(&self, result: Result<Vec<RawEndpoint>, FetchError>) {
        *self.endpoints.lock().unwrap() = Some(result);
    }

    pub fn set_containers(&self, endpoint_id: u64, result: Result<Vec<RawContainer>, FetchError>) {
        self.containers.lock().unwrap().insert(endpoint_id, result);
    }

    pub fn set_detail(&self, container_id: &str, result: Result<ContainerDetail, FetchError>) {
        self.details
            .lock()
            .unwrap()
            .insert(container_id.to_string(), result);
    }

    pub fn set_stacks(&self, endpoint_id: u64, result: Result<Vec<RawStack>, FetchError>) {
        self.stacks.lock().unwrap().insert(endpoint_id, result);
    }

    pub fn set_endpoints_delay(&self, delay: Duration) {
        *self.endpoints_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_detail_delay(&self, delay: Duration) {
        *self.detail_delay.lock().unwrap() = Some(delay);
    }

    /// Lists the containers on an endpoint and gives each a running detail.
    pub fn serve_containers(&self, endpoint_id: u64, containers: Vec<RawContainer>) {
        for c in &containers {
            let detail = detail(&c.id, &c.state, None);
            self.set_detail(&c.id, Ok(detail));
        }
        self.set_containers(endpoint_id, Ok(containers));
    }
}

#[async_trait]
impl InventoryFetcher for MockFetcher {
    async fn endpoints(&self) -> Result<Vec<RawEndpoint>, FetchError> {
        self.endpoints_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.endpoints_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_endpoints_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.endpoints_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.endpoints_in_flight.fetch_sub(1, Ordering::SeqCst);
        self.endpoints
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn containers(&self, endpoint_id: u64) -> Result<Vec<RawContainer>, FetchError> {
        self.containers
            .lock()
            .unwrap()
            .get(&endpoint_id)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn container_detail(
        &self,
        _endpoint_id: u64,
        container_id: &str,
    ) -> Result<ContainerDetail, FetchError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.detail_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.details
            .lock()
            .unwrap()
            .get(container_id)
            .cloned()
            .unwrap_or(Err(FetchError::NotFound))
    }

    async fn stacks(&self, endpoint_id: u64) -> Result<Vec<RawStack>, FetchError> {
        self.stacks
            .lock()
            .unwrap()
            .get(&endpoint_id)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[async_trait]
impl ResourceControl for MockFetcher {
    async fn container_action(
        &self,
        endpoint_id: u64,
        container_id: &str,
        action: ContainerAction,
    ) -> Result<(), FetchError> {
        self.actions
            .lock()
            .unwrap()
            .push(format!("container:{}:{}:{}", endpoint_id, container_id, action));
        Ok(())
    }

    async fn stack_action(
        &self,
        endpoint_id: u64,
        stack_id: u64,
        action: StackAction,
    ) -> Result<(), FetchError> {
        self.actions
            .lock()
            .unwrap()
            .push(format!("stack:{}:{}:{}", endpoint_id, stack_id, action));
        Ok(())
    }
}

pub fn raw_endpoint(id: u64, name: &str, up: bool) -> RawEndpoint {
    RawEndpoint {
        id,
        name: name.to_string(),
        endpoint_type: 1,
        status: if up { 1 } else { 2 },
        snapshots: Some(vec![RawEndpointSnapshot {
            docker_version: "27.0.1".into(),
            running_container_count: 2,
            stopped_container_count: 1,
            ..Default::default()
        }]),
    }
}

pub fn raw_container(id: &str, name: &str, state: &str) -> RawContainer {
    RawContainer {
        id: id.to_string(),
        names: Some(vec![format!("/{}", name)]),
        image: format!("{}:latest", name),
        state: state.to_string(),
        created: 1_714_558_830,
        ports: Vec::new(),
        labels: None,
    }
}

/// A container that belongs to compose project `project`.
pub fn compose_container(id: &str, name: &str, state: &str, project: &str) -> RawContainer {
    let mut c = raw_container(id, name, state);
    c.labels = Some(HashMap::from([(
        "com.docker.compose.project".to_string(),
        project.to_string(),
    )]));
    c
}

pub fn raw_stack(id: u64, name: &str, endpoint_id: u64) -> RawStack {
    RawStack {
        id,
        name: name.to_string(),
        endpoint_id,
        stack_type: 2,
        status: 1,
    }
}

pub fn detail(id: &str, status: &str, health: Option<&str>) -> ContainerDetail {
    ContainerDetail {
        id: id.to_string(),
        state: Some(DetailState {
            status: Some(status.to_string()),
            exit_code: Some(0),
            started_at: Some("2024-05-01T10:20:30.123456789Z".into()),
            health: health.map(|h| DetailHealth {
                status: Some(h.to_string()),
            }),
        }),
        host_config: Some(DetailHostConfig {
            network_mode: Some("bridge".into()),
            privileged: Some(false),
            restart_policy: Some(DetailRestartPolicy {
                name: Some("unless-stopped".into()),
            }),
        }),
        ..Default::default()
    }
}

pub fn context() -> CoordinatorContext {
    CoordinatorContext {
        config_id: CONFIG_ID.to_string(),
        config_name: CONFIG_NAME.to_string(),
        features: Features::default(),
        fetch_timeout: Duration::from_secs(2),
        max_concurrent_inspections: 4,
    }
}

pub fn coordinator(fetcher: Arc<MockFetcher>) -> Coordinator {
    Coordinator::new(fetcher, context())
}
