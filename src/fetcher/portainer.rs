// Portainer REST client via reqwest

use super::{
    ContainerAction, ContainerDetail, FetchError, InventoryFetcher, RawContainer, RawEndpoint,
    RawStack, ResourceControl, StackAction,
};
use crate::config::PortainerConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::instrument;

const API_KEY_HEADER: &str = "x-api-key";

pub struct PortainerClient {
    client: reqwest::Client,
    base_url: String,
}

impl PortainerClient {
    pub fn connect(config: &PortainerConfig, timeout: Duration) -> anyhow::Result<Self> {
        let mut api_key = HeaderValue::from_str(&config.api_key)?;
        api_key.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, api_key);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()?;
        let scheme = if config.ssl { "https" } else { "http" };
        Ok(Self {
            client,
            base_url: format!("{}://{}/api/", scheme, config.host.trim_end_matches('/')),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }
        let body = response.bytes().await.map_err(transport_error)?;
        if body.is_empty() {
            return Err(FetchError::Malformed(format!("{}: empty body", path)));
        }
        serde_json::from_slice(&body).map_err(|e| FetchError::Malformed(format!("{}: {}", path, e)))
    }

    async fn post(&self, path: &str, query: &[(&str, String)]) -> Result<(), FetchError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        // Docker answers 304 when the container is already in the requested state.
        if status.is_success() || status == StatusCode::NOT_MODIFIED {
            Ok(())
        } else {
            Err(status_error(status))
        }
    }
}

fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_decode() {
        FetchError::Malformed(e.to_string())
    } else {
        FetchError::Unreachable(e.to_string())
    }
}

fn status_error(status: StatusCode) -> FetchError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Unauthorized,
        StatusCode::NOT_FOUND => FetchError::NotFound,
        other => FetchError::ServerError(other.as_u16()),
    }
}

#[async_trait]
impl InventoryFetcher for PortainerClient {
    #[instrument(skip(self), fields(fetcher = "portainer", operation = "endpoints"))]
    async fn endpoints(&self) -> Result<Vec<RawEndpoint>, FetchError> {
        self.get_json("endpoints", &[]).await
    }

    #[instrument(skip(self), fields(fetcher = "portainer", operation = "containers"))]
    async fn containers(&self, endpoint_id: u64) -> Result<Vec<RawContainer>, FetchError> {
        self.get_json(
            &format!("endpoints/{}/docker/containers/json", endpoint_id),
            &[("all", "true".to_string())],
        )
        .await
    }

    #[instrument(skip(self), fields(fetcher = "portainer", operation = "container_detail"))]
    async fn container_detail(
        &self,
        endpoint_id: u64,
        container_id: &str,
    ) -> Result<ContainerDetail, FetchError> {
        self.get_json(
            &format!(
                "endpoints/{}/docker/containers/{}/json",
                endpoint_id, container_id
            ),
            &[],
        )
        .await
    }

    #[instrument(skip(self), fields(fetcher = "portainer", operation = "stacks"))]
    async fn stacks(&self, endpoint_id: u64) -> Result<Vec<RawStack>, FetchError> {
        let filters = serde_json::json!({ "EndpointID": endpoint_id }).to_string();
        self.get_json("stacks", &[("filters", filters)]).await
    }
}

#[async_trait]
impl ResourceControl for PortainerClient {
    #[instrument(skip(self), fields(fetcher = "portainer", operation = "container_action"))]
    async fn container_action(
        &self,
        endpoint_id: u64,
        container_id: &str,
        action: ContainerAction,
    ) -> Result<(), FetchError> {
        self.post(
            &format!(
                "endpoints/{}/docker/containers/{}/{}",
                endpoint_id,
                container_id,
                action.as_str()
            ),
            &[],
        )
        .await
    }

    #[instrument(skip(self), fields(fetcher = "portainer", operation = "stack_action"))]
    async fn stack_action(
        &self,
        endpoint_id: u64,
        stack_id: u64,
        action: StackAction,
    ) -> Result<(), FetchError> {
        self.post(
            &format!("stacks/{}/{}", stack_id, action.as_str()),
            &[("endpointId", endpoint_id.to_string())],
        )
        .await
    }
}
