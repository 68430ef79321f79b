// Derive enriched container fields from a raw inspect response.

use crate::config::Features;
use crate::fetcher::ContainerDetail;
use crate::models::{Container, ContainerState, HealthStatus, PortBinding};
use chrono::{DateTime, Utc};

/// Merges the inspect response into `container`. Exposed for unit tests.
pub(crate) fn apply_detail(container: &mut Container, detail: &ContainerDetail, features: Features) {
    let host_config = detail.host_config.as_ref();

    container.network_mode = host_config
        .and_then(|h| h.network_mode.clone())
        .unwrap_or_else(|| "unknown".into());
    container.privileged = host_config.and_then(|h| h.privileged).unwrap_or(false);
    container.ip_address = first_ip_address(detail).unwrap_or_else(|| "unknown".into());
    container.mounts = format_mounts(detail);
    container.published_ports = format_ports(&container.ports);
    container.image_id = detail.image.clone().unwrap_or_else(|| "unknown".into());
    container.exit_code = detail.state.as_ref().and_then(|s| s.exit_code);
    container.started_at = detail
        .state
        .as_ref()
        .and_then(|s| s.started_at.as_deref())
        .and_then(parse_docker_time);

    container.health = features
        .health_check
        .then(|| derive_health(container.state, detail));
    container.restart_policy = features.restart_policy.then(|| restart_policy(detail));
}

/// Not running is always `Unavailable`; running without a health check is `Unknown`.
pub(crate) fn derive_health(state: ContainerState, detail: &ContainerDetail) -> HealthStatus {
    if !state.is_running() {
        return HealthStatus::Unavailable;
    }
    detail
        .state
        .as_ref()
        .and_then(|s| s.health.as_ref())
        .and_then(|h| h.status.as_deref())
        .map(HealthStatus::from_docker)
        .unwrap_or(HealthStatus::Unknown)
}

/// `HostConfig.RestartPolicy.Name`, defaulting to `no`.
pub(crate) fn restart_policy(detail: &ContainerDetail) -> String {
    detail
        .host_config
        .as_ref()
        .and_then(|h| h.restart_policy.as_ref())
        .and_then(|p| p.name.clone())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "no".into())
}

/// First non-empty address across attached networks, in network-name order.
fn first_ip_address(detail: &ContainerDetail) -> Option<String> {
    let networks = detail.network_settings.as_ref()?.networks.as_ref()?;
    let mut names: Vec<&String> = networks.keys().collect();
    names.sort();
    names
        .into_iter()
        .filter_map(|n| networks[n].ip_address.clone())
        .find(|ip| !ip.is_empty())
}

/// `source:destination` pairs (volume name when there is no source), or `none`.
pub(crate) fn format_mounts(detail: &ContainerDetail) -> String {
    let mounts: Vec<String> = detail
        .mounts
        .iter()
        .flatten()
        .filter_map(|m| {
            let source = m
                .source
                .as_deref()
                .filter(|s| !s.is_empty())
                .or(m.name.as_deref())?;
            let destination = m.destination.as_deref().filter(|d| !d.is_empty())?;
            Some(format!("{}:{}", source, destination))
        })
        .collect();
    if mounts.is_empty() {
        "none".into()
    } else {
        mounts.join(", ")
    }
}

/// `[ip:]public->private/proto` for published ports, `private/proto` otherwise, or `none`.
/// The wildcard address is left out.
pub(crate) fn format_ports(ports: &[PortBinding]) -> String {
    let formatted: Vec<String> = ports
        .iter()
        .filter_map(|p| {
            let private = p.private_port?;
            Some(match p.public_port {
                Some(public) => {
                    let prefix = match p.ip.as_deref() {
                        Some(ip) if !ip.is_empty() && ip != "0.0.0.0" => format!("{}:", ip),
                        _ => String::new(),
                    };
                    format!("{}{}->{}/{}", prefix, public, private, p.protocol)
                }
                None => format!("{}/{}", private, p.protocol),
            })
        })
        .collect();
    if formatted.is_empty() {
        "none".into()
    } else {
        formatted.join(", ")
    }
}

/// Parses Docker's RFC 3339 timestamps; the zero time (`0001-01-01...`) means never.
pub(crate) fn parse_docker_time(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() || s.starts_with("0001-01-01") {
        return None;
    }
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| tracing::debug!(error = %e, value = s, "unparseable docker timestamp"))
        .ok()
}
