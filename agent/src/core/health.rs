//! Collaborator health probing.
//!
//! The detector, transcriber and synthesizer answer `GET /health` at the root
//! of their origin. The answer service has no such endpoint.

use std::fmt;
use std::time::Duration;

use futures::future::join_all;
use reqwest::Client;
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Healthy,
    /// Reachable but answered with a non-success status
    Unhealthy(String),
    Unreachable(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => f.write_str("healthy"),
            HealthStatus::Unhealthy(detail) => write!(f, "unhealthy ({detail})"),
            HealthStatus::Unreachable(detail) => write!(f, "unreachable ({detail})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub service: String,
    pub url: String,
    pub status: HealthStatus,
}

/// Health endpoint for a service URL: `/health` on the same origin.
pub fn health_url(service_url: &str) -> Option<String> {
    let url = Url::parse(service_url).ok()?;
    if !url.has_host() {
        return None;
    }
    url.join("/health").ok().map(|u| u.to_string())
}

pub struct HealthProber {
    http_client: Client,
}

impl HealthProber {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self { http_client })
    }

    pub async fn probe(&self, service: &str, service_url: &str) -> HealthReport {
        let Some(url) = health_url(service_url) else {
            return HealthReport {
                service: service.to_string(),
                url: service_url.to_string(),
                status: HealthStatus::Unreachable("invalid service URL".to_string()),
            };
        };

        let status = match self.http_client.get(&url).send().await {
            Ok(response) if response.status().is_success() => HealthStatus::Healthy,
            Ok(response) => HealthStatus::Unhealthy(response.status().to_string()),
            Err(e) => HealthStatus::Unreachable(e.to_string()),
        };

        HealthReport {
            service: service.to_string(),
            url,
            status,
        }
    }

    /// Probe `(service, url)` pairs concurrently, logging each result.
    pub async fn probe_all(&self, targets: &[(&str, &str)]) -> Vec<HealthReport> {
        let reports = join_all(targets.iter().map(|(name, url)| self.probe(name, url))).await;
        for report in &reports {
            if report.status.is_healthy() {
                info!(service = %report.service, url = %report.url, "Service healthy");
            } else {
                warn!(service = %report.service, url = %report.url, status = %report.status, "Service not healthy");
            }
        }
        reports
    }
}
