//! Preflight connectivity checks.
//!
//! Before any phase runs, [`ConnectivityProbe`] verifies the target host is
//! reachable and then issues one GET to each service root. A route that
//! exists but has no resource (404) still proves the service is up.
//! Any failure here is fatal to the run.

use std::time::Duration;

use reqwest::Client;
use reqwest::redirect::Policy;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::error::LoadTestError;
use crate::service::Endpoints;

/// Upper bound on the external `ping` process.
const PING_PROCESS_TIMEOUT: Duration = Duration::from_secs(10);

/// How the target host itself is checked before the HTTP probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCheck {
    /// Run the system `ping` once against the host.
    Ping,
    /// Open a TCP connection to the given port.
    Tcp(u16),
    /// Skip the host check.
    Skip,
}

/// One endpoint to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    /// URL to GET.
    pub url: Url,
    /// Human-readable service name for the report.
    pub name: String,
}

/// Result of probing one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointStatus {
    /// Service name.
    pub name: String,
    /// Probed URL.
    pub url: String,
    /// Status code, when a response arrived.
    pub status: Option<u16>,
    /// Whether the endpoint counts as reachable.
    pub reachable: bool,
    /// Transport error, when no response arrived.
    pub error: Option<String>,
}

/// Outcome of a full probe run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// Whether the host check passed.
    pub host_reachable: bool,
    /// Per-endpoint results, in probe order. Empty when the host check failed.
    pub endpoints: Vec<EndpointStatus>,
}

impl ProbeReport {
    /// True when the host and every endpoint were reachable.
    #[must_use]
    pub fn all_reachable(&self) -> bool {
        self.host_reachable && self.endpoints.iter().all(|endpoint| endpoint.reachable)
    }

    /// Names of everything that failed, for error reporting.
    #[must_use]
    pub fn unreachable(&self, host: &str) -> Vec<String> {
        let mut names = Vec::new();
        if !self.host_reachable {
            names.push(format!("host {host}"));
        }
        names.extend(
            self.endpoints
                .iter()
                .filter(|endpoint| !endpoint.reachable)
                .map(|endpoint| endpoint.name.clone()),
        );
        names
    }

    /// Converts a failed probe into [`LoadTestError::Connectivity`].
    ///
    /// # Errors
    ///
    /// Returns [`LoadTestError::Connectivity`] naming every unreachable target.
    pub fn ensure_reachable(&self, host: &str) -> Result<(), LoadTestError> {
        if self.all_reachable() {
            Ok(())
        } else {
            Err(LoadTestError::Connectivity {
                unreachable: self.unreachable(host),
            })
        }
    }
}

/// Returns true for statuses that prove a service is up: 2xx, 3xx, or 404.
#[must_use]
pub fn is_acceptable_status(status: u16) -> bool {
    (200..400).contains(&status) || status == 404
}

/// Preflight reachability checker.
#[derive(Debug, Clone)]
pub struct ConnectivityProbe {
    client: Client,
    host: String,
    host_check: HostCheck,
    targets: Vec<ProbeTarget>,
    timeout: Duration,
}

impl ConnectivityProbe {
    /// Creates a probe for explicit targets.
    ///
    /// # Errors
    ///
    /// Returns [`LoadTestError::HttpClient`] if the probe client cannot be built.
    pub fn new(
        host: impl Into<String>,
        targets: Vec<ProbeTarget>,
        host_check: HostCheck,
        timeout: Duration,
    ) -> Result<Self, LoadTestError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(LoadTestError::HttpClient)?;
        Ok(Self {
            client,
            host: host.into(),
            host_check,
            targets,
            timeout,
        })
    }

    /// Creates a probe for the service roots of `endpoints`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadTestError::HttpClient`] if the probe client cannot be built.
    pub fn for_endpoints(
        endpoints: &Endpoints,
        host_check: HostCheck,
        timeout: Duration,
    ) -> Result<Self, LoadTestError> {
        let targets = endpoints
            .probe_targets()
            .into_iter()
            .map(|(url, name)| ProbeTarget {
                url,
                name: name.to_string(),
            })
            .collect();
        Self::new(endpoints.host(), targets, host_check, timeout)
    }

    /// Returns the probed host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Runs the host check and then every endpoint probe, in order.
    #[instrument(skip(self), fields(host = %self.host))]
    pub async fn run(&self) -> ProbeReport {
        info!("Testing connectivity to services...");

        if !self.check_host().await {
            return ProbeReport {
                host_reachable: false,
                endpoints: Vec::new(),
            };
        }

        let mut endpoints = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            endpoints.push(self.probe_endpoint(target).await);
        }

        ProbeReport {
            host_reachable: true,
            endpoints,
        }
    }

    async fn check_host(&self) -> bool {
        match self.host_check {
            HostCheck::Skip => {
                debug!("host check skipped");
                true
            }
            HostCheck::Ping => self.ping_host().await,
            HostCheck::Tcp(port) => self.connect_host(port).await,
        }
    }

    async fn ping_host(&self) -> bool {
        let mut command = Command::new("ping");
        command
            .args(["-c", "1", "-W", "3", self.host.as_str()])
            .kill_on_drop(true);

        match tokio::time::timeout(PING_PROCESS_TIMEOUT, command.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                info!("Target host ({}) is reachable", self.host);
                true
            }
            Ok(Ok(_)) => {
                error!("Target host ({}) is not reachable", self.host);
                false
            }
            Ok(Err(e)) => {
                error!("Failed to ping target host ({}): {}", self.host, e);
                false
            }
            Err(_) => {
                error!("Ping to target host ({}) timed out", self.host);
                false
            }
        }
    }

    async fn connect_host(&self, port: u16) -> bool {
        let address = (self.host.as_str(), port);
        match tokio::time::timeout(self.timeout, TcpStream::connect(address)).await {
            Ok(Ok(_stream)) => {
                info!("Target host ({}:{}) accepts connections", self.host, port);
                true
            }
            Ok(Err(e)) => {
                error!("Target host ({}:{}) refused connection: {}", self.host, port, e);
                false
            }
            Err(_) => {
                error!("Connection to target host ({}:{}) timed out", self.host, port);
                false
            }
        }
    }

    async fn probe_endpoint(&self, target: &ProbeTarget) -> EndpointStatus {
        match self.client.get(target.url.clone()).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let reachable = is_acceptable_status(status);
                if reachable {
                    info!("{} is accessible (status: {})", target.name, status);
                } else {
                    error!("{} returned unexpected status: {}", target.name, status);
                }
                EndpointStatus {
                    name: target.name.clone(),
                    url: target.url.to_string(),
                    status: Some(status),
                    reachable,
                    error: None,
                }
            }
            Err(e) => {
                error!("{} is not accessible: {}", target.name, e);
                EndpointStatus {
                    name: target.name.clone(),
                    url: target.url.to_string(),
                    status: None,
                    reachable: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
