//! Builders that wire library components against mock servers.

use std::sync::Arc;
use std::time::Duration;

use loadtest_core::service::{Endpoints, HttpTargetService};
use loadtest_core::{
    ConnectivityProbe, HostCheck, LoadTestConfig, LoadTestOrchestrator, PhaseExecutor,
    RetryPolicy, RunStatistics, SessionStore,
};
use url::Url;
use wiremock::MockServer;

#[allow(dead_code)]
pub const TEST_BACKOFF: Duration = Duration::from_millis(10);

#[allow(dead_code)]
pub fn endpoints(auth: &MockServer, profile: &MockServer, front_end: Option<&MockServer>) -> Endpoints {
    Endpoints::from_bases(
        "127.0.0.1",
        Url::parse(&auth.uri()).unwrap(),
        Url::parse(&profile.uri()).unwrap(),
        front_end.map(|server| Url::parse(&server.uri()).unwrap()),
    )
    .unwrap()
}

#[allow(dead_code)]
pub fn executor(endpoints: Endpoints, sessions: Arc<dyn SessionStore>, attempts: u32) -> PhaseExecutor {
    let service = HttpTargetService::new(endpoints, Duration::from_secs(5)).unwrap();
    PhaseExecutor::new(
        Arc::new(service),
        sessions,
        Arc::new(RunStatistics::new()),
        RetryPolicy::new(attempts, TEST_BACKOFF),
    )
}

#[allow(dead_code)]
pub fn orchestrator(
    endpoints: Endpoints,
    sessions: Arc<dyn SessionStore>,
    attempts: u32,
    concurrency: usize,
) -> LoadTestOrchestrator {
    let config = LoadTestConfig {
        concurrency,
        concurrency_explicit: true,
        retries: attempts,
        backoff: TEST_BACKOFF,
        host_check: HostCheck::Skip,
        ..LoadTestConfig::default()
    };
    let probe = ConnectivityProbe::for_endpoints(&endpoints, HostCheck::Skip, Duration::from_secs(2)).unwrap();
    LoadTestOrchestrator::new(config, probe, executor(endpoints, sessions, attempts))
}
