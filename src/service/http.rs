//! reqwest-backed [`TargetService`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::COOKIE;
use reqwest::redirect::Policy;
use serde_json::json;
use tracing::{debug, instrument};

use super::{DataOwner, Endpoints, LoginResponse, TargetService};
use crate::error::{LoadTestError, RequestError};
use crate::identity::Identity;
use crate::session::SessionArtifact;

/// Connect timeout cap; the overall request timeout may be longer.
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the services under test.
///
/// Redirects are not followed: a `302` from login or logout is itself the
/// success signal, and the session cookies ride on that redirect response.
/// Created once per run and shared across tasks (connection pooling).
#[derive(Debug, Clone)]
pub struct HttpTargetService {
    client: Client,
    endpoints: Endpoints,
}

impl HttpTargetService {
    /// Creates a client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`LoadTestError::HttpClient`] if the client cannot be built.
    #[instrument(level = "debug", skip(endpoints), fields(host = endpoints.host()))]
    pub fn new(endpoints: Endpoints, request_timeout: Duration) -> Result<Self, LoadTestError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout.min(MAX_CONNECT_TIMEOUT))
            .redirect(Policy::none())
            .build()
            .map_err(LoadTestError::HttpClient)?;
        Ok(Self { client, endpoints })
    }
}

#[async_trait]
impl TargetService for HttpTargetService {
    async fn register(&self, identity: &Identity) -> Result<u16, RequestError> {
        let url = self.endpoints.register();
        let response = self
            .client
            .post(url.clone())
            .json(identity)
            .send()
            .await
            .map_err(|e| RequestError::from_reqwest(url.as_str(), e))?;
        Ok(response.status().as_u16())
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, RequestError> {
        let url = self.endpoints.login();
        let response = self
            .client
            .post(url.clone())
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|e| RequestError::from_reqwest(url.as_str(), e))?;

        let status = response.status().as_u16();
        let cookies: Vec<String> = response
            .cookies()
            .map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
            .collect();
        debug!(username, status, cookies = cookies.len(), "login response");

        let artifact = (!cookies.is_empty()).then(|| SessionArtifact::new(cookies.join("; ")));
        Ok(LoginResponse { status, artifact })
    }

    async fn logout(&self, session: &SessionArtifact) -> Result<u16, RequestError> {
        let url = self.endpoints.logout();
        let mut request = self.client.get(url.clone());
        if !session.as_str().is_empty() {
            request = request.header(COOKIE, session.as_str());
        }
        let response = request
            .send()
            .await
            .map_err(|e| RequestError::from_reqwest(url.as_str(), e))?;
        Ok(response.status().as_u16())
    }

    async fn clear_data(&self, owner: DataOwner, username: &str) -> Result<u16, RequestError> {
        let url = self.endpoints.clear_data(owner);
        let response = self
            .client
            .post(url.clone())
            .json(&json!({ "username": username }))
            .send()
            .await
            .map_err(|e| RequestError::from_reqwest(url.as_str(), e))?;
        Ok(response.status().as_u16())
    }
}
