//! Target service seam.
//!
//! The phase executor talks to the system under test only through
//! [`TargetService`], which reports raw HTTP status codes. Deciding which
//! codes count as success is the executor's job, per operation.
//! [`HttpTargetService`] is the reqwest-backed implementation.

use async_trait::async_trait;

use crate::error::RequestError;
use crate::identity::Identity;
use crate::session::SessionArtifact;

mod endpoints;
mod http;

pub use endpoints::{
    DEFAULT_AUTH_PORT, DEFAULT_FRONT_END_PORT, DEFAULT_PROFILE_PORT, DataOwner, Endpoints,
    ServicePorts,
};
pub use http::HttpTargetService;

/// Response to a login request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    /// HTTP status code.
    pub status: u16,
    /// Session captured from the response cookies, if any were set.
    pub artifact: Option<SessionArtifact>,
}

/// Operations the load test performs against the system under test.
#[async_trait]
pub trait TargetService: Send + Sync {
    /// Submits a registration for `identity`, returning the status code.
    async fn register(&self, identity: &Identity) -> Result<u16, RequestError>;

    /// Logs in with form-encoded credentials.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, RequestError>;

    /// Logs out the session carried by `session`, returning the status code.
    async fn logout(&self, session: &SessionArtifact) -> Result<u16, RequestError>;

    /// Asks `owner` to clear all data for `username`, returning the status code.
    async fn clear_data(&self, owner: DataOwner, username: &str) -> Result<u16, RequestError>;
}
