//! Endpoint addressing for the target services.
//!
//! Registration and clear-data always hit their owning service directly.
//! Login and logout go either to the authentication service (direct mode)
//! or through the shared front-end (front-end mode).

use url::Url;

use crate::error::LoadTestError;

/// Default authentication service port.
pub const DEFAULT_AUTH_PORT: u16 = 5005;

/// Default profile (customer info) service port.
pub const DEFAULT_PROFILE_PORT: u16 = 5006;

/// Default front-end / load-balancer port.
pub const DEFAULT_FRONT_END_PORT: u16 = 80;

/// Ports of the services under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServicePorts {
    /// Authentication service: register, login/logout in direct mode, clear-data.
    pub auth: u16,
    /// Profile service: clear-data.
    pub profile: u16,
    /// Front-end: login/logout in front-end mode.
    pub front_end: u16,
}

impl Default for ServicePorts {
    fn default() -> Self {
        Self {
            auth: DEFAULT_AUTH_PORT,
            profile: DEFAULT_PROFILE_PORT,
            front_end: DEFAULT_FRONT_END_PORT,
        }
    }
}

/// Downstream service that owns per-identity data cleared during cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataOwner {
    /// Authentication state.
    Auth,
    /// Profile data.
    Profile,
}

impl DataOwner {
    /// Every owner, in the order cleanup visits them.
    pub const ALL: [DataOwner; 2] = [DataOwner::Auth, DataOwner::Profile];

    /// Short label used in log lines.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Profile => "customer",
        }
    }
}

/// Fully resolved URLs for every operation and probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    host: String,
    auth_root: Url,
    profile_root: Url,
    front_end_root: Option<Url>,
    register: Url,
    login: Url,
    logout: Url,
    clear_auth: Url,
    clear_profile: Url,
}

fn base_url(host: &str, port: u16) -> Result<Url, LoadTestError> {
    let raw = format!("http://{host}:{port}/");
    Url::parse(&raw).map_err(|e| LoadTestError::Endpoint(format!("{raw}: {e}")))
}

fn join(base: &Url, path: &str) -> Result<Url, LoadTestError> {
    base.join(path)
        .map_err(|e| LoadTestError::Endpoint(format!("{base}{path}: {e}")))
}

impl Endpoints {
    /// Builds endpoints for `host` with the given ports and addressing mode.
    ///
    /// # Errors
    ///
    /// Returns [`LoadTestError::Endpoint`] if `host` does not form a valid URL.
    pub fn new(host: &str, ports: ServicePorts, use_front_end: bool) -> Result<Self, LoadTestError> {
        let auth = base_url(host, ports.auth)?;
        let profile = base_url(host, ports.profile)?;
        let front_end = if use_front_end {
            Some(base_url(host, ports.front_end)?)
        } else {
            None
        };
        Self::from_bases(host, auth, profile, front_end)
    }

    /// Builds endpoints from explicit service base URLs.
    ///
    /// # Errors
    ///
    /// Returns [`LoadTestError::Endpoint`] if a path cannot be joined onto a base.
    pub fn from_bases(
        host: &str,
        auth_root: Url,
        profile_root: Url,
        front_end_root: Option<Url>,
    ) -> Result<Self, LoadTestError> {
        let session_base = front_end_root.as_ref().unwrap_or(&auth_root);
        Ok(Self {
            host: host.to_string(),
            register: join(&auth_root, "register")?,
            login: join(session_base, "login")?,
            logout: join(session_base, "logout")?,
            clear_auth: join(&auth_root, "clearData")?,
            clear_profile: join(&profile_root, "clearData")?,
            auth_root,
            profile_root,
            front_end_root,
        })
    }

    /// Target host name or address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether login/logout are routed through the front-end.
    #[must_use]
    pub fn uses_front_end(&self) -> bool {
        self.front_end_root.is_some()
    }

    /// Registration URL.
    #[must_use]
    pub fn register(&self) -> &Url {
        &self.register
    }

    /// Login URL.
    #[must_use]
    pub fn login(&self) -> &Url {
        &self.login
    }

    /// Logout URL.
    #[must_use]
    pub fn logout(&self) -> &Url {
        &self.logout
    }

    /// Clear-data URL for `owner`.
    #[must_use]
    pub fn clear_data(&self, owner: DataOwner) -> &Url {
        match owner {
            DataOwner::Auth => &self.clear_auth,
            DataOwner::Profile => &self.clear_profile,
        }
    }

    /// Authentication service root.
    #[must_use]
    pub fn auth_root(&self) -> &Url {
        &self.auth_root
    }

    /// Ordered `(url, name)` pairs the connectivity probe checks.
    #[must_use]
    pub fn probe_targets(&self) -> Vec<(Url, &'static str)> {
        let mut targets = vec![
            (self.auth_root.clone(), "Authentication service"),
            (self.profile_root.clone(), "Customer info service"),
        ];
        if let Some(front_end) = &self.front_end_root {
            targets.push((front_end.clone(), "Load balancer"));
        }
        targets
    }
}
