//! Config file loading and merging with CLI arguments.
//!
//! Precedence: command-line value, then config file value, then built-in default.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use loadtest_core::{HostCheck, LoadTestConfig};

use crate::cli::{Args, HostCheckArg};

/// TOML-backed defaults for the load test.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub host: Option<String>,
    pub use_front_end: Option<bool>,
    pub auth_port: Option<u16>,
    pub profile_port: Option<u16>,
    pub front_end_port: Option<u16>,
    pub concurrency: Option<u16>,
    pub retries: Option<u32>,
    pub backoff_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub probe_timeout_secs: Option<u64>,
    pub host_check: Option<String>,
    pub session_dir: Option<PathBuf>,
    pub login_retry_pass: Option<bool>,
}

impl FileConfig {
    /// Validates config values against CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=1000).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=1000");
        }
        if let Some(retries) = self.retries
            && !(1..=20).contains(&retries)
        {
            bail!("Invalid config value for `retries`: {retries}. Expected range: 1..=20");
        }
        validate_timeout_secs("request_timeout_secs", self.request_timeout_secs)?;
        validate_timeout_secs("probe_timeout_secs", self.probe_timeout_secs)?;
        if let Some(host_check) = &self.host_check {
            parse_host_check(host_check)?;
        }
        if let Some(host) = &self.host
            && host.trim().is_empty()
        {
            bail!("Invalid config value for `host`: must not be empty");
        }
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

fn parse_host_check(value: &str) -> Result<HostCheckArg> {
    match value.to_ascii_lowercase().as_str() {
        "ping" => Ok(HostCheckArg::Ping),
        "tcp" => Ok(HostCheckArg::Tcp),
        "skip" => Ok(HostCheckArg::Skip),
        other => bail!("Invalid config value for `host_check`: '{other}'. Expected ping, tcp, or skip"),
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/loadtest/config.toml`
/// 2. `$HOME/.config/loadtest/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("loadtest")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("loadtest")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the explicit config file, or the default one if it exists.
///
/// An explicit path that does not exist is an error; a missing default is not.
pub fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return read_file_config(path).map(Some);
    }

    match resolve_default_config_path() {
        Some(path) if path.exists() => read_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

pub(crate) fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

/// Merges CLI arguments over the file config over defaults.
pub fn resolve_config(args: &Args, file: Option<&FileConfig>) -> Result<LoadTestConfig> {
    let file = file.cloned().unwrap_or_default();
    let mut config = LoadTestConfig::default();

    if let Some(host) = args.host.clone().or(file.host) {
        config.host = host;
    }
    config.use_front_end = if args.no_lb {
        false
    } else {
        file.use_front_end.unwrap_or(config.use_front_end)
    };

    if let Some(port) = args.auth_port.or(file.auth_port) {
        config.ports.auth = port;
    }
    if let Some(port) = args.profile_port.or(file.profile_port) {
        config.ports.profile = port;
    }
    if let Some(port) = args.front_end_port.or(file.front_end_port) {
        config.ports.front_end = port;
    }

    if let Some(concurrency) = args.concurrency.or(file.concurrency) {
        config.concurrency = usize::from(concurrency);
        config.concurrency_explicit = true;
    }
    if let Some(retries) = args.retries.or(file.retries) {
        config.retries = retries;
    }
    if let Some(backoff_ms) = args.backoff_ms.or(file.backoff_ms) {
        config.backoff = Duration::from_millis(backoff_ms);
    }
    if let Some(secs) = args.request_timeout.or(file.request_timeout_secs) {
        config.request_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = args.probe_timeout.or(file.probe_timeout_secs) {
        config.probe_timeout = Duration::from_secs(secs);
    }

    let host_check = match (args.host_check, file.host_check.as_deref()) {
        (Some(arg), _) => Some(arg),
        (None, Some(value)) => Some(parse_host_check(value)?),
        (None, None) => None,
    };
    if let Some(host_check) = host_check {
        config.host_check = match host_check {
            HostCheckArg::Ping => HostCheck::Ping,
            HostCheckArg::Tcp => HostCheck::Tcp(config.ports.auth),
            HostCheckArg::Skip => HostCheck::Skip,
        };
    }

    if let Some(dir) = args.session_dir.clone().or(file.session_dir) {
        config.session_dir = dir;
    }
    config.login_retry_pass = if args.no_login_retry {
        false
    } else {
        file.login_retry_pass.unwrap_or(config.login_retry_pass)
    };

    config
        .validate()
        .context("Invalid effective configuration")?;
    Ok(config)
}
