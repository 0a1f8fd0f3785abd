//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, ValueEnum};

use loadtest_core::RunMode;

/// Phased load test for user registration and login.
///
/// Registers synthetic users, logs them in, and reports per-phase success
/// rates. Separate runs log users out or clear their data.
#[derive(Parser, Debug)]
#[command(name = "loadtest")]
#[command(author, version, about)]
#[command(group(ArgGroup::new("mode").args(["test", "load", "cleanup", "logout"]).multiple(false)))]
pub struct Args {
    /// Target host name or IP address (default: localhost)
    #[arg(long = "ip", value_name = "HOST")]
    pub host: Option<String>,

    /// Disable load balancer (direct service access for login/logout)
    #[arg(long)]
    pub no_lb: bool,

    /// Test connectivity only
    #[arg(long)]
    pub test: bool,

    /// Number of users to create and log in
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub load: Option<u32>,

    /// Clear data for user1..=userN
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub cleanup: Option<u32>,

    /// Log out all currently logged in users
    #[arg(long)]
    pub logout: bool,

    /// Reload logged-in users from stored sessions before logging out
    #[arg(long, requires = "logout")]
    pub reload_sessions: bool,

    /// Concurrent users per phase (1-1000, default: 50)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u16).range(1..=1000))]
    pub concurrency: Option<u16>,

    /// Attempts per register/login request (1-20, default: 3)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub retries: Option<u32>,

    /// Delay between attempts in milliseconds (default: 2000)
    #[arg(long, value_name = "MS")]
    pub backoff_ms: Option<u64>,

    /// Per-request timeout in seconds during phases (1-3600, default: 30)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub request_timeout: Option<u64>,

    /// Per-request timeout in seconds for connectivity probes (1-3600, default: 10)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub probe_timeout: Option<u64>,

    /// How to check the host before probing services
    #[arg(long, value_enum)]
    pub host_check: Option<HostCheckArg>,

    /// Authentication service port (default: 5005)
    #[arg(long, value_name = "PORT")]
    pub auth_port: Option<u16>,

    /// Customer info service port (default: 5006)
    #[arg(long, value_name = "PORT")]
    pub profile_port: Option<u16>,

    /// Load balancer port (default: 80)
    #[arg(long, value_name = "PORT")]
    pub front_end_port: Option<u16>,

    /// Directory for stored session cookies (default: cookie)
    #[arg(long, value_name = "DIR")]
    pub session_dir: Option<PathBuf>,

    /// Skip the one-at-a-time login retry for users who failed to log in
    #[arg(long)]
    pub no_login_retry: bool,

    /// Config file (default: $XDG_CONFIG_HOME/loadtest/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Host reachability check selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HostCheckArg {
    /// Send one ICMP echo with the system `ping`
    Ping,
    /// Open a TCP connection to the authentication port
    Tcp,
    /// Do not check the host
    Skip,
}

impl Args {
    /// Returns the selected run mode, or `None` when no mode flag was given.
    pub fn mode(&self) -> Option<RunMode> {
        if self.test {
            Some(RunMode::ConnectivityOnly)
        } else if let Some(users) = self.load {
            Some(RunMode::Load { users })
        } else if let Some(users) = self.cleanup {
            Some(RunMode::Cleanup { users })
        } else if self.logout {
            Some(RunMode::LogoutOnly {
                reload_sessions: self.reload_sessions,
            })
        } else {
            None
        }
    }

    /// Default log level from the verbosity flags.
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_no_mode_parses() {
        let args = Args::try_parse_from(["loadtest"]).unwrap();
        assert!(args.mode().is_none());
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(args.concurrency.is_none());
    }

    #[test]
    fn test_cli_load_mode() {
        let args = Args::try_parse_from(["loadtest", "--load", "25", "--ip", "10.0.0.5"]).unwrap();
        assert_eq!(args.mode(), Some(RunMode::Load { users: 25 }));
        assert_eq!(args.host.as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn test_cli_test_mode() {
        let args = Args::try_parse_from(["loadtest", "--test", "--no-lb"]).unwrap();
        assert_eq!(args.mode(), Some(RunMode::ConnectivityOnly));
        assert!(args.no_lb);
    }

    #[test]
    fn test_cli_cleanup_mode() {
        let args = Args::try_parse_from(["loadtest", "--cleanup", "100"]).unwrap();
        assert_eq!(args.mode(), Some(RunMode::Cleanup { users: 100 }));
    }

    #[test]
    fn test_cli_logout_mode_with_reload() {
        let args = Args::try_parse_from(["loadtest", "--logout", "--reload-sessions"]).unwrap();
        assert_eq!(
            args.mode(),
            Some(RunMode::LogoutOnly {
                reload_sessions: true
            })
        );
    }

    #[test]
    fn test_cli_reload_sessions_requires_logout() {
        let err = Args::try_parse_from(["loadtest", "--reload-sessions"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_modes_are_mutually_exclusive() {
        let err = Args::try_parse_from(["loadtest", "--load", "5", "--cleanup", "5"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);

        let err = Args::try_parse_from(["loadtest", "--test", "--logout"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_load_zero_rejected() {
        let err = Args::try_parse_from(["loadtest", "--load", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    // ==================== Tuning Tests ====================

    #[test]
    fn test_cli_concurrency_bounds() {
        let args = Args::try_parse_from(["loadtest", "-c", "1000"]).unwrap();
        assert_eq!(args.concurrency, Some(1000));

        let err = Args::try_parse_from(["loadtest", "-c", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let err = Args::try_parse_from(["loadtest", "--concurrency", "1001"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_retries_bounds() {
        let args = Args::try_parse_from(["loadtest", "--retries", "5"]).unwrap();
        assert_eq!(args.retries, Some(5));

        let err = Args::try_parse_from(["loadtest", "-r", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_host_check_values() {
        let args = Args::try_parse_from(["loadtest", "--host-check", "tcp"]).unwrap();
        assert_eq!(args.host_check, Some(HostCheckArg::Tcp));

        let err = Args::try_parse_from(["loadtest", "--host-check", "icmp"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    // ==================== Verbosity Tests ====================

    #[test]
    fn test_cli_verbosity_levels() {
        let args = Args::try_parse_from(["loadtest", "-vv"]).unwrap();
        assert_eq!(args.default_log_level(), "trace");

        let args = Args::try_parse_from(["loadtest", "-q"]).unwrap();
        assert_eq!(args.default_log_level(), "error");

        let args = Args::try_parse_from(["loadtest"]).unwrap();
        assert_eq!(args.default_log_level(), "info");
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        let err = Args::try_parse_from(["loadtest", "-q", "-v"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["loadtest", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["loadtest", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
