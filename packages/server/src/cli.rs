//! Command-line interface of the `orgmesh` binary.
//!
//! - `orgmesh department` runs the department service (default port 8081)
//! - `orgmesh employee` runs the employee service (default port 8082)
//!
//! Every flag can also be set through the environment variable named in its
//! help text. Parsed arguments convert into [`ServiceConfig`]; nothing below
//! the binary depends on clap.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::app::Role;
use crate::client::parse_base_url;
use crate::network::NetworkConfig;
use crate::resilience::{CircuitBreakerConfig, ResilienceConfig, RetryConfig};
use crate::service::{DeleteGuardPolicy, ServiceConfig};
use crate::telemetry::LogFormat;

/// `OrgMesh` department and employee services.
#[derive(Debug, Parser)]
#[command(name = "orgmesh", version, about, long_about = None)]
pub struct Cli {
    /// Log line format.
    #[arg(long, env = "ORGMESH_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Serve Prometheus metrics on this address.
    #[arg(long, env = "ORGMESH_METRICS_ADDR", global = true)]
    pub metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the department service.
    Department(DepartmentArgs),
    /// Run the employee service.
    Employee(EmployeeArgs),
}

impl Command {
    #[must_use]
    pub fn role(&self) -> Role {
        match self {
            Self::Department(_) => Role::Department,
            Self::Employee(_) => Role::Employee,
        }
    }

    /// Converts the parsed flags into a service config.
    ///
    /// # Errors
    ///
    /// Returns an error when a peer URL is invalid.
    pub fn service_config(&self) -> anyhow::Result<ServiceConfig> {
        match self {
            Self::Department(args) => {
                let mut config = args.common.service_config(8081)?;
                config.delete_guard_policy = args.delete_guard_policy;
                Ok(config)
            }
            Self::Employee(args) => args.common.service_config(8082),
        }
    }
}

#[derive(Debug, Args)]
pub struct DepartmentArgs {
    #[command(flatten)]
    pub common: ServeArgs,

    /// What to do when the employee roster cannot be fetched before a delete
    /// (`fail-open` or `fail-closed`).
    #[arg(long, env = "ORGMESH_DELETE_GUARD_POLICY", default_value = "fail-open")]
    pub delete_guard_policy: DeleteGuardPolicy,
}

#[derive(Debug, Args)]
pub struct EmployeeArgs {
    #[command(flatten)]
    pub common: ServeArgs,
}

/// Flags shared by both services.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Bind address.
    #[arg(long, env = "ORGMESH_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port; defaults to 8081 (department) or 8082 (employee).
    #[arg(long, env = "ORGMESH_PORT")]
    pub port: Option<u16>,

    /// Base URL of the counterpart service.
    #[arg(long, env = "ORGMESH_PEER_URL")]
    pub peer_url: String,

    /// Where to POST lifecycle events (repeatable). Defaults to the peer URL.
    #[arg(long = "event-peer", env = "ORGMESH_EVENT_PEERS", value_delimiter = ',')]
    pub event_peers: Vec<String>,

    /// Sliding window size of the circuit breaker.
    #[arg(long, default_value_t = 10)]
    pub cb_window_size: usize,

    /// Calls recorded before the failure rate is evaluated.
    #[arg(long, default_value_t = 5)]
    pub cb_min_calls: usize,

    /// Failure percentage that opens the breaker.
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub cb_failure_rate: u8,

    /// Time the breaker stays open before probing, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    pub cb_open_wait_ms: u64,

    /// Probe calls admitted while half-open.
    #[arg(long, default_value_t = 3)]
    pub cb_half_open_calls: usize,

    /// Attempts per lookup, including the first.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub retry_max_attempts: u32,

    /// Delay between attempts, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub retry_wait_ms: u64,

    /// Hard deadline per attempt, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    pub call_timeout_ms: u64,
}

impl ServeArgs {
    fn service_config(&self, default_port: u16) -> anyhow::Result<ServiceConfig> {
        let mut config = ServiceConfig::new(parse_base_url(&self.peer_url)?);
        config.network = NetworkConfig {
            host: self.host.clone(),
            port: self.port.unwrap_or(default_port),
            ..NetworkConfig::default()
        };
        config.event_peers = self
            .event_peers
            .iter()
            .map(|raw| parse_base_url(raw))
            .collect::<anyhow::Result<_>>()?;
        config.resilience = ResilienceConfig {
            breaker: CircuitBreakerConfig {
                sliding_window_size: self.cb_window_size,
                minimum_number_of_calls: self.cb_min_calls,
                failure_rate_threshold: self.cb_failure_rate,
                wait_duration_in_open_state: Duration::from_millis(self.cb_open_wait_ms),
                permitted_calls_in_half_open_state: self.cb_half_open_calls,
            },
            retry: RetryConfig {
                max_attempts: self.retry_max_attempts,
                wait: Duration::from_millis(self.retry_wait_ms),
            },
            call_timeout: Duration::from_millis(self.call_timeout_ms),
        };
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn department_defaults() {
        let cli = Cli::parse_from(["orgmesh", "department", "--peer-url", "http://localhost:8082"]);
        assert_eq!(cli.log_format, LogFormat::Pretty);
        assert_eq!(cli.command.role(), Role::Department);

        let config = cli.command.service_config().unwrap();
        assert_eq!(config.network.port, 8081);
        assert_eq!(config.peer_url.as_str(), "http://localhost:8082/");
        assert_eq!(config.resilience, ResilienceConfig::default());
        assert_eq!(config.delete_guard_policy, DeleteGuardPolicy::FailOpen);
    }

    #[test]
    fn employee_flags_override_defaults() {
        let cli = Cli::parse_from([
            "orgmesh",
            "--log-format",
            "json",
            "employee",
            "--port",
            "9000",
            "--peer-url",
            "http://dept:8081",
            "--event-peer",
            "http://a:1",
            "--event-peer",
            "http://b:2",
            "--retry-max-attempts",
            "1",
            "--call-timeout-ms",
            "250",
        ]);
        assert_eq!(cli.log_format, LogFormat::Json);
        let config = cli.command.service_config().unwrap();
        assert_eq!(config.network.port, 9000);
        assert_eq!(config.event_peers.len(), 2);
        assert_eq!(config.resilience.retry.max_attempts, 1);
        assert_eq!(config.resilience.call_timeout, Duration::from_millis(250));
    }

    #[test]
    fn fail_closed_policy_parses() {
        let cli = Cli::parse_from([
            "orgmesh",
            "department",
            "--peer-url",
            "http://localhost:8082",
            "--delete-guard-policy",
            "fail-closed",
        ]);
        let config = cli.command.service_config().unwrap();
        assert_eq!(config.delete_guard_policy, DeleteGuardPolicy::FailClosed);
    }

    #[test]
    fn bad_peer_url_is_rejected() {
        let cli = Cli::parse_from(["orgmesh", "employee", "--peer-url", "not a url"]);
        assert!(cli.command.service_config().is_err());
    }

    #[test]
    fn out_of_range_failure_rate_is_rejected() {
        let parsed = Cli::try_parse_from([
            "orgmesh",
            "employee",
            "--peer-url",
            "http://x:1",
            "--cb-failure-rate",
            "150",
        ]);
        assert!(parsed.is_err());
    }
}
