//! Host reachability probes
//!
//! The ICMP probe shells out to the system `ping` binary, which works
//! unprivileged on every mainstream distribution. When `ping` is missing or
//! cannot run, it falls back to a TCP connect against the control port.

use std::ffi::OsString;
use std::net::SocketAddr;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, ProbeResult};

/// Default probe timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// `ping` exit status when no reply was received
const PING_NO_REPLY: i32 = 1;

/// Which probe the poller runs before querying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// ICMP echo via `ping`, TCP fallback
    #[default]
    Ping,
    /// TCP connect to the control port
    Tcp,
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ping => "ping",
            Self::Tcp => "tcp",
        })
    }
}

impl std::str::FromStr for ProbeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ping" | "icmp" => Ok(Self::Ping),
            "tcp" => Ok(Self::Tcp),
            other => Err(format!("unknown probe '{other}'")),
        }
    }
}

/// Checks whether a host answers at all
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Probes `host`; `port` is used by connection-based probes
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] if the host cannot be resolved or does not answer.
    async fn probe(&self, host: &str, port: u16) -> ProbeResult<()>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Builds the probe selected in settings
#[must_use]
pub fn probe_for(kind: ProbeKind, timeout: Duration) -> Arc<dyn ReachabilityProbe> {
    match kind {
        ProbeKind::Ping => Arc::new(PingProbe::new(timeout)),
        ProbeKind::Tcp => Arc::new(TcpProbe::new(timeout)),
    }
}

async fn resolve(host: &str, port: u16) -> ProbeResult<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| ProbeError::ResolutionFailed {
            host: host.to_string(),
            reason: e.to_string(),
        })?
        .collect();

    if addrs.is_empty() {
        return Err(ProbeError::ResolutionFailed {
            host: host.to_string(),
            reason: "No addresses found".to_string(),
        });
    }
    Ok(addrs)
}

/// TCP connect probe
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    /// Creates a probe with the given connect timeout
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn probe(&self, host: &str, port: u16) -> ProbeResult<()> {
        let mut last_error = String::new();
        for addr in resolve(host, port).await? {
            match tokio::time::timeout(self.timeout, tokio::net::TcpStream::connect(addr)).await {
                Ok(Ok(_stream)) => return Ok(()),
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => last_error = "Connection timed out".to_string(),
            }
        }
        Err(ProbeError::Unreachable {
            host: host.to_string(),
            reason: format!("port {port}: {last_error}"),
        })
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

/// ICMP echo probe through the system `ping` binary
#[derive(Debug, Clone)]
pub struct PingProbe {
    program: OsString,
    timeout: Duration,
    fallback: TcpProbe,
}

impl PingProbe {
    /// Creates a probe that runs `ping`
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self::with_program("ping", timeout)
    }

    /// Creates a probe that runs a specific ping binary
    #[must_use]
    pub fn with_program(program: impl Into<OsString>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            fallback: TcpProbe::new(timeout),
        }
    }

    async fn ping(&self, host: &str) -> Result<bool, std::io::Error> {
        // -W takes whole seconds
        let wait_secs = self.timeout.as_secs().max(1);
        let child = tokio::process::Command::new(&self.program)
            .args(["-c", "1", "-W", &wait_secs.to_string()])
            .arg(host)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        let grace = Duration::from_secs(wait_secs) + Duration::from_millis(500);
        match tokio::time::timeout(grace, child).await {
            Ok(status) => {
                let status = status?;
                match status.code() {
                    Some(0) => Ok(true),
                    Some(PING_NO_REPLY) => Ok(false),
                    _ => Err(std::io::Error::other(format!("ping exited with {status}"))),
                }
            }
            Err(_) => Ok(false),
        }
    }
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

#[async_trait]
impl ReachabilityProbe for PingProbe {
    async fn probe(&self, host: &str, port: u16) -> ProbeResult<()> {
        match self.ping(host).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ProbeError::Unreachable {
                host: host.to_string(),
                reason: "no echo reply".to_string(),
            }),
            Err(e) => {
                tracing::debug!(host, error = %e, "ping unavailable, using TCP probe");
                self.fallback.probe(host, port).await
            }
        }
    }

    fn name(&self) -> &'static str {
        "ping"
    }
}
