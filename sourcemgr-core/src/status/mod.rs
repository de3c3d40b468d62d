//! Live status of managed endpoints
//!
//! [`StatusPoller`] runs a reachability probe followed by an A2S_INFO
//! query and publishes the result on each endpoint's status channel.

mod poller;
mod probe;

pub use poller::{
    DEFAULT_CONCURRENCY, DEFAULT_QUERY_TIMEOUT, PollResult, PollSummary, StatusPoller,
};
pub use probe::{
    DEFAULT_PROBE_TIMEOUT, PingProbe, ProbeKind, ReachabilityProbe, TcpProbe, probe_for,
};
