//! Fleet management
//!
//! [`FleetManager`] ties the vault, the endpoint registry, the session pools
//! and the status poller together and exposes the user-triggered
//! operations: endpoint CRUD, RCON commands, uploads, directory browsing,
//! status refreshes and the orderly shutdown drain.

mod backends;
mod edit;
mod manager;
mod report;

pub use backends::Backends;
pub use edit::EndpointEdit;
pub use manager::{FleetManager, MIN_REFRESH_INTERVAL};
pub use report::{
    CommandOutcome, FleetPoolStats, RCON_ERROR_PREFIX, SecretStatus, UploadFailure, UploadReport,
    describe_error, format_broadcast, transfer_error_prefix,
};
