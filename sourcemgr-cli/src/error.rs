//! CLI error types and exit codes.

use sourcemgr_core::SourceMgrError;

/// Exit codes for CLI operations
pub mod exit_codes {
    /// General error - configuration, validation, or other non-connection errors
    pub const GENERAL_ERROR: i32 = 1;
    /// Connection failure - a server could not be reached or refused the
    /// session
    pub const CONNECTION_FAILURE: i32 = 2;
}

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Endpoint lookup failed
    #[error("{0}")]
    Lookup(String),

    /// Invalid command-line input
    #[error("Invalid input: {0}")]
    Input(String),

    /// Credential vault error
    #[error("Secret error: {0}")]
    Secret(String),

    /// A server could not be reached or talked to
    #[error("Connection error: {0}")]
    Connection(String),

    /// Some endpoints of a fleet operation failed
    #[error("{failed} of {total} servers failed")]
    Partial {
        /// Endpoints that failed
        failed: usize,
        /// Endpoints targeted
        total: usize,
    },

    /// Logging could not be set up
    #[error("Logging error: {0}")]
    Logging(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SourceMgrError> for CliError {
    fn from(err: SourceMgrError) -> Self {
        if err.is_connection_failure() {
            return Self::Connection(err.to_string());
        }
        match err {
            SourceMgrError::Config(e) => Self::Config(e.to_string()),
            SourceMgrError::Secret(e) => Self::Secret(e.to_string()),
            e @ (SourceMgrError::EndpointNotFound(_) | SourceMgrError::AmbiguousEndpoint(_)) => {
                Self::Lookup(e.to_string())
            }
            SourceMgrError::Io(e) => Self::Io(e),
            e => Self::Connection(e.to_string()),
        }
    }
}

impl CliError {
    /// Returns the appropriate exit code for this error type.
    ///
    /// Exit codes:
    /// - 0: Success (not an error)
    /// - 1: General error (configuration, lookup, input, secrets, IO)
    /// - 2: Connection failure (including fleet operations where any
    ///   server failed)
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Connection(_) | Self::Partial { .. } => exit_codes::CONNECTION_FAILURE,
            Self::Config(_)
            | Self::Lookup(_)
            | Self::Input(_)
            | Self::Secret(_)
            | Self::Logging(_)
            | Self::Io(_) => exit_codes::GENERAL_ERROR,
        }
    }
}
