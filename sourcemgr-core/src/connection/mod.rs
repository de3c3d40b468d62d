//! Session pooling
//!
//! A [`SessionPool`] keeps at most one live session per [`ConnectionKey`]
//! and reuses it across operations. Pools are generic over the session
//! contract; the fleet owns one pool per protocol (RCON, query, FTP, SFTP).

mod pool;
mod retry;
mod session;

pub use pool::{PoolStats, PoolStatsSnapshot, SessionPool};
pub use retry::{
    DEFAULT_ATTEMPTS, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_DELAY_MS,
    RetryConfig, RetryState, retry_with_backoff,
};
pub use session::{
    ConnectParams, ConnectionKey, Connector, FtpEncryption, PooledSession, TlsSettings,
    next_session_id,
};
