//! Volatile endpoint status

use std::fmt;

use serde::Serialize;

/// Max players reported before the first successful query
pub const DEFAULT_MAX_PLAYERS: u32 = 24;

/// Map name used when the query interface did not answer
pub const UNKNOWN_MAP: &str = "unknown";

/// Live status of one endpoint. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointStatus {
    /// The host answered the reachability probe
    pub reachable: bool,
    /// The game server is considered up
    pub online: bool,
    /// Current player count
    pub players: u32,
    /// Player capacity
    pub max_players: u32,
    /// Current map
    pub map: String,
}

impl Default for EndpointStatus {
    fn default() -> Self {
        Self::offline()
    }
}

/// How much the last poll learned about an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTier {
    /// Reachability probe failed
    Offline,
    /// Query answered with live details
    Online,
    /// Host reachable but the query failed
    Degraded,
}

impl fmt::Display for StatusTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Offline => "offline",
            Self::Online => "online",
            Self::Degraded => "degraded",
        })
    }
}

impl EndpointStatus {
    /// Status of an endpoint whose reachability probe failed. The map is
    /// left empty.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            reachable: false,
            online: false,
            players: 0,
            max_players: DEFAULT_MAX_PLAYERS,
            map: String::new(),
        }
    }

    /// Status of a reachable endpoint whose query failed
    #[must_use]
    pub fn degraded() -> Self {
        Self {
            reachable: true,
            online: true,
            map: UNKNOWN_MAP.to_string(),
            ..Self::offline()
        }
    }

    /// Status built from a successful query
    #[must_use]
    pub fn live(players: u32, max_players: u32, map: impl Into<String>) -> Self {
        Self {
            reachable: true,
            online: true,
            players,
            max_players,
            map: map.into(),
        }
    }

    /// Classifies this status
    #[must_use]
    pub fn tier(&self) -> StatusTier {
        if !self.reachable {
            StatusTier::Offline
        } else if self.map == UNKNOWN_MAP && self.players == 0 {
            StatusTier::Degraded
        } else {
            StatusTier::Online
        }
    }

    /// `"<players>/<max> - <map>"`
    #[must_use]
    pub fn player_map_info(&self) -> String {
        format!("{}/{} - {}", self.players, self.max_players, self.map)
    }
}
