//! Typed parsing of RCON command output

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{ProtocolError, ProtocolResult};

/// Output of a console command that can be parsed into a typed value
pub trait RconParse: Sized {
    /// Parses the full command output
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] if the output has an unexpected shape.
    fn parse_response(text: &str) -> ProtocolResult<Self>;
}

/// `players : 2 humans, 1 bots (16/0 max)` (CS:GO and later)
static PLAYERS_HUMANS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s+humans?,\s*(\d+)\s+bots?\s*\((\d+)/\d+\s+max\)")
        .expect("PLAYERS_HUMANS_REGEX is a valid regex pattern")
});

/// `players : 5 (24 max)` (older Source games)
static PLAYERS_LEGACY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*\((\d+)\s+max\)").expect("PLAYERS_LEGACY_REGEX is a valid regex pattern")
});

/// `# 2 1 "name" STEAM_1:0:123 05:32 50 0 active ...`
static PLAYER_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^#\s*(\d+)\s+(?:\d+\s+)?"((?:[^"\\]|\\.)*)"\s+(\S+)(.*)$"#)
        .expect("PLAYER_LINE_REGEX is a valid regex pattern")
});

/// `"sv_gravity" = "800" ( def. "800" )` or `sv_gravity = 800`
static CVAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*"?([A-Za-z0-9_.+\-]+)"?\s*=\s*(?:"([^"]*)"|(\S+))"#)
        .expect("CVAR_REGEX is a valid regex pattern")
});

/// One row of the `status` player table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerEntry {
    /// Server-side user id
    pub user_id: u32,
    /// Player name
    pub name: String,
    /// Steam id, or `BOT`
    pub unique_id: String,
    /// Connection time as printed by the server
    pub connected: Option<String>,
    /// Ping in milliseconds
    pub ping: Option<u32>,
}

impl PlayerEntry {
    /// Returns true for bot players
    #[must_use]
    pub fn is_bot(&self) -> bool {
        self.unique_id == "BOT"
    }
}

/// Parsed output of the `status` command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Server hostname
    pub hostname: String,
    /// Current map
    pub map: String,
    /// Human players connected
    pub players: u32,
    /// Bots connected
    pub bots: u32,
    /// Player capacity
    pub max_players: u32,
    /// Player table
    pub player_list: Vec<PlayerEntry>,
}

impl RconParse for StatusReport {
    fn parse_response(text: &str) -> ProtocolResult<Self> {
        let mut report = Self::default();
        let mut saw_header = false;

        for line in text.lines() {
            let trimmed = line.trim();

            if let Some(caps) = PLAYER_LINE_REGEX.captures(trimmed) {
                let unique_id = caps[3].to_string();
                let rest: Vec<&str> = caps[4].split_whitespace().collect();
                let (connected, ping) = if unique_id == "BOT" {
                    (None, None)
                } else {
                    (
                        rest.first().map(|s| (*s).to_string()),
                        rest.get(1).and_then(|s| s.parse().ok()),
                    )
                };
                report.player_list.push(PlayerEntry {
                    user_id: caps[1].parse().unwrap_or_default(),
                    name: caps[2].to_string(),
                    unique_id,
                    connected,
                    ping,
                });
                continue;
            }

            let Some((key, value)) = trimmed.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "hostname" => {
                    report.hostname = value.to_string();
                    saw_header = true;
                }
                "map" => {
                    report.map = value.split_whitespace().next().unwrap_or_default().to_string();
                    saw_header = true;
                }
                "players" => {
                    if let Some(caps) = PLAYERS_HUMANS_REGEX.captures(value) {
                        report.players = caps[1].parse().unwrap_or_default();
                        report.bots = caps[2].parse().unwrap_or_default();
                        report.max_players = caps[3].parse().unwrap_or_default();
                    } else if let Some(caps) = PLAYERS_LEGACY_REGEX.captures(value) {
                        report.players = caps[1].parse().unwrap_or_default();
                        report.max_players = caps[2].parse().unwrap_or_default();
                    }
                    saw_header = true;
                }
                _ => {}
            }
        }

        if !saw_header {
            return Err(ProtocolError::Malformed(
                "status output has no hostname, map or players line".into(),
            ));
        }

        // Older games count bots in the player total and list them as BOT
        if report.bots == 0 {
            report.bots = report.player_list.iter().filter(|p| p.is_bot()).count() as u32;
        }

        Ok(report)
    }
}

/// Value of a console variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CvarValue {
    /// Variable name
    pub name: String,
    /// Current value
    pub value: String,
}

impl CvarValue {
    /// Interprets the value as a boolean (`0`/`1`, `true`/`false`)
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self.value.to_ascii_lowercase().as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        }
    }

    /// Interprets the value as a number
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.value.parse().ok()
    }
}

impl RconParse for CvarValue {
    fn parse_response(text: &str) -> ProtocolResult<Self> {
        let first = text.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();

        if first.trim_start().starts_with("Unknown command") {
            return Err(ProtocolError::Malformed(first.trim().to_string()));
        }

        let caps = CVAR_REGEX
            .captures(first)
            .ok_or_else(|| ProtocolError::Malformed(format!("not a cvar value: {}", first.trim())))?;

        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        Ok(Self {
            name: caps[1].to_string(),
            value,
        })
    }
}
