//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::domain::{ActorId, CooldownMode, RequestKey, TeleportRequest};
use crate::world::ProgressStyle;

/// How requests are keyed in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKeying {
    /// Ordered `(mover, anchor)`: "tpa" and "tpahere" between the same two
    /// actors can coexist
    #[default]
    Directional,
    /// Unordered pair: at most one request between two actors
    Pair,
}

impl RequestKeying {
    /// Key for a request moving `mover` to `anchor`
    pub fn key(&self, mover: ActorId, anchor: ActorId) -> RequestKey {
        match self {
            Self::Directional => RequestKey::directional(mover, anchor),
            Self::Pair => RequestKey::pair(mover, anchor),
        }
    }

    pub fn key_for(&self, request: &TeleportRequest) -> RequestKey {
        self.key(request.mover, request.anchor)
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Seconds before an unanswered request expires
    #[serde(rename = "timeout", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Seconds the mover must stand still after acceptance
    #[serde(rename = "stand-still", default = "default_stand_still_secs")]
    pub stand_still_secs: u64,

    /// Minimum seconds between an actor's teleports
    #[serde(rename = "cooldown", default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Who is stamped when a teleport completes
    #[serde(rename = "cooldown-mode", default)]
    pub cooldown_mode: CooldownMode,

    /// Rich (bar) progress rendering instead of plain chat lines
    #[serde(default = "default_bossbar")]
    pub bossbar: bool,

    /// Stand-still sampling cadence in milliseconds
    #[serde(rename = "poll-interval-ms", default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Registry keying policy
    #[serde(rename = "request-keying", default)]
    pub request_keying: RequestKeying,

    /// Mailbox capacity
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_stand_still_secs() -> u64 {
    5
}

fn default_cooldown_secs() -> u64 {
    5
}

fn default_bossbar() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_channel_buffer() -> usize {
    256
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            stand_still_secs: default_stand_still_secs(),
            cooldown_secs: default_cooldown_secs(),
            cooldown_mode: CooldownMode::default(),
            bossbar: default_bossbar(),
            poll_interval_ms: default_poll_interval_ms(),
            request_keying: RequestKeying::default(),
            channel_buffer: default_channel_buffer(),
        }
    }
}

impl CoordinatorConfig {
    /// Request expiry as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn stand_still(&self) -> Duration {
        Duration::from_secs(self.stand_still_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn progress_style(&self) -> ProgressStyle {
        if self.bossbar {
            ProgressStyle::Rich
        } else {
            ProgressStyle::Plain
        }
    }

    /// Check the invariants the coordinator relies on
    pub fn validate(&self) -> Result<(), String> {
        debug!(?self, "CoordinatorConfig::validate: called");
        if self.timeout_secs == 0 {
            return Err("timeout must be greater than 0 seconds".to_string());
        }
        if self.poll_interval_ms == 0 {
            return Err("poll-interval-ms must be greater than 0".to_string());
        }
        if self.channel_buffer == 0 {
            return Err("channel-buffer must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Apply a runtime setting, returning the updated config without touching
    /// `self` if the result would be invalid
    pub fn with_setting(&self, setting: &Setting) -> Result<Self, String> {
        let mut next = self.clone();
        match *setting {
            Setting::Timeout(secs) => next.timeout_secs = secs,
            Setting::StandStill(secs) => next.stand_still_secs = secs,
            Setting::Cooldown(secs) => next.cooldown_secs = secs,
            Setting::CooldownMode(mode) => next.cooldown_mode = mode,
            Setting::Bossbar(on) => next.bossbar = on,
        }
        next.validate()?;
        Ok(next)
    }
}

/// A single runtime-adjustable configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Timeout(u64),
    StandStill(u64),
    Cooldown(u64),
    CooldownMode(CooldownMode),
    Bossbar(bool),
}

impl Setting {
    /// Names accepted by `parse`, in display order
    pub const KEYS: &'static [&'static str] = &["timeout", "stand-still", "cooldown", "cooldown-mode", "bossbar"];

    /// Parse a `key value` pair as typed by an operator
    pub fn parse(key: &str, value: &str) -> Result<Self, String> {
        let secs = || {
            value
                .parse::<u64>()
                .map_err(|_| format!("{} expects a whole number of seconds, got '{}'", key, value))
        };
        match key {
            "timeout" => Ok(Self::Timeout(secs()?)),
            "stand-still" => Ok(Self::StandStill(secs()?)),
            "cooldown" => Ok(Self::Cooldown(secs()?)),
            "cooldown-mode" => Ok(Self::CooldownMode(value.parse()?)),
            "bossbar" => value
                .parse::<bool>()
                .map(Self::Bossbar)
                .map_err(|_| format!("bossbar expects true or false, got '{}'", value)),
            _ => Err(format!("Unknown setting: {} (expected one of {})", key, Self::KEYS.join(", "))),
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::StandStill(_) => "stand-still",
            Self::Cooldown(_) => "cooldown",
            Self::CooldownMode(_) => "cooldown-mode",
            Self::Bossbar(_) => "bossbar",
        }
    }
}
