//! Cooldown stamping policy

use serde::{Deserialize, Serialize};

/// Who gets stamped when a teleport completes
///
/// The check at request time always looks at the initiator; this only
/// decides whose timestamps are written on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CooldownMode {
    /// Stamp only the actor that was moved
    #[default]
    #[serde(alias = "WhoTeleported", alias = "whoteleported")]
    MoverOnly,
    /// Stamp only the actor that issued the request
    #[serde(alias = "WhoInitiated", alias = "whoinitiated")]
    InitiatorOnly,
    /// Stamp both the mover and the anchor
    #[serde(alias = "BothUsers", alias = "bothusers")]
    BothParticipants,
}

impl std::fmt::Display for CooldownMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MoverOnly => write!(f, "mover-only"),
            Self::InitiatorOnly => write!(f, "initiator-only"),
            Self::BothParticipants => write!(f, "both-participants"),
        }
    }
}

impl std::str::FromStr for CooldownMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mover-only" | "moveronly" | "whoteleported" => Ok(Self::MoverOnly),
            "initiator-only" | "initiatoronly" | "whoinitiated" => Ok(Self::InitiatorOnly),
            "both-participants" | "bothparticipants" | "bothusers" => Ok(Self::BothParticipants),
            _ => Err(format!("Unknown cooldown mode: {}", s)),
        }
    }
}
