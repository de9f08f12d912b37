//! Command tokens understood by an instance
//!
//! Tokens are free text: trimmed, matched case-insensitively, with runs of
//! whitespace treated as one space.

use crate::domain::MAX_SPEED;

/// Every command an instance answers, as shown to confused controllers
pub const COMMAND_VOCABULARY: [&str; 9] = [
    "ping",
    "status",
    "quest",
    "map",
    "boss",
    "toggle auto",
    "toggle attack",
    "log",
    "speed [n]",
];

/// A parsed command token
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelCommand {
    Ping,
    Status,
    Quest,
    Map,
    Boss,
    ToggleAuto,
    ToggleAttack,
    Log,
    /// `speed` cycles; `speed n` sets
    Speed(Option<f32>),
    /// `speed` with an argument outside (0, 10] or not a number
    InvalidSpeed(String),
    Unknown(String),
}

impl ChannelCommand {
    pub fn parse(token: &str) -> Self {
        let normalized = normalize(token);
        match normalized.as_str() {
            "ping" => Self::Ping,
            "status" => Self::Status,
            "quest" => Self::Quest,
            "map" => Self::Map,
            "boss" => Self::Boss,
            "toggle auto" => Self::ToggleAuto,
            "toggle attack" => Self::ToggleAttack,
            "log" => Self::Log,
            "speed" => Self::Speed(None),
            other => match other.strip_prefix("speed ") {
                Some(arg) => parse_speed(arg),
                None => Self::Unknown(normalized),
            },
        }
    }

    /// Whether the command changes instance state
    pub fn is_mutating(&self) -> bool {
        matches!(self, Self::ToggleAuto | Self::ToggleAttack | Self::Speed(_))
    }
}

fn parse_speed(arg: &str) -> ChannelCommand {
    match arg.parse::<f32>() {
        Ok(n) if n.is_finite() && n > 0.0 && n <= MAX_SPEED => ChannelCommand::Speed(Some(n)),
        _ => ChannelCommand::InvalidSpeed(arg.to_string()),
    }
}

/// Trim, lowercase and collapse whitespace
pub fn normalize(token: &str) -> String {
    token.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
