use std::fmt;

use serde::{Deserialize, Serialize};

/// Door sensor state as reported by `getDoorStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    Open,
    Closed,
    /// Anything the device reports that isn't open/close, verbatim.
    Unknown(String),
}

impl DoorState {
    /// Interpret the status value returned by the device
    /// (`open`, `close`; case-insensitive).
    pub fn from_status(status: &str) -> Self {
        let status = status.trim();
        match status.to_ascii_lowercase().as_str() {
            "open" => Self::Open,
            "close" | "closed" => Self::Closed,
            _ => Self::Unknown(status.to_owned()),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
            Self::Unknown(raw) => write!(f, "unknown ({raw})"),
        }
    }
}
