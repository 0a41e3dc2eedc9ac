//! Access levels.
//!
//! Levels form a closed, totally ordered set: `None < Read < ReadWrite`.
//! `None` is never stored; it is what an absent grant reads as.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// How much of a patient's record a doctor may touch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    None,
    Read,
    ReadWrite,
}

impl AccessLevel {
    /// Numeric code used by callers that speak integers (0, 1, 2).
    pub fn as_u8(&self) -> u8 {
        match self {
            AccessLevel::None => 0,
            AccessLevel::Read => 1,
            AccessLevel::ReadWrite => 2,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            AccessLevel::None => "none",
            AccessLevel::Read => "read",
            AccessLevel::ReadWrite => "read_write",
        }
    }

    /// Whether this level lets a doctor read the record.
    pub fn can_read(&self) -> bool {
        *self >= AccessLevel::Read
    }

    /// Whether this level lets a doctor modify the record.
    pub fn can_write(&self) -> bool {
        *self >= AccessLevel::ReadWrite
    }
}

impl TryFrom<u8> for AccessLevel {
    type Error = RegistryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AccessLevel::None),
            1 => Ok(AccessLevel::Read),
            2 => Ok(AccessLevel::ReadWrite),
            other => Err(RegistryError::InvalidInput(format!(
                "unknown access level: {other}"
            ))),
        }
    }
}

impl FromStr for AccessLevel {
    type Err = RegistryError;

    /// Accepts the tag names (`none`, `read`, `read_write`), a few common
    /// spellings, or the numeric codes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "0" => Ok(AccessLevel::None),
            "read" | "r" | "1" => Ok(AccessLevel::Read),
            "read_write" | "readwrite" | "read-write" | "rw" | "2" => Ok(AccessLevel::ReadWrite),
            other => Err(RegistryError::InvalidInput(format!(
                "unknown access level: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}
