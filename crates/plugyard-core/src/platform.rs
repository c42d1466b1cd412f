//! Target platforms a plugin version can declare support for.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A server platform that plugins are built against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Paper,
    Waterfall,
    Velocity,
}

impl Platform {
    /// All known platforms, in display order.
    pub const ALL: [Platform; 3] = [Platform::Paper, Platform::Waterfall, Platform::Velocity];

    /// Human-readable name, also used as the platform tag name.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Paper => "Paper",
            Platform::Waterfall => "Waterfall",
            Platform::Velocity => "Velocity",
        }
    }

    /// Directory component used for relocated artifacts.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Platform::Paper => "PAPER",
            Platform::Waterfall => "WATERFALL",
            Platform::Velocity => "VELOCITY",
        }
    }

    /// Display color of the platform tag.
    pub fn tag_color(&self) -> &'static str {
        match self {
            Platform::Paper => "#f7cf0d",
            Platform::Waterfall => "#3b79e6",
            Platform::Velocity => "#1bbae0",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownPlatform(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("paper".parse::<Platform>().unwrap(), Platform::Paper);
        assert_eq!("VELOCITY".parse::<Platform>().unwrap(), Platform::Velocity);
        assert_eq!(" Waterfall ".parse::<Platform>().unwrap(), Platform::Waterfall);
    }

    #[test]
    fn parse_unknown() {
        assert!("bukkit".parse::<Platform>().is_err());
    }

    #[test]
    fn serde_lowercase() {
        let json = serde_json::to_string(&Platform::Waterfall).unwrap();
        assert_eq!(json, "\"waterfall\"");
        let back: Platform = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Platform::Waterfall);
    }
}
