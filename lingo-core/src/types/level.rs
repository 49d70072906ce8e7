//! CEFR proficiency levels.

use serde::{Deserialize, Serialize};

/// The five-step proficiency ladder used to gate content difficulty.
///
/// Ordered so that comparisons follow the ladder: `A2 < B1 < ... < C2`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum CefrLevel {
    /// Elementary (the entry level for the platform).
    #[default]
    A2,
    /// Intermediate.
    B1,
    /// Upper intermediate.
    B2,
    /// Advanced.
    C1,
    /// Proficient.
    C2,
}

impl CefrLevel {
    /// All levels in ladder order.
    pub const LADDER: [CefrLevel; 5] = [Self::A2, Self::B1, Self::B2, Self::C1, Self::C2];

    /// The next level up the ladder, or `None` at the top.
    #[must_use]
    pub fn next(&self) -> Option<CefrLevel> {
        match self {
            Self::A2 => Some(Self::B1),
            Self::B1 => Some(Self::B2),
            Self::B2 => Some(Self::C1),
            Self::C1 => Some(Self::C2),
            Self::C2 => None,
        }
    }

    /// Whether this is the top of the ladder.
    #[must_use]
    pub fn is_max(&self) -> bool {
        self.next().is_none()
    }

    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A2 => "A2",
            Self::B1 => "B1",
            Self::B2 => "B2",
            Self::C1 => "C1",
            Self::C2 => "C2",
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "A2" => Some(Self::A2),
            "B1" => Some(Self::B1),
            "B2" => Some(Self::B2),
            "C1" => Some(Self::C1),
            "C2" => Some(Self::C2),
            _ => None,
        }
    }
}

impl std::fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
