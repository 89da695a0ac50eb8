use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A deployment environment.
///
/// Variant order is the stability hierarchy, most stable first, so the derived
/// `Ord` sorts PROD before PRE before TEST before DEV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    Prod,
    Pre,
    Test,
    Dev,
}

/// Fixed stability order, PROD is always the baseline.
pub const STABILITY_ORDER: [Environment; 4] = [
    Environment::Prod,
    Environment::Pre,
    Environment::Test,
    Environment::Dev,
];

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Prod => "PROD",
            Environment::Pre => "PRE",
            Environment::Test => "TEST",
            Environment::Dev => "DEV",
        }
    }

    /// Position in [`STABILITY_ORDER`].
    pub fn position(&self) -> usize {
        match self {
            Environment::Prod => 0,
            Environment::Pre => 1,
            Environment::Test => 2,
            Environment::Dev => 3,
        }
    }

    /// Environments more stable than `self`, nearest first.
    pub fn more_stable(&self) -> impl Iterator<Item = Environment> {
        STABILITY_ORDER[..self.position()].iter().rev().copied()
    }

    /// Every environment that can diverge from a baseline (all but PROD).
    pub fn non_baseline() -> impl Iterator<Item = Environment> {
        STABILITY_ORDER[1..].iter().copied()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PROD" => Ok(Environment::Prod),
            "PRE" => Ok(Environment::Pre),
            "TEST" => Ok(Environment::Test),
            "DEV" => Ok(Environment::Dev),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}
