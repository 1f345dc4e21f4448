//! Mining and consensus mode selectors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Proof-of-work fidelity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiningMode {
    /// Full nonce search in time slices, with difficulty retargeting
    Normal,
    /// Difficulty capped at 2 and at most 1000 search iterations
    #[default]
    Test,
    /// No search; the hash is stamped with the required leading zeros
    Instant,
}

/// Consensus label reported alongside the chain
///
/// Only proof of work is implemented; the other variants are carried for
/// compatibility with exported state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusMode {
    #[default]
    Pow,
    Poa,
    Hybrid,
}

impl MiningMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MiningMode::Normal => "normal",
            MiningMode::Test => "test",
            MiningMode::Instant => "instant",
        }
    }
}

impl ConsensusMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusMode::Pow => "pow",
            ConsensusMode::Poa => "poa",
            ConsensusMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for MiningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ConsensusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MiningMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" | "full" => Ok(MiningMode::Normal),
            "test" => Ok(MiningMode::Test),
            "instant" => Ok(MiningMode::Instant),
            other => Err(format!("unknown mining mode: {other}")),
        }
    }
}

impl FromStr for ConsensusMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pow" => Ok(ConsensusMode::Pow),
            "poa" => Ok(ConsensusMode::Poa),
            "hybrid" => Ok(ConsensusMode::Hybrid),
            other => Err(format!("unknown consensus mode: {other}")),
        }
    }
}
