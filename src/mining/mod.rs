//! Mining module - fidelity modes and the proof-of-work search

mod miner;
mod mode;

pub use miner::*;
pub use mode::*;
