//! Consensus module - Block structure, validation and difficulty

mod block;
mod difficulty;
mod validation;

pub use block::*;
pub use difficulty::*;
pub use validation::*;
