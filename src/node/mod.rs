//! Node module - the ledger engine and its collaborators

mod clock;
mod genesis;
mod ledger;
mod stats;

pub use clock::*;
pub use genesis::*;
pub use ledger::*;
pub use stats::*;
