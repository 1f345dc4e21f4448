//! JSON-RPC API Module
//!
//! Provides an HTTP interface to the ledger's operation set.

mod methods;
mod server;

pub use methods::*;
pub use server::*;
