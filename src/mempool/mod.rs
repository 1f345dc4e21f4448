//! Mempool module - transaction admission and fee-priority ordering

mod pool;

pub use pool::*;
