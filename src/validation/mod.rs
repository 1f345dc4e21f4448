//! Transaction model - fields, canonical byte forms, gas estimation

mod transaction;

pub use transaction::*;
