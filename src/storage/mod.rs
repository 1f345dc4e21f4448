//! Storage module - key-value backends and chain persistence

mod store;
mod persistence;
pub mod db;

pub use store::*;
pub use persistence::*;
pub use db::SledStore;
