//! clipfeed: clipboard history feed engine over a SQLite record store.

pub mod config;
pub mod engine;
pub mod storage;
pub mod store;
pub mod util;
