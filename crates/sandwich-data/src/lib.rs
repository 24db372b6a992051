//! sandwich-data crate
//!
//! Raw Solana block schema, normalized swap events, slot fetching over
//! JSON-RPC, SQLite persistence and JSON report output.

pub mod blocks;
pub mod report;
pub mod store;
pub mod types;

pub use types::{BlockResponse, SlotSwaps, SwapEvent};
