//! sandwich-analysis crate
//!
//! Sandwich detection pipeline over extracted swap activity:
//! swap extraction from raw blocks, round-trip triple matching, and
//! spacing validation with profit / price-impact scoring.
//!
//! Every stage is a synchronous, pure transformation of its input.

pub mod detect;
pub mod extract;
pub mod summary;
pub mod validate;
