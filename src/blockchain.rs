// Thin re-export module: implementation is in `blockchain/core.rs`, split
// into chain management, mining jobs, balance state and proof validation.

pub mod core;
pub use core::*;
