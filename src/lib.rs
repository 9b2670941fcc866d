//! powchain - a minimal proof-of-work ledger with an external HTTP miner
//!
//! # Architecture
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the ledger, mining jobs and balance replay
//! - [`transaction`] - Transaction types, canonical hashing and admission checks
//!
//! ## Mining
//! - [`miner`] - Job protocol, nonce search and the miner state machine
//!
//! ## Cryptography
//! - [`crypto`] - secp256k1 keys, signatures and RIPEMD-160 addresses
//!
//! ## Node
//! - [`api`] - HTTP surface (mining protocol and queries)
//! - [`node`] - Process context and startup
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod transaction;

// ============================================================================
// Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Node
// ============================================================================
#[cfg(feature = "api")]
pub mod api;
pub mod node;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
