//! driftguard migration CLI library
//!
//! The binary (main.rs) wires these pieces to a PostgreSQL ledger.

pub mod cli;
pub mod commands;
