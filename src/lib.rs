//! `bank-cards` - Bank card management backend
//!
//! Administrators issue cards and manage users; cardholders view their cards,
//! move funds between their own cards and ask for cards to be blocked. Transfers
//! and block approvals are atomic, and every transfer attempt leaves an audit
//! record whatever its outcome.

// Deny the most critical lints that could lead to bugs or security issues
#![deny(
    unsafe_code,
    unreachable_code,
    unreachable_patterns,
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links,
)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,

    // Correctness
    clippy::dbg_macro,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,

    // Style consistency
    clippy::enum_glob_use,
    clippy::semicolon_if_nothing_returned,

    future_incompatible,
    rust_2018_idioms,
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
)]

/// Configuration management for database and seed users
pub mod config;
/// Core business logic - transfers, block requests, cards and users
pub mod core;
/// SeaORM entity definitions for database tables
pub mod entities;
/// Unified error types and result handling
pub mod errors;
/// Caller-facing views with masked card numbers
pub mod views;

#[cfg(test)]
pub mod test_utils;
