//! Core business logic - framework-agnostic card, transfer and block-request
//! operations. Every operation takes the database connection and the caller's
//! identity explicitly.

/// Caller identity and role checks
pub mod caller;
/// Card store and card management
pub mod card;
/// Filters and paging for list queries
pub mod filter;
/// Block request workflow
pub mod block_request;
/// Funds transfer engine and transfer history
pub mod transfer;
/// User management and seeding
pub mod user;
