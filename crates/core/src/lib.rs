//! Mandir Bazaar Core - domain types and rules.
//!
//! This crate holds everything about the marketplace tier that can be decided
//! without I/O:
//! - `storefront` - axum site serving temples, vendors, customers and admins
//! - `cli` - migrations and out-of-band role management
//!
//! # Architecture
//!
//! No database access, no HTTP, no clocks read implicitly. Functions that
//! depend on time take `now` as an argument so callers (and tests) control it.
//!
//! # Modules
//!
//! - [`types`] - IDs, contact details, prices and roles
//! - [`guard`] - Route guard decision table
//! - [`cart`] - Cart lines, stock reconciliation and the persisted payload
//! - [`verification`] - One-time verification codes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod guard;
pub mod types;
pub mod verification;

pub use types::*;
