//! Core types for Mandir Bazaar.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod contact;
pub mod id;
pub mod price;
pub mod role;

pub use contact::{Email, EmailError, PhoneError, PhoneNumber};
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use role::{ActiveRole, Role, RoleParseError, RoleSet};
