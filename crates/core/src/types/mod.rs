//! Core types for Bruma.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{MoneyError, from_minor_units, to_minor_units};
pub use status::*;
