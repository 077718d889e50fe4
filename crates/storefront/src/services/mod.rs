//! Business-logic services.
//!
//! Services orchestrate repositories and external clients; route handlers
//! stay thin and translate service results into HTTP responses.

pub mod auth;
pub mod checkout;
pub mod payments;
