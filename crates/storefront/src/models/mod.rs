//! Domain models for the storefront.
//!
//! These types represent validated domain objects separate from database
//! row types (which live in the `db` modules).

pub mod order;
pub mod session;
pub mod user;

pub use order::{NewOrder, NewOrderItem, Order, OrderItem, ShippingAddress};
pub use session::session_keys;
pub use user::{CurrentUser, User};
