//! Session key constants.
//!
//! All session reads and writes go through these keys so a typo cannot
//! silently split state across two entries.

/// Keys used to store values in the tower-session.
pub mod session_keys {
    /// The logged-in user (`CurrentUser`), if any.
    pub const CURRENT_USER: &str = "current_user";
}
