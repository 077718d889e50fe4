//! Shared helpers for in-crate tests.
//!
//! Tests build real application state with a lazy pool: nothing dials out
//! unless a code path actually touches the database, in which case the
//! query errors and the test fails - which doubles as proof that
//! rejection paths never reach the store.

use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;

use crate::config::{CheckoutConfig, StorefrontConfig, StripeConfig};
use crate::state::AppState;

/// Webhook secret used to sign test payloads.
pub(crate) const TEST_WEBHOOK_SECRET: &str = "whsec_test123secret456";

/// Build a config for tests (constructed directly, so no env validation).
pub(crate) fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://127.0.0.1:1/bruma_test"),
        host: "127.0.0.1".parse().expect("valid address"),
        port: 0,
        base_url: "http://localhost:3000".to_owned(),
        session_secret: SecretString::from("x".repeat(32)),
        stripe: StripeConfig {
            // Points at a closed port; tests must not reach the processor.
            api_base: "http://127.0.0.1:1".to_owned(),
            secret_key: SecretString::from("sk_test_key"),
            webhook_secret: SecretString::from(TEST_WEBHOOK_SECRET),
        },
        checkout: CheckoutConfig::default(),
        sentry_dsn: None,
    }
}

/// Build application state whose pool never connects unless used.
pub(crate) fn test_state() -> AppState {
    let config = test_config();
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://127.0.0.1:1/bruma_test")
        .expect("lazy pool creation cannot fail on a well-formed URL");

    AppState::new(config, pool)
}
