//! API handlers for the storefront auth service.
//!
//! Route handlers live here, grouped by concern: `auth` carries the three
//! login methods plus session endpoints, `health` reports liveness and the
//! user store's readability.

pub mod auth;
pub mod health;
pub mod root;
