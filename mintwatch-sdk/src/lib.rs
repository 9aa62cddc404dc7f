//! Wire types and clients for the services mintwatch talks to.
//!
//! - [`objects::feed`]: the curated-projects feed.
//! - [`objects::ledger`]: ledger JSON-RPC lookups and log-subscription frames.
//! - [`objects::discord`]: the webhook payload delivered for each new event.
//!
//! The HTTP and WebSocket clients live in [`client`] behind the `client`
//! cargo feature.

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
