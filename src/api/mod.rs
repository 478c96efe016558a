//! HTTP control API.
//!
//! - `chat`: the multi-provider conversation (send, bookmark, vote, copy)
//! - `mission`: mission submission and snapshot
//! - `ledger`: ledger query, share and replay
//! - `personas`: the agent roster
//! - `notifications`: error notices as server-sent events

mod chat;
mod ledger;
mod mission;
mod notifications;
mod personas;
pub mod routes;
pub mod types;

pub use routes::{router, serve, AppState};
