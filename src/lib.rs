//! Client for Molasses feature flags.
//!
//! Feature definitions are kept in a local snapshot that a background task refreshes, either by
//! polling or over a server-sent event stream. Queries are evaluated against that snapshot
//! without any network round-trip.

mod bucket;
mod client;
mod config;
mod constraint;
mod error;
mod eval;
mod events;
mod feature;
mod http;
mod segment;
mod store;
mod sync;
mod test_common;
mod user;

pub use bucket::*;
pub use client::*;
pub use config::*;
pub use constraint::*;
pub use error::*;
pub use eval::*;
pub use events::*;
pub use feature::*;
pub use segment::*;
pub use store::*;
pub use sync::{BackoffConfig, StreamState};
pub use user::*;
