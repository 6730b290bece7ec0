//! Data models for Keepr.
//!
//! Field names serialize as camelCase so persisted blobs and API payloads stay
//! readable by the mobile shell.

mod namespace;
mod progress;
mod treatment;

pub use namespace::*;
pub use progress::*;
pub use treatment::*;
