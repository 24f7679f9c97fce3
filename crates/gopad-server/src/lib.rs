//! # gopad-server
//!
//! The relay core plus its HTTP surface.
//!
//! - [`registry`]: the authoritative set of connected participants
//! - [`dispatch`]: maps inbound envelopes to collaborator calls and outbound envelopes
//! - [`broadcast`]: best-effort fan-out to one, the others, or everyone
//! - [`session`]: register / announce / receive loop / unregister around one socket
//! - [`server`]: axum router (`/ws`, `/static/`, `/health`) and listener

#![deny(unsafe_code)]

pub mod broadcast;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod errors;
pub mod health;
pub mod registry;
pub mod server;
pub mod session;
pub mod shutdown;

pub use config::ServerConfig;
pub use registry::{Client, ClientRegistry};
pub use server::GopadServer;
