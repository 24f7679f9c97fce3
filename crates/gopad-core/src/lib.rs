//! # gopad-core
//!
//! Shared types for the gopad relay.
//!
//! - [`envelope`]: the `{Kind, Body, Args}` unit exchanged with browser clients
//! - [`ids`]: branded connection ids and registry-assigned client ids
//! - [`collaborator`]: format / compile / publish contracts consumed by the dispatcher
//! - [`errors`]: collaborator and envelope error types

#![deny(unsafe_code)]

pub mod collaborator;
pub mod envelope;
pub mod errors;
pub mod ids;

mod serde_helpers;

pub use collaborator::{CompileEvent, CompileResult, Compiler, Formatter, Publisher};
pub use envelope::{Envelope, Kind};
pub use errors::{CollaboratorError, EnvelopeError};
pub use ids::{ClientId, ConnectionId};
