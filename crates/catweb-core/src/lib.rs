//! catweb-core: Core types, events, and error definitions for catweb.
//!
//! This crate defines the abstractions shared by the relay session, the
//! concrete network transports, and the test harness. Applications depend on
//! these types without pulling in a specific transport.
//!
//! # Key types
//!
//! - [`RigId`], [`RigStatus`], [`ModeFlags`] -- rig identifiers and the
//!   wire-exact status and mode constants
//! - [`Transport`], [`Connector`], [`TokenSource`] -- channels to the relay
//! - [`RelayEvent`] -- asynchronous state change notifications
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod helpers;
pub mod transport;
pub mod types;

pub use error::{Error, Result};
pub use events::RelayEvent;
pub use helpers::{format_freq_mhz, format_opt_freq, format_opt_mode, format_opt_status};
pub use transport::{Connector, TokenResponse, TokenSource, Transport};
pub use types::{ConnectionState, ModeFlags, ParseModeError, RigId, RigStatus};
