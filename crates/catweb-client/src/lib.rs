//! catweb-client: Relay session client for the CAT4Web radio-control service.
//!
//! The relay forwards CAT control of one or more remote transceivers
//! ("rigs") over a WebSocket. This crate keeps a persistent, authenticated
//! session to it and mirrors every rig's status, frequency, mode, and PTT
//! into a local cache.
//!
//! # Components
//!
//! - [`codec`] -- wire frame encoding and decoding (pure, no I/O)
//! - [`state`] -- per-rig attribute cache
//! - [`handshake`] -- access-token fetch and token frame
//! - `session` -- background task owning the transport and reconnect loop
//! - [`client`] -- the [`CatWebClient`] facade
//! - [`builder`] -- [`CatWebBuilder`] for configuration
//!
//! # Example
//!
//! ```no_run
//! use catweb_client::CatWebBuilder;
//! use catweb_core::{ModeFlags, RigId};
//!
//! # async fn example() -> catweb_core::Result<()> {
//! let client = CatWebBuilder::new().build()?;
//! client.on_frequency_change(|rig, freq| println!("rig {rig}: {freq:?}"));
//! client.connect()?;
//!
//! let rig = RigId::new(1).unwrap();
//! client.set_frequency(rig, 14_074_000)?;
//! client.set_mode(rig, ModeFlags::DIG_U)?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
mod callbacks;
pub mod client;
pub mod codec;
pub mod handshake;
mod session;
pub mod state;

pub use builder::CatWebBuilder;
pub use client::{CatWebClient, ClientOptions};
pub use state::{RigAttributes, RigStateCache};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, ignoring poisoning.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
