//! # catweb -- CAT4Web Relay Client
//!
//! `catweb` is an asynchronous Rust client for the CAT4Web radio-control
//! relay. The relay exposes one or more amateur radio transceivers ("rigs")
//! over a WebSocket; this crate keeps an authenticated session to it, mirrors
//! every rig's status, frequency, mode, and PTT into a local cache, and sends
//! frequency and mode commands.
//!
//! ## Quick Start
//!
//! Add `catweb` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! catweb = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! Connect to the relay and tune a rig:
//!
//! ```no_run
//! use catweb::{CatWebBuilder, ModeFlags, RigId};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = CatWebBuilder::new().build()?;
//!     client.on_connect(|| println!("relay session up"));
//!     client.connect()?;
//!
//!     let rig = RigId::new(1).unwrap();
//!     client.set_frequency(rig, 14_074_000)?;
//!     client.set_mode(rig, ModeFlags::DIG_U)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                 | Purpose                                          |
//! |-----------------------|--------------------------------------------------|
//! | `catweb-core`         | Types ([`RigId`], [`ModeFlags`], [`RigStatus`]), traits, errors |
//! | `catweb-transport`    | WebSocket transport and HTTP token source        |
//! | `catweb-client`       | Session, codec, rig cache, [`CatWebClient`]      |
//! | **`catweb`**          | This facade crate -- re-exports everything       |
//!
//! ## Session Lifecycle
//!
//! [`CatWebClient::connect`] starts a background task that opens the
//! WebSocket, fetches a fresh access token, and sends it to the relay. Once
//! the relay answers `{"auth":true}` the client is active and rig updates
//! flow into the cache. If the connection drops for any reason other than
//! [`CatWebClient::disconnect`], the task waits five seconds and tries again,
//! indefinitely.
//!
//! ## Callbacks and Events
//!
//! Six single-slot callbacks (`on_connect`, `on_disconnect`,
//! `on_status_change`, `on_frequency_change`, `on_mode_change`,
//! `on_ptt_change`) cover the common case. For multiple consumers, every
//! change is also broadcast as a [`RelayEvent`]:
//!
//! ```no_run
//! use catweb::{CatWebClient, RelayEvent};
//! # async fn example(client: &CatWebClient) {
//! let mut events = client.subscribe();
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         RelayEvent::FrequencyChanged { rig, freq_hz } => {
//!             println!("rig {rig}: {}", catweb::format_opt_freq(freq_hz));
//!         }
//!         other => println!("{other:?}"),
//!     }
//! }
//! # }
//! ```

pub use catweb_core::*;

pub use catweb_client::{
    CatWebBuilder, CatWebClient, ClientOptions, RigAttributes, RigStateCache,
};

/// Wire frame encoding and decoding.
pub mod codec {
    pub use catweb_client::codec::*;
}

/// WebSocket transport and HTTP token source.
pub mod transport {
    pub use catweb_core::transport::*;
    pub use catweb_transport::*;
}
