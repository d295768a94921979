//! # SortOfRemote NG – vSphere Session Cache
//!
//! Connects to a vCenter / ESXi SDK endpoint once, logs in, and caches the
//! datacenter, compute resource, datastore, host, network and resource
//! pool the caller asked for, so later code does not repeat the
//! name-to-object lookups.
//!
//! ## Modules
//!
//! - **types** — Config, inventory references, session state
//! - **error** — Crate error type and aggregated lookup errors
//! - **endpoint** — SDK URL parsing and credential stripping
//! - **xml** — Minimal XML tree reader
//! - **soap** — vim25 SOAP envelopes and response decoding
//! - **client** — `VimConnector` / `VimApi` seam + reqwest SOAP client
//! - **cert** — Client certificate loading for extension login
//! - **keepalive** — Periodic keep-alive task
//! - **finder** — Path / default resolution of inventory objects
//! - **session** — `Session` lifecycle (connect, populate, create, logout)

pub mod types;
pub mod error;
pub mod endpoint;
pub mod xml;
pub mod soap;
pub mod client;
pub mod cert;
pub mod keepalive;
pub mod finder;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{SessionError, SessionErrorKind, SessionResult};
pub use session::Session;
pub use types::SessionConfig;
