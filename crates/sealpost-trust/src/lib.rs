//! # Sealpost Trust
//!
//! Trust-on-first-use contact store. Maps a normalized email address to the
//! long-term keys pinned for it and a status in the invite/accept exchange.
//!
//! ## Key Types
//!
//! - [`TrustStore`] - Async storage primitives
//! - [`TrustStoreExt`] - Lookup, pinning, events, snapshot restore
//! - [`SqliteTrustStore`] - Persistent backend
//! - [`MemoryTrustStore`] - In-memory backend for tests
//! - [`TrustEvent`] - Invite/accept protocol events
//!
//! ## Design Notes
//!
//! - **Ready by accept only**: a contact reaches `Ready` only through an
//!   `AcceptReceived` event carrying keys.
//! - **No silent re-pin**: different keys yield `KeyChanged` and nothing is
//!   written until `replace_pin` is called. Keys whose fingerprint does not
//!   match them are rejected outright.
//! - **No lost updates**: read-modify-write operations commit through a
//!   conditional write and report `ConcurrentUpdate` on a race.
//! - **History**: every overwrite snapshots the previous state first.

pub mod contact;
pub mod error;
pub mod events;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use contact::{
    normalize_email, now_millis, ContactSnapshot, ContactStatus, PinOutcome, TrustedContact,
};
pub use error::{Result, TrustError};
pub use events::{transition, TrustEvent, Transition};
pub use memory::MemoryTrustStore;
pub use sqlite::SqliteTrustStore;
pub use traits::{TrustStore, TrustStoreExt};
