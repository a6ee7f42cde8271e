//! # Sealpost Testkit
//!
//! Testing utilities for Sealpost.
//!
//! - **Fixtures**: deterministic parties, postboxes, and a full invite/accept
//!   exchange between two postboxes
//! - **Generators**: proptest strategies for contexts, bodies, attachments and
//!   sealed envelopes, plus bit-flip helpers for tamper tests
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use sealpost_testkit::generators::{seal_from_params, EnvelopeParams};
//!
//! proptest! {
//!     #[test]
//!     fn opens(params: EnvelopeParams) {
//!         let case = seal_from_params(&params);
//!         prop_assert!(case
//!             .envelope
//!             .open(&params.context, case.recipient.agreement(), &case.sender.signing_public_key())
//!             .is_ok());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{bundle_from_seed, introduce, multi_party_fixtures, Party};
pub use generators::{seal_from_params, EnvelopeParams, SealedCase};
