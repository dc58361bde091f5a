//! Shared primitives for the Tenor rollup state engine.
//!
//! This crate defines the scalar field element every authenticated tree and
//! witness value is expressed in, together with the contracts the engine
//! requires from its cryptographic providers: a field-native hash
//! ([`FieldHasher`]) and a field-native signature scheme ([`FieldSigner`]).
//! The providers themselves are external; [`testing`] ships deterministic
//! non-cryptographic stand-ins for tests.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]
#![deny(missing_docs)]

mod field;
mod provider;

pub mod testing;

pub use field::Fr;
pub use provider::{FieldHasher, FieldSigner, Signature};
