//! Contracts the rollup engine requires from its cryptographic providers.

use serde::{Deserialize, Serialize};

use crate::Fr;

/// A deterministic, collision-resistant hash over field elements, defined
/// for variable-arity input.
///
/// Tree nodes, leaf commitments, nullifier keys, and the block commitment
/// root are all produced through this one function. The engine never
/// inspects the output beyond field arithmetic, so any Poseidon-style
/// sponge over the scalar field satisfies the contract.
pub trait FieldHasher {
    /// Hashes the ordered input tuple into a single field element.
    fn hash(inputs: &[Fr]) -> Fr;

    /// Hashes a two-child node. Provided for readability at call sites that
    /// fold Merkle paths.
    fn hash2(left: Fr, right: Fr) -> Fr {
        Self::hash(&[left, right])
    }
}

/// An EdDSA-style signature over the scalar field.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// The commitment point `R8`.
    pub r8: (Fr, Fr),
    /// The response scalar `S`.
    pub s: Fr,
}

impl Signature {
    /// The all-zero placeholder used for transaction kinds the circuit does
    /// not verify a user signature for.
    pub fn empty() -> Self {
        Signature::default()
    }
}

/// A field-native signer, used by the engine to sign admin-class
/// transactions. Verification is external.
pub trait FieldSigner {
    /// The signer's public key pair.
    fn public_key(&self) -> (Fr, Fr);

    /// Signs a single field element (the hash of a message tuple).
    fn sign(&self, message: Fr) -> Signature;
}
