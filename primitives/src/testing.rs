//! Deterministic stand-ins for the external hash and signature providers.
//!
//! None of this is cryptographic. [`MixHasher`] is an order- and
//! arity-sensitive mixing function that satisfies the [`FieldHasher`]
//! determinism contract, which is all the engine's unit and scenario tests
//! need; swapping in a real Poseidon provider changes the concrete root
//! values but none of the tested invariants.

use crate::{FieldHasher, FieldSigner, Fr, Signature};

const MIX_A: u64 = 0x9e37_79b9_7f4a_7c15;
const MIX_B: u64 = 0x5851_f42d_4c95_7f2d;

/// A deterministic, non-cryptographic [`FieldHasher`].
#[derive(Copy, Clone, Debug, Default)]
pub struct MixHasher;

impl FieldHasher for MixHasher {
    fn hash(inputs: &[Fr]) -> Fr {
        let mut acc = Fr::from(MIX_A) + Fr::from(inputs.len() as u64) * Fr::from(MIX_B);
        for (i, x) in inputs.iter().enumerate() {
            acc = acc * Fr::from(MIX_B) + *x + Fr::from(i as u64 + 1);
            acc = acc * acc + Fr::from(MIX_A);
        }
        acc
    }
}

/// A deterministic signer deriving its key pair and signatures from a seed
/// via [`MixHasher`].
#[derive(Copy, Clone, Debug)]
pub struct MixSigner {
    secret: Fr,
}

impl MixSigner {
    /// Creates a signer from an arbitrary seed.
    pub fn new(seed: u64) -> Self {
        MixSigner {
            secret: MixHasher::hash(&[Fr::from(seed)]),
        }
    }
}

impl FieldSigner for MixSigner {
    fn public_key(&self) -> (Fr, Fr) {
        (
            MixHasher::hash(&[self.secret, Fr::from(1u64)]),
            MixHasher::hash(&[self.secret, Fr::from(2u64)]),
        )
    }

    fn sign(&self, message: Fr) -> Signature {
        Signature {
            r8: (
                MixHasher::hash(&[self.secret, message, Fr::from(1u64)]),
                MixHasher::hash(&[self.secret, message, Fr::from(2u64)]),
            ),
            s: MixHasher::hash(&[self.secret, message, Fr::from(3u64)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_arity_sensitive() {
        let a = [Fr::from(1u64), Fr::from(2u64)];
        assert_eq!(MixHasher::hash(&a), MixHasher::hash(&a));
        assert_ne!(MixHasher::hash(&a), MixHasher::hash(&a[..1]));
        assert_ne!(
            MixHasher::hash(&[Fr::from(1u64), Fr::from(2u64)]),
            MixHasher::hash(&[Fr::from(2u64), Fr::from(1u64)])
        );
    }

    #[test]
    fn signer_is_stable_per_seed() {
        let s1 = MixSigner::new(7);
        let s2 = MixSigner::new(7);
        assert_eq!(s1.public_key(), s2.public_key());
        assert_eq!(s1.sign(Fr::from(42u64)), s2.sign(Fr::from(42u64)));
        assert_ne!(s1.public_key(), MixSigner::new(8).public_key());
    }
}
