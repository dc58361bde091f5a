//! The scalar field element backing every leaf, hash, and root.

use std::fmt::{self, Debug, Display};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;

use ethereum_types::{U256, U512};
use once_cell::sync::Lazy;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The BN254 scalar field prime. Roots and leaf hashes produced by the hash
/// provider live in this field.
static MODULUS: Lazy<U256> = Lazy::new(|| {
    U256::from_dec_str(
        "21888242871839275222246405745257275088548364400416034343698204186575808495617",
    )
    .expect("modulus literal is valid decimal")
});

/// An element of the scalar field, stored as its canonical representative in
/// `[0, p)`.
///
/// Arithmetic is modular; comparisons and bit access operate on the canonical
/// representative. Bounded quantities (amounts, ids, timestamps) should use
/// native integers and widen to `Fr` only at encoding boundaries.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fr(U256);

impl Fr {
    /// The additive identity.
    pub const fn zero() -> Self {
        Fr(U256::zero())
    }

    /// The multiplicative identity.
    pub fn one() -> Self {
        Fr(U256::one())
    }

    /// The field modulus `p`.
    pub fn modulus() -> U256 {
        *MODULUS
    }

    /// Builds an element from an arbitrary 256-bit integer, reducing mod `p`.
    pub fn from_u256(v: U256) -> Self {
        Fr(v % *MODULUS)
    }

    /// The canonical representative as a `U256`.
    pub fn to_u256(self) -> U256 {
        self.0
    }

    /// `self mod 2^bits`, for deriving bounded ids from hashes (nullifier
    /// bucket ids, 160-bit addresses).
    pub fn low_bits(self, bits: usize) -> U256 {
        if bits >= 256 {
            return self.0;
        }
        self.0 % (U256::one() << bits)
    }

    /// The low 64 bits of the canonical representative.
    pub fn low_u64(self) -> u64 {
        self.0.low_u64()
    }

    /// The low 128 bits of the canonical representative.
    pub fn low_u128(self) -> u128 {
        self.0.low_u128()
    }

    /// True for the zero element.
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Big-endian canonical byte representation.
    pub fn to_be_bytes(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        self.0.to_big_endian(&mut out);
        out
    }

    /// Builds an element from big-endian bytes, reducing mod `p`.
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        Fr::from_u256(U256::from_big_endian(bytes))
    }
}

impl Add for Fr {
    type Output = Fr;

    fn add(self, rhs: Fr) -> Fr {
        // Both operands are < p < 2^254, so the raw sum cannot wrap.
        let sum = self.0 + rhs.0;
        Fr(if sum >= *MODULUS { sum - *MODULUS } else { sum })
    }
}

impl AddAssign for Fr {
    fn add_assign(&mut self, rhs: Fr) {
        *self = *self + rhs;
    }
}

impl Sub for Fr {
    type Output = Fr;

    fn sub(self, rhs: Fr) -> Fr {
        if self.0 >= rhs.0 {
            Fr(self.0 - rhs.0)
        } else {
            Fr(self.0 + *MODULUS - rhs.0)
        }
    }
}

impl SubAssign for Fr {
    fn sub_assign(&mut self, rhs: Fr) {
        *self = *self - rhs;
    }
}

impl Mul for Fr {
    type Output = Fr;

    fn mul(self, rhs: Fr) -> Fr {
        let prod = self.0.full_mul(rhs.0);
        let rem = prod % U512::from(*MODULUS);
        // The remainder is < p, so the high limbs are zero.
        Fr(U256([rem.0[0], rem.0[1], rem.0[2], rem.0[3]]))
    }
}

impl Sum for Fr {
    fn sum<I: Iterator<Item = Fr>>(iter: I) -> Fr {
        iter.fold(Fr::zero(), |acc, x| acc + x)
    }
}

macro_rules! impl_from_uint_for_fr {
    ($($t:ty),*) => {
        $(impl From<$t> for Fr {
            fn from(v: $t) -> Fr {
                Fr(U256::from(v))
            }
        })*
    };
}

impl_from_uint_for_fr!(u8, u16, u32, u64, u128, usize);

impl FromStr for Fr {
    type Err = ethereum_types::FromDecStrErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Fr::from_u256(U256::from_dec_str(s)?))
    }
}

impl Display for Fr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Decimal, matching the circom-facing witness convention.
        write!(f, "{}", self.0)
    }
}

impl Debug for Fr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fr({})", self.0)
    }
}

impl Serialize for Fr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Fr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|_| {
            D::Error::custom(format!("invalid decimal field element: {s:?}"))
        })
    }
}
