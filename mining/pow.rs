//! Proof-of-Work targets and header hashing
//!
//! This module converts compact difficulty bits into full-width targets and
//! provides the hashing capability used by the worker loop. The hash is read
//! as a little-endian 256-bit number, matching the network's canonical
//! encoding of double-SHA256 output.

use crate::block::HEADER_SIZE;
use crate::errors::{MiningError, MiningResult};
use crypto_hashes::{double_sha256, Hash};
use primitive_types::U256;

const COMPACT_SIGN_BIT: u32 = 0x0080_0000;
const COMPACT_MANTISSA_MASK: u32 = 0x007f_ffff;

/// Target represents the difficulty threshold for valid blocks
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct Target(U256);

impl Target {
    /// Creates a new Target from a U256 value
    pub fn new(value: U256) -> Self {
        Target(value)
    }

    /// The loosest possible target; every hash satisfies it.
    pub fn max() -> Self {
        Target(U256::MAX)
    }

    /// Derives the target for `bits`, clamped to the network `pow_limit`.
    ///
    /// Fails with [`MiningError::MalformedDifficulty`] when the encoding is
    /// negative, overflows 256 bits, or decodes to zero.
    pub fn derive(bits: u32, pow_limit: U256) -> MiningResult<Self> {
        let (value, negative, overflow) = decode_compact(bits);
        if negative || overflow || value.is_zero() {
            return Err(MiningError::MalformedDifficulty { bits });
        }
        Ok(Target(value.min(pow_limit)))
    }

    /// Converts Target to compact bits representation
    pub fn to_compact(&self) -> u32 {
        let mut size = (self.0.bits() + 7) / 8;
        let mut compact = if size <= 3 {
            (self.0.low_u64() << (8 * (3 - size))) as u32
        } else {
            (self.0 >> (8 * (size - 3))).low_u32()
        };
        // The mantissa is signed; keep it positive by moving into the next byte.
        if compact & COMPACT_SIGN_BIT != 0 {
            compact >>= 8;
            size += 1;
        }
        compact | ((size as u32) << 24)
    }

    /// Returns true when `hash`, read as a little-endian integer, is `<= self`.
    ///
    /// This is the only comparison used for deciding whether a header solves
    /// a block, both in the worker loop and in validation.
    #[inline]
    pub fn is_met_by(&self, hash: &Hash) -> bool {
        U256::from_little_endian(hash.as_bytes()) <= self.0
    }

    /// Expected number of hashes needed to find a solution, `2^256 / (target + 1)`.
    pub fn work(&self) -> U256 {
        match self.0.overflowing_add(U256::one()) {
            (_, true) => U256::one(),
            (denominator, false) => (!self.0 / denominator) + U256::one(),
        }
    }

    /// Difficulty relative to the network pow limit (1.0 at the limit).
    pub fn difficulty(&self, pow_limit: U256) -> f64 {
        let target = u256_to_f64(self.0);
        if target == 0.0 {
            return f64::INFINITY;
        }
        u256_to_f64(pow_limit) / target
    }

    /// Returns the inner U256 value
    pub fn as_u256(&self) -> U256 {
        self.0
    }
}

impl From<U256> for Target {
    fn from(value: U256) -> Self {
        Target(value)
    }
}

impl From<Target> for U256 {
    fn from(target: Target) -> Self {
        target.0
    }
}

/// Decodes compact bits, returning `(value, negative, overflow)`.
fn decode_compact(bits: u32) -> (U256, bool, bool) {
    let size = (bits >> 24) as usize;
    let word = bits & COMPACT_MANTISSA_MASK;

    let value = if size <= 3 {
        U256::from(word >> (8 * (3 - size)))
    } else if size <= 34 {
        U256::from(word) << (8 * (size - 3))
    } else {
        U256::zero()
    };

    let negative = word != 0 && bits & COMPACT_SIGN_BIT != 0;
    let overflow = word != 0
        && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));
    (value, negative, overflow)
}

pub(crate) fn u256_to_f64(value: U256) -> f64 {
    value
        .0
        .iter()
        .rev()
        .fold(0.0, |acc, limb| acc * 18_446_744_073_709_551_616.0 + *limb as f64)
}

/// A proof-of-work hash function over serialized block headers.
///
/// The worker loop only talks to this trait, so alternative algorithms plug
/// in without touching the search code.
pub trait PowHasher: Send + Sync {
    fn name(&self) -> &'static str;

    fn hash_header(&self, header: &[u8; HEADER_SIZE]) -> Hash;
}

/// SHA256(SHA256(header)), the canonical header hash.
#[derive(Clone, Copy, Debug, Default)]
pub struct DoubleSha256;

impl PowHasher for DoubleSha256 {
    fn name(&self) -> &'static str {
        "sha256d"
    }

    #[inline]
    fn hash_header(&self, header: &[u8; HEADER_SIZE]) -> Hash {
        Hash::from(double_sha256(header))
    }
}

/// Proof-of-Work handler
pub struct ProofOfWork;

impl ProofOfWork {
    /// Hashes a serialized header and checks it against `target`.
    pub fn check(hasher: &dyn PowHasher, header: &[u8; HEADER_SIZE], target: &Target) -> bool {
        target.is_met_by(&hasher.hash_header(header))
    }

    /// Hash rate in hashes per second, with elapsed time floored at one second.
    pub fn calculate_hash_rate(hashes: u64, elapsed_secs: u64) -> f64 {
        hashes as f64 / elapsed_secs.max(1) as f64
    }
}
