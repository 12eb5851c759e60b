//! The compact "nBits" difficulty encoding and the work it represents.
//!
//! Header ingestion in this client checks structure and checkpoints, not
//! proof of work, so nothing here rejects headers; the expanded forms are
//! used for reporting how much work the chain tip represents.

use std::{fmt, ops::Add};

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::{BitcoinDeserialize, BitcoinSerialize, SerializationError};

/// A 32-bit "compact bits" value, the floating-point form Bitcoin headers
/// use to encode their 256-bit target threshold.
///
/// Byte layout: one byte of exponent, then a 3-byte mantissa. The sign bit
/// (0x0080_0000) is never valid in a block header.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CompactDifficulty(pub u32);

/// The 256-bit target threshold a block hash must not exceed.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub struct ExpandedDifficulty(U256);

/// A measure of how hard it is to find a hash under a given target,
/// `floor(2^256 / (target + 1))`.
///
/// 128 bits is enough for any plausible accumulated chain work; targets so
/// low that a single block would overflow it are treated as invalid.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct Work(u128);

impl CompactDifficulty {
    const SIGN_BIT: u32 = 0x0080_0000;
    const MANTISSA_MASK: u32 = 0x007f_ffff;

    /// Expand to the 256-bit target, or `None` if the encoding is invalid
    /// (zero mantissa, sign bit set, or a target that overflows 256 bits).
    pub fn to_expanded(self) -> Option<ExpandedDifficulty> {
        let mantissa = self.0 & Self::MANTISSA_MASK;
        if mantissa == 0 || self.0 & Self::SIGN_BIT != 0 {
            return None;
        }
        let exponent = (self.0 >> 24) as usize;

        let target = if exponent <= 3 {
            U256::from(mantissa >> (8 * (3 - exponent)))
        } else {
            let shift = 8 * (exponent - 3);
            if shift > 255 {
                return None;
            }
            let shifted = U256::from(mantissa) << shift;
            // a shift that dropped mantissa bits means the target overflowed
            if shifted >> shift != U256::from(mantissa) {
                return None;
            }
            shifted
        };

        if target.is_zero() {
            None
        } else {
            Some(ExpandedDifficulty(target))
        }
    }

    /// The work represented by a single block at this difficulty.
    pub fn to_work(self) -> Option<Work> {
        let expanded = self.to_expanded()?;
        // `2^256 / (target + 1)` without 512-bit arithmetic, the same
        // identity Bitcoin uses: (!target / (target + 1)) + 1.
        let work = (!expanded.0 / (expanded.0 + 1)) + 1;
        if work.bits() > 128 {
            return None;
        }
        Some(Work(work.low_u128()))
    }
}

impl ExpandedDifficulty {
    pub fn target(&self) -> U256 {
        self.0
    }
}

impl Work {
    pub fn as_u128(self) -> u128 {
        self.0
    }
}

impl Add for Work {
    type Output = Work;

    fn add(self, rhs: Work) -> Work {
        Work(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Debug for CompactDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("CompactDifficulty")
            .field(&format_args!("{:#010x}", self.0))
            .finish()
    }
}

impl fmt::Debug for ExpandedDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut bytes = [0u8; 32];
        self.0.to_big_endian(&mut bytes);
        f.debug_tuple("ExpandedDifficulty")
            .field(&hex::encode(&bytes))
            .finish()
    }
}

impl BitcoinSerialize for CompactDifficulty {
    fn bitcoin_serialize<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
        self.0.bitcoin_serialize(target)
    }
}

impl BitcoinDeserialize for CompactDifficulty {
    fn bitcoin_deserialize<R: std::io::Read>(reader: R) -> Result<Self, SerializationError>
    where
        Self: Sized,
    {
        Ok(CompactDifficulty(u32::bitcoin_deserialize(reader)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The difficulty-1 bits value carried by both genesis blocks.
    const GENESIS_BITS: CompactDifficulty = CompactDifficulty(0x1d00_ffff);

    #[test]
    fn genesis_expansion() {
        let expanded = GENESIS_BITS.to_expanded().expect("valid encoding");
        assert_eq!(expanded.target(), U256::from(0xffff) << 208);
    }

    #[test]
    fn genesis_work() {
        // 2^256 / (0xffff * 2^208 + 1) == 0x1_0001_0001
        let work = GENESIS_BITS.to_work().expect("valid encoding");
        assert_eq!(work.as_u128(), 0x1_0001_0001);
    }

    #[test]
    fn invalid_encodings() {
        // zero mantissa
        assert!(CompactDifficulty(0x1d00_0000).to_expanded().is_none());
        // sign bit set
        assert!(CompactDifficulty(0x1d80_0001).to_expanded().is_none());
        // overflows 256 bits
        assert!(CompactDifficulty(0xff01_0000).to_expanded().is_none());
    }

    #[test]
    fn small_exponents_shift_right() {
        assert_eq!(
            CompactDifficulty(0x0101_2300).to_expanded().map(|e| e.target()),
            Some(U256::from(0x01u32)),
        );
        assert_eq!(
            CompactDifficulty(0x0212_3456).to_expanded().map(|e| e.target()),
            Some(U256::from(0x1234u32)),
        );
    }

    #[test]
    fn work_accumulates() {
        let one = GENESIS_BITS.to_work().unwrap();
        assert_eq!((one + one).as_u128(), 2 * one.as_u128());
    }
}
