//! Bitcoin's variable-length integer encoding, used for list and string
//! length prefixes.

use byteorder::{LittleEndian, WriteBytesExt};

use crate::{BitcoinDeserialize, BitcoinSerialize, SerializationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactInt(u64);

impl CompactInt {
    pub fn from(value: usize) -> CompactInt {
        CompactInt(value as u64)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The encoded length of `value`, in bytes.
    pub fn size(value: usize) -> usize {
        if value < 0xFD {
            1
        } else if value <= 0xFFFF {
            3
        } else if value <= 0xFFFF_FFFF {
            5
        } else {
            9
        }
    }
}

impl BitcoinSerialize for CompactInt {
    fn bitcoin_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        if self.0 < 0xFD {
            target.write_all(&[self.0 as u8])
        } else if self.0 <= 0xFFFF {
            target.write_all(&[0xFD])?;
            target.write_u16::<LittleEndian>(self.0 as u16)
        } else if self.0 <= 0xFFFF_FFFF {
            target.write_all(&[0xFE])?;
            target.write_u32::<LittleEndian>(self.0 as u32)
        } else {
            target.write_all(&[0xFF])?;
            target.write_u64::<LittleEndian>(self.0)
        }
    }
}

impl BitcoinDeserialize for CompactInt {
    fn bitcoin_deserialize<R: std::io::Read>(
        mut target: R,
    ) -> Result<CompactInt, SerializationError> {
        let first = u8::bitcoin_deserialize(&mut target)?;
        match first {
            0xFD => Ok(CompactInt(u16::bitcoin_deserialize(&mut target)? as u64)),
            0xFE => Ok(CompactInt(u32::bitcoin_deserialize(&mut target)? as u64)),
            0xFF => Ok(CompactInt(u64::bitcoin_deserialize(&mut target)?)),
            prefix => Ok(CompactInt(prefix as u64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BitcoinDeserializeInto;

    fn roundtrip(value: u64) {
        let encoded = CompactInt(value).bitcoin_serialize_to_vec().unwrap();
        let decoded: CompactInt = encoded.as_slice().bitcoin_deserialize_into().unwrap();
        assert_eq!(decoded.value(), value);
        assert_eq!(encoded.len(), CompactInt::size(value as usize));
    }

    #[test]
    fn encoding_boundaries() {
        assert_eq!(
            CompactInt::from(252).bitcoin_serialize_to_vec().unwrap(),
            vec![0xFC]
        );
        assert_eq!(
            CompactInt::from(253).bitcoin_serialize_to_vec().unwrap(),
            vec![0xFD, 0xFD, 0x00]
        );
        assert_eq!(
            CompactInt::from(254).bitcoin_serialize_to_vec().unwrap(),
            vec![0xFD, 0xFE, 0x00]
        );
    }

    #[test]
    fn roundtrip_boundaries() {
        for value in &[
            0,
            0xFC,
            0xFD,
            0xFFFF,
            0x1_0000,
            0xFFFF_FFFF,
            0x1_0000_0000,
            u64::MAX,
        ] {
            roundtrip(*value);
        }
    }
}
