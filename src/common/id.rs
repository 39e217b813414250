//! Kademlia node Id or a lookup target
use bytes::Bytes;
use rand::Rng;
use std::{
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};

use crate::{Error, Result};

/// The size of default node IDs in bytes.
pub const ID_SIZE: usize = 20;
/// The size of default node IDs in bits.
pub const ID_BITS: usize = ID_SIZE * 8;

#[derive(Clone, PartialEq, Eq, Hash)]
/// Kademlia node Id or a lookup target.
///
/// A fixed length bit-string, stored big-endian in the smallest number of
/// bytes that fit it. The unused high bits of the first byte are always zero.
///
/// The [Ord] implementation compares raw magnitudes (after bit length), which
/// has no meaning in the XOR metric space. It only serves as a deterministic
/// tie-break for [crate::BucketOrder] and [crate::DistanceOrder].
pub struct Id {
    bits: usize,
    bytes: Bytes,
}

impl Id {
    /// Create an Id of `bits` length from big-endian `bytes`.
    ///
    /// `bytes` must be exactly `ceil(bits / 8)` long, and any bits above
    /// `bits` must be zero.
    pub fn new<T: AsRef<[u8]>>(bits: usize, bytes: T) -> Result<Id> {
        let bytes = bytes.as_ref();

        if bits == 0 {
            return Err(Error::InvalidId("bit length must be non-zero".into()));
        }

        if bytes.len() != byte_len(bits) {
            return Err(Error::InvalidId(format!(
                "{bits} bits need {} bytes, got {}",
                byte_len(bits),
                bytes.len()
            )));
        }

        if bytes[0] & !top_mask(bits) != 0 {
            return Err(Error::InvalidId(format!(
                "value does not fit in {bits} bits"
            )));
        }

        Ok(Id {
            bits,
            bytes: Bytes::copy_from_slice(bytes),
        })
    }

    /// Create an Id from some bytes, with a bit length of `8 * bytes.len()`.
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Id> {
        let bytes = bytes.as_ref();
        Id::new(bytes.len() * 8, bytes)
    }

    /// Create an Id of `bits` length holding the unsigned `value`.
    ///
    /// Handy for small identifier spaces, `Id::from_u64(4, 0b0011)`.
    pub fn from_u64(bits: usize, value: u64) -> Result<Id> {
        if bits < 64 && value >> bits != 0 {
            return Err(Error::InvalidId(format!(
                "{value} does not fit in {bits} bits"
            )));
        }

        let mut bytes = vec![0; byte_len(bits)];
        let be = value.to_be_bytes();
        let n = bytes.len().min(be.len());
        let offset = bytes.len() - n;
        bytes[offset..].copy_from_slice(&be[be.len() - n..]);

        Id::new(bits, bytes)
    }

    /// A random 160 bits Id.
    pub fn random() -> Id {
        Id::random_with_bits(ID_BITS)
    }

    /// A random Id of `bits` length.
    ///
    /// `bits` should be non-zero, a zero length Id is never stored.
    pub fn random_with_bits(bits: usize) -> Id {
        let mut bytes = vec![0; byte_len(bits)];
        rand::thread_rng().fill(&mut bytes[..]);

        if let Some(first) = bytes.first_mut() {
            *first &= top_mask(bits);
        }

        Id {
            bits,
            bytes: bytes.into(),
        }
    }

    /// A 160 bits Id from the SHA-1 digest of `data`, used to derive keys for values.
    pub fn from_sha1<T: AsRef<[u8]>>(data: T) -> Id {
        let digest = sha1_smol::Sha1::from(data.as_ref()).digest().bytes();

        Id {
            bits: ID_BITS,
            bytes: Bytes::copy_from_slice(&digest),
        }
    }

    // === Getters ===

    /// Length of this Id in bits.
    pub fn bit_length(&self) -> usize {
        self.bits
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    // === Public Methods ===

    /// XOR distance between this Id and a target Id.
    ///
    /// Both Ids are expected to share the same bit length.
    pub fn distance(&self, other: &Id) -> Distance {
        debug_assert_eq!(self.bits, other.bits);

        Distance(
            self.bytes
                .iter()
                .zip(other.bytes.iter())
                .map(|(a, b)| a ^ b)
                .collect(),
        )
    }

    /// Position of the bucket `other` falls in, relative to this Id.
    ///
    /// That is the 1-based index of the most significant differing bit, or
    /// the bit length of the XOR distance.
    ///
    /// Position of self is 0
    /// Position of the farthest Id is `bit_length()`
    /// Position of an Id with 5 leading matching bits out of 160 is 155
    pub fn bucket_position(&self, other: &Id) -> usize {
        debug_assert_eq!(self.bits, other.bits);

        for (i, (a, b)) in self.bytes.iter().zip(other.bytes.iter()).enumerate() {
            let xor = a ^ b;

            if xor != 0 {
                // leading zeros so far + leading zeros of this byte
                let leading_zeros = i * 8 + xor.leading_zeros() as usize;

                return self.bytes.len() * 8 - leading_zeros;
            }
        }

        0
    }

    /// The Id with every bit flipped, the farthest possible Id from this one.
    pub fn farthest(&self) -> Id {
        let mut bytes: Vec<u8> = self.bytes.iter().map(|b| !b).collect();

        if let Some(first) = bytes.first_mut() {
            *first &= top_mask(self.bits);
        }

        Id {
            bits: self.bits,
            bytes: bytes.into(),
        }
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> Ordering {
        // Same length byte strings compare like big-endian integers.
        self.bits
            .cmp(&other.bits)
            .then_with(|| self.bytes.cmp(&other.bytes))
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lowercase hex, using exactly `ceil(bits / 4)` digits.
impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let hex: String = self.bytes.iter().map(|b| format!("{b:02x}")).collect();
        let digits = self.bits.div_ceil(4);

        f.write_str(&hex[hex.len() - digits..])
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Id({self})")
    }
}

/// Parses a hex string, every digit accounts for 4 bits.
impl FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Id> {
        if s.is_empty() || !s.bytes().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidId(format!("not a hex string: {s:?}")));
        }

        let padded = if s.len() % 2 == 1 {
            format!("0{s}")
        } else {
            s.to_string()
        };

        let bytes = (0..padded.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&padded[i..i + 2], 16))
            .collect::<std::result::Result<Vec<u8>, _>>()
            .map_err(|e| Error::InvalidId(e.to_string()))?;

        Id::new(s.len() * 4, bytes)
    }
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// XOR distance between two [Id]s, ordered as an unsigned big-endian integer.
pub struct Distance(Box<[u8]>);

impl Distance {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of significant bits, equal to the bucket position of one
    /// Id relative to the other.
    pub fn bit_length(&self) -> usize {
        for (i, byte) in self.0.iter().enumerate() {
            if *byte != 0 {
                return (self.0.len() - i) * 8 - byte.leading_zeros() as usize;
            }
        }

        0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl Debug for Distance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Distance({:x?})", &self.0)
    }
}

fn byte_len(bits: usize) -> usize {
    bits.div_ceil(8)
}

/// Mask of the bits in the first byte that belong to a `bits` long Id.
fn top_mask(bits: usize) -> u8 {
    match bits % 8 {
        0 => 0xff,
        r => (1u8 << r) - 1,
    }
}
