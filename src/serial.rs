//! Certificate serial numbers.
//!
//! A serial is 16 bytes of entropy with the sign bit of the most significant
//! byte cleared, so it always encodes as a positive ASN.1 INTEGER of at most
//! 16 content octets.

use std::fmt;

use crate::provider::CryptoProvider;

/// Length of a serial number in bytes.
pub const SERIAL_NUMBER_LEN: usize = 16;

/// A positive 128-bit certificate serial number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SerialNumber([u8; SERIAL_NUMBER_LEN]);

impl SerialNumber {
    /// Builds a serial from raw entropy by clearing the top bit.
    ///
    /// Returns `None` when the result would be zero.
    pub fn from_entropy(mut entropy: [u8; SERIAL_NUMBER_LEN]) -> Option<Self> {
        entropy[0] &= 0x7f;
        if entropy.iter().all(|b| *b == 0) {
            return None;
        }
        Some(SerialNumber(entropy))
    }

    /// Draws a fresh serial from the provider's randomness source.
    pub fn generate<P: CryptoProvider + ?Sized>(provider: &P) -> Self {
        loop {
            let mut entropy = [0u8; SERIAL_NUMBER_LEN];
            provider.random_bytes(&mut entropy);
            if let Some(serial) = Self::from_entropy(entropy) {
                return serial;
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8; SERIAL_NUMBER_LEN] {
        &self.0
    }

    /// Minimal two's complement content octets: leading zero bytes are
    /// dropped unless the next byte has its top bit set.
    pub fn to_der_bytes(&self) -> Vec<u8> {
        let first = self
            .0
            .iter()
            .position(|b| *b != 0)
            .unwrap_or(SERIAL_NUMBER_LEN - 1);
        let mut bytes = Vec::with_capacity(SERIAL_NUMBER_LEN + 1);
        if self.0[first] & 0x80 != 0 {
            bytes.push(0);
        }
        bytes.extend_from_slice(&self.0[first..]);
        bytes
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
