//! The cryptography seam of the engine.
//!
//! Everything the engine needs from a cryptography library goes through
//! [`CryptoProvider`]: key generation, signing, signature verification and
//! randomness. [`RustCryptoProvider`] implements it on the RustCrypto crates.

use rand::RngCore;

use crate::cert::SignatureAlgorithm;
use crate::error::Result;
use crate::key::{KeyPair, PublicKey};

pub trait CryptoProvider {
    /// Generates a fresh RSA key pair of `bits` bits.
    fn generate_key_pair(&self, bits: usize) -> Result<KeyPair>;

    /// Signs `message` with `key`.
    fn sign(&self, key: &KeyPair, algorithm: SignatureAlgorithm, message: &[u8]) -> Result<Vec<u8>>;

    /// Verifies `signature` over `message` under `key`.
    fn verify(
        &self,
        key: &PublicKey,
        algorithm: SignatureAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool>;

    /// Fills `buf` from a cryptographically secure source.
    fn random_bytes(&self, buf: &mut [u8]);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RustCryptoProvider;

impl CryptoProvider for RustCryptoProvider {
    fn generate_key_pair(&self, bits: usize) -> Result<KeyPair> {
        KeyPair::generate_rsa(bits)
    }

    fn sign(&self, key: &KeyPair, algorithm: SignatureAlgorithm, message: &[u8]) -> Result<Vec<u8>> {
        key.sign_data(algorithm, message)
    }

    fn verify(
        &self,
        key: &PublicKey,
        algorithm: SignatureAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool> {
        key.verify(algorithm, message, signature)
    }

    fn random_bytes(&self, buf: &mut [u8]) {
        rand::rng().fill_bytes(buf);
    }
}

impl<P: CryptoProvider + ?Sized> CryptoProvider for &P {
    fn generate_key_pair(&self, bits: usize) -> Result<KeyPair> {
        (**self).generate_key_pair(bits)
    }

    fn sign(&self, key: &KeyPair, algorithm: SignatureAlgorithm, message: &[u8]) -> Result<Vec<u8>> {
        (**self).sign(key, algorithm, message)
    }

    fn verify(
        &self,
        key: &PublicKey,
        algorithm: SignatureAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool> {
        (**self).verify(key, algorithm, message, signature)
    }

    fn random_bytes(&self, buf: &mut [u8]) {
        (**self).random_bytes(buf)
    }
}
