use std::fmt;

use const_oid::AssociatedOid;
use der::Encode;
use ed25519_dalek::VerifyingKey as Ed25519VerifyingKey;
use p256::ecdsa::VerifyingKey as P256VerifyingKey;
use p384::ecdsa::VerifyingKey as P384VerifyingKey;
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey};
use rsa::pkcs1v15::{
    Signature as RsaSignature, SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey,
};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::cert::SignatureAlgorithm;
use crate::error::{CertMintError, Result};

/// An RSA key pair owned by whichever party generated it.
///
/// Authority keys and keys for directly generated certificates are always
/// RSA. `Debug` prints the modulus size only.
#[derive(Clone)]
pub struct KeyPair {
    private: Box<RsaPrivateKey>,
    public: RsaPublicKey,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("bits", &(self.public.size() * 8))
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CertMintError::KeyGenerationError(e.to_string()))?;
        Ok(Self::from_private(private))
    }

    fn from_private(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        KeyPair {
            private: Box::new(private),
            public,
        }
    }

    /// Returns the public half of the key pair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::Rsa(self.public.clone())
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.public.size() * 8
    }

    /// Encodes the private key as a PKCS#8 `PrivateKeyInfo`.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        let document = self
            .private
            .to_pkcs8_der()
            .map_err(|e| CertMintError::EncodingError(e.to_string()))?;
        Ok(document.as_bytes().to_vec())
    }

    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs8_der(der)?;
        Ok(Self::from_private(private))
    }

    /// Encodes the private key as a PKCS#8 `EncryptedPrivateKeyInfo`
    /// (PBES2, scrypt and AES-256-CBC) under `password`.
    pub fn to_pkcs8_encrypted_der(&self, password: &str) -> Result<Vec<u8>> {
        let document = self
            .private
            .to_pkcs8_encrypted_der(rand_core::OsRng, password)
            .map_err(|e| CertMintError::EncodingError(e.to_string()))?;
        Ok(document.as_bytes().to_vec())
    }

    /// Decrypts a PKCS#8 `EncryptedPrivateKeyInfo`. A wrong password and a
    /// damaged document both fail with [`CertMintError::DecodingError`].
    pub fn from_pkcs8_encrypted_der(der: &[u8], password: &str) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs8_encrypted_der(der, password)
            .map_err(|e| CertMintError::DecodingError(e.to_string()))?;
        Ok(Self::from_private(private))
    }

    pub fn import_from_pkcs8_pem(pem: &str) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs8_pem(pem)?;
        Ok(Self::from_private(private))
    }

    /// Signs `data` with RSASSA-PKCS1-v1_5 using the digest named by `algorithm`.
    pub fn sign_data(&self, algorithm: SignatureAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
        match algorithm {
            SignatureAlgorithm::Sha1WithRsa => self.sign_rsa::<Sha1>(data),
            SignatureAlgorithm::Sha256WithRsa => self.sign_rsa::<Sha256>(data),
            SignatureAlgorithm::Sha384WithRsa => self.sign_rsa::<Sha384>(data),
            SignatureAlgorithm::Sha512WithRsa => self.sign_rsa::<Sha512>(data),
            other => Err(CertMintError::UnsupportedAlgorithm(format!(
                "{other:?} cannot be produced by an RSA key"
            ))),
        }
    }

    fn sign_rsa<D>(&self, data: &[u8]) -> Result<Vec<u8>>
    where
        D: Digest + AssociatedOid,
    {
        let signing_key: RsaSigningKey<D> = RsaSigningKey::new((*self.private).clone());
        let signature = signing_key
            .try_sign(data)
            .map_err(|e| CertMintError::RsaError(e.to_string()))?;
        Ok(signature.to_vec())
    }
}

/// A subject public key as carried in a certificate or signing request.
///
/// Requesters may submit ECDSA or Ed25519 keys; the engine carries them into
/// the issued certificate unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
    EcdsaP384(P384VerifyingKey),
    Ed25519(Ed25519VerifyingKey),
}

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        key_pair.public_key()
    }

    /// Short human readable name of the key type.
    pub fn kind(&self) -> &'static str {
        match self {
            PublicKey::Rsa(_) => "RSA",
            PublicKey::EcdsaP256(_) => "ECDSA P-256",
            PublicKey::EcdsaP384(_) => "ECDSA P-384",
            PublicKey::Ed25519(_) => "Ed25519",
        }
    }

    /// Whether `algorithm` is a signature scheme this key can verify.
    pub fn accepts(&self, algorithm: SignatureAlgorithm) -> bool {
        match self {
            PublicKey::Rsa(_) => algorithm.is_rsa(),
            PublicKey::EcdsaP256(_) => algorithm == SignatureAlgorithm::EcdsaWithSha256,
            PublicKey::EcdsaP384(_) => algorithm == SignatureAlgorithm::EcdsaWithSha384,
            PublicKey::Ed25519(_) => algorithm == SignatureAlgorithm::Ed25519,
        }
    }

    /// Converts the key into its `SubjectPublicKeyInfo` form.
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let spki = match self {
            PublicKey::Rsa(public) => SubjectPublicKeyInfoOwned::from_key(public.clone())?,
            PublicKey::EcdsaP256(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)?
            }
            PublicKey::EcdsaP384(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)?
            }
            PublicKey::Ed25519(verifying_key) => SubjectPublicKeyInfoOwned {
                algorithm: AlgorithmIdentifierOwned {
                    oid: const_oid::db::rfc8410::ID_ED_25519,
                    parameters: None,
                },
                subject_public_key: der::asn1::BitString::from_bytes(&verifying_key.to_bytes())?,
            },
        };
        Ok(spki)
    }

    /// DER encoding of the `SubjectPublicKeyInfo`.
    pub fn to_spki_der(&self) -> Result<Vec<u8>> {
        self.to_spki()?
            .to_der()
            .map_err(|e| CertMintError::EncodingError(e.to_string()))
    }

    /// Reads a key out of a `SubjectPublicKeyInfo`.
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der = spki.to_der()?;
        match spki.algorithm.oid {
            const_oid::db::rfc5912::RSA_ENCRYPTION => {
                Ok(PublicKey::Rsa(RsaPublicKey::from_public_key_der(&der)?))
            }
            const_oid::db::rfc5912::ID_EC_PUBLIC_KEY => {
                let curve = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .map(|params| params.decode_as::<const_oid::ObjectIdentifier>())
                    .transpose()?;
                match curve {
                    Some(const_oid::db::rfc5912::SECP_256_R_1) => Ok(PublicKey::EcdsaP256(
                        P256VerifyingKey::from_public_key_der(&der)?,
                    )),
                    Some(const_oid::db::rfc5912::SECP_384_R_1) => Ok(PublicKey::EcdsaP384(
                        P384VerifyingKey::from_public_key_der(&der)?,
                    )),
                    other => Err(CertMintError::UnsupportedAlgorithm(format!(
                        "elliptic curve {other:?}"
                    ))),
                }
            }
            const_oid::db::rfc8410::ID_ED_25519 => {
                let raw: [u8; 32] = spki
                    .subject_public_key
                    .raw_bytes()
                    .try_into()
                    .map_err(|_| {
                        CertMintError::DecodingError("Ed25519 key must be 32 bytes".to_string())
                    })?;
                let key = Ed25519VerifyingKey::from_bytes(&raw)
                    .map_err(|e| CertMintError::DecodingError(e.to_string()))?;
                Ok(PublicKey::Ed25519(key))
            }
            other => Err(CertMintError::UnsupportedAlgorithm(format!(
                "public key algorithm {other}"
            ))),
        }
    }

    /// Checks `signature` over `message`.
    ///
    /// Returns `Ok(false)` for a well-formed request whose signature does not
    /// match, and an error when the key and algorithm do not belong together.
    pub fn verify(
        &self,
        algorithm: SignatureAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool> {
        use p256::ecdsa::signature::Verifier as _;

        match (self, algorithm) {
            (PublicKey::Rsa(key), SignatureAlgorithm::Sha1WithRsa) => {
                Ok(verify_rsa::<Sha1>(key, message, signature))
            }
            (PublicKey::Rsa(key), SignatureAlgorithm::Sha256WithRsa) => {
                Ok(verify_rsa::<Sha256>(key, message, signature))
            }
            (PublicKey::Rsa(key), SignatureAlgorithm::Sha384WithRsa) => {
                Ok(verify_rsa::<Sha384>(key, message, signature))
            }
            (PublicKey::Rsa(key), SignatureAlgorithm::Sha512WithRsa) => {
                Ok(verify_rsa::<Sha512>(key, message, signature))
            }
            (PublicKey::EcdsaP256(key), SignatureAlgorithm::EcdsaWithSha256) => {
                let Ok(signature) = p256::ecdsa::Signature::from_der(signature) else {
                    return Ok(false);
                };
                Ok(key.verify(message, &signature).is_ok())
            }
            (PublicKey::EcdsaP384(key), SignatureAlgorithm::EcdsaWithSha384) => {
                let Ok(signature) = p384::ecdsa::Signature::from_der(signature) else {
                    return Ok(false);
                };
                Ok(key.verify(message, &signature).is_ok())
            }
            (PublicKey::Ed25519(key), SignatureAlgorithm::Ed25519) => {
                let Ok(signature) = ed25519_dalek::Signature::from_slice(signature) else {
                    return Ok(false);
                };
                Ok(key.verify(message, &signature).is_ok())
            }
            (key, algorithm) => Err(CertMintError::UnsupportedAlgorithm(format!(
                "{algorithm:?} with an {} key",
                key.kind()
            ))),
        }
    }
}

fn verify_rsa<D>(key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> bool
where
    D: Digest + AssociatedOid,
{
    let Ok(signature) = RsaSignature::try_from(signature) else {
        return false;
    };
    let verifying_key: RsaVerifyingKey<D> = RsaVerifyingKey::new(key.clone());
    verifying_key.verify(message, &signature).is_ok()
}
