pub mod extensions;
pub mod params;

use der::{Decode, Encode, EncodePem, Tag};
use extensions::ToAndFromX509Extension;
use params::{DistinguishedName, ExtensionParam};
use time::OffsetDateTime;
use x509_cert::certificate::CertificateInner;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::error::{CertMintError, Result};
use crate::issuer::Issuer;
use crate::key::{KeyPair, PublicKey};
use crate::provider::CryptoProvider;

/// sha1WithRSAEncryption, kept for compatibility with legacy relying parties.
const SHA_1_WITH_RSA_ENCRYPTION: const_oid::ObjectIdentifier =
    const_oid::ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");

/// Represents the supported signature algorithms for certificates and requests.
///
/// The engine only ever signs with the RSA variants; the others are accepted
/// when verifying signing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    /// SHA-1 with RSA encryption. Legacy.
    Sha1WithRsa,
    /// SHA-256 with RSA encryption.
    #[default]
    Sha256WithRsa,
    /// SHA-384 with RSA encryption.
    Sha384WithRsa,
    /// SHA-512 with RSA encryption.
    Sha512WithRsa,
    /// ECDSA P-256 with SHA-256.
    EcdsaWithSha256,
    /// ECDSA P-384 with SHA-384.
    EcdsaWithSha384,
    /// Pure Ed25519.
    Ed25519,
}

impl SignatureAlgorithm {
    pub fn oid(self) -> const_oid::ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha1WithRsa => SHA_1_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha256WithRsa => {
                const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION
            }
            SignatureAlgorithm::Sha384WithRsa => {
                const_oid::db::rfc5912::SHA_384_WITH_RSA_ENCRYPTION
            }
            SignatureAlgorithm::Sha512WithRsa => {
                const_oid::db::rfc5912::SHA_512_WITH_RSA_ENCRYPTION
            }
            SignatureAlgorithm::EcdsaWithSha256 => const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
            SignatureAlgorithm::EcdsaWithSha384 => const_oid::db::rfc5912::ECDSA_WITH_SHA_384,
            SignatureAlgorithm::Ed25519 => const_oid::db::rfc8410::ID_ED_25519,
        }
    }

    /// Determines the signature algorithm from its OID.
    pub fn from_oid(oid: const_oid::ObjectIdentifier) -> Result<Self> {
        match oid {
            SHA_1_WITH_RSA_ENCRYPTION => Ok(SignatureAlgorithm::Sha1WithRsa),
            const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION => {
                Ok(SignatureAlgorithm::Sha256WithRsa)
            }
            const_oid::db::rfc5912::SHA_384_WITH_RSA_ENCRYPTION => {
                Ok(SignatureAlgorithm::Sha384WithRsa)
            }
            const_oid::db::rfc5912::SHA_512_WITH_RSA_ENCRYPTION => {
                Ok(SignatureAlgorithm::Sha512WithRsa)
            }
            const_oid::db::rfc5912::ECDSA_WITH_SHA_256 => Ok(SignatureAlgorithm::EcdsaWithSha256),
            const_oid::db::rfc5912::ECDSA_WITH_SHA_384 => Ok(SignatureAlgorithm::EcdsaWithSha384),
            const_oid::db::rfc8410::ID_ED_25519 => Ok(SignatureAlgorithm::Ed25519),
            other => Err(CertMintError::UnsupportedAlgorithm(format!(
                "signature algorithm {other}"
            ))),
        }
    }

    pub fn is_rsa(self) -> bool {
        matches!(
            self,
            SignatureAlgorithm::Sha1WithRsa
                | SignatureAlgorithm::Sha256WithRsa
                | SignatureAlgorithm::Sha384WithRsa
                | SignatureAlgorithm::Sha512WithRsa
        )
    }

    /// Builds the `AlgorithmIdentifier` written into certificates.
    ///
    /// RSA identifiers carry an explicit NULL parameter, ECDSA and EdDSA ones
    /// carry none.
    pub fn algorithm_identifier(self) -> Result<AlgorithmIdentifierOwned> {
        let parameters = if self.is_rsa() {
            Some(der::Any::new(Tag::Null, Vec::<u8>::new())?)
        } else {
            None
        };
        Ok(AlgorithmIdentifierOwned {
            oid: self.oid(),
            parameters,
        })
    }
}

/// Represents an X.509 certificate.
///
/// Records are immutable once signed. Accessors decode on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_der(der)?,
        })
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        let der = crate::pem_utils::pem_to_der(pem, &["CERTIFICATE"])?;
        Self::from_der(&der)
    }

    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CertMintError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| CertMintError::EncodingError(e.to_string()))
    }

    pub fn subject(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.subject)
    }

    pub fn issuer(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.issuer)
    }

    /// Serial number content octets, always a positive INTEGER.
    pub fn serial_number(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    pub fn not_before(&self) -> OffsetDateTime {
        to_offset_date_time(&self.inner.tbs_certificate.validity.not_before)
    }

    pub fn not_after(&self) -> OffsetDateTime {
        to_offset_date_time(&self.inner.tbs_certificate.validity.not_after)
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::from_oid(self.inner.signature_algorithm.oid)
    }

    pub fn signature(&self) -> &[u8] {
        self.inner.signature.raw_bytes()
    }

    /// All extensions, in certificate order.
    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|ext| ExtensionParam {
                oid: ext.extn_id,
                critical: ext.critical,
                value: ext.extn_value.as_bytes().to_vec(),
            })
            .collect()
    }

    /// Decodes the extension of type `E`, if present.
    pub fn extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.extensions()
            .iter()
            .find(|ext| ext.oid == E::OID)
            .map(|ext| ext.to_extension::<E>())
            .transpose()
    }

    /// Checks the certificate signature under `issuer_key`.
    pub fn verify_signature<P: CryptoProvider + ?Sized>(
        &self,
        issuer_key: &PublicKey,
        provider: &P,
    ) -> Result<bool> {
        let tbs = self.inner.tbs_certificate.to_der()?;
        let algorithm = self.signature_algorithm()?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            CertMintError::DecodingError("signature has unused bits".to_string())
        })?;
        provider.verify(issuer_key, algorithm, &tbs, signature)
    }

    /// True when issuer equals subject and the signature verifies under the
    /// certificate's own key.
    pub fn is_self_signed<P: CryptoProvider + ?Sized>(&self, provider: &P) -> Result<bool> {
        if self.issuer()? != self.subject()? {
            return Ok(false);
        }
        self.verify_signature(&self.public_key()?, provider)
    }
}

fn to_offset_date_time(time: &x509_cert::time::Time) -> OffsetDateTime {
    match time {
        x509_cert::time::Time::UtcTime(ut) => OffsetDateTime::from(ut.to_system_time()),
        x509_cert::time::Time::GeneralTime(gt) => OffsetDateTime::from(gt.to_system_time()),
    }
}

/// A certificate together with the private key that can sign on its behalf.
///
/// This is the shape of a resolved authority.
#[derive(Debug, Clone)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl Issuer for CertificateWithPrivateKey {
    fn issuer_name(&self) -> Result<DistinguishedName> {
        // The name of the issuer is the subject of the certificate
        self.cert.subject()
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }
}
