use der::Encode;
use tracing::debug;
use x509_cert::certificate::CertificateInner;

use crate::cert::extensions::{AuthorityKeyIdentifier, SubjectKeyIdentifier, key_identifier};
use crate::cert::params::{DistinguishedName, ExtensionParam, Validity};
use crate::cert::{Certificate, SignatureAlgorithm};
use crate::error::{CertMintError, Result};
use crate::issuer::Issuer;
use crate::key::PublicKey;
use crate::provider::CryptoProvider;
use crate::serial::SerialNumber;
use crate::tbs_certificate::TbsCertificate;

const DEFAULT_VALIDITY_DAYS: i64 = 365;

/// A builder for constructing and signing X.509v3 certificates.
///
/// Subject and public key are required. A random serial is drawn at signing
/// time unless one was set explicitly.
#[derive(Clone, Debug)]
pub struct CertificateBuilder {
    subject: Option<DistinguishedName>,
    public_key: Option<PublicKey>,
    serial_number: Option<SerialNumber>,
    validity: Option<Validity>,
    extensions: Vec<ExtensionParam>,
    signature_algorithm: SignatureAlgorithm,
}

impl Default for CertificateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CertificateBuilder {
    /// Create a new certificate builder with default values.
    pub fn new() -> Self {
        Self {
            subject: None,
            public_key: None,
            serial_number: None,
            validity: None,
            extensions: Vec::new(),
            signature_algorithm: SignatureAlgorithm::default(),
        }
    }

    /// Set the subject distinguished name.
    pub fn subject(mut self, subject: DistinguishedName) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Set the subject public key.
    pub fn public_key(mut self, public_key: PublicKey) -> Self {
        self.public_key = Some(public_key);
        self
    }

    /// Set the serial number.
    pub fn serial_number(mut self, serial: SerialNumber) -> Self {
        self.serial_number = Some(serial);
        self
    }

    /// Set the validity period. Defaults to one year from signing.
    pub fn validity(mut self, validity: Validity) -> Self {
        self.validity = Some(validity);
        self
    }

    /// Set the signature algorithm.
    pub fn signature_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.signature_algorithm = algorithm;
        self
    }

    /// Add an extension.
    pub fn add_extension(mut self, ext: ExtensionParam) -> Self {
        self.extensions.push(ext);
        self
    }

    /// Add several extensions, keeping their order.
    pub fn extensions(mut self, extensions: impl IntoIterator<Item = ExtensionParam>) -> Self {
        self.extensions.extend(extensions);
        self
    }

    /// Sign the certificate with the issuer's key.
    ///
    /// Subject and authority key identifiers are appended after the
    /// configured extensions.
    pub fn sign<P: CryptoProvider + ?Sized>(
        self,
        issuer: &dyn Issuer,
        provider: &P,
    ) -> Result<Certificate> {
        let subject = self
            .subject
            .ok_or_else(|| CertMintError::InvalidInput("certificate subject is required".into()))?;
        let public_key = self.public_key.ok_or_else(|| {
            CertMintError::InvalidInput("certificate public key is required".into())
        })?;
        let validity = match self.validity {
            Some(validity) => validity,
            None => Validity::for_days(DEFAULT_VALIDITY_DAYS)?,
        };
        if validity.not_before > validity.not_after {
            return Err(CertMintError::InvalidInput(
                "validity ends before it starts".into(),
            ));
        }
        let serial_number = self
            .serial_number
            .unwrap_or_else(|| SerialNumber::generate(provider));

        let subject_spki = public_key.to_spki()?;
        let issuer_spki = issuer.issuer_public_key().to_spki()?;

        let mut extensions = self.extensions;
        extensions.push(ExtensionParam::from_extension(
            SubjectKeyIdentifier {
                key_identifier: key_identifier(&subject_spki),
            },
            false,
        )?);
        extensions.push(ExtensionParam::from_extension(
            AuthorityKeyIdentifier {
                key_identifier: key_identifier(&issuer_spki),
            },
            false,
        )?);

        let tbs_cert = TbsCertificate {
            serial_number,
            signature_algorithm: self.signature_algorithm,
            issuer: issuer.issuer_name()?,
            validity,
            subject,
            subject_public_key: public_key,
            extensions,
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let tbs_der = tbs_cert_inner
            .to_der()
            .map_err(|e| CertMintError::EncodingError(e.to_string()))?;
        let signature = provider.sign(
            issuer.signing_key(),
            self.signature_algorithm,
            &tbs_der,
        )?;

        debug!(
            subject = %tbs_cert.subject,
            issuer = %tbs_cert.issuer,
            serial = %serial_number,
            "signed certificate"
        );

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: self.signature_algorithm.algorithm_identifier()?,
            signature: der::asn1::BitString::from_bytes(&signature)?,
        };

        Ok(Certificate { inner: cert_inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::{BasicConstraints, ToAndFromX509Extension};
    use crate::issuer::SelfIssuer;
    use crate::key::KeyPair;
    use crate::provider::RustCryptoProvider;
    use time::{Duration, OffsetDateTime};

    fn self_signed(name: &str, key: &KeyPair) -> Certificate {
        let subject = DistinguishedName::from_common_name(name);
        CertificateBuilder::new()
            .subject(subject.clone())
            .public_key(key.public_key())
            .add_extension(
                ExtensionParam::from_extension(
                    BasicConstraints {
                        is_ca: true,
                        max_path_length: None,
                    },
                    true,
                )
                .unwrap(),
            )
            .sign(&SelfIssuer { name: subject, key }, &RustCryptoProvider)
            .unwrap()
    }

    #[test]
    fn test_self_signed_certificate_verifies() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let cert = self_signed("Builder CA", &key);
        assert_eq!(cert.subject().unwrap(), cert.issuer().unwrap());
        assert!(cert.is_self_signed(&RustCryptoProvider).unwrap());
        assert_eq!(
            cert.signature_algorithm().unwrap(),
            SignatureAlgorithm::Sha256WithRsa
        );
    }

    #[test]
    fn test_key_identifiers_link_leaf_to_issuer() {
        let ca_key = KeyPair::generate_rsa(1024).unwrap();
        let ca_cert = self_signed("Builder CA", &ca_key);
        let leaf_key = KeyPair::generate_rsa(1024).unwrap();
        let leaf = CertificateBuilder::new()
            .subject(DistinguishedName::from_common_name("leaf"))
            .public_key(leaf_key.public_key())
            .sign(
                &SelfIssuer {
                    name: ca_cert.subject().unwrap(),
                    key: &ca_key,
                },
                &RustCryptoProvider,
            )
            .unwrap();

        let ca_ski: SubjectKeyIdentifier = ca_cert.extension().unwrap().unwrap();
        let leaf_aki: AuthorityKeyIdentifier = leaf.extension().unwrap().unwrap();
        assert_eq!(ca_ski.key_identifier, leaf_aki.key_identifier);
        assert!(
            leaf.verify_signature(&ca_key.public_key(), &RustCryptoProvider)
                .unwrap()
        );
        assert!(
            !leaf
                .verify_signature(&leaf_key.public_key(), &RustCryptoProvider)
                .unwrap()
        );
        // identity extensions are never critical
        for ext in leaf.extensions() {
            if ext.oid == SubjectKeyIdentifier::OID || ext.oid == AuthorityKeyIdentifier::OID {
                assert!(!ext.critical);
            }
        }
    }

    #[test]
    fn test_legacy_sha1_signature() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let subject = DistinguishedName::from_common_name("legacy");
        let cert = CertificateBuilder::new()
            .subject(subject.clone())
            .public_key(key.public_key())
            .signature_algorithm(SignatureAlgorithm::Sha1WithRsa)
            .sign(&SelfIssuer { name: subject, key: &key }, &RustCryptoProvider)
            .unwrap();
        assert_eq!(
            cert.signature_algorithm().unwrap(),
            SignatureAlgorithm::Sha1WithRsa
        );
        assert!(cert.is_self_signed(&RustCryptoProvider).unwrap());
    }

    #[test]
    fn test_validity_is_preserved_to_the_second() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let subject = DistinguishedName::from_common_name("validity");
        let issued_at = OffsetDateTime::now_utc().replace_nanosecond(0).unwrap();
        let validity = Validity::backdated(issued_at, 730, Duration::days(1)).unwrap();
        let cert = CertificateBuilder::new()
            .subject(subject.clone())
            .public_key(key.public_key())
            .validity(validity.clone())
            .sign(&SelfIssuer { name: subject, key: &key }, &RustCryptoProvider)
            .unwrap();
        assert_eq!(cert.not_before(), validity.not_before);
        assert_eq!(cert.not_after(), validity.not_after);
    }

    #[test]
    fn test_missing_subject_is_rejected() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let err = CertificateBuilder::new()
            .public_key(key.public_key())
            .sign(
                &SelfIssuer {
                    name: DistinguishedName::from_common_name("x"),
                    key: &key,
                },
                &RustCryptoProvider,
            )
            .unwrap_err();
        assert!(matches!(err, CertMintError::InvalidInput(_)));
    }
}
