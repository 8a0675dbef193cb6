//! PKCS#10 certificate signing requests.
//!
//! A request proves that the requester holds the private key matching the
//! public key it carries. Verifying it is a self-consistency check, never a
//! trust decision.

use der::{Decode, Encode};
use tracing::debug;
use x509_cert::request::{CertReq, Version};

use crate::cert::SignatureAlgorithm;
use crate::cert::params::DistinguishedName;
use crate::error::{CertMintError, Result};
use crate::key::PublicKey;
use crate::pem_utils::pem_to_der;
use crate::provider::{CryptoProvider, RustCryptoProvider};

/// PEM labels a request may be armored with.
pub const CSR_PEM_LABELS: &[&str] = &["CERTIFICATE REQUEST", "NEW CERTIFICATE REQUEST"];

/// A parsed signing request. Transient: it is consumed by one issuance and
/// never stored.
#[derive(Debug, Clone)]
pub struct CertificateSigningRequest {
    pub subject: DistinguishedName,
    pub public_key: PublicKey,
    pub signature_algorithm: SignatureAlgorithm,
    /// DER of the `CertificationRequestInfo` the signature covers.
    pub signed_info: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Parses and verifies signing requests.
#[derive(Debug, Clone, Copy)]
pub struct CsrProcessor<P = RustCryptoProvider> {
    provider: P,
}

impl<P: CryptoProvider> CsrProcessor<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Parses a PEM-armored PKCS#10 request.
    ///
    /// Structural problems fail with [`CertMintError::MalformedCsr`]. A
    /// subject that is not a usable name fails with
    /// [`CertMintError::InvalidDistinguishedName`].
    pub fn parse(&self, pem: &[u8]) -> Result<CertificateSigningRequest> {
        let der = pem_to_der(pem, CSR_PEM_LABELS).map_err(malformed)?;
        let request = CertReq::from_der(&der).map_err(malformed)?;
        if request.info.version != Version::V1 {
            return Err(CertMintError::MalformedCsr(format!(
                "unsupported request version {:?}",
                request.info.version
            )));
        }

        let subject = DistinguishedName::from_x509_name(&request.info.subject)?;
        let public_key = PublicKey::from_x509spki(&request.info.public_key).map_err(|e| match e {
            CertMintError::UnsupportedAlgorithm(_) => e,
            other => malformed(other),
        })?;
        let signature_algorithm = SignatureAlgorithm::from_oid(request.algorithm.oid)?;
        let signed_info = request.info.to_der().map_err(malformed)?;
        let signature = request
            .signature
            .as_bytes()
            .ok_or_else(|| CertMintError::MalformedCsr("signature has unused bits".into()))?
            .to_vec();

        debug!(
            subject = %subject,
            key = public_key.kind(),
            algorithm = ?signature_algorithm,
            "parsed signing request"
        );

        Ok(CertificateSigningRequest {
            subject,
            public_key,
            signature_algorithm,
            signed_info,
            signature,
        })
    }

    /// Checks the request's signature against its own public key.
    ///
    /// A signature algorithm that does not fit the key type cannot
    /// self-verify and yields `Ok(false)`.
    pub fn verify(&self, csr: &CertificateSigningRequest) -> Result<bool> {
        if !csr.public_key.accepts(csr.signature_algorithm) {
            debug!(
                subject = %csr.subject,
                key = csr.public_key.kind(),
                algorithm = ?csr.signature_algorithm,
                "signature algorithm does not match the request key"
            );
            return Ok(false);
        }
        self.provider.verify(
            &csr.public_key,
            csr.signature_algorithm,
            &csr.signed_info,
            &csr.signature,
        )
    }
}

fn malformed(err: impl std::fmt::Display) -> CertMintError {
    CertMintError::MalformedCsr(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyPair;
    use crate::pem_utils::der_to_pem;
    use x509_cert::request::CertReqInfo;

    fn request_pem(subject: &str, key: &KeyPair) -> String {
        request_pem_claiming(subject, key, SignatureAlgorithm::Sha256WithRsa)
    }

    /// Signs with SHA-256/RSA but labels the signature as `claimed`.
    fn request_pem_claiming(subject: &str, key: &KeyPair, claimed: SignatureAlgorithm) -> String {
        let subject = DistinguishedName::parse(subject)
            .unwrap()
            .as_x509_name()
            .unwrap();
        signed_request(subject, key, claimed)
    }

    fn signed_request(
        subject: x509_cert::name::Name,
        key: &KeyPair,
        claimed: SignatureAlgorithm,
    ) -> String {
        let info = CertReqInfo {
            version: Version::V1,
            subject,
            public_key: key.public_key().to_spki().unwrap(),
            attributes: Default::default(),
        };
        let signature = key
            .sign_data(SignatureAlgorithm::Sha256WithRsa, &info.to_der().unwrap())
            .unwrap();
        let request = CertReq {
            info,
            algorithm: claimed.algorithm_identifier().unwrap(),
            signature: der::asn1::BitString::from_bytes(&signature).unwrap(),
        };
        der_to_pem(&request.to_der().unwrap(), "CERTIFICATE REQUEST")
    }

    #[test]
    fn test_parse_and_verify() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let pem = request_pem("CN=codehost, O=Example", &key);
        let processor = CsrProcessor::new(RustCryptoProvider);
        let csr = processor.parse(pem.as_bytes()).unwrap();
        assert_eq!(csr.subject.canonical(), "CN=codehost,O=Example");
        assert_eq!(csr.public_key, key.public_key());
        assert_eq!(csr.signature_algorithm, SignatureAlgorithm::Sha256WithRsa);
        assert!(processor.verify(&csr).unwrap());
    }

    #[test]
    fn test_flipped_signature_byte_fails_verification() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let pem = request_pem("CN=codehost", &key);
        let processor = CsrProcessor::new(RustCryptoProvider);
        let mut csr = processor.parse(pem.as_bytes()).unwrap();
        csr.signature[10] ^= 0x01;
        assert!(!processor.verify(&csr).unwrap());
    }

    #[test]
    fn test_algorithm_not_matching_key_fails_verification() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let pem = request_pem_claiming("CN=mixed", &key, SignatureAlgorithm::EcdsaWithSha256);
        let processor = CsrProcessor::new(RustCryptoProvider);
        let csr = processor.parse(pem.as_bytes()).unwrap();
        assert_eq!(csr.signature_algorithm, SignatureAlgorithm::EcdsaWithSha256);
        assert!(!processor.verify(&csr).unwrap());
    }

    #[test]
    fn test_repeated_subject_attribute_is_rejected() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let mut subject = DistinguishedName::parse("CN=h, OU=a")
            .unwrap()
            .as_x509_name()
            .unwrap();
        let mut second = DistinguishedName::parse("CN=h, OU=b")
            .unwrap()
            .as_x509_name()
            .unwrap();
        // RDNs are written C..CN, so the OU comes first
        subject.0.push(second.0.remove(0));
        let pem = signed_request(subject, &key, SignatureAlgorithm::Sha256WithRsa);

        let err = CsrProcessor::new(RustCryptoProvider)
            .parse(pem.as_bytes())
            .unwrap_err();
        assert!(
            matches!(err, CertMintError::InvalidDistinguishedName(_)),
            "{err:?}"
        );
    }

    #[test]
    fn test_new_certificate_request_label() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let pem = request_pem("CN=legacy", &key)
            .replace("CERTIFICATE REQUEST", "NEW CERTIFICATE REQUEST");
        let csr = CsrProcessor::new(RustCryptoProvider).parse(pem.as_bytes()).unwrap();
        assert_eq!(csr.subject.common_name, "legacy");
    }

    #[test]
    fn test_malformed_input() {
        let processor = CsrProcessor::new(RustCryptoProvider);
        for input in [
            "".to_string(),
            "not a request".to_string(),
            der_to_pem(b"\x30\x03\x02\x01\x00", "CERTIFICATE REQUEST"),
            der_to_pem(b"\x30\x00", "CERTIFICATE"),
        ] {
            let err = processor.parse(input.as_bytes()).unwrap_err();
            assert!(
                matches!(err, CertMintError::MalformedCsr(_)),
                "{input:?}: {err:?}"
            );
        }
    }
}
