use der::Encode;
use der::asn1::{GeneralizedTime, OctetString, UtcTime};
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{DistinguishedName, ExtensionParam, Validity};
use crate::error::{CertMintError, Result};
use crate::key::PublicKey;
use crate::serial::SerialNumber;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 certificate.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `validity` - The certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - Additional X.509 extensions for the certificate.
pub struct TbsCertificate {
    /// Certificate serial number
    pub serial_number: SerialNumber,
    /// Certificate signature algorithm
    pub signature_algorithm: SignatureAlgorithm,
    /// Certificate issuer distinguished name
    pub issuer: DistinguishedName,
    /// Validity window
    pub validity: Validity,
    /// Certificate subject distinguished name
    pub subject: DistinguishedName,
    /// Subject's public key
    pub subject_public_key: PublicKey,
    /// Certificate extensions
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let algorithm_id = self.signature_algorithm.algorithm_identifier()?;

        let extensions = self
            .extensions
            .iter()
            .map(|ext| {
                Ok(x509_cert::ext::Extension {
                    extn_id: ext.oid,
                    critical: ext.critical,
                    extn_value: OctetString::new(ext.value.clone())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.validity.not_before)?,
            not_after: to_x509_time(self.validity.not_after)?,
        };

        let serial_number =
            x509_cert::serial_number::SerialNumber::new(&self.serial_number.to_der_bytes())?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: algorithm_id,
            issuer: self.issuer.as_x509_name()?,
            validity,
            subject: self.subject.as_x509_name()?,
            subject_public_key_info: self.subject_public_key.to_spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: if extensions.is_empty() {
                None
            } else {
                Some(extensions)
            },
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.to_tbs_certificate_inner()?
            .to_der()
            .map_err(|e| CertMintError::EncodingError(e.to_string()))
    }
}

/// UTCTime through 2049, GeneralizedTime from 2050 on (RFC 5280 4.1.2.5).
fn to_x509_time(instant: time::OffsetDateTime) -> Result<x509_cert::time::Time> {
    let system_time: std::time::SystemTime = instant.into();
    if instant.year() < 2050 {
        Ok(x509_cert::time::Time::UtcTime(UtcTime::from_system_time(
            system_time,
        )?))
    } else {
        Ok(x509_cert::time::Time::GeneralTime(
            GeneralizedTime::from_system_time(system_time)?,
        ))
    }
}
