use crate::cert::params::DistinguishedName;
use crate::error::Result;
use crate::key::{KeyPair, PublicKey};

/// Represents an entity capable of issuing certificates.
///
/// The issuer name becomes the issuer field of every certificate it signs,
/// and its key both signs the certificate and supplies the authority key
/// identifier.
pub trait Issuer {
    /// Returns the distinguished name of the issuer.
    fn issuer_name(&self) -> Result<DistinguishedName>;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Returns the public key relying parties verify the issuer's signatures with.
    fn issuer_public_key(&self) -> PublicKey {
        self.signing_key().public_key()
    }
}

/// Issuer for self-signed certificates: the issuer is the subject itself.
pub struct SelfIssuer<'a> {
    pub name: DistinguishedName,
    pub key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Result<DistinguishedName> {
        Ok(self.name.clone())
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }
}
