//! Password-protected PKCS#12 bundles of a certificate and its private key.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p12::PFX;

use crate::cert::Certificate;
use crate::error::{CertMintError, Result};
use crate::key::KeyPair;
use crate::provider::CryptoProvider;
use crate::store::StoredBundle;

/// Bytes of entropy in a generated export password.
const PASSWORD_ENTROPY_LEN: usize = 24;

/// A DER-encoded PKCS#12 archive and the password that opens it.
#[derive(Clone, PartialEq, Eq)]
pub struct Pkcs12Bundle {
    pub der: Vec<u8>,
    pub password: String,
}

impl fmt::Debug for Pkcs12Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pkcs12Bundle")
            .field("len", &self.der.len())
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Packs and unpacks [`Pkcs12Bundle`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pkcs12Exporter;

impl Pkcs12Exporter {
    /// Packages `cert` and `key` under `password`.
    ///
    /// The bag's friendly name is the certificate's common name.
    pub fn export(&self, cert: &Certificate, key: &KeyPair, password: &str) -> Result<Pkcs12Bundle> {
        let friendly_name = cert.subject()?.common_name;
        let pfx = PFX::new(
            &cert.to_der()?,
            &key.to_pkcs8_der()?,
            None,
            password,
            &friendly_name,
        )
        .ok_or_else(|| {
            CertMintError::Pkcs12Error(format!("could not build bundle for {friendly_name}"))
        })?;
        Ok(Pkcs12Bundle {
            der: pfx.to_der(),
            password: password.to_string(),
        })
    }

    /// Opens a bundle, checking its MAC before reading the bags.
    pub fn import(&self, bundle: &Pkcs12Bundle) -> Result<StoredBundle> {
        let pfx = PFX::parse(&bundle.der)
            .map_err(|e| CertMintError::Pkcs12Error(format!("{e:?}")))?;
        if !pfx.verify_mac(&bundle.password) {
            return Err(CertMintError::Pkcs12Error(
                "integrity check failed, wrong password?".to_string(),
            ));
        }

        let cert_der = pfx
            .cert_x509_bags(&bundle.password)
            .map_err(|e| CertMintError::Pkcs12Error(format!("{e:?}")))?
            .into_iter()
            .next()
            .ok_or_else(|| CertMintError::Pkcs12Error("bundle holds no certificate".into()))?;
        let key_der = pfx
            .key_bags(&bundle.password)
            .map_err(|e| CertMintError::Pkcs12Error(format!("{e:?}")))?
            .into_iter()
            .next();

        Ok(StoredBundle {
            certificate: Certificate::from_der(&cert_der)?,
            key: key_der.map(|der| KeyPair::from_pkcs8_der(&der)).transpose()?,
        })
    }
}

/// A fresh export password: 24 random bytes, URL-safe base64 without padding.
pub fn generate_password<P: CryptoProvider + ?Sized>(provider: &P) -> String {
    let mut entropy = [0u8; PASSWORD_ENTROPY_LEN];
    provider.random_bytes(&mut entropy);
    URL_SAFE_NO_PAD.encode(entropy)
}
