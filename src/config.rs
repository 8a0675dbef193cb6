use std::fmt;

use bon::Builder;
use time::Duration;

use crate::cert::SignatureAlgorithm;
use crate::store::StoreLocation;

/// Engine settings.
///
/// ```rust
/// use certmint::config::EngineConfig;
/// use certmint::store::StoreLocation;
///
/// let config = EngineConfig::builder()
///     .location(StoreLocation::Machine)
///     .legacy_sha1(true)
///     .build();
/// assert_eq!(config.leaf_validity_days, 730);
/// ```
#[derive(Clone, Builder)]
pub struct EngineConfig {
    /// Sign with sha1WithRSAEncryption instead of sha256WithRSAEncryption.
    #[builder(default)]
    pub legacy_sha1: bool,
    /// Modulus size of generated keys.
    #[builder(default = 2048)]
    pub rsa_bits: usize,
    /// Tier new records are written to.
    #[builder(default)]
    pub location: StoreLocation,
    /// How far notBefore is moved into the past to tolerate clock skew.
    #[builder(default = Duration::days(1))]
    pub backdate: Duration,
    #[builder(default = 3650)]
    pub authority_validity_days: u32,
    #[builder(default = 730)]
    pub leaf_validity_days: u32,
    /// Fixed export password. When unset every export draws a fresh one.
    pub export_password: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl EngineConfig {
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        if self.legacy_sha1 {
            SignatureAlgorithm::Sha1WithRsa
        } else {
            SignatureAlgorithm::Sha256WithRsa
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("legacy_sha1", &self.legacy_sha1)
            .field("rsa_bits", &self.rsa_bits)
            .field("location", &self.location)
            .field("backdate", &self.backdate)
            .field("authority_validity_days", &self.authority_validity_days)
            .field("leaf_validity_days", &self.leaf_validity_days)
            .field(
                "export_password",
                &self.export_password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(!config.legacy_sha1);
        assert_eq!(config.rsa_bits, 2048);
        assert_eq!(config.location, StoreLocation::User);
        assert_eq!(config.backdate, Duration::days(1));
        assert_eq!(config.authority_validity_days, 3650);
        assert_eq!(config.leaf_validity_days, 730);
        assert!(config.export_password.is_none());
        assert_eq!(config.signature_algorithm(), SignatureAlgorithm::Sha256WithRsa);
    }

    #[test]
    fn test_legacy_sha1() {
        let config = EngineConfig::builder().legacy_sha1(true).build();
        assert_eq!(config.signature_algorithm(), SignatureAlgorithm::Sha1WithRsa);
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = EngineConfig::builder()
            .export_password("hunter2".to_string())
            .build();
        let printed = format!("{config:?}");
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("hunter2"));
    }
}
