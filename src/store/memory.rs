use std::collections::HashMap;

use tracing::debug;

use super::{CertificateStore, ExportedBundle, StoreLocation, StoreScope, StoredBundle};
use crate::cert::params::DistinguishedName;
use crate::error::{CertMintError, Result};

type Tier = HashMap<(StoreScope, DistinguishedName), Vec<StoredBundle>>;

/// A store that lives only as long as the value. Used by tests and demos.
#[derive(Debug, Default)]
pub struct MemoryCertificateStore {
    machine: Tier,
    user: Tier,
    puts: usize,
    /// When set, every `put` fails with [`CertMintError::StoreAccess`].
    pub fail_puts: bool,
}

impl MemoryCertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes so far.
    pub fn put_count(&self) -> usize {
        self.puts
    }

    /// Number of records held in `scope` across both tiers.
    pub fn len(&self, scope: StoreScope) -> usize {
        self.machine
            .iter()
            .chain(self.user.iter())
            .filter(|((s, _), _)| *s == scope)
            .map(|(_, records)| records.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.machine.is_empty() && self.user.is_empty()
    }

    /// Every record for `subject` in `scope`, machine tier first, oldest
    /// first within a tier.
    pub fn records(&self, scope: StoreScope, subject: &DistinguishedName) -> Vec<StoredBundle> {
        let key = (scope, subject.clone());
        StoreLocation::SEARCH_ORDER
            .into_iter()
            .filter_map(|location| self.tier(location).get(&key))
            .flatten()
            .cloned()
            .collect()
    }

    fn tier(&self, location: StoreLocation) -> &Tier {
        match location {
            StoreLocation::Machine => &self.machine,
            StoreLocation::User => &self.user,
        }
    }
}

impl CertificateStore for MemoryCertificateStore {
    fn get(&self, scope: StoreScope, subject: &DistinguishedName) -> Result<Option<StoredBundle>> {
        let key = (scope, subject.clone());
        Ok(StoreLocation::SEARCH_ORDER
            .into_iter()
            .find_map(|location| self.tier(location).get(&key)?.last().cloned()))
    }

    fn put(
        &mut self,
        scope: StoreScope,
        location: StoreLocation,
        bundle: &ExportedBundle,
    ) -> Result<()> {
        if self.fail_puts {
            return Err(CertMintError::StoreAccess(format!(
                "{location} store is read-only"
            )));
        }
        let stored = bundle.open()?;
        let subject = stored.certificate.subject()?;
        debug!(%scope, %location, subject = %subject, "memory store write");
        let tier = match location {
            StoreLocation::Machine => &mut self.machine,
            StoreLocation::User => &mut self.user,
        };
        let records = tier.entry((scope, subject.clone())).or_default();
        let taken = if scope.keyed_by_serial() {
            let serial = stored.certificate.serial_number();
            records
                .iter()
                .any(|existing| existing.certificate.serial_number() == serial)
        } else {
            !records.is_empty()
        };
        if taken {
            return Err(CertMintError::StoreAccess(format!(
                "{location} {scope} already holds a record for {subject}"
            )));
        }
        records.push(stored);
        self.puts += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CertificateBuilder;
    use crate::cert::Certificate;
    use crate::issuer::SelfIssuer;
    use crate::key::KeyPair;
    use crate::pkcs12::Pkcs12Exporter;
    use crate::provider::RustCryptoProvider;

    fn certificate(name: &str, key: &KeyPair) -> Certificate {
        let subject = DistinguishedName::parse(name).unwrap();
        CertificateBuilder::new()
            .subject(subject.clone())
            .public_key(key.public_key())
            .sign(&SelfIssuer { name: subject, key }, &RustCryptoProvider)
            .unwrap()
    }

    #[test]
    fn test_machine_tier_wins() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let in_user = certificate("CN=shared", &key);
        let in_machine = certificate("CN=shared", &key);
        let mut store = MemoryCertificateStore::new();
        store
            .put(
                StoreScope::My,
                StoreLocation::User,
                &ExportedBundle::Certificate(in_user),
            )
            .unwrap();
        store
            .put(
                StoreScope::My,
                StoreLocation::Machine,
                &ExportedBundle::Certificate(in_machine.clone()),
            )
            .unwrap();

        let subject = DistinguishedName::from_common_name("shared");
        let found = store.get(StoreScope::My, &subject).unwrap().unwrap();
        assert_eq!(found.certificate, in_machine);
        assert!(found.key.is_none());
        assert!(store.get(StoreScope::Root, &subject).unwrap().is_none());
        assert_eq!(store.put_count(), 2);
        assert_eq!(store.len(StoreScope::My), 2);
    }

    #[test]
    fn test_lookup_uses_canonical_name() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let cert = certificate("O=Example, CN=host", &key);
        let mut store = MemoryCertificateStore::new();
        store
            .put(
                StoreScope::My,
                StoreLocation::User,
                &ExportedBundle::Certificate(cert),
            )
            .unwrap();
        let subject = DistinguishedName::parse("CN=host,O=Example").unwrap();
        assert!(store.get(StoreScope::My, &subject).unwrap().is_some());
    }

    #[test]
    fn test_failed_put_leaves_store_untouched() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let mut store = MemoryCertificateStore {
            fail_puts: true,
            ..Default::default()
        };
        let err = store
            .put(
                StoreScope::My,
                StoreLocation::User,
                &ExportedBundle::Certificate(certificate("CN=x", &key)),
            )
            .unwrap_err();
        assert!(matches!(err, CertMintError::StoreAccess(_)));
        assert!(store.is_empty());
        assert_eq!(store.put_count(), 0);
    }

    #[test]
    fn test_keyed_record_is_never_replaced() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let original = certificate("CN=keyed", &key);
        let bundle = Pkcs12Exporter.export(&original, &key, "pw").unwrap();
        let mut store = MemoryCertificateStore::new();
        store
            .put(StoreScope::My, StoreLocation::User, &ExportedBundle::Pkcs12(bundle))
            .unwrap();

        let err = store
            .put(
                StoreScope::My,
                StoreLocation::User,
                &ExportedBundle::Certificate(certificate("CN=keyed", &key)),
            )
            .unwrap_err();
        assert!(matches!(err, CertMintError::StoreAccess(_)), "{err:?}");

        let found = store
            .get(StoreScope::My, &DistinguishedName::from_common_name("keyed"))
            .unwrap()
            .unwrap();
        assert_eq!(found.certificate, original);
        assert!(found.key.is_some());
        assert_eq!(store.put_count(), 1);
    }

    #[test]
    fn test_keyless_record_is_never_replaced() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let first = certificate("CN=plain", &key);
        let mut store = MemoryCertificateStore::new();
        store
            .put(
                StoreScope::My,
                StoreLocation::User,
                &ExportedBundle::Certificate(first.clone()),
            )
            .unwrap();
        let err = store
            .put(
                StoreScope::My,
                StoreLocation::User,
                &ExportedBundle::Certificate(certificate("CN=plain", &key)),
            )
            .unwrap_err();
        assert!(matches!(err, CertMintError::StoreAccess(_)), "{err:?}");
        let found = store
            .get(StoreScope::My, &DistinguishedName::from_common_name("plain"))
            .unwrap()
            .unwrap();
        assert_eq!(found.certificate, first);
    }

    #[test]
    fn test_requested_records_accumulate_by_serial() {
        let key = KeyPair::generate_rsa(1024).unwrap();
        let mut store = MemoryCertificateStore::new();
        let older = certificate("CN=requested", &key);
        let newer = certificate("CN=requested", &key);
        for cert in [&older, &newer] {
            store
                .put(
                    StoreScope::Requested,
                    StoreLocation::User,
                    &ExportedBundle::Certificate(cert.clone()),
                )
                .unwrap();
        }
        let err = store
            .put(
                StoreScope::Requested,
                StoreLocation::User,
                &ExportedBundle::Certificate(older.clone()),
            )
            .unwrap_err();
        assert!(matches!(err, CertMintError::StoreAccess(_)), "{err:?}");

        let subject = DistinguishedName::from_common_name("requested");
        let found = store.get(StoreScope::Requested, &subject).unwrap().unwrap();
        assert_eq!(found.certificate, newer);
        let all: Vec<_> = store
            .records(StoreScope::Requested, &subject)
            .into_iter()
            .map(|record| record.certificate)
            .collect();
        assert_eq!(all, vec![older, newer]);
        assert_eq!(store.len(StoreScope::Requested), 2);
        assert_eq!(store.put_count(), 2);
    }
}
