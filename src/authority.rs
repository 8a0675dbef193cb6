//! The certificate authority engine.
//!
//! [`AuthorityManager`] resolves or creates a self-signed root, then issues
//! leaf certificates from a subject name or from a verified signing request,
//! persisting every new record through a [`CertificateStore`].

use std::collections::HashMap;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::builder::CertificateBuilder;
use crate::cert::params::{DistinguishedName, Validity};
use crate::cert::{Certificate, CertificateWithPrivateKey};
use crate::config::EngineConfig;
use crate::csr::CsrProcessor;
use crate::error::{CertMintError, Result};
use crate::issuer::{Issuer, SelfIssuer};
use crate::key::{KeyPair, PublicKey};
use crate::pkcs12::{Pkcs12Exporter, generate_password};
use crate::profile::Usage;
use crate::provider::{CryptoProvider, RustCryptoProvider};
use crate::store::{CertificateStore, ExportedBundle, StoreScope, StoredBundle};

/// Issues certificates under one root authority.
///
/// The lookup cache is owned by the manager and lives exactly as long as it
/// does. It is never shared; mutating operations take `&mut self`, so a
/// service issuing concurrently must put each manager behind its own lock.
pub struct AuthorityManager<S, P = RustCryptoProvider> {
    store: S,
    provider: P,
    config: EngineConfig,
    authority: Option<DistinguishedName>,
    cache: HashMap<(StoreScope, DistinguishedName), StoredBundle>,
}

impl<S: CertificateStore> AuthorityManager<S> {
    pub fn new(store: S, authority: Option<DistinguishedName>, config: EngineConfig) -> Self {
        Self::with_provider(store, RustCryptoProvider, authority, config)
    }
}

impl<S: CertificateStore, P: CryptoProvider> AuthorityManager<S, P> {
    pub fn with_provider(
        store: S,
        provider: P,
        authority: Option<DistinguishedName>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            provider,
            config,
            authority,
            cache: HashMap::new(),
        }
    }

    pub fn authority(&self) -> Option<&DistinguishedName> {
        self.authority.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Returns the root named `name`, creating and persisting it on a miss.
    ///
    /// A stored root without its private key cannot sign and is reported as
    /// [`CertMintError::MissingRootAuthority`].
    pub fn get_or_create_authority(
        &mut self,
        name: &DistinguishedName,
    ) -> Result<CertificateWithPrivateKey> {
        self.get_or_create_root(name, 0)
    }

    /// Issues a certificate for `subject_name`, or returns the one already
    /// stored for it.
    ///
    /// With [`Usage::Authority`] the subject itself is the root to get or
    /// create. Any other usage needs the configured authority name, and the
    /// subject may not be that name.
    /// A `validity_days` of 0 selects the usage default.
    pub fn generate_certificate(
        &mut self,
        subject_name: &str,
        usage: Usage,
        validity_days: u32,
    ) -> Result<Certificate> {
        let subject = DistinguishedName::parse(subject_name)?;
        if usage == Usage::Authority {
            return Ok(self.get_or_create_root(&subject, validity_days)?.cert);
        }

        let authority = self.configured_authority()?;
        reject_authority_name(&subject, &authority)?;
        let days = self.validity_days(usage, validity_days);
        let validity = self.validity(days)?;
        let root = self.get_or_create_authority(&authority)?;
        if let Some(existing) = self.lookup(StoreScope::My, &subject)? {
            return Ok(existing.certificate);
        }

        let key = self.provider.generate_key_pair(self.config.rsa_bits)?;
        let certificate = self.issue(&subject, key.public_key(), usage, validity, &root)?;
        info!(
            subject = %subject,
            %usage,
            issuer = %authority,
            days,
            "issued certificate"
        );

        let bundle = self.export(&certificate, &key)?;
        self.persist(StoreScope::My, &subject, bundle)?;
        Ok(certificate)
    }

    /// Issues a certificate for the subject and key of a PKCS#10 request.
    ///
    /// The root must already exist; it is never created here. The request
    /// is parsed and its signature verified before the root is resolved, so
    /// a rejected request never touches the store. A request naming the
    /// authority itself is refused whatever the usage. Every call issues a new
    /// certificate, recorded in [`StoreScope::Requested`] beside any earlier
    /// ones for the same subject.
    pub fn sign_certificate_request(
        &mut self,
        csr_pem: &[u8],
        usage: Usage,
        validity_days: u32,
    ) -> Result<Certificate> {
        let authority = self.configured_authority()?;

        let processor = CsrProcessor::new(&self.provider);
        let csr = processor.parse(csr_pem)?;
        if !processor.verify(&csr)? {
            warn!(subject = %csr.subject, "rejected signing request with a bad signature");
            return Err(CertMintError::InvalidCsrSignature);
        }
        reject_authority_name(&csr.subject, &authority)?;

        let days = self.validity_days(usage, validity_days);
        let validity = self.validity(days)?;
        let root = self.existing_root(&authority)?;
        let certificate = self.issue(&csr.subject, csr.public_key, usage, validity, &root)?;
        info!(
            subject = %csr.subject,
            %usage,
            issuer = %authority,
            days,
            "signed certificate request"
        );

        self.persist(
            StoreScope::Requested,
            &csr.subject,
            ExportedBundle::Certificate(certificate.clone()),
        )?;
        Ok(certificate)
    }

    fn configured_authority(&self) -> Result<DistinguishedName> {
        self.authority.clone().ok_or_else(|| {
            CertMintError::MissingRootAuthority("no authority name was given".to_string())
        })
    }

    fn get_or_create_root(
        &mut self,
        name: &DistinguishedName,
        validity_days: u32,
    ) -> Result<CertificateWithPrivateKey> {
        if let Some(existing) = self.lookup(StoreScope::Root, name)? {
            return signing_root(name, existing);
        }

        let days = self.validity_days(Usage::Authority, validity_days);
        let validity = self.validity(days)?;
        let key = self.provider.generate_key_pair(self.config.rsa_bits)?;
        let issuer = SelfIssuer {
            name: name.clone(),
            key: &key,
        };
        let cert = self.issue(name, key.public_key(), Usage::Authority, validity, &issuer)?;
        info!(subject = %name, days, bits = key.bits(), "created root authority");

        let bundle = self.export(&cert, &key)?;
        self.persist(StoreScope::Root, name, bundle)?;
        Ok(CertificateWithPrivateKey { cert, key })
    }

    /// Resolves a stored root without ever creating one.
    fn existing_root(&mut self, name: &DistinguishedName) -> Result<CertificateWithPrivateKey> {
        match self.lookup(StoreScope::Root, name)? {
            Some(existing) => signing_root(name, existing),
            None => Err(CertMintError::MissingRootAuthority(format!(
                "no stored root named {name}"
            ))),
        }
    }

    fn validity(&self, days: u32) -> Result<Validity> {
        Validity::backdated(
            OffsetDateTime::now_utc(),
            i64::from(days),
            self.config.backdate,
        )
    }

    fn issue(
        &self,
        subject: &DistinguishedName,
        public_key: PublicKey,
        usage: Usage,
        validity: Validity,
        issuer: &dyn Issuer,
    ) -> Result<Certificate> {
        CertificateBuilder::new()
            .subject(subject.clone())
            .public_key(public_key)
            .validity(validity)
            .signature_algorithm(self.config.signature_algorithm())
            .extensions(usage.profile().extensions()?)
            .sign(issuer, &self.provider)
    }

    fn export(&self, certificate: &Certificate, key: &KeyPair) -> Result<ExportedBundle> {
        let password = match &self.config.export_password {
            Some(password) => password.clone(),
            None => generate_password(&self.provider),
        };
        let bundle = Pkcs12Exporter.export(certificate, key, &password)?;
        Ok(ExportedBundle::Pkcs12(bundle))
    }

    fn lookup(
        &mut self,
        scope: StoreScope,
        subject: &DistinguishedName,
    ) -> Result<Option<StoredBundle>> {
        let cache_key = (scope, subject.clone());
        if let Some(cached) = self.cache.get(&cache_key) {
            debug!(%scope, subject = %subject, "cache hit");
            return Ok(Some(cached.clone()));
        }
        let found = self.store.get(scope, subject)?;
        match &found {
            Some(bundle) => {
                debug!(%scope, subject = %subject, "store hit");
                self.cache.insert(cache_key, bundle.clone());
            }
            None => debug!(%scope, subject = %subject, "not found"),
        }
        Ok(found)
    }

    fn persist(
        &mut self,
        scope: StoreScope,
        subject: &DistinguishedName,
        bundle: ExportedBundle,
    ) -> Result<()> {
        let location = self.config.location;
        if let Err(err) = self.store.put(scope, location, &bundle) {
            warn!(%scope, %location, subject = %subject, error = %err, "could not persist certificate");
            return Err(CertMintError::PersistFailed {
                subject: subject.to_string(),
                reason: err.to_string(),
            });
        }
        self.cache.insert((scope, subject.clone()), bundle.open()?);
        Ok(())
    }

    fn validity_days(&self, usage: Usage, requested: u32) -> u32 {
        match (requested, usage) {
            (0, Usage::Authority) => self.config.authority_validity_days,
            (0, _) => self.config.leaf_validity_days,
            (days, _) => days,
        }
    }
}

/// A stored root can only sign when its private key came back with it.
fn signing_root(name: &DistinguishedName, stored: StoredBundle) -> Result<CertificateWithPrivateKey> {
    let key = stored.key.ok_or_else(|| {
        CertMintError::MissingRootAuthority(format!("stored root {name} has no private key"))
    })?;
    Ok(CertificateWithPrivateKey {
        cert: stored.certificate,
        key,
    })
}

/// Nothing but the root may carry the authority's name.
fn reject_authority_name(subject: &DistinguishedName, authority: &DistinguishedName) -> Result<()> {
    if subject != authority {
        return Ok(());
    }
    warn!(subject = %subject, "rejected a leaf named after the authority");
    Err(CertMintError::InvalidInput(format!(
        "subject {subject} is the authority's own name"
    )))
}
