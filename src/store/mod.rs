//! Name-addressed certificate storage.
//!
//! Stores hold certificate bundles keyed by compartment ([`StoreScope`]) and
//! canonical subject name, in two tiers ([`StoreLocation`]). Lookups search
//! the machine tier first and then the user tier.

mod file;
mod memory;

use std::fmt;

pub use file::FileCertificateStore;
pub use memory::MemoryCertificateStore;

use crate::cert::Certificate;
use crate::cert::params::DistinguishedName;
use crate::error::Result;
use crate::key::KeyPair;
use crate::pkcs12::{Pkcs12Bundle, Pkcs12Exporter};

/// Store compartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreScope {
    /// Issued leaf certificates.
    My,
    /// Authority roots.
    Root,
    /// Certificates issued for signing requests. The requester holds the key,
    /// so these records never carry one. One subject may have many records,
    /// told apart by serial number.
    Requested,
}

impl StoreScope {
    /// Whether records in this scope are keyed by subject and serial number
    /// rather than by subject alone.
    pub fn keyed_by_serial(self) -> bool {
        matches!(self, StoreScope::Requested)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StoreScope::My => "my",
            StoreScope::Root => "root",
            StoreScope::Requested => "requested",
        }
    }
}

impl fmt::Display for StoreScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreLocation {
    Machine,
    #[default]
    User,
}

impl StoreLocation {
    /// Tiers in lookup order.
    pub const SEARCH_ORDER: [StoreLocation; 2] = [StoreLocation::Machine, StoreLocation::User];

    pub fn as_str(self) -> &'static str {
        match self {
            StoreLocation::Machine => "machine",
            StoreLocation::User => "user",
        }
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A certificate and, when the engine generated it, its private key.
#[derive(Debug, Clone)]
pub struct StoredBundle {
    pub certificate: Certificate,
    pub key: Option<KeyPair>,
}

/// What the engine hands to [`CertificateStore::put`].
#[derive(Debug, Clone)]
pub enum ExportedBundle {
    /// Certificate and key, password protected.
    Pkcs12(Pkcs12Bundle),
    /// A certificate whose key belongs to someone else.
    Certificate(Certificate),
}

impl ExportedBundle {
    /// Opens the bundle into the certificate and key it carries.
    pub fn open(&self) -> Result<StoredBundle> {
        match self {
            ExportedBundle::Pkcs12(bundle) => Pkcs12Exporter.import(bundle),
            ExportedBundle::Certificate(certificate) => Ok(StoredBundle {
                certificate: certificate.clone(),
                key: None,
            }),
        }
    }
}

/// Get and put of certificate bundles by subject name.
///
/// A miss is `Ok(None)`, not an error. `put` must either persist both the
/// certificate and its key or fail. Records are write-once: `put` fails with
/// [`CertMintError::StoreAccess`](crate::error::CertMintError::StoreAccess)
/// rather than replace one. In scopes where [`StoreScope::keyed_by_serial`]
/// holds, `get` answers with the most recently issued record for the subject.
/// Callers never assume a `put` is visible to another process.
pub trait CertificateStore {
    /// Looks `subject` up in `scope`, machine tier first.
    fn get(&self, scope: StoreScope, subject: &DistinguishedName) -> Result<Option<StoredBundle>>;

    /// Persists `bundle` under its certificate's subject in `scope` at `location`.
    fn put(
        &mut self,
        scope: StoreScope,
        location: StoreLocation,
        bundle: &ExportedBundle,
    ) -> Result<()>;
}

impl<S: CertificateStore + ?Sized> CertificateStore for &mut S {
    fn get(&self, scope: StoreScope, subject: &DistinguishedName) -> Result<Option<StoredBundle>> {
        (**self).get(scope, subject)
    }

    fn put(
        &mut self,
        scope: StoreScope,
        location: StoreLocation,
        bundle: &ExportedBundle,
    ) -> Result<()> {
        (**self).put(scope, location, bundle)
    }
}
