use std::fmt;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{CertificateStore, ExportedBundle, StoreLocation, StoreScope, StoredBundle};
use crate::cert::Certificate;
use crate::cert::params::DistinguishedName;
use crate::error::{CertMintError, Result};
use crate::key::KeyPair;
use crate::pem_utils::der_to_pem;

const CERTIFICATE_LABEL: &str = "CERTIFICATE";
const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";
const ENCRYPTED_PRIVATE_KEY_LABEL: &str = "ENCRYPTED PRIVATE KEY";
const APP_DIR: &str = "certmint";

/// A two-tier store on the local filesystem.
///
/// Each tier is a directory. A record lives at
/// `<tier>/<scope>/<sha256 of canonical subject>.pem` and holds the
/// certificate followed by its PKCS#8 private key when one is known. In
/// scopes keyed by serial number the file is
/// `<sha256 of canonical subject>-<serial>.pem` instead. Files are never
/// overwritten.
///
/// With a key password the key is written as an `ENCRYPTED PRIVATE KEY`.
/// Without one it is written in the clear and only the 0600 file mode
/// protects it.
#[derive(Clone)]
pub struct FileCertificateStore {
    machine_root: PathBuf,
    user_root: PathBuf,
    key_password: Option<String>,
}

impl fmt::Debug for FileCertificateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCertificateStore")
            .field("machine_root", &self.machine_root)
            .field("user_root", &self.user_root)
            .field("key_password", &self.key_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl FileCertificateStore {
    pub fn new(machine_root: impl Into<PathBuf>, user_root: impl Into<PathBuf>) -> Self {
        Self {
            machine_root: machine_root.into(),
            user_root: user_root.into(),
            key_password: None,
        }
    }

    /// Encrypts private keys written from now on, and decrypts stored ones,
    /// with `password`.
    pub fn with_key_password(mut self, password: impl Into<String>) -> Self {
        self.key_password = Some(password.into());
        self
    }

    /// Both tiers below one directory, as `<dir>/machine` and `<dir>/user`.
    pub fn with_root(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(
            dir.join(StoreLocation::Machine.as_str()),
            dir.join(StoreLocation::User.as_str()),
        )
    }

    /// The platform locations: a system-wide data directory for the machine
    /// tier and the user's local data directory for the user tier.
    pub fn default_location() -> Result<Self> {
        let user_root = dirs::data_local_dir()
            .ok_or_else(|| {
                CertMintError::StoreAccess("no local data directory for this user".to_string())
            })?
            .join(APP_DIR);
        Ok(Self::new(machine_data_dir(), user_root))
    }

    pub fn root(&self, location: StoreLocation) -> &Path {
        match location {
            StoreLocation::Machine => &self.machine_root,
            StoreLocation::User => &self.user_root,
        }
    }

    /// Where the record for `subject` lives in one tier, for scopes keyed by
    /// subject alone.
    pub fn record_path(
        &self,
        location: StoreLocation,
        scope: StoreScope,
        subject: &DistinguishedName,
    ) -> PathBuf {
        self.root(location)
            .join(scope.as_str())
            .join(format!("{}.pem", record_id(subject)))
    }

    /// Where `certificate` is written in one tier.
    fn certificate_path(
        &self,
        location: StoreLocation,
        scope: StoreScope,
        subject: &DistinguishedName,
        certificate: &Certificate,
    ) -> PathBuf {
        if !scope.keyed_by_serial() {
            return self.record_path(location, scope, subject);
        }
        self.root(location).join(scope.as_str()).join(format!(
            "{}-{}.pem",
            record_id(subject),
            hex::encode(certificate.serial_number())
        ))
    }

    /// Every serial-keyed record file for `subject` in one tier.
    fn serial_records(
        &self,
        location: StoreLocation,
        scope: StoreScope,
        subject: &DistinguishedName,
    ) -> Result<Vec<PathBuf>> {
        let dir = self.root(location).join(scope.as_str());
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let prefix = format!("{}-", record_id(subject));
        let mut paths = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(".pem"));
            if matches && path.is_file() {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    fn get_latest(
        &self,
        location: StoreLocation,
        scope: StoreScope,
        subject: &DistinguishedName,
    ) -> Result<Option<StoredBundle>> {
        let mut latest: Option<StoredBundle> = None;
        for path in self.serial_records(location, scope, subject)? {
            debug!(%scope, %location, path = %path.display(), "reading stored record");
            let record = self.read_record(&path)?;
            if record.certificate.subject()? != *subject {
                continue;
            }
            let newer = latest.as_ref().is_none_or(|current| {
                (record.certificate.not_before(), record.certificate.serial_number())
                    > (current.certificate.not_before(), current.certificate.serial_number())
            });
            if newer {
                latest = Some(record);
            }
        }
        Ok(latest)
    }

    fn read_record(&self, path: &Path) -> Result<StoredBundle> {
        let contents = fs::read(path)?;
        let blocks = pem::parse_many(&contents)?;
        let mut certificate = None;
        let mut key = None;
        for block in blocks {
            match block.tag() {
                CERTIFICATE_LABEL if certificate.is_none() => {
                    certificate = Some(Certificate::from_der(block.contents())?)
                }
                PRIVATE_KEY_LABEL if key.is_none() => {
                    key = Some(KeyPair::from_pkcs8_der(block.contents())?)
                }
                ENCRYPTED_PRIVATE_KEY_LABEL if key.is_none() => {
                    let password = self.key_password.as_deref().ok_or_else(|| {
                        CertMintError::StoreAccess(format!(
                            "{} holds an encrypted key and no key password was given",
                            path.display()
                        ))
                    })?;
                    let decrypted = KeyPair::from_pkcs8_encrypted_der(block.contents(), password)
                        .map_err(|e| {
                            CertMintError::StoreAccess(format!("{}: {e}", path.display()))
                        })?;
                    key = Some(decrypted);
                }
                _ => {}
            }
        }
        let certificate = certificate.ok_or_else(|| {
            CertMintError::StoreAccess(format!("{} holds no certificate", path.display()))
        })?;
        Ok(StoredBundle { certificate, key })
    }

    fn encode_key(&self, key: &KeyPair) -> Result<String> {
        Ok(match &self.key_password {
            Some(password) => der_to_pem(
                &key.to_pkcs8_encrypted_der(password)?,
                ENCRYPTED_PRIVATE_KEY_LABEL,
            ),
            None => der_to_pem(&key.to_pkcs8_der()?, PRIVATE_KEY_LABEL),
        })
    }
}

fn record_id(subject: &DistinguishedName) -> String {
    hex::encode(Sha256::digest(subject.canonical().as_bytes()))
}

#[cfg(windows)]
fn machine_data_dir() -> PathBuf {
    std::env::var_os("ProgramData")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(r"C:\ProgramData"))
        .join(APP_DIR)
}

#[cfg(not(windows))]
fn machine_data_dir() -> PathBuf {
    PathBuf::from("/var/lib").join(APP_DIR)
}

fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

impl CertificateStore for FileCertificateStore {
    fn get(&self, scope: StoreScope, subject: &DistinguishedName) -> Result<Option<StoredBundle>> {
        for location in StoreLocation::SEARCH_ORDER {
            if scope.keyed_by_serial() {
                if let Some(record) = self.get_latest(location, scope, subject)? {
                    return Ok(Some(record));
                }
                continue;
            }
            let path = self.record_path(location, scope, subject);
            if !path.is_file() {
                continue;
            }
            debug!(%scope, %location, path = %path.display(), "reading stored record");
            let record = self.read_record(&path)?;
            // a hash collision or a hand-edited file must not answer for another name
            if record.certificate.subject()? == *subject {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn put(
        &mut self,
        scope: StoreScope,
        location: StoreLocation,
        bundle: &ExportedBundle,
    ) -> Result<()> {
        let stored = bundle.open()?;
        let subject = stored.certificate.subject()?;

        let path = self.certificate_path(location, scope, &subject, &stored.certificate);
        if path.exists() {
            return Err(CertMintError::StoreAccess(format!(
                "{} already holds a record for {subject}",
                path.display()
            )));
        }

        let mut contents = der_to_pem(&stored.certificate.to_der()?, CERTIFICATE_LABEL);
        if let Some(key) = &stored.key {
            contents.push_str(&self.encode_key(key)?);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_private(&path, contents.as_bytes())?;

        info!(%scope, %location, subject = %subject, path = %path.display(), "stored certificate");
        Ok(())
    }
}
