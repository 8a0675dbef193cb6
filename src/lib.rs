//! # CertMint - A Pure Rust Private Certificate Authority
//!
//! CertMint issues X.509v3 certificates for a private certificate authority,
//! built entirely with rustcrypto libraries. It creates or reuses a
//! self-signed RSA root, then either generates a leaf certificate from a
//! subject name or signs an externally supplied PKCS#10 request.
//!
//! ## Usages
//!
//! Every certificate is issued for one [`profile::Usage`], which fixes its
//! extensions:
//!
//! - **Authority**: CA basic constraints, keyCertSign and cRLSign
//! - **Server**: serverAuth and clientAuth
//! - **Client**: clientAuth
//! - **Code**: codeSigning
//!
//! ## Key Features
//!
//! - **Get-or-create**: repeated requests for the same subject return the stored record
//! - **Two-tier storage**: machine tier searched before user tier
//! - **CSR signing**: requester keys (RSA, ECDSA P-256/P-384, Ed25519) carried unchanged
//! - **PKCS#12 export**: certificate and key bundled under a per-operation password
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use certmint::{
//!     authority::AuthorityManager,
//!     cert::params::DistinguishedName,
//!     config::EngineConfig,
//!     profile::Usage,
//!     store::MemoryCertificateStore,
//! };
//!
//! # fn main() -> Result<(), certmint::error::CertMintError> {
//! let mut manager = AuthorityManager::new(
//!     MemoryCertificateStore::new(),
//!     Some(DistinguishedName::from_common_name("Test CA")),
//!     EngineConfig::default(),
//! );
//!
//! // Creates "Test CA" on first use, then the leaf.
//! let leaf = manager.generate_certificate("www.example.org", Usage::Server, 0)?;
//! println!("{}", leaf.to_pem()?);
//!
//! // The second call returns the stored leaf.
//! let again = manager.generate_certificate("www.example.org", Usage::Server, 0)?;
//! assert_eq!(leaf, again);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use certmint::{cert::params::DistinguishedName, error::CertMintError};
//!
//! match DistinguishedName::parse("CN=host, XX=unknown") {
//!     Ok(name) => println!("parsed {name}"),
//!     Err(CertMintError::InvalidDistinguishedName(msg)) => println!("bad name: {msg}"),
//!     Err(e) => println!("other error: {e}"),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`authority`]: The engine: root resolution, issuance, CSR signing
//! - [`builder`]: Assembles and signs certificates
//! - [`cert`]: Certificate records, names, validity and extensions
//! - [`csr`]: PKCS#10 parsing and verification
//! - [`pkcs12`]: Password-protected export bundles
//! - [`profile`]: Usage to extension table
//! - [`serial`]: Serial number generation
//! - [`store`]: Certificate store contract and implementations
//! - [`provider`]: The cryptography seam

pub mod authority;
pub mod builder;
pub mod cert;
pub mod config;
pub mod csr;
pub mod error;
pub mod issuer;
pub mod key;
pub mod pem_utils;
pub mod pkcs12;
pub mod profile;
pub mod provider;
pub mod serial;
pub mod store;
pub mod tbs_certificate;
