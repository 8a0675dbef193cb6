#![allow(dead_code)]

use std::cell::Cell;

use certmint::authority::AuthorityManager;
use certmint::cert::SignatureAlgorithm;
use certmint::cert::params::DistinguishedName;
use certmint::config::EngineConfig;
use certmint::error::Result;
use certmint::key::{KeyPair, PublicKey};
use certmint::pem_utils::der_to_pem;
use certmint::provider::{CryptoProvider, RustCryptoProvider};
use certmint::store::CertificateStore;
use der::Encode;
use p256::ecdsa::signature::Signer;
use x509_cert::request::{CertReq, CertReqInfo, Version};

pub const AUTHORITY: &str = "Test CA";

/// Small keys keep the suite fast.
pub fn test_config() -> EngineConfig {
    EngineConfig::builder().rsa_bits(1024).build()
}

pub fn authority() -> DistinguishedName {
    DistinguishedName::from_common_name(AUTHORITY)
}

pub fn manager<S: CertificateStore>(store: S) -> AuthorityManager<S> {
    AuthorityManager::new(store, Some(authority()), test_config())
}

/// A manager whose root already exists, as signing requests need.
pub fn manager_with_root<S: CertificateStore>(store: S) -> AuthorityManager<S> {
    let mut manager = manager(store);
    manager.get_or_create_authority(&authority()).unwrap();
    manager
}

fn request_info(subject: &str, public_key: &PublicKey) -> CertReqInfo {
    CertReqInfo {
        version: Version::V1,
        subject: DistinguishedName::parse(subject)
            .unwrap()
            .as_x509_name()
            .unwrap(),
        public_key: public_key.to_spki().unwrap(),
        attributes: Default::default(),
    }
}

fn request_pem(info: CertReqInfo, algorithm: SignatureAlgorithm, signature: &[u8]) -> String {
    let request = CertReq {
        info,
        algorithm: algorithm.algorithm_identifier().unwrap(),
        signature: der::asn1::BitString::from_bytes(signature).unwrap(),
    };
    der_to_pem(&request.to_der().unwrap(), "CERTIFICATE REQUEST")
}

/// A PKCS#10 request for `subject` signed with `key` using SHA-256.
pub fn rsa_csr_pem(subject: &str, key: &KeyPair) -> String {
    let info = request_info(subject, &key.public_key());
    let signature = key
        .sign_data(SignatureAlgorithm::Sha256WithRsa, &info.to_der().unwrap())
        .unwrap();
    request_pem(info, SignatureAlgorithm::Sha256WithRsa, &signature)
}

/// A PKCS#10 request for `subject` with a fresh P-256 key.
pub fn p256_csr_pem(subject: &str) -> (String, PublicKey) {
    let signing_key = p256::ecdsa::SigningKey::random(&mut rand_core::OsRng);
    let public_key = PublicKey::EcdsaP256(*signing_key.verifying_key());
    let info = request_info(subject, &public_key);
    let signature: p256::ecdsa::DerSignature = signing_key.sign(&info.to_der().unwrap());
    let pem = request_pem(
        info,
        SignatureAlgorithm::EcdsaWithSha256,
        signature.as_bytes(),
    );
    (pem, public_key)
}

/// Flips one bit inside the signature of a PEM request.
pub fn tamper_signature(pem: &str) -> String {
    let der = certmint::pem_utils::pem_to_der(pem, &["CERTIFICATE REQUEST"]).unwrap();
    let mut request = <CertReq as der::Decode>::from_der(&der).unwrap();
    let mut signature = request.signature.raw_bytes().to_vec();
    let middle = signature.len() / 2;
    signature[middle] ^= 0x01;
    request.signature = der::asn1::BitString::from_bytes(&signature).unwrap();
    der_to_pem(&request.to_der().unwrap(), "CERTIFICATE REQUEST")
}

/// Delegates to [`RustCryptoProvider`] and counts key generations.
#[derive(Default)]
pub struct CountingProvider {
    pub key_generations: Cell<usize>,
}

impl CryptoProvider for CountingProvider {
    fn generate_key_pair(&self, bits: usize) -> Result<KeyPair> {
        self.key_generations.set(self.key_generations.get() + 1);
        RustCryptoProvider.generate_key_pair(bits)
    }

    fn sign(&self, key: &KeyPair, algorithm: SignatureAlgorithm, message: &[u8]) -> Result<Vec<u8>> {
        RustCryptoProvider.sign(key, algorithm, message)
    }

    fn verify(
        &self,
        key: &PublicKey,
        algorithm: SignatureAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool> {
        RustCryptoProvider.verify(key, algorithm, message, signature)
    }

    fn random_bytes(&self, buf: &mut [u8]) {
        RustCryptoProvider.random_bytes(buf)
    }
}
