//! Usage kinds and the extension profile each one is issued with.

use std::fmt;
use std::str::FromStr;

use crate::cert::extensions::{
    BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, KeyUsage, KeyUsages,
};
use crate::cert::params::ExtensionParam;
use crate::error::{CertMintError, Result};

/// What an issued certificate is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Usage {
    /// A root authority that signs other certificates.
    Authority,
    /// A TLS server (also usable as a TLS client).
    Server,
    /// A TLS client.
    Client,
    /// Code signing.
    Code,
}

impl Usage {
    pub const ALL: [Usage; 4] = [Usage::Authority, Usage::Server, Usage::Client, Usage::Code];

    pub fn profile(self) -> &'static ExtensionProfile {
        ExtensionProfile::for_usage(self)
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Usage::Authority => "Authority",
            Usage::Server => "Server",
            Usage::Client => "Client",
            Usage::Code => "Code",
        })
    }
}

impl FromStr for Usage {
    type Err = CertMintError;

    fn from_str(s: &str) -> Result<Self> {
        Usage::ALL
            .into_iter()
            .find(|usage| usage.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CertMintError::UnknownUsage(s.to_string()))
    }
}

/// The fixed set of extensions for one [`Usage`].
///
/// Every extension in a profile is critical. Order is BasicConstraints,
/// KeyUsage, then ExtendedKeyUsage when the profile has any.
#[derive(Debug)]
pub struct ExtensionProfile {
    pub is_ca: bool,
    pub key_usage: &'static [KeyUsages],
    pub extended_key_usage: &'static [ExtendedKeyUsageOption],
}

const LEAF_KEY_USAGE: &[KeyUsages] = &[
    KeyUsages::DigitalSignature,
    KeyUsages::NonRepudiation,
    KeyUsages::KeyEncipherment,
];

const AUTHORITY: ExtensionProfile = ExtensionProfile {
    is_ca: true,
    key_usage: &[KeyUsages::KeyCertSign, KeyUsages::CRLSign],
    extended_key_usage: &[],
};

const SERVER: ExtensionProfile = ExtensionProfile {
    is_ca: false,
    key_usage: LEAF_KEY_USAGE,
    extended_key_usage: &[
        ExtendedKeyUsageOption::ServerAuth,
        ExtendedKeyUsageOption::ClientAuth,
    ],
};

const CLIENT: ExtensionProfile = ExtensionProfile {
    is_ca: false,
    key_usage: LEAF_KEY_USAGE,
    extended_key_usage: &[ExtendedKeyUsageOption::ClientAuth],
};

const CODE: ExtensionProfile = ExtensionProfile {
    is_ca: false,
    key_usage: LEAF_KEY_USAGE,
    extended_key_usage: &[ExtendedKeyUsageOption::CodeSigning],
};

impl ExtensionProfile {
    pub fn for_usage(usage: Usage) -> &'static ExtensionProfile {
        match usage {
            Usage::Authority => &AUTHORITY,
            Usage::Server => &SERVER,
            Usage::Client => &CLIENT,
            Usage::Code => &CODE,
        }
    }

    /// Encodes the profile as certificate extensions.
    pub fn extensions(&self) -> Result<Vec<ExtensionParam>> {
        let mut extensions = vec![
            ExtensionParam::from_extension(
                BasicConstraints {
                    is_ca: self.is_ca,
                    max_path_length: None,
                },
                true,
            )?,
            ExtensionParam::from_extension(KeyUsage::from_usages(self.key_usage), true)?,
        ];
        if !self.extended_key_usage.is_empty() {
            extensions.push(ExtensionParam::from_extension(
                ExtendedKeyUsage {
                    usage: self.extended_key_usage.to_vec(),
                },
                true,
            )?);
        }
        Ok(extensions)
    }
}
