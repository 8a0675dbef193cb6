use std::fmt;
use std::str::FromStr;

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::{Tag, Tagged};
use der::asn1::SetOfVec;
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

use super::extensions::ToAndFromX509Extension;
use crate::error::{CertMintError, Result};

const CN: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const OU: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
const O: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const L: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const ST: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const C: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");

/// Distinguished name of a certificate subject or issuer.
///
/// Two names are equal when their canonical forms are equal: the attribute
/// order of the text they were parsed from does not matter. The canonical
/// form lists the present attributes as `CN, OU, O, L, ST, C`.
///
/// # Fields
/// * `common_name` - The common name (CN).
/// * `organization_unit` - The organizational unit (OU).
/// * `organization` - The organization (O).
/// * `locality` - The locality or city (L).
/// * `state` - The state or province (ST).
/// * `country` - The two letter country code (C).
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq, Hash)]
pub struct DistinguishedName {
    pub common_name: String,
    pub organization_unit: Option<String>,
    pub organization: Option<String>,
    pub locality: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Attribute {
    CommonName,
    OrganizationUnit,
    Organization,
    Locality,
    State,
    Country,
}

impl Attribute {
    fn from_key(key: &str) -> Option<Self> {
        let attribute = match key.to_ascii_lowercase().as_str() {
            "cn" | "commonname" | "2.5.4.3" => Attribute::CommonName,
            "ou" | "organizationalunitname" | "2.5.4.11" => Attribute::OrganizationUnit,
            "o" | "organizationname" | "2.5.4.10" => Attribute::Organization,
            "l" | "localityname" | "2.5.4.7" => Attribute::Locality,
            "st" | "s" | "stateorprovincename" | "2.5.4.8" => Attribute::State,
            "c" | "countryname" | "2.5.4.6" => Attribute::Country,
            _ => return None,
        };
        Some(attribute)
    }

    fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        match *oid {
            CN => Some(Attribute::CommonName),
            OU => Some(Attribute::OrganizationUnit),
            O => Some(Attribute::Organization),
            L => Some(Attribute::Locality),
            ST => Some(Attribute::State),
            C => Some(Attribute::Country),
            _ => None,
        }
    }

    fn oid(self) -> ObjectIdentifier {
        match self {
            Attribute::CommonName => CN,
            Attribute::OrganizationUnit => OU,
            Attribute::Organization => O,
            Attribute::Locality => L,
            Attribute::State => ST,
            Attribute::Country => C,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Attribute::CommonName => "CN",
            Attribute::OrganizationUnit => "OU",
            Attribute::Organization => "O",
            Attribute::Locality => "L",
            Attribute::State => "ST",
            Attribute::Country => "C",
        }
    }
}

impl DistinguishedName {
    /// A name consisting of a common name only.
    pub fn from_common_name(common_name: impl Into<String>) -> Self {
        DistinguishedName {
            common_name: common_name.into(),
            ..Default::default()
        }
    }

    /// Parses RFC 4514 style text such as `CN=host,O=Example`.
    ///
    /// Attribute types are case-insensitive and may appear in any order.
    /// Text without any `=` is taken as a bare common name. Values may escape
    /// special characters with a backslash.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(invalid("name is empty"));
        }
        if !text.contains('=') {
            return Self::from_common_name(text).validated();
        }

        let mut name = DistinguishedName::default();
        let mut seen_common_name = false;
        for part in split_unescaped(text)? {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| invalid(&format!("'{part}' is not a key=value pair")))?;
            let attribute = Attribute::from_key(key.trim())
                .ok_or_else(|| invalid(&format!("unsupported attribute type '{}'", key.trim())))?;
            let value = unescape(value.trim())?;
            if value.is_empty() {
                return Err(invalid(&format!("{} has an empty value", attribute.label())));
            }
            name.set_once(attribute, value, &mut seen_common_name)?;
        }
        name.validated()
    }

    /// Stores one attribute value; a second value for the same attribute fails.
    fn set_once(
        &mut self,
        attribute: Attribute,
        value: String,
        seen_common_name: &mut bool,
    ) -> Result<()> {
        let slot = match attribute {
            Attribute::CommonName => {
                if std::mem::replace(seen_common_name, true) {
                    return Err(repeated(attribute));
                }
                self.common_name = value;
                return Ok(());
            }
            Attribute::OrganizationUnit => &mut self.organization_unit,
            Attribute::Organization => &mut self.organization,
            Attribute::Locality => &mut self.locality,
            Attribute::State => &mut self.state,
            Attribute::Country => &mut self.country,
        };
        if slot.replace(value).is_some() {
            return Err(repeated(attribute));
        }
        Ok(())
    }

    fn validated(self) -> Result<Self> {
        if self.common_name.trim().is_empty() {
            return Err(invalid("CN is required"));
        }
        if let Some(country) = &self.country {
            if country.len() != 2 || !country.bytes().all(|b| b.is_ascii_alphabetic()) {
                return Err(invalid(&format!(
                    "country '{country}' is not a two letter code"
                )));
            }
        }
        Ok(self)
    }

    fn attributes(&self) -> impl Iterator<Item = (Attribute, &str)> {
        [
            (Attribute::CommonName, Some(self.common_name.as_str())),
            (
                Attribute::OrganizationUnit,
                self.organization_unit.as_deref(),
            ),
            (Attribute::Organization, self.organization.as_deref()),
            (Attribute::Locality, self.locality.as_deref()),
            (Attribute::State, self.state.as_deref()),
            (Attribute::Country, self.country.as_deref()),
        ]
        .into_iter()
        .filter_map(|(attribute, value)| value.map(|v| (attribute, v)))
    }

    /// The canonical string form used for equality and store lookup.
    pub fn canonical(&self) -> String {
        self.attributes()
            .map(|(attribute, value)| format!("{}={}", attribute.label(), escape(value)))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Converts the distinguished name to an X.509-compatible format.
    ///
    /// RDNs are encoded most significant first (C ... CN), one attribute per
    /// RDN. The country is a PrintableString, everything else UTF8String.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName> {
        let mut rdns = Vec::new();
        for (attribute, value) in self.attributes() {
            let tag = if attribute == Attribute::Country {
                Tag::PrintableString
            } else {
                Tag::Utf8String
            };
            let atv = AttributeTypeAndValue {
                oid: attribute.oid(),
                value: der::Any::new(tag, value.as_bytes().to_vec())?,
            };
            rdns.push(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?));
        }
        rdns.reverse();
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    ///
    /// A repeated attribute fails rather than overwriting the earlier value.
    pub fn from_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> Result<Self> {
        let mut name = DistinguishedName::default();
        let mut seen_common_name = false;
        for rdn in x509dn.0.iter() {
            for atv in rdn.0.iter() {
                let attribute = Attribute::from_oid(&atv.oid).ok_or_else(|| {
                    invalid(&format!("unsupported attribute type {}", atv.oid))
                })?;
                let value = match atv.value.tag() {
                    Tag::Utf8String | Tag::PrintableString | Tag::Ia5String => {
                        std::str::from_utf8(atv.value.value())
                            .map_err(|e| invalid(&e.to_string()))?
                            .to_string()
                    }
                    other => {
                        return Err(invalid(&format!(
                            "{} uses unsupported string type {other}",
                            attribute.label()
                        )));
                    }
                };
                name.set_once(attribute, value, &mut seen_common_name)?;
            }
        }
        name.validated()
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for DistinguishedName {
    type Err = CertMintError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn invalid(reason: &str) -> CertMintError {
    CertMintError::InvalidDistinguishedName(reason.to_string())
}

fn repeated(attribute: Attribute) -> CertMintError {
    invalid(&format!("{} appears more than once", attribute.label()))
}

/// Splits on `,`, `;` and `+` that are not preceded by a backslash.
fn split_unescaped(text: &str) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (index, ch) in text.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ',' | ';' | '+' => {
                parts.push(text[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
    }
    if escaped {
        return Err(invalid("trailing escape character"));
    }
    parts.push(text[start..].trim());
    if parts.iter().any(|part| part.is_empty()) {
        return Err(invalid("empty relative distinguished name"));
    }
    Ok(parts)
}

fn unescape(value: &str) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            let next = chars
                .next()
                .ok_or_else(|| invalid("trailing escape character"))?;
            out.push(next);
        } else {
            out.push(ch);
        }
    }
    Ok(out)
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (index, ch) in value.chars().enumerate() {
        let leading = index == 0 && (ch == '#' || ch == ' ');
        let trailing = index + 1 == value.chars().count() && ch == ' ';
        if matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=') || leading || trailing {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Certificate validity period.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Last year a four digit GeneralizedTime can carry.
    pub const MAX_NOT_AFTER_YEAR: i32 = 9999;

    /// Creates a validity period starting now for the given number of days.
    pub fn for_days(days: i64) -> Result<Self> {
        Self::backdated(OffsetDateTime::now_utc(), days, Duration::ZERO)
    }

    /// A validity window around `issued_at`: it opens `backdate` earlier to
    /// tolerate clock skew and closes `days` after `issued_at`.
    ///
    /// Fails with [`CertMintError::InvalidInput`] when either end falls
    /// outside what a certificate can encode.
    pub fn backdated(issued_at: OffsetDateTime, days: i64, backdate: Duration) -> Result<Self> {
        let not_before = issued_at.checked_sub(backdate).ok_or_else(|| {
            CertMintError::InvalidInput(format!("backdate of {backdate} is out of range"))
        })?;
        let not_after = days
            .checked_mul(86_400)
            .map(Duration::seconds)
            .and_then(|validity| issued_at.checked_add(validity))
            .filter(|end| end.year() <= Self::MAX_NOT_AFTER_YEAR)
            .ok_or_else(|| {
                CertMintError::InvalidInput(format!("a validity of {days} days is out of range"))
            })?;
        Ok(Self {
            not_before,
            not_after,
        })
    }

    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.not_before <= instant && instant <= self.not_after
    }
}

/// Represents an X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        E::from_x509_extension_value(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_order_does_not_matter() {
        let a = DistinguishedName::parse("CN=host, O=Example, C=US").unwrap();
        let b = DistinguishedName::parse("c=US;o=Example;cn=host").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.canonical(), "CN=host,O=Example,C=US");
    }

    #[test]
    fn test_bare_name_is_common_name() {
        let name = DistinguishedName::parse("www.example.org").unwrap();
        assert_eq!(name, DistinguishedName::from_common_name("www.example.org"));
        assert_eq!(name.to_string(), "CN=www.example.org");
    }

    #[test]
    fn test_escaped_separator_stays_in_value() {
        let name = DistinguishedName::parse(r"CN=Smith\, John,O=Acme").unwrap();
        assert_eq!(name.common_name, "Smith, John");
        assert_eq!(name.canonical(), r"CN=Smith\, John,O=Acme");
        assert_eq!(DistinguishedName::parse(&name.canonical()).unwrap(), name);
    }

    #[test]
    fn test_rejects_malformed_names() {
        for text in [
            "",
            "   ",
            "O=Example",
            "CN=",
            "CN=a,CN=b",
            "CN=a,,O=b",
            "CN=a,X=b",
            "CN=a,C=USA",
            "CN=a\\",
            "CN=a,garbage",
        ] {
            let err = DistinguishedName::parse(text).unwrap_err();
            assert!(
                matches!(err, CertMintError::InvalidDistinguishedName(_)),
                "{text:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_x509_name_round_trip() {
        let name = DistinguishedName::builder()
            .common_name("Test CA".to_string())
            .organization("Test Org".to_string())
            .country("US".to_string())
            .build();
        let x509 = name.as_x509_name().unwrap();
        assert_eq!(x509.0.len(), 3);
        let decoded = DistinguishedName::from_x509_name(&x509).unwrap();
        assert_eq!(decoded, name);
    }

    #[test]
    fn test_backdated_validity_contains_issuance() {
        let now = OffsetDateTime::now_utc();
        let validity = Validity::backdated(now, 730, Duration::days(1)).unwrap();
        assert!(validity.contains(now));
        assert_eq!(validity.not_after - validity.not_before, Duration::days(731));
    }

    #[test]
    fn test_validity_beyond_encodable_range_is_rejected() {
        let now = OffsetDateTime::now_utc();
        for days in [3_000_000, i64::from(u32::MAX), i64::MAX] {
            let err = Validity::backdated(now, days, Duration::days(1)).unwrap_err();
            assert!(matches!(err, CertMintError::InvalidInput(_)), "{days}: {err:?}");
        }
        let last_day = Validity::backdated(now, 365, Duration::days(1)).unwrap();
        assert!(last_day.not_after.year() <= Validity::MAX_NOT_AFTER_YEAR);
    }

    #[test]
    fn test_repeated_x509_attribute_is_rejected() {
        let mut x509 = DistinguishedName::parse("CN=h, OU=a")
            .unwrap()
            .as_x509_name()
            .unwrap();
        let second_unit = DistinguishedName::parse("CN=x, OU=b")
            .unwrap()
            .as_x509_name()
            .unwrap()
            .0
            .into_iter()
            .find(|rdn| rdn.0.iter().any(|atv| atv.oid == OU))
            .unwrap();
        x509.0.push(second_unit);
        let err = DistinguishedName::from_x509_name(&x509).unwrap_err();
        assert_eq!(
            err,
            CertMintError::InvalidDistinguishedName("OU appears more than once".into())
        );
    }
}
