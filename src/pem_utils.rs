use crate::error::{CertMintError, Result};

/// Convert DER‑encoded data into a PEM‑encoded string with the provided label.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let pem = pem::Pem::new(label, der);
    pem::encode_config(&pem, pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF))
}

/// Convert the first PEM block carrying one of `labels` to DER‑encoded bytes.
pub fn pem_to_der(input: impl AsRef<[u8]>, labels: &[&str]) -> Result<Vec<u8>> {
    let blocks = pem::parse_many(input)?;
    if blocks.is_empty() {
        return Err(CertMintError::DecodingError("no PEM block found".to_string()));
    }
    blocks
        .into_iter()
        .find(|block| labels.contains(&block.tag()))
        .map(|block| block.into_contents())
        .ok_or_else(|| {
            CertMintError::DecodingError(format!("no PEM block labelled {}", labels.join(" or ")))
        })
}
