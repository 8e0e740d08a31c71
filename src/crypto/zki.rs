//! ZKI (zaštitni kod izdavatelja) computation.
//!
//! The algorithm is fixed by the tax authority: RSA-SHA1 signature over the
//! [`zki_input`] string, MD5 over the raw signature bytes, lowercase hex.

use openssl::hash::{MessageDigest, hash};

use super::SigningKey;
use crate::core::{FiscalInvoiceRequest, SigningError, ZkiCode, zki_input};

/// Compute the issuer security code for a request.
///
/// Deterministic: PKCS#1 v1.5 signatures carry no randomness, so the same
/// key and fields always yield the same code.
///
/// # Errors
///
/// `CertificateNotValid` when the certificate does not cover the invoice
/// instant, `KeyUnusable` when the key refuses to sign.
pub fn compute_zki<K: SigningKey + ?Sized>(
    key: &K,
    request: &FiscalInvoiceRequest,
) -> Result<ZkiCode, SigningError> {
    if !key.is_valid_at(request.issued_at.to_utc()) {
        return Err(SigningError::CertificateNotValid(
            request.issued_at.zki_format(),
        ));
    }

    let input = zki_input(request);
    let signature = key.sign_rsa_sha1(input.as_bytes())?;
    let digest = hash(MessageDigest::md5(), &signature)
        .map_err(|e| SigningError::KeyUnusable(e.to_string()))?;

    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    tracing::debug!(invoice = %request.invoice_number, zki = %hex, "ZKI computed");
    ZkiCode::from_hex(&hex)
        .ok_or_else(|| SigningError::KeyUnusable(format!("unexpected digest '{hex}'")))
}
