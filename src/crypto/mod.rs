//! Key material and the ZKI security code.
//!
//! The private key is never reached through a global: every operation that
//! signs takes a [`SigningKey`], so tests and alternative key stores can
//! substitute their own implementation.

mod certificate;
mod zki;

pub use certificate::FiscalCertificate;
pub use zki::compute_zki;

use chrono::{DateTime, Utc};

use crate::core::SigningError;

/// An RSA signing capability bound to one leaf certificate.
///
/// Implementations must be pure with respect to their inputs and safe to
/// call from many tasks at once.
pub trait SigningKey: Send + Sync {
    /// PKCS#1 v1.5 signature over the SHA-1 digest of `data`.
    fn sign_rsa_sha1(&self, data: &[u8]) -> Result<Vec<u8>, SigningError>;

    /// DER encoding of the leaf certificate.
    fn certificate_der(&self) -> &[u8];

    /// Issuer distinguished name in RFC 2253 form.
    fn issuer_name(&self) -> &str;

    /// Certificate serial number in decimal.
    fn serial_number(&self) -> &str;

    /// Whether the certificate covers the given instant.
    fn is_valid_at(&self, at: DateTime<Utc>) -> bool;
}

impl<K: SigningKey + ?Sized> SigningKey for std::sync::Arc<K> {
    fn sign_rsa_sha1(&self, data: &[u8]) -> Result<Vec<u8>, SigningError> {
        (**self).sign_rsa_sha1(data)
    }

    fn certificate_der(&self) -> &[u8] {
        (**self).certificate_der()
    }

    fn issuer_name(&self) -> &str {
        (**self).issuer_name()
    }

    fn serial_number(&self) -> &str {
        (**self).serial_number()
    }

    fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        (**self).is_valid_at(at)
    }
}
