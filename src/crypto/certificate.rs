//! PKCS#12 certificate store.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use openssl::x509::{X509, X509NameRef};
use std::fmt;
use zeroize::Zeroizing;

use super::SigningKey;
use crate::core::{CertificateError, SigningError};

/// The issuer's fiscal certificate and its RSA private key.
///
/// Loaded once at service start and shared read-only (usually behind an
/// `Arc`). OpenSSL clears the private key components when the last
/// reference is dropped.
pub struct FiscalCertificate {
    key: PKey<Private>,
    cert: X509,
    cert_der: Vec<u8>,
    subject_cn: String,
    issuer_cn: String,
    issuer_dn: String,
    serial: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
}

impl FiscalCertificate {
    /// Load a PKCS#12 container, rejecting certificates that are already expired.
    ///
    /// # Errors
    ///
    /// `InvalidPassphrase` when the MAC does not verify, `MalformedContainer`
    /// for anything that is not a readable PKCS#12 RSA container, `MissingKey`
    /// when the key or leaf certificate is absent, `Expired` when `not_after`
    /// lies in the past.
    pub fn load(container: &[u8], passphrase: &str) -> Result<Self, CertificateError> {
        Self::load_at(container, passphrase, Utc::now())
    }

    /// Same as [`load`](Self::load) with an explicit clock.
    pub fn load_at(
        container: &[u8],
        passphrase: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, CertificateError> {
        let pkcs12 = Pkcs12::from_der(container)
            .map_err(|e| CertificateError::MalformedContainer(e.to_string()))?;
        let parsed = pkcs12.parse2(passphrase).map_err(classify_parse_error)?;

        let key = parsed
            .pkey
            .ok_or(CertificateError::MissingKey("private key"))?;
        let cert = parsed
            .cert
            .ok_or(CertificateError::MissingKey("certificate"))?;

        if key.rsa().is_err() {
            return Err(CertificateError::MalformedContainer(
                "private key is not RSA".into(),
            ));
        }
        let matches = cert
            .public_key()
            .map(|pk| pk.public_eq(&key))
            .map_err(|e| CertificateError::MalformedContainer(e.to_string()))?;
        if !matches {
            return Err(CertificateError::MalformedContainer(
                "certificate does not belong to the private key".into(),
            ));
        }

        let malformed = |e: ErrorStack| CertificateError::MalformedContainer(e.to_string());
        let not_before = asn1_to_utc(cert.not_before()).map_err(malformed)?;
        let not_after = asn1_to_utc(cert.not_after()).map_err(malformed)?;
        if now > not_after {
            return Err(CertificateError::Expired(not_after.to_rfc3339()));
        }

        let cert_der = cert.to_der().map_err(malformed)?;
        let serial = cert
            .serial_number()
            .to_bn()
            .and_then(|bn| bn.to_dec_str())
            .map_err(malformed)?
            .to_string();

        let loaded = Self {
            subject_cn: common_name(cert.subject_name()),
            issuer_cn: common_name(cert.issuer_name()),
            issuer_dn: distinguished_name(cert.issuer_name()),
            serial,
            not_before,
            not_after,
            cert_der,
            cert,
            key,
        };
        tracing::info!(
            subject = %loaded.subject_cn,
            issuer = %loaded.issuer_cn,
            not_after = %loaded.not_after,
            "fiscal certificate loaded"
        );
        Ok(loaded)
    }

    /// Load from the base64 form used in configuration.
    pub fn from_base64_blob(blob: &str, passphrase: &str) -> Result<Self, CertificateError> {
        let compact: Zeroizing<String> =
            Zeroizing::new(blob.chars().filter(|c| !c.is_whitespace()).collect());
        let bytes = Zeroizing::new(STANDARD.decode(compact.as_bytes()).map_err(|e| {
            CertificateError::MalformedContainer(format!("certificate blob is not base64: {e}"))
        })?);
        Self::load(&bytes, passphrase)
    }

    pub fn subject_cn(&self) -> &str {
        &self.subject_cn
    }

    pub fn issuer_cn(&self) -> &str {
        &self.issuer_cn
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Leaf certificate as PEM.
    pub fn certificate_pem(&self) -> Result<Vec<u8>, CertificateError> {
        self.cert
            .to_pem()
            .map_err(|e| CertificateError::MalformedContainer(e.to_string()))
    }

    /// Private key as PKCS#8 PEM, wiped from memory when dropped.
    pub fn private_key_pem(&self) -> Result<Zeroizing<Vec<u8>>, CertificateError> {
        self.key
            .private_key_to_pem_pkcs8()
            .map(Zeroizing::new)
            .map_err(|e| CertificateError::MalformedContainer(e.to_string()))
    }

    /// Leaf certificate DER, base64-encoded for `X509Certificate`.
    pub fn certificate_der_base64(&self) -> String {
        STANDARD.encode(&self.cert_der)
    }
}

impl SigningKey for FiscalCertificate {
    fn sign_rsa_sha1(&self, data: &[u8]) -> Result<Vec<u8>, SigningError> {
        let unusable = |e: ErrorStack| SigningError::KeyUnusable(e.to_string());
        let mut signer = Signer::new(MessageDigest::sha1(), &self.key).map_err(unusable)?;
        signer.update(data).map_err(unusable)?;
        signer.sign_to_vec().map_err(unusable)
    }

    fn certificate_der(&self) -> &[u8] {
        &self.cert_der
    }

    fn issuer_name(&self) -> &str {
        &self.issuer_dn
    }

    fn serial_number(&self) -> &str {
        &self.serial
    }

    fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

impl fmt::Debug for FiscalCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiscalCertificate")
            .field("subject_cn", &self.subject_cn)
            .field("issuer_cn", &self.issuer_cn)
            .field("serial", &self.serial)
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

fn classify_parse_error(e: ErrorStack) -> CertificateError {
    let bad_mac = e
        .errors()
        .iter()
        .any(|err| err.reason().is_some_and(|r| r.contains("mac verify failure")));
    if bad_mac {
        CertificateError::InvalidPassphrase
    } else {
        CertificateError::MalformedContainer(e.to_string())
    }
}

fn asn1_to_utc(t: &Asn1TimeRef) -> Result<DateTime<Utc>, ErrorStack> {
    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(t)?;
    let secs = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    Ok(DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MIN_UTC))
}

fn common_name(name: &X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|e| e.data().as_utf8().ok())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// RFC 2253 rendering (most specific RDN first) for `X509IssuerName`.
fn distinguished_name(name: &X509NameRef) -> String {
    let mut parts: Vec<String> = name
        .entries()
        .filter_map(|e| {
            let key = e.object().nid().short_name().ok()?;
            let value = e.data().as_utf8().ok()?;
            Some(format!("{key}={}", escape_dn_value(&value)))
        })
        .collect();
    parts.reverse();
    parts.join(",")
}

fn escape_dn_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
