//! Enveloped XML-DSIG signatures in the profile the fiscalization service
//! accepts: exclusive canonicalization, SHA-1 digest, RSA-SHA1 signature,
//! leaf certificate only in `KeyInfo`.
//!
//! The service answers any deviation (inclusive c14n, SHA-256, transform
//! order) with a bare "invalid digital signature", so every algorithm URI
//! here is a constant.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use openssl::hash::{MessageDigest, hash};
use openssl::sign::Verifier;
use openssl::x509::X509;
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use xml_c14n::{CanonicalizationMode, CanonicalizationOptions, canonicalize_xml};

use crate::core::SigningError;
use crate::crypto::SigningKey;

pub const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";

/// Byte offsets of the element carrying the signing `Id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SignTarget {
    /// Offset of the opening `<`.
    start: usize,
    /// Offset of the closing tag's `<`.
    close_start: usize,
    /// Offset one past the closing tag's `>`.
    end: usize,
}

/// Sign the element whose `Id` attribute equals `sign_id`.
///
/// The `Signature` block is appended as the element's last child and its
/// `Reference URI` is `"#" + sign_id`. The element must declare every
/// namespace it uses, as [`build_request_xml`](super::build_request_xml)
/// output does.
///
/// # Errors
///
/// `MissingSignTarget` / `DuplicateSignTarget` when the id does not select
/// exactly one element, `MalformedXml` for unparseable input, an empty
/// target or an id that cannot appear in a same-document reference,
/// `Canonicalization` and `KeyUnusable` from the digest and signature steps.
pub fn sign_document<K: SigningKey + ?Sized>(
    xml: &str,
    sign_id: &str,
    key: &K,
) -> Result<String, SigningError> {
    check_id(sign_id)?;
    let target = locate(xml, sign_id)?;
    let element = &xml[target.start..target.end];
    if element.contains(&format!("<Signature xmlns=\"{DSIG_NS}\"")) {
        return Err(SigningError::MalformedXml(format!(
            "element '{sign_id}' is already signed"
        )));
    }

    let digest = sha1_base64(exc_c14n(element)?.as_bytes())?;
    let canonical_signed_info = exc_c14n(&signed_info(&digest, sign_id, true))?;
    let signature_value = STANDARD.encode(key.sign_rsa_sha1(canonical_signed_info.as_bytes())?);

    let signature = format!(
        "<Signature xmlns=\"{DSIG_NS}\">{}<SignatureValue>{signature_value}</SignatureValue>\
         <KeyInfo><X509Data><X509Certificate>{}</X509Certificate><X509IssuerSerial>\
         <X509IssuerName>{}</X509IssuerName><X509SerialNumber>{}</X509SerialNumber>\
         </X509IssuerSerial></X509Data></KeyInfo></Signature>",
        signed_info(&digest, sign_id, false),
        STANDARD.encode(key.certificate_der()),
        escape(key.issuer_name()),
        key.serial_number(),
    );

    tracing::debug!(sign_id, digest = %digest, "document signed");

    let mut out = String::with_capacity(xml.len() + signature.len());
    out.push_str(&xml[..target.close_start]);
    out.push_str(&signature);
    out.push_str(&xml[target.close_start..]);
    Ok(out)
}

/// Check a document produced by [`sign_document`] against the certificate
/// embedded in its `KeyInfo`.
///
/// Recomputes the reference digest after removing the signature
/// (enveloped transform) and verifies `SignatureValue` over the canonical
/// `SignedInfo`. Useful as a local diagnostic, since the service reports
/// signature problems without detail.
pub fn verify_document(signed_xml: &str, sign_id: &str) -> Result<bool, SigningError> {
    check_id(sign_id)?;
    let target = locate(signed_xml, sign_id)?;
    let element = &signed_xml[target.start..target.end];

    let sig_open = format!("<Signature xmlns=\"{DSIG_NS}\">");
    let sig_start = element
        .find(&sig_open)
        .ok_or_else(|| SigningError::MalformedXml("no Signature element".into()))?;
    let sig_end = element[sig_start..]
        .find("</Signature>")
        .map(|p| sig_start + p + "</Signature>".len())
        .ok_or_else(|| SigningError::MalformedXml("unterminated Signature element".into()))?;
    let signature = &element[sig_start..sig_end];
    let unsigned = format!("{}{}", &element[..sig_start], &element[sig_end..]);

    let uri = attribute_of(signature, "Reference", "URI")?;
    if uri.as_deref() != Some(format!("#{sign_id}").as_str()) {
        return Ok(false);
    }

    let digest = sha1_base64(exc_c14n(&unsigned)?.as_bytes())?;
    if text_of(signature, "DigestValue")?.as_deref() != Some(digest.as_str()) {
        return Ok(false);
    }

    let si_start = signature
        .find("<SignedInfo>")
        .ok_or_else(|| SigningError::MalformedXml("no SignedInfo element".into()))?;
    let si_end = signature
        .find("</SignedInfo>")
        .map(|p| p + "</SignedInfo>".len())
        .ok_or_else(|| SigningError::MalformedXml("unterminated SignedInfo element".into()))?;
    let standalone = signature[si_start..si_end].replacen(
        "<SignedInfo>",
        &format!("<SignedInfo xmlns=\"{DSIG_NS}\">"),
        1,
    );
    let canonical = exc_c14n(&standalone)?;

    let missing = |what: &str| SigningError::MalformedXml(format!("no {what} element"));
    let value = text_of(signature, "SignatureValue")?.ok_or_else(|| missing("SignatureValue"))?;
    let cert_b64 =
        text_of(signature, "X509Certificate")?.ok_or_else(|| missing("X509Certificate"))?;

    let bad_b64 = |e: base64::DecodeError| SigningError::MalformedXml(e.to_string());
    let signature_bytes = STANDARD.decode(value.trim()).map_err(bad_b64)?;
    let cert_der = STANDARD.decode(cert_b64.trim()).map_err(bad_b64)?;

    let unusable = |e: openssl::error::ErrorStack| SigningError::KeyUnusable(e.to_string());
    let cert = X509::from_der(&cert_der).map_err(unusable)?;
    let public = cert.public_key().map_err(unusable)?;
    let mut verifier = Verifier::new(MessageDigest::sha1(), &public).map_err(unusable)?;
    verifier.update(canonical.as_bytes()).map_err(unusable)?;
    verifier.verify(&signature_bytes).map_err(unusable)
}

/// `SignedInfo` in canonical form. With `declare_ns` it is the standalone
/// rendering that gets signed; without, the in-document rendering that
/// inherits the namespace from `Signature`.
fn signed_info(digest: &str, sign_id: &str, declare_ns: bool) -> String {
    let open = if declare_ns {
        format!("<SignedInfo xmlns=\"{DSIG_NS}\">")
    } else {
        "<SignedInfo>".to_string()
    };
    format!(
        "{open}<CanonicalizationMethod Algorithm=\"{EXC_C14N}\"></CanonicalizationMethod>\
         <SignatureMethod Algorithm=\"{RSA_SHA1}\"></SignatureMethod>\
         <Reference URI=\"#{sign_id}\"><Transforms>\
         <Transform Algorithm=\"{ENVELOPED_SIGNATURE}\"></Transform>\
         <Transform Algorithm=\"{EXC_C14N}\"></Transform></Transforms>\
         <DigestMethod Algorithm=\"{SHA1}\"></DigestMethod>\
         <DigestValue>{digest}</DigestValue></Reference></SignedInfo>"
    )
}

/// Exclusive XML canonicalization 1.0 without comments.
pub fn exc_c14n(xml: &str) -> Result<String, SigningError> {
    let options = CanonicalizationOptions {
        mode: CanonicalizationMode::ExclusiveCanonical1_0,
        keep_comments: false,
        inclusive_ns_prefixes: vec![],
    };
    canonicalize_xml(xml, options).map_err(|e| SigningError::Canonicalization(e.to_string()))
}

fn sha1_base64(data: &[u8]) -> Result<String, SigningError> {
    hash(MessageDigest::sha1(), data)
        .map(|d| STANDARD.encode(d))
        .map_err(|e| SigningError::KeyUnusable(e.to_string()))
}

/// Ids end up inside `URI="#..."`; only NCName characters are accepted.
fn check_id(sign_id: &str) -> Result<(), SigningError> {
    let mut chars = sign_id.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(SigningError::MalformedXml(format!(
            "'{sign_id}' is not a valid Id value"
        )))
    }
}

fn locate(xml: &str, sign_id: &str) -> Result<SignTarget, SigningError> {
    let mut reader = Reader::from_str(xml);
    let mut found: Option<SignTarget> = None;
    let mut depth = 0usize;
    let mut inside = false;

    loop {
        let pos = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if inside {
                    depth += 1;
                }
                if has_id(&e, sign_id)? {
                    if found.is_some() {
                        return Err(SigningError::DuplicateSignTarget(sign_id.into()));
                    }
                    found = Some(SignTarget {
                        start: markup_start(xml, pos),
                        close_start: 0,
                        end: 0,
                    });
                    inside = true;
                    depth = 1;
                }
            }
            Ok(Event::Empty(e)) => {
                if has_id(&e, sign_id)? {
                    if found.is_some() {
                        return Err(SigningError::DuplicateSignTarget(sign_id.into()));
                    }
                    return Err(SigningError::MalformedXml(format!(
                        "element '{sign_id}' is empty and cannot hold a signature"
                    )));
                }
            }
            Ok(Event::End(_)) if inside => {
                depth -= 1;
                if depth == 0 {
                    inside = false;
                    if let Some(t) = found.as_mut() {
                        t.close_start = markup_start(xml, pos);
                        t.end = reader.buffer_position() as usize;
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SigningError::MalformedXml(e.to_string())),
        }
    }

    match found {
        Some(t) if t.end > 0 => Ok(t),
        Some(_) => Err(SigningError::MalformedXml(format!(
            "element '{sign_id}' is not closed"
        ))),
        None => Err(SigningError::MissingSignTarget(sign_id.into())),
    }
}

/// Position of the `<` that opened the markup read from `pos`, whether or
/// not the reader had already consumed it while reading preceding text.
fn markup_start(xml: &str, pos: usize) -> usize {
    let bytes = xml.as_bytes();
    if bytes.get(pos) != Some(&b'<') && pos > 0 && bytes.get(pos - 1) == Some(&b'<') {
        pos - 1
    } else {
        pos
    }
}

fn has_id(e: &BytesStart<'_>, sign_id: &str) -> Result<bool, SigningError> {
    let attr = e
        .try_get_attribute("Id")
        .map_err(|err| SigningError::MalformedXml(err.to_string()))?;
    match attr {
        Some(a) => {
            let value = a
                .unescape_value()
                .map_err(|err| SigningError::MalformedXml(err.to_string()))?;
            Ok(value == sign_id)
        }
        None => Ok(false),
    }
}

/// Text of the first element with the given local name.
fn text_of(xml: &str, local: &str) -> Result<Option<String>, SigningError> {
    let mut reader = Reader::from_str(xml);
    let mut capture = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => capture = e.local_name().as_ref() == local.as_bytes(),
            Ok(Event::Text(t)) if capture => {
                let text = t
                    .unescape()
                    .map_err(|e| SigningError::MalformedXml(e.to_string()))?;
                return Ok(Some(text.into_owned()));
            }
            Ok(Event::End(_)) => capture = false,
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(SigningError::MalformedXml(e.to_string())),
        }
    }
}

/// Attribute value of the first element with the given local name.
fn attribute_of(xml: &str, local: &str, attr: &str) -> Result<Option<String>, SigningError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == local.as_bytes() =>
            {
                let Some(a) = e
                    .try_get_attribute(attr)
                    .map_err(|err| SigningError::MalformedXml(err.to_string()))?
                else {
                    return Ok(None);
                };
                let value = a
                    .unescape_value()
                    .map_err(|err| SigningError::MalformedXml(err.to_string()))?;
                return Ok(Some(value.into_owned()));
            }
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(SigningError::MalformedXml(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_finds_element_bounds() {
        let xml = r#"<?xml version="1.0"?><env><a Id="x"><b>1</b><c/></a><d/></env>"#;
        let t = locate(xml, "x").unwrap();
        assert_eq!(&xml[t.start..t.end], r#"<a Id="x"><b>1</b><c/></a>"#);
        assert_eq!(&xml[t.close_start..t.end], "</a>");
    }

    #[test]
    fn locate_rejects_missing_duplicate_and_empty() {
        assert!(matches!(
            locate("<a Id=\"y\"></a>", "x"),
            Err(SigningError::MissingSignTarget(_))
        ));
        assert!(matches!(
            locate("<r><a Id=\"x\"></a><b Id=\"x\"></b></r>", "x"),
            Err(SigningError::DuplicateSignTarget(_))
        ));
        assert!(matches!(
            locate("<r><a Id=\"x\"/></r>", "x"),
            Err(SigningError::MalformedXml(_))
        ));
    }

    #[test]
    fn signed_info_reference_uses_hash_prefixed_id() {
        let si = signed_info("AAAA", "racun-42", false);
        assert!(si.contains(r##"<Reference URI="#racun-42">"##));
        assert!(si.starts_with("<SignedInfo><CanonicalizationMethod"));
        let enveloped = si.find(ENVELOPED_SIGNATURE).unwrap();
        let exclusive = si.rfind(EXC_C14N).unwrap();
        assert!(enveloped < exclusive, "enveloped transform must come first");
        assert!(si.contains(RSA_SHA1));
        assert!(!si.contains("sha256"));
    }

    #[test]
    fn id_must_be_an_ncname() {
        assert!(check_id("racun-1").is_ok());
        assert!(check_id("_a.b").is_ok());
        assert!(check_id("").is_err());
        assert!(check_id("1abc").is_err());
        assert!(check_id("a\"b").is_err());
    }
}
