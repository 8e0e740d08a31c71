use super::SOAP_ENV_NS;
use super::writer::XmlWriter;
use crate::core::FiscalError;

/// Wrap a signed `RacunZahtjev` in a SOAP 1.1 envelope.
///
/// The body is embedded byte-for-byte; a leading XML declaration on it is
/// dropped so the envelope stays well-formed.
pub fn soap_envelope(body_xml: &str) -> Result<String, FiscalError> {
    let body = strip_declaration(body_xml);
    let mut w = XmlWriter::with_declaration()?;
    w.start_element_with_attrs("soapenv:Envelope", &[("xmlns:soapenv", SOAP_ENV_NS)])?;
    w.start_element("soapenv:Body")?;
    w.raw(body)?;
    w.end_element("soapenv:Body")?;
    w.end_element("soapenv:Envelope")?;
    w.into_string()
}

fn strip_declaration(xml: &str) -> &str {
    let trimmed = xml.trim_start();
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return trimmed[end + 2..].trim_start();
        }
    }
    trimmed
}
