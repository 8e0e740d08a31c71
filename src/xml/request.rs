use uuid::Uuid;

use super::dsig::sign_document;
use super::writer::XmlWriter;
use super::{FISCAL_NS, FISCAL_PREFIX};
use crate::core::*;
use crate::crypto::SigningKey;

/// A `RacunZahtjev` with its ZKI embedded and its enveloped signature
/// appended, plus the identifiers it was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedFiscalRequest {
    pub xml: String,
    pub sign_id: String,
    pub message_id: Uuid,
}

/// Fresh value for the signed element's `Id` attribute.
pub fn new_sign_id() -> String {
    format!("racun-{}", Uuid::new_v4().simple())
}

/// Fresh `IdPoruke` message identifier (UUID v4).
pub fn new_message_id() -> Uuid {
    Uuid::new_v4()
}

/// Build the unsigned `RacunZahtjev` document.
///
/// The root element carries `Id = sign_id` and declares the fiscalization
/// namespace itself, so it can be canonicalized without its SOAP envelope.
/// Header and invoice timestamps both render `request.issued_at`.
pub fn build_request_xml(
    request: &FiscalInvoiceRequest,
    zki: &ZkiCode,
    sign_id: &str,
    message_id: Uuid,
) -> Result<String, FiscalError> {
    let errors = validate_request(request);
    if !errors.is_empty() {
        return Err(FiscalError::Validation(errors));
    }

    let tag = |local: &str| format!("{FISCAL_PREFIX}:{local}");
    let xmlns = format!("xmlns:{FISCAL_PREFIX}");
    let mut w = XmlWriter::new();

    w.start_element_with_attrs(
        &tag("RacunZahtjev"),
        &[(xmlns.as_str(), FISCAL_NS), ("Id", sign_id)],
    )?;

    w.start_element(&tag("Zaglavlje"))?;
    w.text_element(&tag("IdPoruke"), &message_id.hyphenated().to_string())?;
    w.text_element(&tag("DatumVrijeme"), &request.issued_at.xml_format())?;
    w.end_element(&tag("Zaglavlje"))?;

    w.start_element(&tag("Racun"))?;
    w.text_element(&tag("Oib"), &request.oib)?;
    w.bool_element(&tag("USustPdv"), request.vat_registered)?;
    w.text_element(&tag("DatVrijeme"), &request.issued_at.xml_format())?;
    w.text_element(&tag("OznSlijed"), request.sequence_mark.code())?;

    w.start_element(&tag("BrRac"))?;
    w.text_element(&tag("BrOznRac"), &request.invoice_number)?;
    w.text_element(&tag("OznPosPr"), &request.business_space_code)?;
    w.text_element(&tag("OznNapUr"), &request.cash_register_code)?;
    w.end_element(&tag("BrRac"))?;

    if !request.vat_breakdown.is_empty() {
        w.start_element(&tag("Pdv"))?;
        for vat in &request.vat_breakdown {
            w.start_element(&tag("Porez"))?;
            w.amount_element(&tag("Stopa"), vat.rate)?;
            w.amount_element(&tag("Osnovica"), vat.base)?;
            w.amount_element(&tag("Iznos"), vat.amount)?;
            w.end_element(&tag("Porez"))?;
        }
        w.end_element(&tag("Pdv"))?;
    }

    w.amount_element(&tag("IznosUkupno"), request.total_amount)?;
    w.text_element(&tag("NacinPlac"), request.payment_method.code())?;
    w.text_element(&tag("OibOper"), &request.operator_oib)?;
    w.text_element(&tag("ZastKod"), zki.as_str())?;
    w.bool_element(&tag("NakDost"), request.subsequent_delivery)?;

    if request.is_storno {
        // validated above: both are present on a storno
        if let Some(jir) = &request.original_jir {
            w.text_element(&tag("StornoRacun"), jir)?;
        }
        if let Some(reason) = &request.storno_reason {
            w.text_element(&tag("StornoRazlog"), reason)?;
        }
    }

    w.end_element(&tag("Racun"))?;
    w.end_element(&tag("RacunZahtjev"))?;
    w.into_string()
}

/// Build and sign a request under fresh sign and message ids.
pub fn sign_request<K: SigningKey + ?Sized>(
    request: &FiscalInvoiceRequest,
    zki: &ZkiCode,
    key: &K,
) -> Result<SignedFiscalRequest, FiscalError> {
    let sign_id = new_sign_id();
    let message_id = new_message_id();
    let unsigned = build_request_xml(request, zki, &sign_id, message_id)?;
    let xml = sign_document(&unsigned, &sign_id, key)?;
    Ok(SignedFiscalRequest {
        xml,
        sign_id,
        message_id,
    })
}
