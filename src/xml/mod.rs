//! Fiscalization XML: the `RacunZahtjev` request, its enveloped signature,
//! the SOAP envelope, and the `RacunOdgovor` response.
//!
//! # Example
//!
//! ```ignore
//! use fiskal::xml::*;
//!
//! let sign_id = new_sign_id();
//! let unsigned = build_request_xml(&request, &zki, &sign_id, new_message_id())?;
//! let signed = sign_document(&unsigned, &sign_id, &certificate)?;
//! let envelope = soap_envelope(&signed)?;
//! ```

mod dsig;
mod request;
mod response;
mod soap;
pub(crate) mod writer;

pub use dsig::{
    DSIG_NS, ENVELOPED_SIGNATURE, EXC_C14N, RSA_SHA1, SHA1, exc_c14n, sign_document,
    verify_document,
};
pub use request::{
    SignedFiscalRequest, build_request_xml, new_message_id, new_sign_id, sign_request,
};
pub use response::{UNKNOWN_ERROR_CODE, parse_response, parse_response_for};
pub use soap::soap_envelope;

/// Fiscalization types namespace (schema version 1.3+).
pub const FISCAL_NS: &str = "http://www.apis-it.hr/fin/2012/types/f73";

/// Prefix bound to [`FISCAL_NS`] in generated documents.
pub const FISCAL_PREFIX: &str = "tns";

/// SOAP 1.1 envelope namespace.
pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
