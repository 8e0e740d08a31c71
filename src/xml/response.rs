use quick_xml::Reader;
use quick_xml::events::Event;

use crate::core::{FiscalInvoiceRequest, FiscalResponse, receipt_url};

/// Error code used when a body cannot be interpreted.
pub const UNKNOWN_ERROR_CODE: &str = "UNKNOWN";

#[derive(Debug, Default)]
struct ParsedResponse {
    jir: Option<String>,
    errors: Vec<(String, String)>,
    fault_code: Option<String>,
    fault_string: Option<String>,
}

impl ParsedResponse {
    fn handle_text(&mut self, path: &[String], text: &str) {
        let Some(current) = path.last() else {
            return;
        };
        match current.as_str() {
            "Jir" => append(&mut self.jir, text),
            "SifraGreske" => match self.errors.last_mut() {
                Some(err) => err.0.push_str(text),
                None => self.errors.push((text.to_string(), String::new())),
            },
            "PorukaGreske" => match self.errors.last_mut() {
                Some(err) => err.1.push_str(text),
                None => self.errors.push((String::new(), text.to_string())),
            },
            "faultcode" => append(&mut self.fault_code, text),
            "faultstring" => append(&mut self.fault_string, text),
            _ => {}
        }
    }
}

fn append(slot: &mut Option<String>, text: &str) {
    slot.get_or_insert_with(String::new).push_str(text);
}

/// Interpret a raw `RacunOdgovor` (or SOAP fault) body.
///
/// Element names are matched by local name, so any namespace prefix (or
/// none) is accepted. A success is reported only when a non-empty `Jir` was
/// found and no `Greska` accompanies it. Everything else is a `Failure`
/// that keeps the raw body; bodies that cannot be parsed or carry neither
/// a JIR nor an error yield the code [`UNKNOWN_ERROR_CODE`]. Never panics.
pub fn parse_response(raw: &str) -> FiscalResponse {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(true);

    let mut parsed = ParsedResponse::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "Greska" {
                    parsed.errors.push((String::new(), String::new()));
                }
                path.push(name);
            }
            Ok(Event::Text(ref e)) => match e.unescape() {
                Ok(text) => {
                    if !text.is_empty() {
                        parsed.handle_text(&path, &text);
                    }
                }
                Err(_) => return unknown(raw, "undecodable text content"),
            },
            Ok(Event::CData(ref e)) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                parsed.handle_text(&path, text.trim());
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return unknown(raw, &format!("unparseable response: {e}")),
        }
    }

    parsed
        .errors
        .retain(|(code, msg)| !code.is_empty() || !msg.is_empty());
    if let Some((first_code, first_msg)) = parsed.errors.first() {
        let error_message = if parsed.errors.len() == 1 {
            first_msg.trim().to_string()
        } else {
            parsed
                .errors
                .iter()
                .map(|(c, m)| format!("[{}] {}", c.trim(), m.trim()))
                .collect::<Vec<_>>()
                .join("; ")
        };
        let error_code = match first_code.trim() {
            "" => UNKNOWN_ERROR_CODE.to_string(),
            code => code.to_string(),
        };
        return FiscalResponse::Failure {
            error_code,
            error_message,
            raw_response: raw.to_string(),
        };
    }

    if let Some(jir) = parsed
        .jir
        .map(|j| j.trim().to_string())
        .filter(|j| !j.is_empty())
    {
        return FiscalResponse::Success {
            jir,
            qr_code_data: None,
        };
    }

    if parsed.fault_code.is_some() || parsed.fault_string.is_some() {
        return FiscalResponse::Failure {
            error_code: parsed
                .fault_code
                .map(|c| c.trim().to_string())
                .unwrap_or_else(|| UNKNOWN_ERROR_CODE.to_string()),
            error_message: parsed.fault_string.unwrap_or_default().trim().to_string(),
            raw_response: raw.to_string(),
        };
    }

    unknown(raw, "response carries neither a JIR nor an error")
}

/// [`parse_response`] for a known request: a success also carries the
/// receipt verification URL in `qr_code_data`.
pub fn parse_response_for(raw: &str, request: &FiscalInvoiceRequest) -> FiscalResponse {
    match parse_response(raw) {
        FiscalResponse::Success { jir, .. } => FiscalResponse::Success {
            qr_code_data: Some(receipt_url(&jir, request.issued_at, request.total_amount)),
            jir,
        },
        failure => failure,
    }
}

fn unknown(raw: &str, message: &str) -> FiscalResponse {
    FiscalResponse::Failure {
        error_code: UNKNOWN_ERROR_CODE.to_string(),
        error_message: message.to_string(),
        raw_response: raw.to_string(),
    }
}
