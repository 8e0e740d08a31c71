use rust_decimal::Decimal;

use super::error::ValidationError;
use super::format::round_amount;
use super::types::*;

/// Validate a request before anything is signed or sent.
/// Returns all validation errors found (not just the first).
pub fn validate_request(request: &FiscalInvoiceRequest) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_oib_field(&request.oib, "oib", &mut errors);
    validate_oib_field(&request.operator_oib, "operator_oib", &mut errors);

    // BrOznRac is numeric in the schema
    if request.invoice_number.is_empty() || !is_digits(&request.invoice_number) {
        errors.push(ValidationError::new(
            "invoice_number",
            "invoice number must be a non-empty string of digits",
        ));
    } else if request.invoice_number.starts_with('0') {
        errors.push(ValidationError::new(
            "invoice_number",
            "invoice number must not have leading zeros",
        ));
    }

    if request.business_space_code.is_empty()
        || request.business_space_code.len() > 20
        || !request
            .business_space_code
            .chars()
            .all(|c| c.is_ascii_alphanumeric())
    {
        errors.push(ValidationError::new(
            "business_space_code",
            "business space code must be 1-20 alphanumeric characters",
        ));
    }

    if request.cash_register_code.is_empty()
        || request.cash_register_code.len() > 20
        || !is_digits(&request.cash_register_code)
    {
        errors.push(ValidationError::new(
            "cash_register_code",
            "cash register code must be 1-20 digits",
        ));
    }

    validate_amount(request.total_amount, "total_amount", &mut errors);

    for (i, vat) in request.vat_breakdown.iter().enumerate() {
        let field = format!("vat_breakdown[{i}]");
        if vat.rate.is_sign_negative() || vat.rate > Decimal::ONE_HUNDRED {
            errors.push(ValidationError::new(
                format!("{field}.rate"),
                format!("VAT rate {} is outside 0-100", vat.rate),
            ));
        }
        validate_amount(vat.base, &format!("{field}.base"), &mut errors);
        validate_amount(vat.amount, &format!("{field}.amount"), &mut errors);
    }

    if request.is_storno {
        match request.original_jir.as_deref() {
            None => errors.push(ValidationError::new(
                "original_jir",
                "storno requires the JIR of the original invoice",
            )),
            Some(jir) if !is_jir(jir) => errors.push(ValidationError::new(
                "original_jir",
                format!("'{jir}' is not a valid JIR"),
            )),
            Some(_) => {}
        }
        if request
            .storno_reason
            .as_deref()
            .is_none_or(|r| r.trim().is_empty())
        {
            errors.push(ValidationError::new(
                "storno_reason",
                "storno requires a reason",
            ));
        }
        if request.total_amount.is_sign_positive() && !request.total_amount.is_zero() {
            errors.push(ValidationError::new(
                "total_amount",
                "storno total must be negative",
            ));
        }
    } else {
        if request.original_jir.is_some() {
            errors.push(ValidationError::new(
                "original_jir",
                "original JIR is only allowed on a storno",
            ));
        }
        if request.total_amount.is_sign_negative() && !request.total_amount.is_zero() {
            errors.push(ValidationError::new(
                "total_amount",
                "negative totals are only allowed on a storno",
            ));
        }
    }

    errors
}

/// Check an OIB: 11 digits with a valid ISO 7064 MOD 11,10 check digit.
pub fn is_valid_oib(oib: &str) -> bool {
    if oib.len() != 11 || !is_digits(oib) {
        return false;
    }
    let digits: Vec<u32> = oib.bytes().map(|b| u32::from(b - b'0')).collect();
    let mut a = 10;
    for d in &digits[..10] {
        a = (a + d) % 10;
        if a == 0 {
            a = 10;
        }
        a = (a * 2) % 11;
    }
    let check = (11 - a) % 10;
    check == digits[10]
}

/// A JIR is a UUID-shaped identifier (8-4-4-4-12 hex groups).
pub fn is_jir(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(g, len)| g.len() == len && g.bytes().all(|b| b.is_ascii_hexdigit()))
}

fn validate_oib_field(oib: &str, field: &str, errors: &mut Vec<ValidationError>) {
    if oib.len() != 11 || !is_digits(oib) {
        errors.push(ValidationError::new(field, "OIB must be exactly 11 digits"));
    } else if !is_valid_oib(oib) {
        errors.push(ValidationError::new(field, "OIB check digit is invalid"));
    }
}

fn validate_amount(amount: Decimal, field: &str, errors: &mut Vec<ValidationError>) {
    if round_amount(amount) != amount {
        errors.push(ValidationError::new(
            field,
            format!("amount {amount} has more than two fraction digits"),
        ));
    }
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}
