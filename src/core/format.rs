//! Bit-exact field renderings shared by the ZKI input and the XML payload.

use rust_decimal::{Decimal, RoundingStrategy};

use super::types::{FiscalInstant, FiscalInvoiceRequest};

/// Public receipt verification endpoint printed as a QR code.
pub const RECEIPT_VERIFY_URL: &str = "https://porezna.gov.hr/rn";

/// Format an amount with exactly two fraction digits and a dot separator.
///
/// Negative amounts keep their `-` sign; there is never a `+`.
///
/// ```
/// use fiskal::core::format_amount;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_amount(dec!(7)), "7.00");
/// assert_eq!(format_amount(dec!(-150.5)), "-150.50");
/// ```
pub fn format_amount(amount: Decimal) -> String {
    let mut d = round_amount(amount);
    if d.is_zero() {
        // -0.00 must not leak into a signed message
        d = Decimal::ZERO;
    }
    d.rescale(2);
    d.to_string()
}

/// Round half away from zero to two fraction digits.
pub fn round_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// The ZKI input string: issuer OIB, issue instant, invoice number,
/// business space, cash register and total, concatenated without delimiters.
pub fn zki_input(request: &FiscalInvoiceRequest) -> String {
    format!(
        "{}{}{}{}{}{}",
        request.oib,
        request.issued_at.zki_format(),
        request.invoice_number,
        request.business_space_code,
        request.cash_register_code,
        format_amount(request.total_amount),
    )
}

/// Receipt verification URL for an issued JIR.
///
/// `izn` is the rounded total as a whole number of cents.
pub fn receipt_url(jir: &str, issued_at: FiscalInstant, total: Decimal) -> String {
    let cents = (round_amount(total) * Decimal::ONE_HUNDRED)
        .trunc()
        .normalize();
    format!(
        "{RECEIPT_VERIFY_URL}?jir={jir}&datv={}&izn={cents}",
        issued_at.receipt_format()
    )
}
