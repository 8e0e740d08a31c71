use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The single wall-clock instant an invoice was issued at.
///
/// Both date renderings used by fiscalization are derived from this one
/// value: [`zki_format`](Self::zki_format) feeds the ZKI digest and
/// [`xml_format`](Self::xml_format) feeds the XML payload. Sub-second
/// precision is dropped on construction because neither format carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FiscalInstant(NaiveDateTime);

impl FiscalInstant {
    const ZKI_FORMAT: &'static str = "%d.%m.%Y %H:%M:%S";
    const XML_FORMAT: &'static str = "%d.%m.%YT%H:%M:%S";

    pub fn new(at: NaiveDateTime) -> Self {
        Self(at.with_nanosecond(0).unwrap_or(at))
    }

    /// Current local wall-clock time.
    pub fn now() -> Self {
        Self::new(chrono::Local::now().naive_local())
    }

    /// Parse a `dd.MM.yyyy HH:mm:ss` string.
    pub fn parse_zki(s: &str) -> Result<Self, chrono::ParseError> {
        NaiveDateTime::parse_from_str(s, Self::ZKI_FORMAT).map(Self)
    }

    /// `dd.MM.yyyy HH:mm:ss`: the ZKI input rendering.
    pub fn zki_format(&self) -> String {
        self.0.format(Self::ZKI_FORMAT).to_string()
    }

    /// `dd.MM.yyyyTHH:mm:ss`: the XML payload rendering.
    pub fn xml_format(&self) -> String {
        self.0.format(Self::XML_FORMAT).to_string()
    }

    /// `yyyyMMdd_HHmm`: the receipt verification URL rendering.
    pub fn receipt_format(&self) -> String {
        self.0.format("%Y%m%d_%H%M").to_string()
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }

    /// The same instant in UTC, reading the wall clock as Croatian civil
    /// time: CET, or CEST between the last Sundays of March and October.
    ///
    /// In the repeated October hour the earlier (CEST) reading wins.
    pub fn to_utc(&self) -> DateTime<Utc> {
        let offset = if is_summer_time(self.0) { 2 } else { 1 };
        (self.0 - TimeDelta::hours(offset)).and_utc()
    }
}

/// EU summer time in local terms: from 02:00 CET on the last Sunday of
/// March until 03:00 CEST on the last Sunday of October.
fn is_summer_time(local: NaiveDateTime) -> bool {
    match (
        last_sunday_at(local.year(), 3, 2),
        last_sunday_at(local.year(), 10, 3),
    ) {
        (Some(start), Some(end)) => start <= local && local < end,
        _ => false,
    }
}

fn last_sunday_at(year: i32, month: u32, hour: u32) -> Option<NaiveDateTime> {
    let last = NaiveDate::from_ymd_opt(year, month, 31)?;
    let back = u64::from(last.weekday().num_days_from_sunday());
    last.checked_sub_days(Days::new(back))?.and_hms_opt(hour, 0, 0)
}

impl From<NaiveDateTime> for FiscalInstant {
    fn from(at: NaiveDateTime) -> Self {
        Self::new(at)
    }
}

/// Payment method (`NacinPlac`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// G: Gotovina (cash).
    Cash,
    /// K: Kartice (cards).
    Card,
    /// C: Ček (cheque).
    Check,
    /// T: Transakcijski račun (bank transfer).
    Transfer,
    /// O: Ostalo (other).
    Other,
}

impl PaymentMethod {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cash => "G",
            Self::Card => "K",
            Self::Check => "C",
            Self::Transfer => "T",
            Self::Other => "O",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "G" => Some(Self::Cash),
            "K" => Some(Self::Card),
            "C" => Some(Self::Check),
            "T" => Some(Self::Transfer),
            "O" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Invoice number sequencing marker (`OznSlijed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SequenceMark {
    /// P: numbers run per business space.
    #[default]
    BusinessSpace,
    /// N: numbers run per cash register.
    CashRegister,
}

impl SequenceMark {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BusinessSpace => "P",
            Self::CashRegister => "N",
        }
    }
}

/// One VAT rate line (`Pdv/Porez`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatRate {
    /// Rate in percent, e.g. 25.
    pub rate: Decimal,
    /// Taxable base.
    pub base: Decimal,
    /// Tax amount.
    pub amount: Decimal,
}

impl VatRate {
    pub fn new(rate: Decimal, base: Decimal, amount: Decimal) -> Self {
        Self { rate, base, amount }
    }
}

/// Everything the authority needs to fiscalize one invoice.
///
/// Built by the billing collaborator, usually through
/// [`FiscalInvoiceBuilder`](super::FiscalInvoiceBuilder). The tuple
/// `(invoice_number, business_space_code, cash_register_code, issued_at)`
/// identifies the invoice; once a JIR exists for it, it must never be
/// submitted again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalInvoiceRequest {
    /// Issuer OIB.
    pub oib: String,
    /// Whether the issuer is in the VAT system (`USustPdv`).
    pub vat_registered: bool,
    /// Issue instant.
    pub issued_at: FiscalInstant,
    /// Sequencing marker.
    pub sequence_mark: SequenceMark,
    /// Numeric invoice number (`BrOznRac`).
    pub invoice_number: String,
    /// Business space code (`OznPosPr`).
    pub business_space_code: String,
    /// Cash register code (`OznNapUr`).
    pub cash_register_code: String,
    /// Total including VAT; negative for storno.
    pub total_amount: Decimal,
    /// Per-rate VAT breakdown.
    pub vat_breakdown: Vec<VatRate>,
    pub payment_method: PaymentMethod,
    /// OIB of the operator at the register (`OibOper`).
    pub operator_oib: String,
    /// Invoice is being delivered after the fact (`NakDost`).
    pub subsequent_delivery: bool,
    pub is_storno: bool,
    /// JIR of the invoice being reversed; required iff `is_storno`.
    pub original_jir: Option<String>,
    /// Reason for the reversal; storno only.
    pub storno_reason: Option<String>,
}

impl FiscalInvoiceRequest {
    /// Sum of all VAT amounts in the breakdown.
    pub fn vat_total(&self) -> Decimal {
        self.vat_breakdown.iter().map(|v| v.amount).sum()
    }
}

/// 32-character lowercase hex issuer security code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZkiCode(String);

impl ZkiCode {
    /// Accept an already computed code, rejecting anything that is not
    /// exactly 32 lowercase hex digits.
    pub fn from_hex(s: &str) -> Option<Self> {
        let ok = s.len() == 32
            && s
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        ok.then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZkiCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed classification of authority error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerErrorKind {
    /// Message does not conform to the schema or a field is invalid.
    SchemaValidation,
    /// Certificate not issued for fiscalization, revoked, expired, or its
    /// OIB does not match the message (often a TEST/PRODUCTION mix-up).
    CertificateMismatch,
    /// Digital signature did not verify.
    InvalidSignature,
    /// The invoice number was already fiscalized.
    DuplicateInvoice,
    /// Any code not listed above.
    UnknownServerError,
}

impl ServerErrorKind {
    /// Classify by code alone.
    pub fn from_code(code: &str) -> Self {
        Self::classify(code, "")
    }

    /// Classify an authority error. Unlisted codes are never guessed.
    pub fn classify(code: &str, message: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "s001" => Self::SchemaValidation,
            "s002" | "s003" | "s005" => Self::CertificateMismatch,
            "s004" => Self::InvalidSignature,
            _ if is_duplicate_message(message) => Self::DuplicateInvoice,
            _ => Self::UnknownServerError,
        }
    }
}

fn is_duplicate_message(message: &str) -> bool {
    let m = message.to_lowercase();
    m.contains("duplicate") || m.contains("već postoji") || m.contains("vec postoji")
}

/// Parsed authority response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FiscalResponse {
    Success {
        jir: String,
        /// Receipt verification URL. `None` when parsed without the
        /// request it answers (`parse_response`); `parse_response_for`
        /// fills it in.
        qr_code_data: Option<String>,
    },
    Failure {
        error_code: String,
        error_message: String,
        raw_response: String,
    },
}

impl FiscalResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn jir(&self) -> Option<&str> {
        match self {
            Self::Success { jir, .. } => Some(jir),
            Self::Failure { .. } => None,
        }
    }
}

/// Success payload handed back to the billing collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalReceipt {
    pub jir: String,
    pub zki: ZkiCode,
    /// Public verification URL, also the QR code content printed on the receipt.
    pub receipt_url: String,
    /// The invoice instant the JIR was issued for.
    pub timestamp: FiscalInstant,
}
