//! # fiskal
//!
//! Croatian invoice fiscalization: everything between "the billing system has
//! an invoice" and "the tax authority issued a JIR for it".
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//! Every timestamp that ends up in a signed message comes from a single
//! [`FiscalInstant`](crate::core::FiscalInstant), so the ZKI input and the XML
//! payload can never disagree.
//!
//! ## Pipeline
//!
//! ```text
//! FiscalInvoiceRequest ─► compute_zki ─► build_request_xml ─► sign_document
//!                                                                  │
//!      FiscalReceipt ◄─ parse_response ◄─ Transport::send ◄─ soap_envelope
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use fiskal::core::*;
//! use rust_decimal_macros::dec;
//!
//! let issued_at = FiscalInstant::parse_zki("02.08.2025 21:48:29").unwrap();
//! let request = FiscalInvoiceBuilder::new("87246357068", issued_at)
//!     .invoice_number("634")
//!     .business_space("POSL1")
//!     .cash_register("2")
//!     .total(dec!(7))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(
//!     zki_input(&request),
//!     "8724635706802.08.2025 21:48:29634POSL127.00"
//! );
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` | Request types, amount/date formatting, validation, config |
//! | `crypto` | PKCS#12 certificate store and ZKI computation |
//! | `xml` | RacunZahtjev builder, XML-DSIG signer, RacunOdgovor parser |
//! | `transport` | Pinned-trust HTTPS transport with bounded retry |
//! | `service` (default) | Storno engine and the `FiscalizationService` façade |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "crypto")]
pub mod crypto;

#[cfg(feature = "xml")]
pub mod xml;

#[cfg(feature = "transport")]
pub mod transport;

#[cfg(feature = "service")]
pub mod storno;

#[cfg(feature = "service")]
pub mod service;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
