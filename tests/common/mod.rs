//! Shared fixtures: throwaway PKCS#12 containers generated with OpenSSL,
//! the reference invoice, canned authority responses and a scripted
//! transport.

#![allow(dead_code)]

use std::sync::OnceLock;

use fiskal::core::*;
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::{X509, X509NameBuilder};
use rust_decimal_macros::dec;

pub const PASSWORD: &str = "fiskal-test";
pub const JIR: &str = "a1b2c3d4-e5f6-4a5b-8c9d-0e1f2a3b4c5d";

/// 2020-01-01T00:00:00Z
pub const NOT_BEFORE: i64 = 1_577_836_800;
/// 2040-01-01T00:00:00Z
pub const NOT_AFTER: i64 = 2_208_988_800;

fn rsa_key() -> &'static PKey<Private> {
    static KEY: OnceLock<PKey<Private>> = OnceLock::new();
    KEY.get_or_init(|| PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap())
}

pub fn self_signed(key: &PKey<Private>, not_before: i64, not_after: i64) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("C", "HR").unwrap();
    name.append_entry_by_nid(Nid::ORGANIZATIONNAME, "Test d.o.o.")
        .unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, "FISKAL 1").unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(4242).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::from_unix(not_before).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::from_unix(not_after).unwrap())
        .unwrap();
    builder.sign(key, MessageDigest::sha256()).unwrap();
    builder.build()
}

/// PKCS#12 DER for the shared key with the given validity window.
pub fn container(not_before: i64, not_after: i64) -> Vec<u8> {
    let key = rsa_key();
    let cert = self_signed(key, not_before, not_after);
    Pkcs12::builder()
        .name("fiskal")
        .pkey(key)
        .cert(&cert)
        .build2(PASSWORD)
        .unwrap()
        .to_der()
        .unwrap()
}

pub fn valid_container() -> Vec<u8> {
    container(NOT_BEFORE, NOT_AFTER)
}

/// Expired on 2020-01-01.
pub fn expired_container() -> Vec<u8> {
    container(1_420_070_400, NOT_BEFORE)
}

#[cfg(feature = "crypto")]
pub fn certificate() -> fiskal::crypto::FiscalCertificate {
    fiskal::crypto::FiscalCertificate::load(&valid_container(), PASSWORD).unwrap()
}

pub fn issued_at() -> FiscalInstant {
    FiscalInstant::parse_zki("02.08.2025 21:48:29").unwrap()
}

/// The reference invoice: OIB 87246357068, 634/POSL1/2, 7.00 EUR by card.
pub fn request() -> FiscalInvoiceRequest {
    FiscalInvoiceBuilder::new("87246357068", issued_at())
        .invoice_number("634")
        .business_space("POSL1")
        .cash_register("2")
        .vat(dec!(25), dec!(5.60), dec!(1.40))
        .total(dec!(7))
        .payment_method(PaymentMethod::Card)
        .build()
        .unwrap()
}

pub fn accepted(jir: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><tns:RacunOdgovor xmlns:tns="http://www.apis-it.hr/fin/2012/types/f73" Id="odgovor"><tns:Zaglavlje><tns:IdPoruke>9f0a2bd4-7c1e-4a55-9d0e-5a3f0c6b1e22</tns:IdPoruke><tns:DatumVrijeme>02.08.2025T21:48:30</tns:DatumVrijeme></tns:Zaglavlje><tns:Jir>{jir}</tns:Jir></tns:RacunOdgovor></soap:Body></soap:Envelope>"#
    )
}

pub fn rejected(code: &str, message: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><tns:RacunOdgovor xmlns:tns="http://www.apis-it.hr/fin/2012/types/f73"><tns:Greske><tns:Greska><tns:SifraGreske>{code}</tns:SifraGreske><tns:PorukaGreske>{message}</tns:PorukaGreske></tns:Greska></tns:Greske></tns:RacunOdgovor></soap:Body></soap:Envelope>"#
    )
}

#[cfg(feature = "transport")]
pub use mock::MockTransport;

#[cfg(feature = "transport")]
mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use fiskal::core::TransportError;
    use fiskal::transport::Transport;

    /// Replays queued replies and records every envelope it was given.
    #[derive(Default)]
    pub struct MockTransport {
        replies: Mutex<VecDeque<Result<String, TransportError>>>,
        sent: Mutex<Vec<String>>,
    }

    impl MockTransport {
        pub fn replying(replies: impl IntoIterator<Item = Result<String, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                sent: Mutex::new(Vec::new()),
            }
        }

        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for MockTransport {
        async fn send(&self, envelope: &str) -> Result<String, TransportError> {
            self.sent.lock().unwrap().push(envelope.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Connect("no reply queued".into())))
        }
    }
}
