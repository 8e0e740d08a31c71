use criterion::{Criterion, black_box, criterion_group, criterion_main};
use openssl::asn1::Asn1Time;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::{X509, X509NameBuilder};
use rust_decimal_macros::dec;
use uuid::Uuid;

use fiskal::core::*;
use fiskal::crypto::{FiscalCertificate, compute_zki};
use fiskal::xml;

const PASSWORD: &str = "bench";

fn bench_certificate() -> FiscalCertificate {
    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, "FISKAL BENCH").unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::from_unix(1_577_836_800).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::from_unix(2_208_988_800).unwrap())
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    let cert = builder.build();

    let der = Pkcs12::builder()
        .name("bench")
        .pkey(&key)
        .cert(&cert)
        .build2(PASSWORD)
        .unwrap()
        .to_der()
        .unwrap();
    FiscalCertificate::load(&der, PASSWORD).unwrap()
}

fn bench_request() -> FiscalInvoiceRequest {
    FiscalInvoiceBuilder::new(
        "87246357068",
        FiscalInstant::parse_zki("02.08.2025 21:48:29").unwrap(),
    )
    .invoice_number("634")
    .business_space("POSL1")
    .cash_register("2")
    .vat(dec!(25), dec!(5.60), dec!(1.40))
    .vat(dec!(13), dec!(100.00), dec!(13.00))
    .total(dec!(120.00))
    .payment_method(PaymentMethod::Card)
    .build()
    .unwrap()
}

fn bench_zki(c: &mut Criterion) {
    let cert = bench_certificate();
    let request = bench_request();
    c.bench_function("compute_zki", |b| {
        b.iter(|| black_box(compute_zki(&cert, black_box(&request))));
    });
}

fn bench_build_and_sign(c: &mut Criterion) {
    let cert = bench_certificate();
    let request = bench_request();
    let zki = compute_zki(&cert, &request).unwrap();

    c.bench_function("build_request_xml", |b| {
        b.iter(|| {
            black_box(xml::build_request_xml(
                black_box(&request),
                &zki,
                "racun-bench",
                Uuid::nil(),
            ))
        });
    });

    let unsigned = xml::build_request_xml(&request, &zki, "racun-bench", Uuid::nil()).unwrap();
    c.bench_function("sign_document", |b| {
        b.iter(|| black_box(xml::sign_document(black_box(&unsigned), "racun-bench", &cert)));
    });

    let signed = xml::sign_document(&unsigned, "racun-bench", &cert).unwrap();
    c.bench_function("verify_document", |b| {
        b.iter(|| black_box(xml::verify_document(black_box(&signed), "racun-bench")));
    });
}

fn bench_parse_response(c: &mut Criterion) {
    let body = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><tns:RacunOdgovor xmlns:tns="http://www.apis-it.hr/fin/2012/types/f73"><tns:Zaglavlje><tns:IdPoruke>9f0a2bd4-7c1e-4a55-9d0e-5a3f0c6b1e22</tns:IdPoruke><tns:DatumVrijeme>02.08.2025T21:48:30</tns:DatumVrijeme></tns:Zaglavlje><tns:Jir>a1b2c3d4-e5f6-4a5b-8c9d-0e1f2a3b4c5d</tns:Jir></tns:RacunOdgovor></soap:Body></soap:Envelope>"#;
    c.bench_function("parse_response", |b| {
        b.iter(|| black_box(xml::parse_response(black_box(body))));
    });
}

criterion_group!(benches, bench_zki, bench_build_and_sign, bench_parse_response);
criterion_main!(benches);
