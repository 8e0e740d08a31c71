#![cfg(feature = "xml")]

mod common;

use fiskal::core::*;
use fiskal::crypto::compute_zki;
use fiskal::xml::*;
use proptest::prelude::*;
use uuid::Uuid;

fn unsigned(sign_id: &str) -> (String, ZkiCode) {
    let cert = common::certificate();
    let req = common::request();
    let zki = compute_zki(&cert, &req).unwrap();
    let xml = build_request_xml(&req, &zki, sign_id, Uuid::new_v4()).unwrap();
    (xml, zki)
}

const GOLDEN_REQUEST: &str = concat!(
    r#"<tns:RacunZahtjev xmlns:tns="http://www.apis-it.hr/fin/2012/types/f73" Id="racun-golden">"#,
    "<tns:Zaglavlje><tns:IdPoruke>00000000-0000-0000-0000-000000000000</tns:IdPoruke>",
    "<tns:DatumVrijeme>02.08.2025T21:48:29</tns:DatumVrijeme></tns:Zaglavlje>",
    "<tns:Racun><tns:Oib>87246357068</tns:Oib><tns:USustPdv>true</tns:USustPdv>",
    "<tns:DatVrijeme>02.08.2025T21:48:29</tns:DatVrijeme><tns:OznSlijed>P</tns:OznSlijed>",
    "<tns:BrRac><tns:BrOznRac>634</tns:BrOznRac><tns:OznPosPr>POSL1</tns:OznPosPr>",
    "<tns:OznNapUr>2</tns:OznNapUr></tns:BrRac>",
    "<tns:Pdv><tns:Porez><tns:Stopa>25.00</tns:Stopa><tns:Osnovica>5.60</tns:Osnovica>",
    "<tns:Iznos>1.40</tns:Iznos></tns:Porez></tns:Pdv>",
    "<tns:IznosUkupno>7.00</tns:IznosUkupno><tns:NacinPlac>K</tns:NacinPlac>",
    "<tns:OibOper>87246357068</tns:OibOper>",
    "<tns:ZastKod>16ac248e21a738625b98d17e51149e87</tns:ZastKod>",
    "<tns:NakDost>false</tns:NakDost></tns:Racun></tns:RacunZahtjev>",
);

/// Base64 SHA-1 of the exclusive canonical form of [`GOLDEN_REQUEST`].
const GOLDEN_DIGEST: &str = "nO5VfOcz5T29wWEeTmnm5lOWGGE=";

#[test]
fn reference_request_has_fixed_digest() {
    let zki = ZkiCode::from_hex("16ac248e21a738625b98d17e51149e87").unwrap();
    let xml = build_request_xml(&common::request(), &zki, "racun-golden", Uuid::nil()).unwrap();
    assert_eq!(xml, GOLDEN_REQUEST);
    assert_eq!(exc_c14n(&xml).unwrap(), GOLDEN_REQUEST);

    let signed = sign_document(&xml, "racun-golden", &common::certificate()).unwrap();
    assert!(signed.contains(&format!("<DigestValue>{GOLDEN_DIGEST}</DigestValue>")));
}

#[test]
fn exclusive_c14n_drops_unused_namespaces_and_sorts_attributes() {
    assert_eq!(
        exc_c14n(r#"<w xmlns:x="urn:unused" z="2" b="1"><c/></w>"#).unwrap(),
        r#"<w b="1" z="2"><c></c></w>"#
    );
    // a prefix is declared where it is used, not where it was inherited from
    assert_eq!(
        exc_c14n(r#"<w xmlns:x="urn:x"><x:a Id="1"/></w>"#).unwrap(),
        r#"<w><x:a xmlns:x="urn:x" Id="1"></x:a></w>"#
    );
}

#[test]
fn signed_request_verifies() {
    let cert = common::certificate();
    let (xml, _) = unsigned("racun-1");
    let signed = sign_document(&xml, "racun-1", &cert).unwrap();
    assert!(verify_document(&signed, "racun-1").unwrap());
}

#[test]
fn signature_is_last_child_of_signed_element() {
    let cert = common::certificate();
    let (xml, _) = unsigned("racun-1");
    let signed = sign_document(&xml, "racun-1", &cert).unwrap();
    assert!(signed.ends_with("</Signature></tns:RacunZahtjev>"));
    assert!(signed.contains(&format!("<Signature xmlns=\"{DSIG_NS}\"><SignedInfo>")));
    assert!(signed.contains(&format!(
        "<CanonicalizationMethod Algorithm=\"{EXC_C14N}\"></CanonicalizationMethod>"
    )));
    assert!(signed.contains(&format!(
        "<SignatureMethod Algorithm=\"{RSA_SHA1}\"></SignatureMethod>"
    )));
    assert!(signed.contains("<X509SerialNumber>4242</X509SerialNumber>"));
    assert!(signed.contains("<X509IssuerName>CN=FISKAL 1,O=Test d.o.o.,C=HR</X509IssuerName>"));
}

#[test]
fn enveloped_transform_precedes_c14n() {
    let cert = common::certificate();
    let (xml, _) = unsigned("racun-1");
    let signed = sign_document(&xml, "racun-1", &cert).unwrap();
    let enveloped = signed.find(ENVELOPED_SIGNATURE).unwrap();
    let c14n = signed[enveloped..].find(EXC_C14N);
    assert!(c14n.is_some());
}

#[test]
fn signing_is_deterministic() {
    let cert = common::certificate();
    let (xml, _) = unsigned("racun-1");
    assert_eq!(
        sign_document(&xml, "racun-1", &cert).unwrap(),
        sign_document(&xml, "racun-1", &cert).unwrap()
    );
}

#[test]
fn tampering_breaks_verification() {
    let cert = common::certificate();
    let (xml, _) = unsigned("racun-1");
    let signed = sign_document(&xml, "racun-1", &cert).unwrap();
    let tampered = signed.replace(
        "<tns:IznosUkupno>7.00</tns:IznosUkupno>",
        "<tns:IznosUkupno>0.70</tns:IznosUkupno>",
    );
    assert_ne!(tampered, signed);
    assert!(!verify_document(&tampered, "racun-1").unwrap());
}

#[test]
fn signature_survives_soap_embedding() {
    let cert = common::certificate();
    let (xml, _) = unsigned("racun-1");
    let signed = sign_document(&xml, "racun-1", &cert).unwrap();
    let envelope = soap_envelope(&signed).unwrap();
    assert!(verify_document(&envelope, "racun-1").unwrap());
}

#[test]
fn missing_and_duplicate_targets() {
    let cert = common::certificate();
    let (xml, _) = unsigned("racun-1");
    assert!(matches!(
        sign_document(&xml, "racun-2", &cert),
        Err(SigningError::MissingSignTarget(_))
    ));
    let doubled = format!("<w>{xml}{xml}</w>");
    assert!(matches!(
        sign_document(&doubled, "racun-1", &cert),
        Err(SigningError::DuplicateSignTarget(_))
    ));
}

#[test]
fn signing_twice_is_refused() {
    let cert = common::certificate();
    let (xml, _) = unsigned("racun-1");
    let signed = sign_document(&xml, "racun-1", &cert).unwrap();
    assert!(sign_document(&signed, "racun-1", &cert).is_err());
}

#[test]
fn sign_request_embeds_zki_and_fresh_ids() {
    let cert = common::certificate();
    let req = common::request();
    let zki = compute_zki(&cert, &req).unwrap();
    let a = sign_request(&req, &zki, &cert).unwrap();
    let b = sign_request(&req, &zki, &cert).unwrap();
    assert_ne!(a.sign_id, b.sign_id);
    assert_ne!(a.message_id, b.message_id);
    assert!(a.xml.contains(&format!("<tns:ZastKod>{zki}</tns:ZastKod>")));
    assert!(verify_document(&a.xml, &a.sign_id).unwrap());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn reference_uri_is_hash_plus_id(sign_id in "[A-Za-z_][A-Za-z0-9_.-]{0,40}") {
        let cert = common::certificate();
        let (xml, _) = unsigned(&sign_id);
        let signed = sign_document(&xml, &sign_id, &cert).unwrap();
        let expected = format!("<Reference URI=\"#{}\">", sign_id);
        prop_assert!(signed.contains(&expected));
        prop_assert!(verify_document(&signed, &sign_id).unwrap());
    }
}
