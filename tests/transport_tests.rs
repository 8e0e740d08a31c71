#![cfg(feature = "transport")]

use std::time::Duration;

use fiskal::core::TransportError;
use fiskal::transport::{HttpTransport, RetryPolicy, Transport, TransportConfig};
use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(5),
    }
}

fn transport_for(server: &MockServer) -> HttpTransport {
    let config = TransportConfig::new(format!("{}/FiskalizacijaServiceTest", server.uri()))
        .with_retry(fast_retry());
    HttpTransport::new(&config).unwrap()
}

#[tokio::test]
async fn posts_soap_with_expected_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/FiskalizacijaServiceTest"))
        .and(header("content-type", "text/xml; charset=utf-8"))
        .and(header_exists("SOAPAction"))
        .and(body_string_contains("<tns:RacunZahtjev"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<Jir>ok</Jir>"))
        .expect(1)
        .mount(&server)
        .await;

    let body = transport_for(&server)
        .send("<soapenv:Envelope><tns:RacunZahtjev/></soapenv:Envelope>")
        .await
        .unwrap();
    assert_eq!(body, "<Jir>ok</Jir>");
}

#[tokio::test]
async fn rejection_on_http_200_is_sent_once() {
    let server = MockServer::start().await;
    let rejection = "<Greska><SifraGreske>s004</SifraGreske>\
                     <PorukaGreske>Neispravan digitalni potpis.</PorukaGreske></Greska>";
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rejection))
        .expect(1)
        .mount(&server)
        .await;

    let body = transport_for(&server).send("<x/>").await.unwrap();
    assert_eq!(body, rejection);
}

#[tokio::test]
async fn soap_fault_status_returns_body_without_retry() {
    let server = MockServer::start().await;
    let fault = "<soap:Fault><faultcode>soap:Server</faultcode></soap:Fault>";
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string(fault))
        .expect(1)
        .mount(&server)
        .await;

    let body = transport_for(&server).send("<x/>").await.unwrap();
    assert_eq!(body, fault);
}

#[tokio::test]
async fn read_timeout_is_ambiguous_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<Jir>late</Jir>")
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = TransportConfig::new(server.uri()).with_retry(fast_retry());
    config.request_timeout = Duration::from_millis(100);
    let transport = HttpTransport::new(&config).unwrap();

    let err = transport.send("<x/>").await.unwrap_err();
    assert!(matches!(err, TransportError::Ambiguous(_)), "{err:?}");
}

#[tokio::test]
async fn refused_connection_exhausts_retries() {
    // bind then drop to get a port nothing listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config =
        TransportConfig::new(format!("http://127.0.0.1:{port}/")).with_retry(fast_retry());
    let transport = HttpTransport::new(&config).unwrap();

    let started = std::time::Instant::now();
    let err = transport.send("<x/>").await.unwrap_err();
    assert!(matches!(err, TransportError::Connect(_)), "{err:?}");
    // 5 + 10 + 20 ms of backoff
    assert!(started.elapsed() >= Duration::from_millis(35));
}

#[test]
fn pinned_bundle_must_parse() {
    let config = TransportConfig::new("https://cistest.apis-it.hr:8449/FiskalizacijaServiceTest")
        .with_pinned_ca("-----BEGIN CERTIFICATE-----\nnot base64\n-----END CERTIFICATE-----\n");
    assert!(matches!(
        HttpTransport::new(&config),
        Err(TransportError::Setup(_))
    ));
}
