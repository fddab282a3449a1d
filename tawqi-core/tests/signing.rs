mod common;

use base64ct::{Base64, Encoding};
use chrono::{TimeZone, Utc};
use k256::ecdsa::{signature::Verifier, Signature, SigningKey};
use quick_xml::events::Event;
use quick_xml::Reader;
use rand_core::OsRng;
use tawqi_core::digest::sha256_hex_base64;
use tawqi_core::qr::{QrProfile, QrSummary};
use tawqi_core::xades::{
    sign_invoice_digest, InvoiceDigest, MissingPart, SignatureBuilder, SigningError,
};

const INVOICE: &[u8] = b"<Invoice><cbc:ID>INV-1</cbc:ID></Invoice>";

fn element_text(xml: &str, name: &[u8]) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut found = Vec::new();
    let mut inside = false;
    loop {
        match reader.read_event().expect("well-formed xml") {
            Event::Start(e) if e.name().as_ref() == name => inside = true,
            Event::End(e) if e.name().as_ref() == name => inside = false,
            Event::Text(t) if inside => {
                found.push(t.unescape().expect("text").into_owned());
            }
            Event::Eof => break,
            _ => {}
        }
    }
    found
}

#[test]
fn build_reports_missing_state() {
    let key = SigningKey::random(&mut OsRng);
    let mut builder = SignatureBuilder::new();
    builder.certificate(common::self_signed_certificate(&key));

    match builder.build() {
        Err(SigningError::IncompleteSignatureState { missing }) => assert_eq!(
            missing,
            vec![MissingPart::MissingDigest, MissingPart::MissingSignatureValue]
        ),
        other => panic!("expected incomplete state, got {other:?}"),
    }
}

#[test]
fn signature_fragment_is_well_formed_and_complete() {
    common::init_logging();
    let key = SigningKey::random(&mut OsRng);
    let certificate = common::self_signed_certificate(&key);
    let digest = InvoiceDigest::from_canonical_bytes(INVOICE);
    let signature_value = sign_invoice_digest(&key, &digest).expect("sign");
    let signing_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();

    let artifact = SignatureBuilder::new()
        .certificate(certificate.clone())
        .invoice_digest(digest)
        .signature_value(signature_value.clone())
        .signing_time(signing_time)
        .build()
        .expect("signature");
    let xml = artifact.xml();

    assert_eq!(element_text(xml, b"ds:X509SerialNumber"), vec!["31"]);
    assert_eq!(
        element_text(xml, b"xades:SigningTime"),
        vec!["2024-01-01T12:30:00"]
    );
    assert_eq!(element_text(xml, b"ds:SignatureValue"), vec![signature_value]);
    assert_eq!(
        element_text(xml, b"ds:X509Certificate"),
        vec![certificate.der_base64()]
    );

    let digests = element_text(xml, b"ds:DigestValue");
    assert!(digests.contains(&digest.to_base64()), "invoice digest");
    assert!(digests.contains(&artifact.signed_properties_digest().to_string()));
    assert!(digests.contains(&certificate.digest_base64()));

    let issuer = element_text(xml, b"ds:X509IssuerName");
    assert_eq!(issuer.len(), 1);
    assert!(issuer[0].contains("CN=Test CA"), "issuer: {}", issuer[0]);
}

#[test]
fn signed_properties_are_embedded_as_hashed() {
    let key = SigningKey::random(&mut OsRng);
    let digest = InvoiceDigest::from_canonical_bytes(INVOICE);
    let artifact = SignatureBuilder::new()
        .certificate(common::self_signed_certificate(&key))
        .invoice_digest(digest)
        .signature_value(sign_invoice_digest(&key, &digest).expect("sign"))
        .build()
        .expect("signature");

    let block = artifact.signed_properties().render();
    assert!(artifact.xml().contains(&block));
    assert_eq!(
        artifact.signed_properties_digest(),
        sha256_hex_base64(block.as_bytes())
    );
    assert_eq!(
        artifact.signed_properties().digest(),
        artifact.signed_properties_digest()
    );
}

#[test]
fn signature_value_verifies_with_certificate_key() {
    let key = SigningKey::random(&mut OsRng);
    let digest = InvoiceDigest::from_canonical_bytes(INVOICE);
    let value = sign_invoice_digest(&key, &digest).expect("sign");
    let artifact = SignatureBuilder::new()
        .certificate(common::self_signed_certificate(&key))
        .invoice_digest(digest)
        .signature_value(value)
        .build()
        .expect("signature");

    let signature = Signature::from_der(artifact.signature_bytes()).expect("der signature");
    assert!(key.verifying_key().verify(digest.as_bytes(), &signature).is_ok());
}

#[test]
fn non_base64_signature_value_is_rejected() {
    let key = SigningKey::random(&mut OsRng);
    let result = SignatureBuilder::new()
        .certificate(common::self_signed_certificate(&key))
        .invoice_digest(InvoiceDigest::from_canonical_bytes(INVOICE))
        .signature_value("not base64!")
        .build();
    assert!(matches!(
        result,
        Err(SigningError::Base64 {
            context: "signature value",
            ..
        })
    ));
}

#[test]
fn qr_payload_carries_signature_values() {
    let key = SigningKey::random(&mut OsRng);
    let certificate = common::self_signed_certificate(&key);
    let digest = InvoiceDigest::from_canonical_bytes(INVOICE);
    let artifact = SignatureBuilder::new()
        .certificate(certificate.clone())
        .invoice_digest(digest)
        .signature_value(sign_invoice_digest(&key, &digest).expect("sign"))
        .build()
        .expect("signature");

    let issued_at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
    let summary = QrSummary::new("Acme Inc", "399999999900003", issued_at, "115.00", "15.00")
        .with_signature(&artifact, &certificate)
        .expect("qr summary");
    let encoded = summary.encode(QrProfile::Phase2).expect("encode");
    let decoded = QrSummary::decode(&encoded).expect("decode");

    assert_eq!(decoded, summary);
    assert_eq!(decoded.invoice_hash.as_deref(), Some(&digest.as_bytes()[..]));
    assert_eq!(
        decoded.signature.as_deref(),
        Some(artifact.signature_bytes())
    );
    assert_eq!(
        decoded.public_key.as_deref(),
        Some(certificate.public_key_der().expect("spki").as_slice())
    );
    assert_eq!(
        Base64::encode_string(decoded.invoice_hash.as_deref().unwrap_or_default()),
        artifact.invoice_hash()
    );
}
