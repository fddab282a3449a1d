use base64ct::{Base64, Encoding};
use tawqi_core::qr::{QrCodeError, QrProfile, QrSummary, QrTag};

const BOBS_RECORDS: &str =
    "AQxCb2JzIFJlY29yZHMCDzMxMDEyMjM5MzUwMDAwMwMUMjAyMi0wNC0yNVQxNTozMDowMFoEBzEwMDAuMDAFBjE1MC4wMA==";

fn bobs_records() -> QrSummary {
    QrSummary {
        seller_name: "Bobs Records".into(),
        vat_number: "310122393500003".into(),
        timestamp: "2022-04-25T15:30:00Z".into(),
        invoice_total: "1000.00".into(),
        vat_total: "150.00".into(),
        invoice_hash: None,
        signature: None,
        public_key: None,
        certificate_signature: None,
    }
}

#[test]
fn phase1_matches_published_sample() {
    assert_eq!(bobs_records().encode(QrProfile::Phase1).unwrap(), BOBS_RECORDS);
    assert_eq!(QrSummary::decode(BOBS_RECORDS).unwrap(), bobs_records());
}

#[test]
fn arabic_seller_name_is_measured_in_bytes() {
    let summary = QrSummary {
        seller_name: "شركة التوريد".into(),
        ..bobs_records()
    };
    let raw = Base64::decode_vec(&summary.encode(QrProfile::Phase1).unwrap()).unwrap();
    assert_eq!(raw[0], 1);
    assert_eq!(raw[1] as usize, "شركة التوريد".len());
    assert_eq!(
        QrSummary::decode(&Base64::encode_string(&raw)).unwrap().seller_name,
        "شركة التوريد"
    );
}

#[test]
fn duplicate_and_unknown_tags_are_rejected() {
    let mut raw = Base64::decode_vec(BOBS_RECORDS).unwrap();
    raw.extend_from_slice(&[1, 1, b'X']);
    assert!(matches!(
        QrSummary::decode(&Base64::encode_string(&raw)),
        Err(QrCodeError::DuplicateField(QrTag::SellerName))
    ));

    let mut raw = Base64::decode_vec(BOBS_RECORDS).unwrap();
    raw.extend_from_slice(&[10, 1, b'X']);
    assert!(QrSummary::decode(&Base64::encode_string(&raw)).is_err());
}

#[test]
fn missing_text_field_is_reported_on_decode() {
    let raw = Base64::decode_vec(BOBS_RECORDS).unwrap();
    // drop the trailing VAT total field
    let truncated = &raw[..raw.len() - 8];
    assert!(matches!(
        QrSummary::decode(&Base64::encode_string(truncated)),
        Err(QrCodeError::MissingField(QrTag::VatTotal))
    ));
}

#[test]
fn phase2_round_trips_with_certificate_signature() {
    let summary = QrSummary {
        invoice_hash: Some(vec![0x11; 32]),
        signature: Some(vec![0x30; 71]),
        public_key: Some(vec![0x30; 88]),
        certificate_signature: Some(vec![0x30; 300]),
        ..bobs_records()
    };
    let encoded = summary.encode(QrProfile::Phase2).unwrap();
    assert_eq!(QrSummary::decode(&encoded).unwrap(), summary);
}
