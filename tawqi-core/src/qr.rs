//! TLV payload for the invoice QR code.
//!
//! Each field is written as `tag (1 byte) | length | value`. Lengths up to 255 take one byte;
//! longer values are written as a `0x00` marker followed by a big-endian `u16` length. Values
//! are never empty, so the marker cannot be confused with a real length.
use std::fmt;

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    certificate::{CertificateError, SigningCertificate},
    xades::SignatureArtifact,
};

/// Scanner guideline for the base64 payload length.
pub const RECOMMENDED_MAX_ENCODED_LEN: usize = 700;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const SHORT_MAX: usize = u8::MAX as usize;
const EXTENDED_LENGTH_MARKER: u8 = 0x00;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum QrTag {
    SellerName = 1,
    VatNumber = 2,
    Timestamp = 3,
    InvoiceTotal = 4,
    VatTotal = 5,
    InvoiceHash = 6,
    Signature = 7,
    PublicKey = 8,
    CertificateSignature = 9,
}

impl QrTag {
    pub fn code(self) -> u8 {
        self as u8
    }

    fn is_binary(self) -> bool {
        matches!(
            self,
            QrTag::InvoiceHash | QrTag::Signature | QrTag::PublicKey | QrTag::CertificateSignature
        )
    }
}

impl TryFrom<u8> for QrTag {
    type Error = QrCodeError;

    fn try_from(tag: u8) -> Result<Self, QrCodeError> {
        Ok(match tag {
            1 => QrTag::SellerName,
            2 => QrTag::VatNumber,
            3 => QrTag::Timestamp,
            4 => QrTag::InvoiceTotal,
            5 => QrTag::VatTotal,
            6 => QrTag::InvoiceHash,
            7 => QrTag::Signature,
            8 => QrTag::PublicKey,
            9 => QrTag::CertificateSignature,
            other => return Err(QrCodeError::UnknownTag { tag: other }),
        })
    }
}

impl fmt::Display for QrTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

#[derive(Debug, Error)]
pub enum QrCodeError {
    #[error("QR field {tag} exceeds {max} bytes (len={len})")]
    FieldTooLarge { tag: QrTag, len: usize, max: usize },
    #[error("QR field {0} is missing")]
    MissingField(QrTag),
    #[error("QR field {0} appears more than once")]
    DuplicateField(QrTag),
    #[error("unknown QR tag {tag}")]
    UnknownTag { tag: u8 },
    #[error("QR payload truncated at byte {offset}")]
    Truncated { offset: usize },
    #[error("QR field {tag} is not valid UTF-8")]
    InvalidUtf8 { tag: QrTag },
    #[error("invalid base64 QR payload: {0}")]
    Base64(#[from] base64ct::Error),
    #[error(transparent)]
    Certificate(#[from] CertificateError),
}

pub type QrResult<T> = std::result::Result<T, QrCodeError>;

/// Which tags are written and how large each may be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QrProfile {
    /// Seller, VAT number, timestamp and totals only.
    Phase1,
    /// Adds the invoice hash, signature, public key and certificate signature.
    #[default]
    Phase2,
}

impl QrProfile {
    fn max_len(self, tag: QrTag) -> usize {
        match self {
            QrProfile::Phase2 if tag.is_binary() => u16::MAX as usize,
            _ => SHORT_MAX,
        }
    }
}

/// Invoice values carried by the QR code.
///
/// Amounts are written as given, so callers format them (e.g. `"115.00"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrSummary {
    pub seller_name: String,
    pub vat_number: String,
    pub timestamp: String,
    pub invoice_total: String,
    pub vat_total: String,
    pub invoice_hash: Option<Vec<u8>>,
    pub signature: Option<Vec<u8>>,
    pub public_key: Option<Vec<u8>>,
    pub certificate_signature: Option<Vec<u8>>,
}

impl QrSummary {
    pub fn new(
        seller_name: impl Into<String>,
        vat_number: impl Into<String>,
        issued_at: DateTime<Utc>,
        invoice_total: impl Into<String>,
        vat_total: impl Into<String>,
    ) -> Self {
        Self {
            seller_name: seller_name.into(),
            vat_number: vat_number.into(),
            timestamp: issued_at.format(TIMESTAMP_FORMAT).to_string(),
            invoice_total: invoice_total.into(),
            vat_total: vat_total.into(),
            invoice_hash: None,
            signature: None,
            public_key: None,
            certificate_signature: None,
        }
    }

    /// Fill tags 6-9 from a built signature and the certificate that produced it.
    pub fn with_signature(
        mut self,
        artifact: &SignatureArtifact,
        certificate: &SigningCertificate,
    ) -> QrResult<Self> {
        self.invoice_hash = Some(artifact.invoice_digest().as_bytes().to_vec());
        self.signature = Some(artifact.signature_bytes().to_vec());
        self.public_key = Some(certificate.public_key_der()?);
        self.certificate_signature = Some(certificate.signature_bytes()?.to_vec());
        Ok(self)
    }

    fn text_fields(&self) -> [(QrTag, &str); 5] {
        [
            (QrTag::SellerName, self.seller_name.as_str()),
            (QrTag::VatNumber, self.vat_number.as_str()),
            (QrTag::Timestamp, self.timestamp.as_str()),
            (QrTag::InvoiceTotal, self.invoice_total.as_str()),
            (QrTag::VatTotal, self.vat_total.as_str()),
        ]
    }

    /// Encode as base64 TLV.
    ///
    /// # Errors
    /// Returns [`QrCodeError::MissingField`] for a missing hash, signature or public key under
    /// [`QrProfile::Phase2`], and
    /// [`QrCodeError::FieldTooLarge`] when a value exceeds the profile's limit.
    pub fn encode(&self, profile: QrProfile) -> QrResult<String> {
        let mut tlv = TlvBuilder::new(profile);
        for (tag, value) in self.text_fields() {
            tlv.push_str(tag, value)?;
        }

        if profile == QrProfile::Phase2 {
            let required = [
                (QrTag::InvoiceHash, &self.invoice_hash),
                (QrTag::Signature, &self.signature),
                (QrTag::PublicKey, &self.public_key),
            ];
            for (tag, value) in required {
                let value = value.as_deref().ok_or(QrCodeError::MissingField(tag))?;
                tlv.push_bytes(tag, value)?;
            }
            if let Some(stamp) = self.certificate_signature.as_deref() {
                tlv.push_bytes(QrTag::CertificateSignature, stamp)?;
            }
        }

        Ok(tlv.finish())
    }

    /// Decode a base64 TLV payload produced by [`encode`](QrSummary::encode).
    ///
    /// # Errors
    /// Returns a [`QrCodeError`] for malformed base64, truncated or unknown fields, and
    /// missing text fields.
    pub fn decode(encoded: &str) -> QrResult<Self> {
        let bytes = Base64::decode_vec(encoded.trim())?;
        let mut summary = QrSummary {
            seller_name: String::new(),
            vat_number: String::new(),
            timestamp: String::new(),
            invoice_total: String::new(),
            vat_total: String::new(),
            invoice_hash: None,
            signature: None,
            public_key: None,
            certificate_signature: None,
        };
        let mut seen: Vec<QrTag> = Vec::new();

        for field in TlvReader::new(&bytes) {
            let (tag, value) = field?;
            if seen.contains(&tag) {
                return Err(QrCodeError::DuplicateField(tag));
            }
            seen.push(tag);

            let text = || {
                String::from_utf8(value.to_vec()).map_err(|_| QrCodeError::InvalidUtf8 { tag })
            };
            match tag {
                QrTag::SellerName => summary.seller_name = text()?,
                QrTag::VatNumber => summary.vat_number = text()?,
                QrTag::Timestamp => summary.timestamp = text()?,
                QrTag::InvoiceTotal => summary.invoice_total = text()?,
                QrTag::VatTotal => summary.vat_total = text()?,
                QrTag::InvoiceHash => summary.invoice_hash = Some(value.to_vec()),
                QrTag::Signature => summary.signature = Some(value.to_vec()),
                QrTag::PublicKey => summary.public_key = Some(value.to_vec()),
                QrTag::CertificateSignature => {
                    summary.certificate_signature = Some(value.to_vec())
                }
            }
        }

        if let Some((tag, _)) = summary
            .text_fields()
            .into_iter()
            .find(|(tag, _)| !seen.contains(tag))
        {
            return Err(QrCodeError::MissingField(tag));
        }
        Ok(summary)
    }
}

struct TlvBuilder {
    profile: QrProfile,
    bytes: Vec<u8>,
}

impl TlvBuilder {
    fn new(profile: QrProfile) -> Self {
        Self {
            profile,
            bytes: Vec::new(),
        }
    }

    fn push_str(&mut self, tag: QrTag, value: &str) -> QrResult<()> {
        self.push_bytes(tag, value.as_bytes())
    }

    fn push_bytes(&mut self, tag: QrTag, value: &[u8]) -> QrResult<()> {
        let max = self.profile.max_len(tag);
        if value.len() > max {
            return Err(QrCodeError::FieldTooLarge {
                tag,
                len: value.len(),
                max,
            });
        }
        self.bytes.push(tag.code());
        // a zero short length would read as the extended marker
        if (1..=SHORT_MAX).contains(&value.len()) {
            self.bytes.push(value.len() as u8);
        } else {
            self.bytes.push(EXTENDED_LENGTH_MARKER);
            self.bytes
                .extend_from_slice(&(value.len() as u16).to_be_bytes());
        }
        self.bytes.extend_from_slice(value);
        Ok(())
    }

    fn finish(self) -> String {
        let encoded = Base64::encode_string(&self.bytes);
        if encoded.len() > RECOMMENDED_MAX_ENCODED_LEN {
            log::warn!(
                "QR payload is {} characters, above the {} character guideline",
                encoded.len(),
                RECOMMENDED_MAX_ENCODED_LEN
            );
        } else {
            log::debug!("encoded QR payload of {} characters", encoded.len());
        }
        encoded
    }
}

struct TlvReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> TlvReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, len: usize) -> QrResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(QrCodeError::Truncated {
                offset: self.offset,
            })?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn next_field(&mut self) -> QrResult<(QrTag, &'a [u8])> {
        let tag = QrTag::try_from(self.take(1)?[0])?;
        let len = match self.take(1)?[0] {
            EXTENDED_LENGTH_MARKER => {
                let len = self.take(2)?;
                u16::from_be_bytes([len[0], len[1]]) as usize
            }
            short => short as usize,
        };
        Ok((tag, self.take(len)?))
    }
}

impl<'a> Iterator for TlvReader<'a> {
    type Item = QrResult<(QrTag, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.bytes.len() {
            return None;
        }
        let field = self.next_field();
        if field.is_err() {
            self.offset = self.bytes.len();
        }
        Some(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn summary() -> QrSummary {
        let issued = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        QrSummary::new("Acme Inc", "301121971500003", issued, "115.00", "15.00")
    }

    fn decode_tlv(bytes: &[u8]) -> Vec<(u8, Vec<u8>)> {
        let mut entries = Vec::new();
        let mut idx = 0;
        while idx < bytes.len() {
            let tag = bytes[idx];
            let len = bytes[idx + 1] as usize;
            let start = idx + 2;
            let end = start + len;
            entries.push((tag, bytes[start..end].to_vec()));
            idx = end;
        }
        entries
    }

    #[test]
    fn phase1_writes_text_tags_in_order() {
        let qr = summary().encode(QrProfile::Phase1).unwrap();
        let raw = Base64::decode_vec(&qr).unwrap();
        assert_eq!(
            decode_tlv(&raw),
            vec![
                (1, b"Acme Inc".to_vec()),
                (2, b"301121971500003".to_vec()),
                (3, b"2024-01-01T12:30:00".to_vec()),
                (4, b"115.00".to_vec()),
                (5, b"15.00".to_vec()),
            ]
        );
    }

    #[test]
    fn phase2_requires_signing_fields() {
        match summary().encode(QrProfile::Phase2) {
            Err(QrCodeError::MissingField(QrTag::InvoiceHash)) => {}
            other => panic!("expected missing hash, got {other:?}"),
        }
    }

    #[test]
    fn phase2_writes_binary_fields() {
        let mut summary = summary();
        summary.invoice_hash = Some(vec![0xAB; 32]);
        summary.signature = Some(vec![0x30; 70]);
        summary.public_key = Some(vec![0x04; 88]);
        summary.certificate_signature = Some(vec![0x01; 71]);

        let raw = Base64::decode_vec(&summary.encode(QrProfile::Phase2).unwrap()).unwrap();
        let entries = decode_tlv(&raw);
        let tags: Vec<u8> = entries.iter().map(|(tag, _)| *tag).collect();
        assert_eq!(tags, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(entries[5].1, vec![0xAB; 32]);
    }

    #[test]
    fn long_values_use_extended_length() {
        let mut summary = summary();
        summary.invoice_hash = Some(vec![1; 32]);
        summary.signature = Some(vec![2; 72]);
        summary.public_key = Some(vec![3; 300]);

        let encoded = summary.encode(QrProfile::Phase2).unwrap();
        let raw = Base64::decode_vec(&encoded).unwrap();
        let key_at = raw.windows(4).position(|w| w == [8, 0x00, 0x01, 0x2c]);
        assert!(key_at.is_some());
        assert_eq!(QrSummary::decode(&encoded).unwrap(), summary);
    }

    #[test]
    fn text_fields_are_limited_to_255_bytes() {
        let mut summary = summary();
        summary.seller_name = "a".repeat(256);
        match summary.encode(QrProfile::Phase1) {
            Err(QrCodeError::FieldTooLarge { tag, len, max }) => {
                assert_eq!(tag, QrTag::SellerName);
                assert_eq!(len, 256);
                assert_eq!(max, 255);
            }
            other => panic!("expected FieldTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn empty_values_use_zero_extended_length() {
        let issued = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        let summary = QrSummary::new("Acme", "399999999900003", issued, "115.00", "");

        let encoded = summary.encode(QrProfile::Phase1).unwrap();
        let raw = Base64::decode_vec(&encoded).unwrap();
        assert_eq!(&raw[raw.len() - 4..], &[5, 0x00, 0x00, 0x00]);
        assert_eq!(QrSummary::decode(&encoded).unwrap(), summary);
    }

    #[test]
    fn decode_rejects_malformed_payloads() {
        let truncated = Base64::encode_string(&[1, 5, b'a']);
        assert!(matches!(
            QrSummary::decode(&truncated),
            Err(QrCodeError::Truncated { .. })
        ));
        let unknown = Base64::encode_string(&[42, 1, b'a']);
        assert!(matches!(
            QrSummary::decode(&unknown),
            Err(QrCodeError::UnknownTag { tag: 42 })
        ));
        let partial = Base64::encode_string(&[1, 1, b'a']);
        assert!(matches!(
            QrSummary::decode(&partial),
            Err(QrCodeError::MissingField(QrTag::VatNumber))
        ));
    }
}
