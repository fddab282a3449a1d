//! Issued signing certificate and the values derived from it.
use base64ct::{Base64, Encoding};
use thiserror::Error;
use x509_cert::{
    der::{Decode, DecodePem, Encode, Error as DerError},
    Certificate,
};

use crate::digest::sha256_hex_base64;

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("failed to decode {context}: {source}")]
    Der {
        context: &'static str,
        #[source]
        source: DerError,
    },

    #[error("invalid base64 in {context}: {source}")]
    Base64 {
        context: &'static str,
        #[source]
        source: base64ct::Error,
    },

    #[error("invalid hex serial '{value}': {source}")]
    SerialHex {
        value: String,
        #[source]
        source: hex::FromHexError,
    },

    #[error("certificate signature has unused bits")]
    UnalignedSignature,
}

/// A code-signing certificate issued by the authority.
///
/// Holds both the parsed structure and the exact DER it was read from, so digests are always
/// taken over the issuer's bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningCertificate {
    certificate: Certificate,
    der: Vec<u8>,
}

impl SigningCertificate {
    pub fn from_der(der: &[u8]) -> Result<Self, CertificateError> {
        let certificate = Certificate::from_der(der).map_err(|e| CertificateError::Der {
            context: "certificate DER",
            source: e,
        })?;
        Ok(Self {
            certificate,
            der: der.to_vec(),
        })
    }

    pub fn from_pem(pem: &str) -> Result<Self, CertificateError> {
        let certificate =
            Certificate::from_pem(pem.as_bytes()).map_err(|e| CertificateError::Der {
                context: "certificate PEM",
                source: e,
            })?;
        let der = certificate.to_der().map_err(|e| CertificateError::Der {
            context: "certificate DER",
            source: e,
        })?;
        Ok(Self { certificate, der })
    }

    /// Base64 DER without PEM armour. Whitespace is ignored.
    pub fn from_base64(value: &str) -> Result<Self, CertificateError> {
        let der = decode_base64(value, "certificate")?;
        Self::from_der(&der)
    }

    /// The API's `binarySecurityToken`: base64 of the base64 certificate text.
    pub fn from_binary_security_token(token: &str) -> Result<Self, CertificateError> {
        let inner = decode_base64(token, "binary security token")?;
        let inner = String::from_utf8_lossy(&inner);
        Self::from_base64(&inner)
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Content of `ds:X509Certificate`.
    pub fn der_base64(&self) -> String {
        Base64::encode_string(&self.der)
    }

    /// Issuer DN with components joined by `", "`.
    pub fn issuer_name(&self) -> String {
        self.certificate
            .tbs_certificate
            .issuer
            .to_string()
            .split(',')
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn serial_decimal(&self) -> String {
        serial_bytes_to_decimal(self.certificate.tbs_certificate.serial_number.as_bytes())
    }

    pub fn serial_hex(&self) -> String {
        hex::encode_upper(self.certificate.tbs_certificate.serial_number.as_bytes())
    }

    /// `base64(hex(SHA-256(DER)))`, the xades:CertDigest value.
    pub fn digest_base64(&self) -> String {
        sha256_hex_base64(&self.der)
    }

    /// SubjectPublicKeyInfo DER of the certified key.
    pub fn public_key_der(&self) -> Result<Vec<u8>, CertificateError> {
        self.certificate
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| CertificateError::Der {
                context: "subject public key info",
                source: e,
            })
    }

    /// The issuer's signature over this certificate.
    pub fn signature_bytes(&self) -> Result<&[u8], CertificateError> {
        self.certificate
            .signature
            .as_bytes()
            .ok_or(CertificateError::UnalignedSignature)
    }
}

fn decode_base64(value: &str, context: &'static str) -> Result<Vec<u8>, CertificateError> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    Base64::decode_vec(&compact).map_err(|e| CertificateError::Base64 { context, source: e })
}

/// Decimal rendering of a hex serial number, e.g. `1F` is `31`.
///
/// # Errors
/// Returns [`CertificateError::SerialHex`] when `hex` is not valid hexadecimal.
pub fn serial_hex_to_decimal(value: &str) -> Result<String, CertificateError> {
    let trimmed = value.trim();
    let padded = if trimmed.len() % 2 == 1 {
        format!("0{trimmed}")
    } else {
        trimmed.to_string()
    };
    let bytes = hex::decode(&padded).map_err(|e| CertificateError::SerialHex {
        value: value.to_string(),
        source: e,
    })?;
    Ok(serial_bytes_to_decimal(&bytes))
}

/// Big-endian unsigned bytes to decimal digits, without size limit.
pub fn serial_bytes_to_decimal(bytes: &[u8]) -> String {
    let mut digits: Vec<u8> = vec![0];
    for &byte in bytes {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            let value = (*digit as u32) * 256 + carry;
            *digit = (value % 10) as u8;
            carry = value / 10;
        }
        while carry > 0 {
            digits.push((carry % 10) as u8);
            carry /= 10;
        }
    }

    while digits.len() > 1 && matches!(digits.last(), Some(0)) {
        digits.pop();
    }

    digits.iter().rev().map(|d| (b'0' + *d) as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_bytes_to_decimal_handles_large_values() {
        assert_eq!(serial_bytes_to_decimal(&[]), "0");
        assert_eq!(serial_bytes_to_decimal(&[0x01]), "1");
        assert_eq!(serial_bytes_to_decimal(&[0x01, 0x00]), "256");
        assert_eq!(serial_bytes_to_decimal(&[0x00, 0x01]), "1");
        assert_eq!(serial_bytes_to_decimal(&[0xFF, 0xFF]), "65535");
        assert_eq!(
            serial_bytes_to_decimal(&[0xFF; 10]),
            "1208925819614629174706175"
        );
    }

    #[test]
    fn serial_hex_to_decimal_accepts_odd_length() {
        assert_eq!(serial_hex_to_decimal("1F").unwrap(), "31");
        assert_eq!(serial_hex_to_decimal("1f").unwrap(), "31");
        assert_eq!(serial_hex_to_decimal("100").unwrap(), "256");
        assert!(matches!(
            serial_hex_to_decimal("zz"),
            Err(CertificateError::SerialHex { .. })
        ));
    }

    #[test]
    fn rejects_garbage_input() {
        assert!(matches!(
            SigningCertificate::from_base64("not base64!"),
            Err(CertificateError::Base64 { .. })
        ));
        assert!(matches!(
            SigningCertificate::from_der(&[0x30, 0x03, 0x02, 0x01, 0x01]),
            Err(CertificateError::Der { .. })
        ));
    }
}
