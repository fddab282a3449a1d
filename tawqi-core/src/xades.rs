//! XAdES enveloped signature for UBL invoices.
//!
//! The builder combines an issued certificate, the canonical invoice digest and the ECDSA
//! signature value into the `ext:UBLExtension` block that is spliced into the invoice.
mod constants;
mod fragment;
mod signed_properties;

pub use signed_properties::SignedPropertiesBlock;

use std::fmt;

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use k256::ecdsa::{signature::Signer, DerSignature, SigningKey};
use thiserror::Error;

use crate::{
    certificate::{CertificateError, SigningCertificate},
    digest::sha256,
};
use constants::SIGNING_TIME_FORMAT;
use fragment::{write_fragment, FragmentValues};

/// Inputs a signature cannot be built without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPart {
    MissingCertificate,
    MissingDigest,
    MissingSignatureValue,
}

impl fmt::Display for MissingPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MissingPart::MissingCertificate => "certificate",
            MissingPart::MissingDigest => "invoice digest",
            MissingPart::MissingSignatureValue => "signature value",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("incomplete signature state, missing: {}", join_parts(.missing))]
    IncompleteSignatureState { missing: Vec<MissingPart> },

    #[error("invalid base64 in {context}: {source}")]
    Base64 {
        context: &'static str,
        #[source]
        source: base64ct::Error,
    },

    #[error("invoice digest must be 32 bytes, got {len}")]
    InvalidDigestLength { len: usize },

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error("failed to sign invoice digest: {message}")]
    Sign { message: String },

    #[error("failed to write signature XML: {message}")]
    Xml { message: String },
}

fn join_parts(parts: &[MissingPart]) -> String {
    parts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// SHA-256 of the canonicalized invoice with UBLExtensions, cac:Signature and the QR
/// reference removed.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvoiceDigest([u8; 32]);

impl InvoiceDigest {
    /// Hash already-canonicalized invoice bytes.
    pub fn from_canonical_bytes(canonical: &[u8]) -> Self {
        Self(sha256(canonical))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Accept a digest computed elsewhere, as base64 of the raw hash.
    pub fn from_base64(value: &str) -> Result<Self, SigningError> {
        let bytes = Base64::decode_vec(value.trim()).map_err(|e| SigningError::Base64 {
            context: "invoice digest",
            source: e,
        })?;
        let raw: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| SigningError::InvalidDigestLength { len: bytes.len() })?;
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        Base64::encode_string(&self.0)
    }
}

impl fmt::Debug for InvoiceDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InvoiceDigest").field(&self.to_base64()).finish()
    }
}

/// ECDSA signature over the invoice digest, as base64 DER.
///
/// The digest bytes are the signed message, so they are hashed once more with SHA-256.
pub fn sign_invoice_digest(key: &SigningKey, digest: &InvoiceDigest) -> Result<String, SigningError> {
    let signature: DerSignature = key
        .try_sign(digest.as_bytes())
        .map_err(|e| SigningError::Sign {
            message: e.to_string(),
        })?;
    Ok(Base64::encode_string(signature.as_bytes()))
}

/// Collects the signature inputs; [`build`](SignatureBuilder::build) checks all are present.
///
/// # Examples
/// ```rust
/// use tawqi_core::xades::{MissingPart, SignatureBuilder, SigningError};
///
/// let err = SignatureBuilder::new().build().unwrap_err();
/// assert!(matches!(
///     err,
///     SigningError::IncompleteSignatureState { ref missing } if missing.len() == 3
/// ));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SignatureBuilder {
    certificate: Option<SigningCertificate>,
    invoice_digest: Option<InvoiceDigest>,
    signature_value: Option<String>,
    signing_time: Option<DateTime<Utc>>,
}

impl SignatureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn certificate(&mut self, certificate: SigningCertificate) -> &mut Self {
        self.certificate = Some(certificate);
        self
    }

    pub fn invoice_digest(&mut self, digest: InvoiceDigest) -> &mut Self {
        self.invoice_digest = Some(digest);
        self
    }

    /// Base64 DER ECDSA signature, e.g. from [`sign_invoice_digest`].
    pub fn signature_value(&mut self, value: impl Into<String>) -> &mut Self {
        self.signature_value = Some(value.into());
        self
    }

    /// Defaults to the current UTC time.
    pub fn signing_time(&mut self, time: DateTime<Utc>) -> &mut Self {
        self.signing_time = Some(time);
        self
    }

    /// Assemble the signature block.
    ///
    /// # Errors
    /// Returns [`SigningError::IncompleteSignatureState`] naming every missing input, or
    /// [`SigningError::Base64`] if the signature value is not base64.
    pub fn build(&self) -> Result<SignatureArtifact, SigningError> {
        let (Some(certificate), Some(invoice_digest), Some(signature_value)) = (
            self.certificate.as_ref(),
            self.invoice_digest.as_ref(),
            self.signature_value.as_deref(),
        ) else {
            let mut missing = Vec::new();
            if self.certificate.is_none() {
                missing.push(MissingPart::MissingCertificate);
            }
            if self.invoice_digest.is_none() {
                missing.push(MissingPart::MissingDigest);
            }
            if self.signature_value.is_none() {
                missing.push(MissingPart::MissingSignatureValue);
            }
            return Err(SigningError::IncompleteSignatureState { missing });
        };

        let signature_value = signature_value.trim();
        let signature_bytes =
            Base64::decode_vec(signature_value).map_err(|e| SigningError::Base64 {
                context: "signature value",
                source: e,
            })?;

        let signing_time = self.signing_time.unwrap_or_else(Utc::now);
        let signed_properties = SignedPropertiesBlock {
            signing_time: signing_time.format(SIGNING_TIME_FORMAT).to_string(),
            certificate_digest: certificate.digest_base64(),
            issuer_name: certificate.issuer_name(),
            serial_number: certificate.serial_decimal(),
        };
        let signed_properties_xml = signed_properties.render();
        let signed_properties_digest = signed_properties.digest();
        let invoice_digest_b64 = invoice_digest.to_base64();

        let xml = write_fragment(&FragmentValues {
            invoice_digest: &invoice_digest_b64,
            signed_properties_digest: &signed_properties_digest,
            signature_value,
            certificate_base64: &certificate.der_base64(),
            signed_properties: &signed_properties_xml,
        })?;
        log::debug!(
            "built signature fragment of {} bytes for certificate serial {}",
            xml.len(),
            signed_properties.serial_number
        );

        Ok(SignatureArtifact {
            xml,
            invoice_digest: *invoice_digest,
            signature_value: signature_value.to_string(),
            signature_bytes,
            signed_properties,
            signed_properties_digest,
            signing_time,
        })
    }
}

/// Immutable result of [`SignatureBuilder::build`].
#[derive(Debug, Clone)]
pub struct SignatureArtifact {
    xml: String,
    invoice_digest: InvoiceDigest,
    signature_value: String,
    signature_bytes: Vec<u8>,
    signed_properties: SignedPropertiesBlock,
    signed_properties_digest: String,
    signing_time: DateTime<Utc>,
}

impl SignatureArtifact {
    /// The `ext:UBLExtension` fragment.
    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn invoice_digest(&self) -> &InvoiceDigest {
        &self.invoice_digest
    }

    /// Base64 invoice hash, as also placed in the QR payload.
    pub fn invoice_hash(&self) -> String {
        self.invoice_digest.to_base64()
    }

    pub fn signature_value(&self) -> &str {
        &self.signature_value
    }

    pub fn signature_bytes(&self) -> &[u8] {
        &self.signature_bytes
    }

    pub fn signed_properties(&self) -> &SignedPropertiesBlock {
        &self.signed_properties
    }

    pub fn signed_properties_digest(&self) -> &str {
        &self.signed_properties_digest
    }

    pub fn certificate_digest(&self) -> &str {
        &self.signed_properties.certificate_digest
    }

    pub fn signing_time(&self) -> DateTime<Utc> {
        self.signing_time
    }
}
