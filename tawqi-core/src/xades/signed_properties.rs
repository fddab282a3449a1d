//! Literal `xades:SignedProperties` template.
//!
//! The verifier hashes this block exactly as laid out here, so its whitespace and the repeated
//! `xmlns:ds` declarations are part of the format. It is never produced through the XML writer.
use quick_xml::escape::escape;

use super::constants::{DS_NS, SHA256_ALGORITHM, SIGNED_PROPERTIES_ID, XADES_NS};
use crate::digest::sha256_hex_base64;

/// Values that fill the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPropertiesBlock {
    pub signing_time: String,
    pub certificate_digest: String,
    pub issuer_name: String,
    pub serial_number: String,
}

impl SignedPropertiesBlock {
    pub fn render(&self) -> String {
        const INDENT: &str = "                                ";
        let line = |depth: usize, text: &str| format!("{INDENT}{}{text}", "    ".repeat(depth));

        [
            format!(
                "<xades:SignedProperties xmlns:xades=\"{XADES_NS}\" Id=\"{SIGNED_PROPERTIES_ID}\">"
            ),
            line(1, "<xades:SignedSignatureProperties>"),
            line(
                2,
                &format!(
                    "<xades:SigningTime>{}</xades:SigningTime>",
                    escape(self.signing_time.as_str())
                ),
            ),
            line(2, "<xades:SigningCertificate>"),
            line(3, "<xades:Cert>"),
            line(4, "<xades:CertDigest>"),
            line(
                5,
                &format!(
                    "<ds:DigestMethod xmlns:ds=\"{DS_NS}\" Algorithm=\"{SHA256_ALGORITHM}\"/>"
                ),
            ),
            line(
                5,
                &format!(
                    "<ds:DigestValue xmlns:ds=\"{DS_NS}\">{}</ds:DigestValue>",
                    escape(self.certificate_digest.as_str())
                ),
            ),
            line(4, "</xades:CertDigest>"),
            line(4, "<xades:IssuerSerial>"),
            line(
                5,
                &format!(
                    "<ds:X509IssuerName xmlns:ds=\"{DS_NS}\">{}</ds:X509IssuerName>",
                    escape(self.issuer_name.as_str())
                ),
            ),
            line(
                5,
                &format!(
                    "<ds:X509SerialNumber xmlns:ds=\"{DS_NS}\">{}</ds:X509SerialNumber>",
                    escape(self.serial_number.as_str())
                ),
            ),
            line(4, "</xades:IssuerSerial>"),
            line(3, "</xades:Cert>"),
            line(2, "</xades:SigningCertificate>"),
            line(1, "</xades:SignedSignatureProperties>"),
            line(0, "</xades:SignedProperties>"),
        ]
        .join("\n")
    }

    /// `base64(hex(SHA-256(render())))`
    pub fn digest(&self) -> String {
        sha256_hex_base64(self.render().as_bytes())
    }
}
