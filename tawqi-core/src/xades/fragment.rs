//! `ext:UBLExtension` fragment written with the quick-xml event writer.
use std::fmt::Display;

use quick_xml::{
    escape::partial_escape,
    events::{BytesEnd, BytesStart, BytesText, Event},
    Writer,
};

use super::constants::{
    C14N11_ALGORITHM, CBC_NS, DS_NS, ECDSA_SHA256_ALGORITHM, EXTENSION_URI, EXT_NS,
    HASH_EXCLUSION_XPATHS, INVOICE_REFERENCE_ID, REFERENCED_SIGNATURE_ID, SAC_NS, SBC_NS,
    SHA256_ALGORITHM, SIGNATURE_ID, SIGNATURE_INFORMATION_ID, SIGNATURE_PROPERTIES_TYPE,
    SIGNED_PROPERTIES_ID, SIG_NS, XADES_NS, XPATH_ALGORITHM,
};
use super::SigningError;

/// Everything the fragment embeds, already encoded.
pub(crate) struct FragmentValues<'a> {
    pub invoice_digest: &'a str,
    pub signed_properties_digest: &'a str,
    pub signature_value: &'a str,
    pub certificate_base64: &'a str,
    pub signed_properties: &'a str,
}

struct FragmentWriter {
    inner: Writer<Vec<u8>>,
}

fn xml_error(err: impl Display) -> SigningError {
    SigningError::Xml {
        message: err.to_string(),
    }
}

impl FragmentWriter {
    fn new() -> Self {
        Self {
            inner: Writer::new(Vec::new()),
        }
    }

    fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), SigningError> {
        let mut element = BytesStart::new(name);
        for attribute in attributes {
            element.push_attribute(*attribute);
        }
        self.inner
            .write_event(Event::Start(element))
            .map_err(xml_error)
    }

    fn end(&mut self, name: &str) -> Result<(), SigningError> {
        self.inner
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_error)
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), SigningError> {
        let mut element = BytesStart::new(name);
        for attribute in attributes {
            element.push_attribute(*attribute);
        }
        self.inner
            .write_event(Event::Empty(element))
            .map_err(xml_error)
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<(), SigningError> {
        self.start(name, &[])?;
        self.inner
            .write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))
            .map_err(xml_error)?;
        self.end(name)
    }

    /// Write pre-serialized markup verbatim.
    fn raw(&mut self, markup: &str) -> Result<(), SigningError> {
        self.inner
            .write_event(Event::Text(BytesText::from_escaped(markup)))
            .map_err(xml_error)
    }

    fn finish(self) -> Result<String, SigningError> {
        String::from_utf8(self.inner.into_inner()).map_err(xml_error)
    }
}

pub(crate) fn write_fragment(values: &FragmentValues<'_>) -> Result<String, SigningError> {
    let mut w = FragmentWriter::new();

    w.start(
        "ext:UBLExtension",
        &[("xmlns:ext", EXT_NS), ("xmlns:cbc", CBC_NS)],
    )?;
    w.text_element("ext:ExtensionURI", EXTENSION_URI)?;
    w.start("ext:ExtensionContent", &[])?;
    w.start(
        "sig:UBLDocumentSignatures",
        &[
            ("xmlns:sig", SIG_NS),
            ("xmlns:sac", SAC_NS),
            ("xmlns:sbc", SBC_NS),
        ],
    )?;
    w.start("sac:SignatureInformation", &[])?;
    w.text_element("cbc:ID", SIGNATURE_INFORMATION_ID)?;
    w.text_element("sbc:ReferencedSignatureID", REFERENCED_SIGNATURE_ID)?;
    w.start("ds:Signature", &[("xmlns:ds", DS_NS), ("Id", SIGNATURE_ID)])?;

    write_signed_info(&mut w, values)?;
    w.text_element("ds:SignatureValue", values.signature_value)?;

    w.start("ds:KeyInfo", &[])?;
    w.start("ds:X509Data", &[])?;
    w.text_element("ds:X509Certificate", values.certificate_base64)?;
    w.end("ds:X509Data")?;
    w.end("ds:KeyInfo")?;

    w.start("ds:Object", &[])?;
    w.start(
        "xades:QualifyingProperties",
        &[("xmlns:xades", XADES_NS), ("Target", SIGNATURE_ID)],
    )?;
    w.raw(values.signed_properties)?;
    w.end("xades:QualifyingProperties")?;
    w.end("ds:Object")?;

    w.end("ds:Signature")?;
    w.end("sac:SignatureInformation")?;
    w.end("sig:UBLDocumentSignatures")?;
    w.end("ext:ExtensionContent")?;
    w.end("ext:UBLExtension")?;
    w.finish()
}

fn write_signed_info(
    w: &mut FragmentWriter,
    values: &FragmentValues<'_>,
) -> Result<(), SigningError> {
    w.start("ds:SignedInfo", &[])?;
    w.empty("ds:CanonicalizationMethod", &[("Algorithm", C14N11_ALGORITHM)])?;
    w.empty("ds:SignatureMethod", &[("Algorithm", ECDSA_SHA256_ALGORITHM)])?;

    w.start(
        "ds:Reference",
        &[("Id", INVOICE_REFERENCE_ID), ("URI", "")],
    )?;
    w.start("ds:Transforms", &[])?;
    for xpath in HASH_EXCLUSION_XPATHS {
        w.start("ds:Transform", &[("Algorithm", XPATH_ALGORITHM)])?;
        w.text_element("ds:XPath", xpath)?;
        w.end("ds:Transform")?;
    }
    w.empty("ds:Transform", &[("Algorithm", C14N11_ALGORITHM)])?;
    w.end("ds:Transforms")?;
    w.empty("ds:DigestMethod", &[("Algorithm", SHA256_ALGORITHM)])?;
    w.text_element("ds:DigestValue", values.invoice_digest)?;
    w.end("ds:Reference")?;

    let signed_properties_uri = format!("#{SIGNED_PROPERTIES_ID}");
    w.start(
        "ds:Reference",
        &[
            ("Type", SIGNATURE_PROPERTIES_TYPE),
            ("URI", signed_properties_uri.as_str()),
        ],
    )?;
    w.empty("ds:DigestMethod", &[("Algorithm", SHA256_ALGORITHM)])?;
    w.text_element("ds:DigestValue", values.signed_properties_digest)?;
    w.end("ds:Reference")?;

    w.end("ds:SignedInfo")
}
