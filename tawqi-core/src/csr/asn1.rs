//! Explicit ASN.1 node model for the authority-specific CSR structures.
//!
//! Every node knows its own tag and DER encoding, so the subject name and the
//! directoryName inside the SAN extension are composed bottom-up instead of
//! being parsed from RFC 4514 strings.
use const_oid::ObjectIdentifier;
use x509_cert::der::{
    self,
    asn1::{PrintableStringRef, Utf8StringRef},
    Encode, Header, Length, Tag, TagNumber, Writer,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asn1Node {
    Sequence(Vec<Asn1Node>),
    /// SET OF; elements are written in DER order regardless of insertion order.
    Set(Vec<Asn1Node>),
    /// Constructed context-specific tag `[number]` (explicit tagging). `number` must be <= 30.
    ContextTagged { number: u8, inner: Box<Asn1Node> },
    ObjectIdentifier(ObjectIdentifier),
    PrintableString(String),
    Utf8String(String),
}

impl Asn1Node {
    /// `AttributeTypeAndValue ::= SEQUENCE { type OID, value ANY }`
    pub fn attribute(oid: ObjectIdentifier, value: Asn1Node) -> Self {
        Asn1Node::Sequence(vec![Asn1Node::ObjectIdentifier(oid), value])
    }

    /// `RDNSequence` with one single-valued RDN per attribute, in the given order.
    pub fn rdn_sequence(attributes: impl IntoIterator<Item = (ObjectIdentifier, Asn1Node)>) -> Self {
        Asn1Node::Sequence(
            attributes
                .into_iter()
                .map(|(oid, value)| Asn1Node::Set(vec![Asn1Node::attribute(oid, value)]))
                .collect(),
        )
    }

    pub fn context(number: u8, inner: Asn1Node) -> Self {
        Asn1Node::ContextTagged {
            number,
            inner: Box::new(inner),
        }
    }

    pub fn utf8(value: impl Into<String>) -> Self {
        Asn1Node::Utf8String(value.into())
    }

    pub fn printable(value: impl Into<String>) -> Self {
        Asn1Node::PrintableString(value.into())
    }

    fn constructed_header(&self) -> der::Result<Option<Header>> {
        let header = match self {
            Asn1Node::Sequence(children) => Header::new(Tag::Sequence, content_len(children)?)?,
            Asn1Node::Set(children) => Header::new(Tag::Set, content_len(children)?)?,
            Asn1Node::ContextTagged { number, inner } => Header::new(
                Tag::ContextSpecific {
                    constructed: true,
                    number: TagNumber::new(*number),
                },
                inner.encoded_len()?,
            )?,
            _ => return Ok(None),
        };
        Ok(Some(header))
    }
}

fn content_len(children: &[Asn1Node]) -> der::Result<Length> {
    children
        .iter()
        .try_fold(Length::ZERO, |acc, child| acc + child.encoded_len()?)
}

impl Encode for Asn1Node {
    fn encoded_len(&self) -> der::Result<Length> {
        if let Some(header) = self.constructed_header()? {
            return header.encoded_len()? + header.length;
        }
        match self {
            Asn1Node::ObjectIdentifier(oid) => oid.encoded_len(),
            Asn1Node::PrintableString(value) => PrintableStringRef::new(value)?.encoded_len(),
            Asn1Node::Utf8String(value) => Utf8StringRef::new(value)?.encoded_len(),
            Asn1Node::Sequence(_) | Asn1Node::Set(_) | Asn1Node::ContextTagged { .. } => {
                unreachable!("constructed nodes are handled above")
            }
        }
    }

    fn encode(&self, writer: &mut impl Writer) -> der::Result<()> {
        match self {
            Asn1Node::Sequence(children) => {
                Header::new(Tag::Sequence, content_len(children)?)?.encode(writer)?;
                children.iter().try_for_each(|child| child.encode(writer))
            }
            Asn1Node::Set(children) => {
                let mut encoded = children
                    .iter()
                    .map(Encode::to_der)
                    .collect::<der::Result<Vec<_>>>()?;
                encoded.sort();
                Header::new(Tag::Set, content_len(children)?)?.encode(writer)?;
                encoded.iter().try_for_each(|bytes| writer.write(bytes))
            }
            Asn1Node::ContextTagged { number, inner } => {
                let tag = Tag::ContextSpecific {
                    constructed: true,
                    number: TagNumber::new(*number),
                };
                Header::new(tag, inner.encoded_len()?)?.encode(writer)?;
                inner.encode(writer)
            }
            Asn1Node::ObjectIdentifier(oid) => oid.encode(writer),
            Asn1Node::PrintableString(value) => PrintableStringRef::new(value)?.encode(writer),
            Asn1Node::Utf8String(value) => Utf8StringRef::new(value)?.encode(writer),
        }
    }
}
