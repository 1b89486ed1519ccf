//! SOAP envelope handling
//!
//! Reads the `eb:Messaging` header and the informational parts of the
//! `wsse:Security` header of an incoming envelope, and writes the envelopes
//! for outgoing user and signal messages. Canonicalization, signatures and
//! encryption are left to the [`SecurityProcessor`](crate::traits::SecurityProcessor).

mod reader;
mod version;
mod writer;
mod xml;

pub use reader::{parse_envelope, ParsedEnvelope, SecurityHeader};
pub use version::{SoapVersion, SOAP11_NS, SOAP12_NS};
pub use writer::{write_signal_envelope, write_user_message_envelope};
pub use xml::{XmlAttribute, XmlElement, MAX_DEPTH};

use thiserror::Error;

/// WS-Security 1.0 secext namespace
pub const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";

/// WS-Security 1.1 secext namespace
pub const WSSE11_NS: &str = "http://docs.oasis-open.org/wss/oasis-wss-wssecurity-secext-1.1.xsd";

/// WS-Security utility namespace
pub const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";

/// XML digital signature namespace
pub const DS_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XML encryption namespace
pub const XENC_NS: &str = "http://www.w3.org/2001/04/xmlenc#";

/// ebBP signals namespace used by non-repudiation receipts
pub const EBBP_NS: &str = "http://docs.oasis-open.org/ebxml-bp/ebbp-signals-2.0";

/// Result type for envelope handling
pub type SoapResult<T> = Result<T, SoapError>;

#[derive(Debug, Error)]
pub enum SoapError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("Envelope is not valid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Document has no root element")]
    Empty,

    #[error("Elements nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("Root element is not a SOAP envelope: {0}")]
    NotAnEnvelope(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}
