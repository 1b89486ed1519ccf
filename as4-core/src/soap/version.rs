//! SOAP versions

use serde::{Deserialize, Serialize};
use std::fmt;

pub const SOAP11_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP12_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SoapVersion {
    #[serde(rename = "1.1")]
    Soap11,
    /// The AS4 default
    #[default]
    #[serde(rename = "1.2")]
    Soap12,
}

impl SoapVersion {
    pub fn namespace(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => SOAP11_NS,
            SoapVersion::Soap12 => SOAP12_NS,
        }
    }

    pub fn from_namespace(ns: &str) -> Option<Self> {
        match ns {
            SOAP11_NS => Some(SoapVersion::Soap11),
            SOAP12_NS => Some(SoapVersion::Soap12),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => "text/xml",
            SoapVersion::Soap12 => "application/soap+xml",
        }
    }

    /// Lexical `mustUnderstand` value meaning "true"
    pub fn must_understand_true(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => "1",
            SoapVersion::Soap12 => "true",
        }
    }

    pub fn is_as4_default(&self) -> bool {
        *self == SoapVersion::Soap12
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => "1.1",
            SoapVersion::Soap12 => "1.2",
        }
    }
}

impl fmt::Display for SoapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SOAP {}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_lookup() {
        assert_eq!(SoapVersion::from_namespace(SOAP12_NS), Some(SoapVersion::Soap12));
        assert_eq!(SoapVersion::from_namespace(SOAP11_NS), Some(SoapVersion::Soap11));
        assert_eq!(SoapVersion::from_namespace("urn:other"), None);
        assert!(SoapVersion::default().is_as4_default());
    }
}
