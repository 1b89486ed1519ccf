//! PMode[1].Security parameters and the algorithm identifiers they use

use serde::{Deserialize, Serialize};
use std::fmt;

/// WS-Security version agreed for a leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WssVersion {
    #[serde(rename = "1.0")]
    Wss10,
    #[serde(rename = "1.1")]
    Wss11,
    #[serde(rename = "1.1.1")]
    Wss111,
}

impl WssVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            WssVersion::Wss10 => "1.0",
            WssVersion::Wss11 => "1.1",
            WssVersion::Wss111 => "1.1.1",
        }
    }
}

impl fmt::Display for WssVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WSS {}", self.as_str())
    }
}

/// XML signature algorithms (`ds:SignatureMethod/@Algorithm`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureAlgorithm {
    RsaSha256,
    RsaSha384,
    RsaSha512,
    EcdsaSha256,
    EcdsaSha384,
    EcdsaSha512,
    Ed25519,
}

impl SignatureAlgorithm {
    pub const ALL: [SignatureAlgorithm; 7] = [
        SignatureAlgorithm::RsaSha256,
        SignatureAlgorithm::RsaSha384,
        SignatureAlgorithm::RsaSha512,
        SignatureAlgorithm::EcdsaSha256,
        SignatureAlgorithm::EcdsaSha384,
        SignatureAlgorithm::EcdsaSha512,
        SignatureAlgorithm::Ed25519,
    ];

    pub fn uri(&self) -> &'static str {
        match self {
            SignatureAlgorithm::RsaSha256 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
            SignatureAlgorithm::RsaSha384 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384",
            SignatureAlgorithm::RsaSha512 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512",
            SignatureAlgorithm::EcdsaSha256 => "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256",
            SignatureAlgorithm::EcdsaSha384 => "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384",
            SignatureAlgorithm::EcdsaSha512 => "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha512",
            SignatureAlgorithm::Ed25519 => "http://www.w3.org/2021/04/xmldsig-more#eddsa-ed25519",
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.uri() == uri.trim())
    }
}

/// Digest algorithms (`ds:DigestMethod/@Algorithm`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub const ALL: [DigestAlgorithm; 3] = [
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha384,
        DigestAlgorithm::Sha512,
    ];

    pub fn uri(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "http://www.w3.org/2001/04/xmlenc#sha256",
            DigestAlgorithm::Sha384 => "http://www.w3.org/2001/04/xmldsig-more#sha384",
            DigestAlgorithm::Sha512 => "http://www.w3.org/2001/04/xmlenc#sha512",
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.uri() == uri.trim())
    }
}

/// Data encryption algorithms (`xenc:EncryptionMethod/@Algorithm` of `xenc:EncryptedData`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionAlgorithm {
    Aes128Gcm,
    Aes192Gcm,
    Aes256Gcm,
    Aes128Cbc,
    Aes256Cbc,
    TripleDesCbc,
}

impl EncryptionAlgorithm {
    pub const ALL: [EncryptionAlgorithm; 6] = [
        EncryptionAlgorithm::Aes128Gcm,
        EncryptionAlgorithm::Aes192Gcm,
        EncryptionAlgorithm::Aes256Gcm,
        EncryptionAlgorithm::Aes128Cbc,
        EncryptionAlgorithm::Aes256Cbc,
        EncryptionAlgorithm::TripleDesCbc,
    ];

    pub fn uri(&self) -> &'static str {
        match self {
            EncryptionAlgorithm::Aes128Gcm => "http://www.w3.org/2009/xmlenc11#aes128-gcm",
            EncryptionAlgorithm::Aes192Gcm => "http://www.w3.org/2009/xmlenc11#aes192-gcm",
            EncryptionAlgorithm::Aes256Gcm => "http://www.w3.org/2009/xmlenc11#aes256-gcm",
            EncryptionAlgorithm::Aes128Cbc => "http://www.w3.org/2001/04/xmlenc#aes128-cbc",
            EncryptionAlgorithm::Aes256Cbc => "http://www.w3.org/2001/04/xmlenc#aes256-cbc",
            EncryptionAlgorithm::TripleDesCbc => "http://www.w3.org/2001/04/xmlenc#tripledes-cbc",
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.uri() == uri.trim())
    }

    /// Key length in bits
    pub fn key_strength(&self) -> u32 {
        match self {
            EncryptionAlgorithm::Aes128Gcm | EncryptionAlgorithm::Aes128Cbc => 128,
            EncryptionAlgorithm::Aes192Gcm | EncryptionAlgorithm::TripleDesCbc => 192,
            EncryptionAlgorithm::Aes256Gcm | EncryptionAlgorithm::Aes256Cbc => 256,
        }
    }
}

/// Key transport algorithm URIs accepted on `xenc:EncryptedKey`
pub const KEY_TRANSPORT_RSA_OAEP_MGF1P: &str = "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p";
pub const KEY_TRANSPORT_RSA_OAEP: &str = "http://www.w3.org/2009/xmlenc11#rsa-oaep";

/// How receipts are returned to the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyPattern {
    Response,
    Callback,
}

/// Security section of a leg
///
/// Boolean flags are tri-state: `None` means "not configured", which the
/// profile validators distinguish from an explicit `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegSecurity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wss_version: Option<WssVersion>,
    /// Reference (alias or PEM) of the signing certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x509_sign_certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x509_signature_algorithm: Option<SignatureAlgorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x509_signature_digest_algorithm: Option<DigestAlgorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x509_encryption_certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x509_encryption_algorithm: Option<EncryptionAlgorithm>,
    /// Minimum key strength in bits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x509_encryption_minimum_strength: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmode_authorize: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_receipt: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_receipt_non_repudiation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_receipt_reply_pattern: Option<ReplyPattern>,
}

impl LegSecurity {
    /// Whether a receipt must be returned on the HTTP response
    pub fn receipt_as_response(&self) -> bool {
        self.send_receipt == Some(true)
            && self.send_receipt_reply_pattern.unwrap_or(ReplyPattern::Response)
                == ReplyPattern::Response
    }

    pub fn is_signing_configured(&self) -> bool {
        self.x509_signature_algorithm.is_some()
    }

    pub fn is_encryption_configured(&self) -> bool {
        self.x509_encryption_algorithm.is_some()
    }
}
