//! WS-Security boundary
//!
//! The agent never touches keys. It asks the processor to secure outgoing
//! envelopes according to the leg's security settings and to verify and
//! decrypt incoming ones.

use crate::ebms::Attachment;
use crate::pmode::LegSecurity;
use crate::soap::SoapVersion;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

pub type SecurityResult<T> = Result<T, SecurityError>;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("Signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Certificate not available: {0}")]
    MissingCertificate(String),

    #[error("Security processing failed: {0}")]
    Other(String),
}

/// An X.509 certificate as seen by the agent
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    subject: String,
    der: Vec<u8>,
}

impl CertificateInfo {
    pub fn new(subject: impl Into<String>, der: Vec<u8>) -> Self {
        Self {
            subject: subject.into(),
            der,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Lower-case hex SHA-256 of the DER encoding
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(&self.der))
    }
}

impl fmt::Debug for CertificateInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateInfo")
            .field("subject", &self.subject)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Envelope and attachments after signing and encryption
#[derive(Debug, Clone)]
pub struct SecuredMessage {
    pub envelope: Vec<u8>,
    pub attachments: Vec<Attachment>,
}

/// Outcome of a successful verification
#[derive(Debug, Clone, Default)]
pub struct VerifiedMessage {
    /// Certificate the signature was made with
    pub signing_certificate: Option<CertificateInfo>,
    /// Attachments after decryption
    pub attachments: Vec<Attachment>,
}

pub trait SecurityProcessor: Send + Sync {
    /// Sign and/or encrypt an outgoing envelope
    fn secure(
        &self,
        envelope: Vec<u8>,
        attachments: Vec<Attachment>,
        security: &LegSecurity,
        soap_version: SoapVersion,
    ) -> SecurityResult<SecuredMessage>;

    /// Verify signatures and decrypt an incoming envelope
    ///
    /// Must return [`SecurityError::SignatureInvalid`] or
    /// [`SecurityError::DecryptionFailed`] so the failure can be reported
    /// with the matching ebMS error.
    fn verify(
        &self,
        envelope: &[u8],
        attachments: Vec<Attachment>,
        security: &LegSecurity,
    ) -> SecurityResult<VerifiedMessage>;
}
