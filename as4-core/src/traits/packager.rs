//! Message packaging boundary
//!
//! AS4 sends attachments as SOAP-with-attachments MIME multiparts. The
//! multipart encoder is external; [`SinglePartPackager`] covers messages
//! without attachments.

use crate::ebms::Attachment;
use crate::soap::SoapVersion;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("Packager does not support attachments ({0} given)")]
    AttachmentsUnsupported(usize),

    #[error("Packaging failed: {0}")]
    Other(String),
}

/// HTTP body ready to send
#[derive(Debug, Clone)]
pub struct PackagedMessage {
    pub content_type: String,
    pub body: Vec<u8>,
}

pub trait MessagePackager: Send + Sync {
    fn package(
        &self,
        envelope: Vec<u8>,
        attachments: Vec<Attachment>,
        soap_version: SoapVersion,
    ) -> Result<PackagedMessage, PackagingError>;
}

/// Sends the bare SOAP envelope as the HTTP body
#[derive(Debug, Clone, Copy, Default)]
pub struct SinglePartPackager;

impl MessagePackager for SinglePartPackager {
    fn package(
        &self,
        envelope: Vec<u8>,
        attachments: Vec<Attachment>,
        soap_version: SoapVersion,
    ) -> Result<PackagedMessage, PackagingError> {
        if !attachments.is_empty() {
            return Err(PackagingError::AttachmentsUnsupported(attachments.len()));
        }
        Ok(PackagedMessage {
            content_type: format!("{}; charset=utf-8", soap_version.mime_type()),
            body: envelope,
        })
    }
}
