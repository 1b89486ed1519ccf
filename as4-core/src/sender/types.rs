//! Outbound request and outcome types

use crate::compression::CompressionError;
use crate::ebms::{Attachment, Property, SignalMessage};
use crate::pmode::RegistryError;
use crate::signal::{lookup, EbmsError};
use crate::soap::SoapError;
use crate::traits::{PackagingError, SecurityError};
use std::time::Duration;
use thiserror::Error;

/// How often a message is (re)sent when the partner cannot be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, at least one is always made
    pub max_attempts: u32,
    pub retry_interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, retry_interval: Duration) -> Self {
        Self {
            max_attempts,
            retry_interval,
        }
    }

    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(10))
    }
}

/// Result of delivering a user message to the partner MSH
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendResult {
    /// A receipt for the message came back, or none was expected
    Success,
    /// No HTTP response after every attempt
    TransportError(String),
    /// An empty response where a receipt was required
    NoSignalMessageReceived,
    /// The response could not be read as a matching signal
    InvalidSignalMessageReceived(String),
    /// The partner returned an ebMS error signal
    ErrorSignalReceived,
    /// Non-2xx status without a readable signal
    HttpError(u16),
}

impl SendResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendResult::Success => "success",
            SendResult::TransportError(_) => "transport_error",
            SendResult::NoSignalMessageReceived => "no_signal",
            SendResult::InvalidSignalMessageReceived(_) => "invalid_signal",
            SendResult::ErrorSignalReceived => "error_signal",
            SendResult::HttpError(_) => "http_error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SendResult::Success)
    }

    /// Failures worth another attempt
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            SendResult::TransportError(_) => true,
            SendResult::HttpError(status) => *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    /// Id the message was sent with, identical on every attempt
    pub message_id: String,
    pub result: SendResult,
    /// Signal returned by the partner, if any
    pub signal: Option<SignalMessage>,
    pub attempts: u32,
}

impl SendOutcome {
    /// Catalog entries of the errors in a returned error signal
    pub fn catalog_errors(&self) -> Vec<&'static EbmsError> {
        self.signal
            .as_ref()
            .map(|signal| signal.errors().iter().filter_map(|e| lookup(&e.code)).collect())
            .unwrap_or_default()
    }
}

/// Defects that prevent a send from being attempted at all
#[derive(Debug, Error)]
pub enum SendError {
    #[error("PMode '{0}' not found")]
    PModeNotFound(String),

    #[error("PMode '{id}' cannot be used for sending: {reason}")]
    InvalidPMode { id: String, reason: String },

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Compression failed: {0}")]
    Compression(#[from] CompressionError),

    #[error("Securing the message failed: {0}")]
    Security(#[from] SecurityError),

    #[error("Packaging failed: {0}")]
    Packaging(#[from] PackagingError),

    #[error("Envelope could not be written: {0}")]
    Envelope(#[from] SoapError),
}

/// Application payload to send under a PMode
#[derive(Debug, Clone, Default)]
pub struct OutgoingUserMessage {
    pub pmode_id: String,
    /// Generated when absent
    pub message_id: Option<String>,
    /// Set when answering a message on leg 2 of a two-way exchange
    pub ref_to_message_id: Option<String>,
    /// Generated when absent
    pub conversation_id: Option<String>,
    pub message_properties: Vec<Property>,
    pub attachments: Vec<Attachment>,
}

impl OutgoingUserMessage {
    pub fn new(pmode_id: impl Into<String>) -> Self {
        Self {
            pmode_id: pmode_id.into(),
            ..Default::default()
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_ref_to_message_id(mut self, ref_to_message_id: impl Into<String>) -> Self {
        self.ref_to_message_id = Some(ref_to_message_id.into());
        self
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.message_properties.push(Property::new(name, value));
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}
