//! Error records and signal message construction

use super::catalog::{self, Category, EbmsError, Severity};
use crate::ebms::{
    generate_message_id, MessageInfo, PullRequest, Receipt, ReceiptContent, SignalKind,
    SignalMessage, SignatureReference, UserMessage, DEFAULT_MESSAGE_ID_DOMAIN,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin used for errors raised by the ebMS processing itself
pub const ORIGIN_EBMS: &str = "ebMS";

/// Origin used for errors raised while checking WS-Security
pub const ORIGIN_SECURITY: &str = "security";

/// Wire-level `eb:Error`: one occurrence of a catalog entry
///
/// Records received from partners may carry codes that are not in our
/// catalog, so the fields are owned strings rather than catalog references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub code: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_to_message_in_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl ErrorRecord {
    /// Attach a free-text detail explaining this occurrence
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }

    /// The catalog entry for this record's code, if it is a known one
    pub fn catalog_entry(&self) -> Option<&'static EbmsError> {
        catalog::lookup(&self.code)
    }

    pub fn is_failure(&self) -> bool {
        self.severity == Severity::Failure
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.code, self.severity)?;
        if let Some(short) = &self.short_description {
            write!(f, " {}", short)?;
        }
        if let Some(detail) = &self.error_detail {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

/// Instantiate a catalog entry for one occurrence
pub fn build_error(
    error: &EbmsError,
    ref_to_message_in_error: Option<&str>,
    origin: Option<&str>,
) -> ErrorRecord {
    ErrorRecord {
        code: error.code.to_string(),
        severity: error.severity,
        category: Some(error.category),
        short_description: Some(error.short_description.to_string()),
        description: Some(error.description.to_string()),
        error_detail: None,
        ref_to_message_in_error: ref_to_message_in_error
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        origin: origin.map(str::to_string),
    }
}

/// Wrap error occurrences into a signal message with a fresh message id
///
/// `RefToMessageId` is taken from the first error that references a message.
pub fn build_signal_message(errors: Vec<ErrorRecord>) -> SignalMessage {
    build_signal_message_with_id(generate_message_id(DEFAULT_MESSAGE_ID_DOMAIN), errors)
}

/// Same as [`build_signal_message`] with a caller supplied message id
pub fn build_signal_message_with_id(message_id: String, errors: Vec<ErrorRecord>) -> SignalMessage {
    let ref_to = errors
        .iter()
        .find_map(|e| e.ref_to_message_in_error.clone());
    SignalMessage {
        message_info: MessageInfo::new(message_id).with_ref_to(ref_to),
        kind: SignalKind::Errors(errors),
    }
}

/// Build the receipt acknowledging `user_message`
///
/// With non-repudiation requested and signature references available the
/// receipt carries those references; otherwise it carries a copy of the
/// acknowledged user message.
pub fn build_receipt(
    message_id: String,
    user_message: &UserMessage,
    non_repudiation: bool,
    references: &[SignatureReference],
) -> SignalMessage {
    let content = if non_repudiation && !references.is_empty() {
        ReceiptContent::NonRepudiation(references.to_vec())
    } else {
        ReceiptContent::UserMessage(Box::new(user_message.clone()))
    };
    SignalMessage {
        message_info: MessageInfo::new(message_id)
            .with_ref_to(Some(user_message.message_id().to_string())),
        kind: SignalKind::Receipt(Receipt { content }),
    }
}

/// Build a pull request for the given MPC
pub fn build_pull_request(message_id: String, mpc: impl Into<String>) -> SignalMessage {
    SignalMessage {
        message_info: MessageInfo::new(message_id),
        kind: SignalKind::PullRequest(PullRequest { mpc: mpc.into() }),
    }
}
