//! ebMS3 message model
//!
//! Structured form of the `eb:Messaging` SOAP header: user messages,
//! signal messages (receipts, errors, pull requests) and the attachment
//! type handed between the pipeline and its collaborators.

mod message;

pub use message::{
    AgreementRef, Attachment, CollaborationInfo, MessageInfo, Messaging, PartInfo, PartyId,
    PartyInfo, PartyRef, Property, PullRequest, Receipt, ReceiptContent, Service,
    SignalKind, SignalMessage, SignatureReference, UserMessage,
};

use uuid::Uuid;

/// ebMS3 core namespace (also the prefix of the predefined URIs below)
pub const EBMS_NS: &str = "http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/";

/// Default message partition channel
pub const DEFAULT_MPC: &str = "http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/defaultMPC";

/// Default party role
pub const DEFAULT_ROLE: &str = "http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/defaultRole";

/// Role URI of the initiating party
pub const INITIATOR_ROLE: &str = "http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/initiator";

/// Role URI of the responding party
pub const RESPONDER_ROLE: &str = "http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/responder";

/// Service used by ping (test) messages
pub const TEST_SERVICE: &str = "http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/service";

/// Action used by ping (test) messages
pub const TEST_ACTION: &str = "http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/test";

/// Four-corner property naming C1
pub const ORIGINAL_SENDER: &str = "originalSender";

/// Four-corner property naming C4
pub const FINAL_RECIPIENT: &str = "finalRecipient";

/// Part property carrying the compression type of an attachment
pub const PART_PROPERTY_COMPRESSION_TYPE: &str = "CompressionType";

/// Part property carrying the original MIME type of a compressed attachment
pub const PART_PROPERTY_MIME_TYPE: &str = "MimeType";

/// Suffix used when no message id domain is configured
pub const DEFAULT_MESSAGE_ID_DOMAIN: &str = "as4-agent";

/// Generate a globally unique message id (`<uuid>@<domain>`)
pub fn generate_message_id(domain: &str) -> String {
    let domain = domain.trim();
    let domain = if domain.is_empty() { DEFAULT_MESSAGE_ID_DOMAIN } else { domain };
    format!("{}@{}", Uuid::new_v4(), domain)
}
