//! ebMS3 header types

use super::{FINAL_RECIPIENT, ORIGINAL_SENDER, TEST_ACTION, TEST_SERVICE};
use crate::signal::ErrorRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content of one `eb:Messaging` header block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Messaging {
    pub user_messages: Vec<UserMessage>,
    pub signal_messages: Vec<SignalMessage>,
}

/// `eb:MessageInfo`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInfo {
    /// Absent or unparsable timestamps are kept as `None`
    pub timestamp: Option<DateTime<Utc>>,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_to_message_id: Option<String>,
}

impl MessageInfo {
    /// New message info stamped with the current time
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            timestamp: Some(Utc::now()),
            message_id: message_id.into(),
            ref_to_message_id: None,
        }
    }

    pub fn with_ref_to(mut self, ref_to_message_id: Option<String>) -> Self {
        self.ref_to_message_id = ref_to_message_id;
        self
    }
}

/// `eb:PartyId`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyId {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_type: Option<String>,
    pub value: String,
}

impl PartyId {
    pub fn new(id_type: Option<&str>, value: impl Into<String>) -> Self {
        Self {
            id_type: id_type.map(str::to_string),
            value: value.into(),
        }
    }
}

/// `eb:From` / `eb:To`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRef {
    pub party_ids: Vec<PartyId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// `eb:PartyInfo`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyInfo {
    pub from: PartyRef,
    pub to: PartyRef,
}

/// `eb:AgreementRef`; `pmode` carries the PMode id when the sender sets it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementRef {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmode: Option<String>,
}

/// `eb:Service`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
}

/// `eb:CollaborationInfo`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaborationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agreement_ref: Option<AgreementRef>,
    pub service: Service,
    pub action: String,
    pub conversation_id: String,
}

/// `eb:Property` (message or part property)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prop_type: Option<String>,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            prop_type: None,
        }
    }
}

/// `eb:PartInfo`; a missing `href` denotes the SOAP body payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Property>,
}

impl PartInfo {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Content id referenced by a `cid:` href
    pub fn content_id(&self) -> Option<&str> {
        self.href.as_deref().and_then(|h| h.strip_prefix("cid:"))
    }
}

/// `eb:UserMessage`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mpc: Option<String>,
    pub message_info: MessageInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_info: Option<PartyInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collaboration_info: Option<CollaborationInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub message_properties: Vec<Property>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload_info: Vec<PartInfo>,
}

impl UserMessage {
    pub fn message_id(&self) -> &str {
        &self.message_info.message_id
    }

    /// Value of the first message property with the given name
    pub fn property(&self, name: &str) -> Option<&str> {
        self.message_properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn original_sender(&self) -> Option<&str> {
        self.property(ORIGINAL_SENDER)
    }

    pub fn final_recipient(&self) -> Option<&str> {
        self.property(FINAL_RECIPIENT)
    }

    /// PMode id referenced through `AgreementRef/@pmode`
    pub fn pmode_id(&self) -> Option<&str> {
        self.collaboration_info
            .as_ref()
            .and_then(|c| c.agreement_ref.as_ref())
            .and_then(|a| a.pmode.as_deref())
            .filter(|id| !id.trim().is_empty())
    }

    pub fn from_party_ids(&self) -> &[PartyId] {
        self.party_info
            .as_ref()
            .map(|p| p.from.party_ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn to_party_ids(&self) -> &[PartyId] {
        self.party_info
            .as_ref()
            .map(|p| p.to.party_ids.as_slice())
            .unwrap_or(&[])
    }

    /// True for the predefined test service/action pair
    pub fn is_ping(&self) -> bool {
        self.collaboration_info
            .as_ref()
            .map(|c| c.service.value == TEST_SERVICE && c.action == TEST_ACTION)
            .unwrap_or(false)
    }
}

/// `eb:PullRequest`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub mpc: String,
}

/// `ds:Reference` copied into non-repudiation receipts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureReference {
    pub uri: String,
    pub digest_algorithm: String,
    pub digest_value: String,
}

/// What a receipt acknowledges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReceiptContent {
    /// `ebbp:NonRepudiationInformation` with the signed references
    NonRepudiation(Vec<SignatureReference>),
    /// Copy of the acknowledged user message
    UserMessage(Box<UserMessage>),
    /// Any other receipt payload
    Other,
}

/// `eb:Receipt`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub content: ReceiptContent,
}

/// The payload of a signal message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignalKind {
    PullRequest(PullRequest),
    Receipt(Receipt),
    Errors(Vec<ErrorRecord>),
}

/// `eb:SignalMessage`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMessage {
    pub message_info: MessageInfo,
    pub kind: SignalKind,
}

impl SignalMessage {
    pub fn message_id(&self) -> &str {
        &self.message_info.message_id
    }

    pub fn ref_to_message_id(&self) -> Option<&str> {
        self.message_info.ref_to_message_id.as_deref()
    }

    pub fn is_pull_request(&self) -> bool {
        matches!(self.kind, SignalKind::PullRequest(_))
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        match &self.kind {
            SignalKind::Errors(errors) => errors,
            _ => &[],
        }
    }
}

/// A MIME attachment as handed over by the packaging collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub content_id: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(content_id: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            content_id: content_id.into(),
            mime_type: mime_type.into(),
            data,
        }
    }
}
