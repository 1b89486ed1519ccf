//! Shared collaborators for the agent integration tests

#![allow(dead_code)]

use as4_core::config::AgentConfig;
use as4_core::ebms::{Attachment, SignalKind, SignalMessage, UserMessage};
use as4_core::pipeline::ProcessingState;
use as4_core::pmode::{BusinessInfo, LegSecurity, PMode};
use as4_core::soap::SoapVersion;
use as4_core::traits::{
    CertificateInfo, DispatchError, DispatchResult, HttpRequest, HttpResponse, HttpTransport,
    MessageDispatcher, SecuredMessage, SecurityError, SecurityProcessor, SecurityResult,
    TransportError, VerifiedMessage,
};
use as4_core::{As4Agent, ProfileRegistry};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const PMODE_ID: &str = "sender-receiver";
pub const PARTY_TYPE: &str = "urn:oasis:names:tc:ebcore:partyid-type:unregistered";

/// WS-Security block a CEF signer produces, minus the real cryptography
pub const SECURITY_HEADER: &str = r##"<wsse:Security xmlns:wsse="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd" xmlns:wsse11="http://docs.oasis-open.org/wss/oasis-wss-wssecurity-secext-1.1.xsd" xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
      <wsse:BinarySecurityToken wsse11:TokenType="x509">AAAA</wsse:BinarySecurityToken>
      <ds:Signature>
        <ds:SignedInfo>
          <ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/>
          <ds:Reference URI="#_body">
            <ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>
            <ds:DigestValue>abc=</ds:DigestValue>
          </ds:Reference>
        </ds:SignedInfo>
      </ds:Signature>
    </wsse:Security>"##;

/// Inbound envelope from `sender` to `receiver` under [`PMODE_ID`]
pub fn envelope(message_id: &str, security: Option<&str>) -> Vec<u8> {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<S12:Envelope xmlns:S12="http://www.w3.org/2003/05/soap-envelope"
              xmlns:eb="http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/">
  <S12:Header>
    <eb:Messaging S12:mustUnderstand="true">
      <eb:UserMessage>
        <eb:MessageInfo>
          <eb:Timestamp>2024-03-01T10:15:30.123Z</eb:Timestamp>
          <eb:MessageId>{message_id}</eb:MessageId>
        </eb:MessageInfo>
        <eb:PartyInfo>
          <eb:From><eb:PartyId type="{party_type}">sender</eb:PartyId><eb:Role>http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/initiator</eb:Role></eb:From>
          <eb:To><eb:PartyId type="{party_type}">receiver</eb:PartyId><eb:Role>http://docs.oasis-open.org/ebxml-msg/ebms/v3.0/ns/core/200704/responder</eb:Role></eb:To>
        </eb:PartyInfo>
        <eb:CollaborationInfo>
          <eb:AgreementRef pmode="{pmode}">urn:agreement</eb:AgreementRef>
          <eb:Service>urn:service</eb:Service>
          <eb:Action>Submit</eb:Action>
          <eb:ConversationId>conv-1</eb:ConversationId>
        </eb:CollaborationInfo>
        <eb:MessageProperties>
          <eb:Property name="originalSender">C1</eb:Property>
          <eb:Property name="finalRecipient">C4</eb:Property>
        </eb:MessageProperties>
      </eb:UserMessage>
    </eb:Messaging>
    {security}
  </S12:Header>
  <S12:Body/>
</S12:Envelope>"#,
        message_id = message_id,
        party_type = PARTY_TYPE,
        pmode = PMODE_ID,
        security = security.unwrap_or_default(),
    )
    .into_bytes()
}

/// CEF PMode between `sender` and `receiver` with a business service
pub fn cef_pmode() -> PMode {
    let profiles = ProfileRegistry::standard(false);
    let mut pmode = profiles
        .get("cef")
        .unwrap()
        .create_pmode_template("sender", "receiver", Some("https://receiver/as4"));
    if let Some(leg) = pmode.leg1.as_mut() {
        leg.business_info = BusinessInfo {
            service: Some("urn:service".to_string()),
            action: Some("Submit".to_string()),
            ..Default::default()
        };
    }
    pmode
}

/// Pretends to sign by splicing [`SECURITY_HEADER`] into the envelope
#[derive(Default)]
pub struct StubSigner {
    pub reject_signatures: bool,
    pub verified: AtomicUsize,
}

impl StubSigner {
    pub fn rejecting() -> Self {
        Self {
            reject_signatures: true,
            ..Default::default()
        }
    }

    pub fn verified(&self) -> usize {
        self.verified.load(Ordering::SeqCst)
    }
}

impl SecurityProcessor for StubSigner {
    fn secure(
        &self,
        envelope: Vec<u8>,
        attachments: Vec<Attachment>,
        _security: &LegSecurity,
        _soap_version: SoapVersion,
    ) -> SecurityResult<SecuredMessage> {
        let envelope = String::from_utf8(envelope)
            .map_err(|e| SecurityError::Other(e.to_string()))?
            .replacen("</S12:Header>", &format!("{}</S12:Header>", SECURITY_HEADER), 1);
        Ok(SecuredMessage {
            envelope: envelope.into_bytes(),
            attachments,
        })
    }

    fn verify(
        &self,
        _envelope: &[u8],
        attachments: Vec<Attachment>,
        _security: &LegSecurity,
    ) -> SecurityResult<VerifiedMessage> {
        self.verified.fetch_add(1, Ordering::SeqCst);
        if self.reject_signatures {
            return Err(SecurityError::SignatureInvalid("digest mismatch".to_string()));
        }
        Ok(VerifiedMessage {
            signing_certificate: Some(CertificateInfo::new("CN=sender", b"sender-cert".to_vec())),
            attachments,
        })
    }
}

/// Remembers the id of every dispatched message and answers pull requests
/// from a queue
#[derive(Default)]
pub struct RecordingDispatcher {
    pub user_messages: Mutex<Vec<String>>,
    pub signals: Mutex<Vec<String>>,
    pub queued: Mutex<Vec<UserMessage>>,
}

impl RecordingDispatcher {
    pub fn user_message_ids(&self) -> Vec<String> {
        self.user_messages.lock().unwrap().clone()
    }

    pub fn signal_ids(&self) -> Vec<String> {
        self.signals.lock().unwrap().clone()
    }

    pub fn enqueue(&self, user_message: UserMessage) {
        self.queued.lock().unwrap().push(user_message);
    }
}

impl MessageDispatcher for RecordingDispatcher {
    fn dispatch_user_message(
        &self,
        user_message: &UserMessage,
        _attachments: &[Attachment],
        _state: &ProcessingState,
    ) -> Result<DispatchResult, DispatchError> {
        self.user_messages
            .lock()
            .unwrap()
            .push(user_message.message_id().to_string());
        Ok(DispatchResult::accepted())
    }

    fn dispatch_signal_message(
        &self,
        signal: &SignalMessage,
        _state: &ProcessingState,
    ) -> Result<DispatchResult, DispatchError> {
        self.signals.lock().unwrap().push(signal.message_id().to_string());
        if let SignalKind::PullRequest(_) = signal.kind {
            if let Some(queued) = self.queued.lock().unwrap().pop() {
                return Ok(DispatchResult::pulled(queued, Vec::new()));
            }
        }
        Ok(DispatchResult::accepted())
    }
}

/// Transport for agents that never send
pub struct UnreachableTransport;

#[async_trait]
impl HttpTransport for UnreachableTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        Err(TransportError::Connection(request.url))
    }
}

/// Delivers every request straight into another agent's inbound pipeline
pub struct LoopbackTransport {
    pub receiver: Arc<As4Agent>,
    pub posted: AtomicUsize,
}

impl LoopbackTransport {
    pub fn new(receiver: Arc<As4Agent>) -> Self {
        Self {
            receiver,
            posted: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HttpTransport for LoopbackTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.posted.fetch_add(1, Ordering::SeqCst);
        let response = self.receiver.process_incoming(&request.body, request.headers);

        let mut headers = as4_core::traits::HttpHeaders::new();
        if let Some(content_type) = response.content_type {
            headers.insert("Content-Type", content_type);
        }
        Ok(HttpResponse {
            status: response.status,
            headers,
            body: response.body,
        })
    }
}

/// Agent with the given collaborators and an empty PMode registry
pub fn build_agent(
    config: AgentConfig,
    security: Arc<StubSigner>,
    dispatcher: Arc<RecordingDispatcher>,
    transport: Arc<dyn HttpTransport>,
) -> As4Agent {
    As4Agent::builder()
        .config(config)
        .security(security)
        .transport(transport)
        .dispatcher(dispatcher)
        .build()
        .unwrap()
}
