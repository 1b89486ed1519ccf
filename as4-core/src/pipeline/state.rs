//! Per-message processing state

use crate::ebms::{Attachment, Messaging, SignalKind, SignalMessage, UserMessage};
use crate::pmode::{Leg, LegSecurity, PMode};
use crate::signal::ErrorRecord;
use crate::soap::{SecurityHeader, SoapVersion};
use crate::traits::{CertificateInfo, DispatchResult, HttpHeaders};
use std::fmt;
use std::sync::Arc;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ExtractMessaging,
    ResolvePMode,
    VerifySecurity,
    DuplicateCheck,
    Dispatch,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ExtractMessaging => "extract_messaging",
            Stage::ResolvePMode => "resolve_pmode",
            Stage::VerifySecurity => "verify_security",
            Stage::DuplicateCheck => "duplicate_check",
            Stage::Dispatch => "dispatch",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of the primary message of an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    User,
    PullRequest,
    Receipt,
    Error,
}

/// Which PMode leg governs the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegNumber {
    Leg1,
    Leg2,
}

/// Everything the stages learn about one inbound message
#[derive(Debug)]
pub struct ProcessingState {
    pub envelope: Vec<u8>,
    pub headers: HttpHeaders,
    pub soap_version: Option<SoapVersion>,
    pub messaging: Option<Messaging>,
    pub security_header: Option<SecurityHeader>,
    pub pmode: Option<Arc<PMode>>,
    pub leg: Option<LegNumber>,
    pub signing_certificate: Option<CertificateInfo>,
    pub tls_client_certificate: Option<CertificateInfo>,
    pub attachments: Vec<Attachment>,
    /// Warnings collected along the way
    pub errors: Vec<ErrorRecord>,
    pub duplicate: bool,
    pub dispatch_result: Option<DispatchResult>,
    pub completed_stages: Vec<Stage>,
}

impl ProcessingState {
    pub fn new(envelope: Vec<u8>, attachments: Vec<Attachment>, headers: HttpHeaders) -> Self {
        Self {
            envelope,
            headers,
            soap_version: None,
            messaging: None,
            security_header: None,
            pmode: None,
            leg: None,
            signing_certificate: None,
            tls_client_certificate: None,
            attachments,
            errors: Vec::new(),
            duplicate: false,
            dispatch_result: None,
            completed_stages: Vec::new(),
        }
    }

    pub fn with_tls_client_certificate(mut self, certificate: Option<CertificateInfo>) -> Self {
        self.tls_client_certificate = certificate;
        self
    }

    /// The user message, which takes precedence over any signal
    pub fn user_message(&self) -> Option<&UserMessage> {
        self.messaging.as_ref()?.user_messages.first()
    }

    pub fn signal_message(&self) -> Option<&SignalMessage> {
        self.messaging.as_ref()?.signal_messages.first()
    }

    pub fn message_kind(&self) -> Option<MessageKind> {
        if self.user_message().is_some() {
            return Some(MessageKind::User);
        }
        self.signal_message().map(|signal| match signal.kind {
            SignalKind::PullRequest(_) => MessageKind::PullRequest,
            SignalKind::Receipt(_) => MessageKind::Receipt,
            SignalKind::Errors(_) => MessageKind::Error,
        })
    }

    /// Id of the primary message, if it carries a non-empty one
    pub fn message_id(&self) -> Option<&str> {
        let id = match self.user_message() {
            Some(user) => user.message_id(),
            None => self.signal_message()?.message_id(),
        };
        (!id.is_empty()).then_some(id)
    }

    pub fn is_ping(&self) -> bool {
        self.user_message().map_or(false, |u| u.is_ping())
    }

    pub fn effective_leg(&self) -> Option<&Leg> {
        let pmode = self.pmode.as_ref()?;
        match self.leg? {
            LegNumber::Leg1 => pmode.leg1.as_ref(),
            LegNumber::Leg2 => pmode.leg2.as_ref(),
        }
    }

    pub fn leg_security(&self) -> Option<&LegSecurity> {
        self.effective_leg()?.security.as_ref()
    }

    pub fn has_completed(&self, stage: Stage) -> bool {
        self.completed_stages.contains(&stage)
    }
}
