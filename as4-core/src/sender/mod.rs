//! Outbound send orchestration
//!
//! Builds the user message from its PMode, compresses and secures it,
//! posts it to the partner with retries and interprets the signal that
//! comes back on the HTTP response.

mod types;

pub use types::{OutgoingUserMessage, RetryPolicy, SendError, SendOutcome, SendResult};

use crate::compression::compress_attachments;
use crate::duplicate::{DuplicateCheck, DuplicateManager};
use crate::ebms::{
    generate_message_id, AgreementRef, Attachment, CollaborationInfo, MessageInfo, PartInfo,
    PartyInfo, PartyRef, Service, SignalKind, SignalMessage, UserMessage,
};
use crate::metrics;
use crate::pmode::{Leg, Mep, PMode, PModeRegistry, Party};
use crate::soap::{parse_envelope, write_user_message_envelope, SoapVersion};
use crate::traits::{HttpHeaders, HttpRequest, HttpTransport, MessagePackager, SecurityProcessor};
use chrono::Utc;
use tracing::{debug, info, warn};

/// Borrowed view of the agent's components for one send
#[derive(Clone, Copy)]
pub struct SendContext<'a> {
    pub registry: &'a PModeRegistry,
    pub duplicates: &'a DuplicateManager,
    pub security: &'a dyn SecurityProcessor,
    pub transport: &'a dyn HttpTransport,
    pub packager: &'a dyn MessagePackager,
    pub message_id_domain: &'a str,
    pub profile_id: &'a str,
}

fn invalid(pmode: &PMode, reason: impl Into<String>) -> SendError {
    SendError::InvalidPMode {
        id: pmode.id.clone(),
        reason: reason.into(),
    }
}

fn party_ref(party: &Party) -> PartyRef {
    PartyRef {
        party_ids: vec![party.to_party_id()],
        role: Some(party.role.clone()),
    }
}

/// Build the `eb:UserMessage` for `outgoing` on the given leg
fn build_user_message(
    pmode: &PMode,
    leg: &Leg,
    is_reply: bool,
    outgoing: &OutgoingUserMessage,
    message_id: &str,
) -> Result<UserMessage, SendError> {
    let (Some(initiator), Some(responder)) = (&pmode.initiator, &pmode.responder) else {
        return Err(invalid(pmode, "initiator and responder are required"));
    };
    let (from, to) = if is_reply {
        (responder, initiator)
    } else {
        (initiator, responder)
    };

    let business = &leg.business_info;
    let service = business
        .service
        .clone()
        .ok_or_else(|| invalid(pmode, "leg has no service"))?;
    let action = business
        .action
        .clone()
        .ok_or_else(|| invalid(pmode, "leg has no action"))?;

    Ok(UserMessage {
        mpc: business.mpc.clone(),
        message_info: MessageInfo {
            timestamp: Some(Utc::now()),
            message_id: message_id.to_string(),
            ref_to_message_id: outgoing.ref_to_message_id.clone(),
        },
        party_info: Some(PartyInfo {
            from: party_ref(from),
            to: party_ref(to),
        }),
        collaboration_info: Some(CollaborationInfo {
            agreement_ref: Some(AgreementRef {
                value: pmode.agreement_ref.clone().unwrap_or_else(|| pmode.id.clone()),
                ref_type: None,
                pmode: Some(pmode.id.clone()),
            }),
            service: Service {
                value: service,
                service_type: business.service_type.clone(),
            },
            action,
            conversation_id: outgoing
                .conversation_id
                .clone()
                .unwrap_or_else(|| generate_message_id("conversation")),
        }),
        message_properties: outgoing.message_properties.clone(),
        payload_info: outgoing
            .attachments
            .iter()
            .map(|a| PartInfo {
                href: Some(format!("cid:{}", a.content_id)),
                properties: Vec::new(),
            })
            .collect(),
    })
}

/// Interpret the HTTP response to one attempt
fn interpret_response(
    ctx: &SendContext<'_>,
    message_id: &str,
    receipt_expected: bool,
    status: u16,
    body: &[u8],
) -> (SendResult, Option<SignalMessage>) {
    let success = (200..300).contains(&status);

    if body.is_empty() {
        let result = match (success, receipt_expected) {
            (false, _) => SendResult::HttpError(status),
            (true, true) => SendResult::NoSignalMessageReceived,
            (true, false) => SendResult::Success,
        };
        return (result, None);
    }

    let signal = match parse_envelope(body) {
        Ok(parsed) => parsed
            .messaging
            .and_then(|m| m.signal_messages.into_iter().next()),
        Err(e) if success => {
            return (SendResult::InvalidSignalMessageReceived(e.to_string()), None);
        }
        Err(_) => return (SendResult::HttpError(status), None),
    };
    let Some(signal) = signal else {
        let result = if success {
            SendResult::InvalidSignalMessageReceived("response carries no SignalMessage".to_string())
        } else {
            SendResult::HttpError(status)
        };
        return (result, None);
    };

    let check = ctx.duplicates.register_and_check(
        Some(signal.message_id()),
        Some(ctx.profile_id),
        None,
    );
    if check == DuplicateCheck::AlreadySeen {
        warn!(signal_id = %signal.message_id(), "Signal message received twice");
    }

    let result = match &signal.kind {
        SignalKind::Errors(errors) => {
            warn!(
                message_id,
                codes = ?errors.iter().map(|e| e.code.as_str()).collect::<Vec<_>>(),
                "Partner returned an error signal"
            );
            SendResult::ErrorSignalReceived
        }
        SignalKind::Receipt(_) if signal.ref_to_message_id() == Some(message_id) => SendResult::Success,
        SignalKind::Receipt(_) => SendResult::InvalidSignalMessageReceived(format!(
            "receipt refers to {:?}",
            signal.ref_to_message_id()
        )),
        SignalKind::PullRequest(_) => {
            SendResult::InvalidSignalMessageReceived("unexpected pull request".to_string())
        }
    };
    (result, Some(signal))
}

/// Send a user message under its PMode
///
/// Configuration defects are returned as [`SendError`]; everything that
/// happens on the wire is reported in the [`SendOutcome`].
pub async fn send_user_message(
    ctx: &SendContext<'_>,
    outgoing: OutgoingUserMessage,
    policy: &RetryPolicy,
) -> Result<SendOutcome, SendError> {
    let pmode = ctx
        .registry
        .find(&outgoing.pmode_id)?
        .ok_or_else(|| SendError::PModeNotFound(outgoing.pmode_id.clone()))?;

    let is_reply = outgoing.ref_to_message_id.is_some() && pmode.mep == Mep::TwoWay;
    let leg = pmode
        .effective_leg(is_reply)
        .ok_or_else(|| invalid(&pmode, "no leg to send on"))?;
    let address = leg
        .protocol
        .address
        .clone()
        .ok_or_else(|| invalid(&pmode, "leg has no partner address"))?;
    let soap_version: SoapVersion = leg.protocol.soap_version;

    let message_id = outgoing
        .message_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| generate_message_id(ctx.message_id_domain));

    let mut user_message = build_user_message(&pmode, leg, is_reply, &outgoing, &message_id)?;
    let attachments: Vec<Attachment> = if pmode.compression_mode().is_some() {
        compress_attachments(&mut user_message, outgoing.attachments)?
    } else {
        outgoing.attachments
    };
    let envelope = write_user_message_envelope(&user_message, soap_version)?;
    let receipt_expected = leg
        .security
        .as_ref()
        .map_or(false, |s| s.receipt_as_response());

    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;
    loop {
        attempts += 1;

        // The request buffer belongs to this attempt only
        let (body, attachments) = match &leg.security {
            Some(security) => {
                let secured = ctx.security.secure(
                    envelope.clone().into_bytes(),
                    attachments.clone(),
                    security,
                    soap_version,
                )?;
                (secured.envelope, secured.attachments)
            }
            None => (envelope.clone().into_bytes(), attachments.clone()),
        };
        let packaged = ctx.packager.package(body, attachments, soap_version)?;
        let request = HttpRequest {
            url: address.clone(),
            headers: HttpHeaders::new().with("Content-Type", packaged.content_type),
            body: packaged.body,
        };

        debug!(%message_id, attempt = attempts, url = %address, "Posting user message");
        metrics::outbound_attempt();
        let (result, signal) = match ctx.transport.post(request).await {
            Ok(response) => {
                interpret_response(ctx, &message_id, receipt_expected, response.status, &response.body)
            }
            Err(e) => (SendResult::TransportError(e.to_string()), None),
        };

        if result.is_retryable() && attempts < max_attempts {
            warn!(%message_id, attempt = attempts, result = result.as_str(), "Send failed, retrying");
            tokio::time::sleep(policy.retry_interval).await;
            continue;
        }

        metrics::outbound_result(result.as_str());
        info!(%message_id, pmode = %pmode.id, attempts, result = result.as_str(), "User message sent");
        return Ok(SendOutcome {
            message_id,
            result,
            signal,
            attempts,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ebms::{Property, SignatureReference};
    use crate::pmode::{BusinessInfo, LegSecurity, MepBinding};
    use crate::profile::{As4Profile, CEF, ENTSOG};
    use crate::signal::{
        build_error, build_receipt, build_signal_message, EBMS_POLICY_NONCOMPLIANCE,
    };
    use crate::soap::write_signal_envelope;
    use crate::traits::{
        HttpResponse, SecuredMessage, SecurityResult, SinglePartPackager, TransportError,
        VerifiedMessage,
    };
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    struct PassThroughSecurity;

    impl SecurityProcessor for PassThroughSecurity {
        fn secure(
            &self,
            envelope: Vec<u8>,
            attachments: Vec<Attachment>,
            _security: &LegSecurity,
            _soap_version: SoapVersion,
        ) -> SecurityResult<SecuredMessage> {
            Ok(SecuredMessage { envelope, attachments })
        }

        fn verify(
            &self,
            _envelope: &[u8],
            attachments: Vec<Attachment>,
            _security: &LegSecurity,
        ) -> SecurityResult<VerifiedMessage> {
            Ok(VerifiedMessage {
                signing_certificate: None,
                attachments,
            })
        }
    }

    /// Answers every post with the next scripted reply
    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn reply(self, reply: Result<HttpResponse, TransportError>) -> Self {
            self.replies.lock().unwrap().push_back(reply);
            self
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TransportError::Timeout))
        }
    }

    fn ok(body: Vec<u8>) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: 200,
            headers: HttpHeaders::new(),
            body,
        })
    }

    fn registry_with(profile: &As4Profile) -> PModeRegistry {
        let mut pmode = profile.create_pmode_template("sender", "receiver", Some("https://receiver/as4"));
        if let Some(leg) = pmode.leg1.as_mut() {
            leg.business_info = BusinessInfo {
                service: Some("urn:service".to_string()),
                action: Some("Submit".to_string()),
                ..Default::default()
            };
        }
        let registry = PModeRegistry::new();
        registry.add(pmode).unwrap();
        registry
    }

    fn receipt_for(request: &HttpRequest) -> Vec<u8> {
        let parsed = parse_envelope(&request.body).unwrap();
        let user = parsed.messaging.unwrap().user_messages.remove(0);
        let reference = SignatureReference {
            uri: "#body".to_string(),
            digest_algorithm: "http://www.w3.org/2001/04/xmlenc#sha256".to_string(),
            digest_value: "abc=".to_string(),
        };
        let receipt = build_receipt("rcpt-1@receiver".to_string(), &user, true, &[reference]);
        write_signal_envelope(&receipt, SoapVersion::Soap12).unwrap().into_bytes()
    }

    async fn send(
        registry: &PModeRegistry,
        duplicates: &DuplicateManager,
        transport: &ScriptedTransport,
        outgoing: OutgoingUserMessage,
        policy: RetryPolicy,
    ) -> Result<SendOutcome, SendError> {
        let ctx = SendContext {
            registry,
            duplicates,
            security: &PassThroughSecurity,
            transport,
            packager: &SinglePartPackager,
            message_id_domain: "sender.example",
            profile_id: "cef",
        };
        send_user_message(&ctx, outgoing, &policy).await
    }

    /// Transport that answers with a receipt for whatever it receives
    struct ReceiptingTransport {
        inner: ScriptedTransport,
    }

    #[async_trait]
    impl HttpTransport for ReceiptingTransport {
        async fn post(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let body = receipt_for(&request);
            self.inner.requests.lock().unwrap().push(request);
            ok(body)
        }
    }

    #[tokio::test]
    async fn test_receipt_means_success() {
        let profile = As4Profile::new(&CEF, false);
        let registry = registry_with(&profile);
        let duplicates = DuplicateManager::new();
        let transport = ReceiptingTransport {
            inner: ScriptedTransport::default(),
        };

        let ctx = SendContext {
            registry: &registry,
            duplicates: &duplicates,
            security: &PassThroughSecurity,
            transport: &transport,
            packager: &SinglePartPackager,
            message_id_domain: "sender.example",
            profile_id: "cef",
        };
        let outgoing = OutgoingUserMessage::new("sender-receiver")
            .with_property("originalSender", "C1")
            .with_property("finalRecipient", "C4");
        let outcome = send_user_message(&ctx, outgoing, &RetryPolicy::no_retry())
            .await
            .unwrap();

        assert_eq!(outcome.result, SendResult::Success);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.message_id.ends_with("@sender.example"));
        assert!(duplicates.contains("rcpt-1@receiver"));

        let requests = transport.inner.requests.lock().unwrap();
        assert_eq!(requests[0].url, "https://receiver/as4");
        let sent = parse_envelope(&requests[0].body).unwrap();
        let user = &sent.messaging.unwrap().user_messages[0];
        assert_eq!(user.pmode_id(), Some("sender-receiver"));
        assert_eq!(user.message_properties[0], Property::new("originalSender", "C1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_are_retried_with_same_id() {
        let profile = As4Profile::new(&CEF, false);
        let registry = registry_with(&profile);
        let duplicates = DuplicateManager::new();
        let transport = ScriptedTransport::default()
            .reply(Err(TransportError::Connection("refused".to_string())))
            .reply(Err(TransportError::Timeout))
            .reply(Err(TransportError::Timeout));

        let outcome = send(
            &registry,
            &duplicates,
            &transport,
            OutgoingUserMessage::new("sender-receiver").with_message_id("fixed-id"),
            RetryPolicy::new(3, Duration::from_secs(30)),
        )
        .await
        .unwrap();

        assert!(matches!(outcome.result, SendResult::TransportError(_)));
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.message_id, "fixed-id");

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        for request in requests.iter() {
            let parsed = parse_envelope(&request.body).unwrap();
            assert_eq!(parsed.messaging.unwrap().user_messages[0].message_id(), "fixed-id");
        }
    }

    #[tokio::test]
    async fn test_error_signal_is_decoded() {
        let profile = As4Profile::new(&CEF, false);
        let registry = registry_with(&profile);
        let duplicates = DuplicateManager::new();
        let error = build_error(&EBMS_POLICY_NONCOMPLIANCE, Some("m1"), None);
        let body = write_signal_envelope(&build_signal_message(vec![error]), SoapVersion::Soap12).unwrap();
        let transport = ScriptedTransport::default().reply(ok(body.into_bytes()));

        let outcome = send(
            &registry,
            &duplicates,
            &transport,
            OutgoingUserMessage::new("sender-receiver").with_message_id("m1"),
            RetryPolicy::no_retry(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.result, SendResult::ErrorSignalReceived);
        assert_eq!(outcome.catalog_errors()[0].code, "EBMS:0103");
    }

    #[tokio::test]
    async fn test_empty_response_when_receipt_expected() {
        let profile = As4Profile::new(&CEF, false);
        let registry = registry_with(&profile);
        let duplicates = DuplicateManager::new();
        let transport = ScriptedTransport::default().reply(ok(Vec::new()));

        let outcome = send(
            &registry,
            &duplicates,
            &transport,
            OutgoingUserMessage::new("sender-receiver"),
            RetryPolicy::no_retry(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.result, SendResult::NoSignalMessageReceived);
    }

    #[tokio::test]
    async fn test_unknown_pmode_is_an_error() {
        let registry = PModeRegistry::new();
        let duplicates = DuplicateManager::new();
        let transport = ScriptedTransport::default();

        let result = send(
            &registry,
            &duplicates,
            &transport,
            OutgoingUserMessage::new("missing"),
            RetryPolicy::no_retry(),
        )
        .await;

        assert!(matches!(result, Err(SendError::PModeNotFound(id)) if id == "missing"));
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_compressing_pmode_needs_multipart_packager() {
        let profile = As4Profile::new(&ENTSOG, false);
        let registry = registry_with(&profile);
        let duplicates = DuplicateManager::new();
        let transport = ScriptedTransport::default();

        let outgoing = OutgoingUserMessage::new("sender-receiver")
            .with_attachment(Attachment::new("p1", "application/xml", b"<doc/>".to_vec()));
        let result = send(&registry, &duplicates, &transport, outgoing, RetryPolicy::no_retry()).await;

        assert!(matches!(result, Err(SendError::Packaging(_))));
    }

    #[test]
    fn test_reply_swaps_parties() {
        let profile = As4Profile::new(&CEF, false);
        let pmode = profile
            .create_pmode_template("a", "b", Some("https://b/as4"))
            .with_mep(Mep::TwoWay, MepBinding::PushPush);
        let leg = Leg::default().with_business_info(BusinessInfo {
            service: Some("s".to_string()),
            action: Some("a".to_string()),
            ..Default::default()
        });

        let outgoing = OutgoingUserMessage::new(pmode.id.clone()).with_ref_to_message_id("req-1");
        let message = build_user_message(&pmode, &leg, true, &outgoing, "resp-1").unwrap();

        assert_eq!(message.from_party_ids()[0].value, "b");
        assert_eq!(message.to_party_ids()[0].value, "a");
        assert_eq!(message.message_info.ref_to_message_id.as_deref(), Some("req-1"));
    }
}
