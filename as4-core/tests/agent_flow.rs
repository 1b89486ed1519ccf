//! Inbound and outbound flows through a fully assembled agent

mod common;

use as4_core::ebms::{ReceiptContent, SignalKind};
use as4_core::pmode::{BusinessInfo, Mep, MepBinding, PMode, SignatureAlgorithm};
use as4_core::signal::build_pull_request;
use as4_core::soap::{parse_envelope, write_signal_envelope, SoapVersion};
use as4_core::storage::MemoryStore;
use as4_core::traits::HttpHeaders;
use as4_core::{
    AgentConfig, AgentError, As4Agent, DuplicateItem, OutgoingUserMessage, RetryPolicy, SendResult,
};
use common::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::tempdir;

fn receiver(security: Arc<StubSigner>, dispatcher: Arc<RecordingDispatcher>) -> As4Agent {
    let agent = build_agent(
        AgentConfig::default(),
        security,
        dispatcher,
        Arc::new(UnreachableTransport),
    );
    agent.add_pmode(cef_pmode()).unwrap();
    agent
}

fn error_codes(body: &[u8]) -> Vec<String> {
    let parsed = parse_envelope(body).unwrap();
    let signal = parsed.messaging.unwrap().signal_messages.remove(0);
    signal.errors().iter().map(|e| e.code.clone()).collect()
}

/// **Signed message accepted and acknowledged**
///
/// A CEF message with a valid signature is dispatched once, its id is
/// remembered, and the synchronous answer is a non-repudiation receipt.
#[test]
fn test_signed_message_is_dispatched_and_receipted() {
    let security = Arc::new(StubSigner::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let agent = receiver(security.clone(), dispatcher.clone());

    let response = agent.process_incoming(
        &envelope("msg-42@sender", Some(SECURITY_HEADER)),
        HttpHeaders::new().with("Content-Type", "application/soap+xml"),
    );

    assert_eq!(response.status, 200);
    assert_eq!(security.verified(), 1);
    assert_eq!(dispatcher.user_message_ids(), vec!["msg-42@sender"]);
    assert!(agent.duplicates().contains("msg-42@sender"));

    let parsed = parse_envelope(&response.body).unwrap();
    assert!(parsed.security.is_some(), "receipt must be signed");
    let receipt = parsed.messaging.unwrap().signal_messages.remove(0);
    assert_eq!(receipt.ref_to_message_id(), Some("msg-42@sender"));
    match receipt.kind {
        SignalKind::Receipt(receipt) => {
            assert!(matches!(receipt.content, ReceiptContent::NonRepudiation(refs) if refs.len() == 1));
        }
        other => panic!("expected receipt, got {:?}", other),
    }
}

#[test]
fn test_resend_is_acknowledged_without_second_dispatch() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let agent = receiver(Arc::new(StubSigner::default()), dispatcher.clone());
    let message = envelope("msg-42@sender", Some(SECURITY_HEADER));

    let first = agent.process_incoming(&message, HttpHeaders::new());
    let second = agent.process_incoming(&message, HttpHeaders::new());

    assert_eq!(first.status, 200);
    assert!(!first.is_empty());
    assert_eq!(second.status, 200);
    assert!(second.is_empty());
    assert_eq!(dispatcher.user_message_ids().len(), 1);
    assert_eq!(agent.duplicates().len(), 1);
}

/// **Security failures never reach duplicate detection**
///
/// An unsigned message on a signing leg is a policy violation; the id must
/// stay unknown so the corrected, signed resend is still accepted.
#[test]
fn test_unsigned_message_rejected_before_duplicate_check() {
    let security = Arc::new(StubSigner::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let agent = receiver(security.clone(), dispatcher.clone());

    let response = agent.process_incoming(&envelope("msg-42@sender", None), HttpHeaders::new());

    assert_eq!(response.status, 200);
    assert_eq!(error_codes(&response.body), vec!["EBMS:0103"]);
    assert_eq!(security.verified(), 0);
    assert!(agent.duplicates().is_empty());
    assert!(dispatcher.user_message_ids().is_empty());

    let resent = agent.process_incoming(
        &envelope("msg-42@sender", Some(SECURITY_HEADER)),
        HttpHeaders::new(),
    );
    assert_eq!(resent.status, 200);
    assert_eq!(dispatcher.user_message_ids(), vec!["msg-42@sender"]);
}

#[test]
fn test_invalid_signature_reports_failed_authentication() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let agent = receiver(Arc::new(StubSigner::rejecting()), dispatcher.clone());

    let response = agent.process_incoming(
        &envelope("msg-42@sender", Some(SECURITY_HEADER)),
        HttpHeaders::new(),
    );

    assert_eq!(error_codes(&response.body), vec!["EBMS:0101"]);
    assert!(agent.duplicates().is_empty());
    assert!(dispatcher.user_message_ids().is_empty());
}

#[test]
fn test_weak_digest_is_policy_noncompliance() {
    let security = Arc::new(StubSigner::default());
    let agent = receiver(security.clone(), Arc::new(RecordingDispatcher::default()));
    let weak = SECURITY_HEADER.replace(
        "http://www.w3.org/2001/04/xmlenc#sha256",
        "http://www.w3.org/2000/09/xmldsig#sha1",
    );

    let response = agent.process_incoming(&envelope("msg-42@sender", Some(&weak)), HttpHeaders::new());

    assert_eq!(error_codes(&response.body), vec!["EBMS:0103"]);
    assert_eq!(security.verified(), 0);
    assert!(agent.duplicates().is_empty());
}

#[test]
fn test_wss_version_mismatch_stops_before_duplicate_check() {
    let security = Arc::new(StubSigner::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let agent = receiver(security.clone(), dispatcher.clone());
    // Without the 1.1 namespace the header declares WSS 1.0
    let wss10 = SECURITY_HEADER
        .replace(r#" xmlns:wsse11="http://docs.oasis-open.org/wss/oasis-wss-wssecurity-secext-1.1.xsd""#, "")
        .replace(r#" wsse11:TokenType="x509""#, "");

    let response = agent.process_incoming(&envelope("msg-42@sender", Some(&wss10)), HttpHeaders::new());

    assert_eq!(error_codes(&response.body), vec!["EBMS:0103"]);
    assert_eq!(security.verified(), 0);
    assert!(agent.duplicates().is_empty());
    assert!(dispatcher.user_message_ids().is_empty());
}

#[test]
fn test_unknown_pmode_is_rejected() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let agent = build_agent(
        AgentConfig::default(),
        Arc::new(StubSigner::default()),
        dispatcher.clone(),
        Arc::new(UnreachableTransport),
    );

    let response = agent.process_incoming(
        &envelope("msg-42@sender", Some(SECURITY_HEADER)),
        HttpHeaders::new(),
    );

    assert_eq!(response.status, 200);
    assert_eq!(error_codes(&response.body), vec!["EBMS:0010"]);
    assert!(agent.duplicates().is_empty());
}

#[test]
fn test_disabled_duplicate_detection_dispatches_every_copy() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let mut config = AgentConfig::default();
    config.duplicates.enabled = false;
    let agent = build_agent(
        config,
        Arc::new(StubSigner::default()),
        dispatcher.clone(),
        Arc::new(UnreachableTransport),
    );
    agent.add_pmode(cef_pmode()).unwrap();

    let message = envelope("msg-42@sender", Some(SECURITY_HEADER));
    agent.process_incoming(&message, HttpHeaders::new());
    agent.process_incoming(&message, HttpHeaders::new());

    assert_eq!(dispatcher.user_message_ids().len(), 2);
    assert!(agent.duplicates().is_empty());
}

/// **Known ids and PModes survive a restart**
#[test]
fn test_file_stores_survive_restart() {
    let dir = tempdir().unwrap();
    let mut config = AgentConfig::default();
    config.pmodes.store_path = Some(dir.path().join("pmodes.json"));
    config.duplicates.store_path = Some(dir.path().join("duplicates.json"));
    let message = envelope("msg-42@sender", Some(SECURITY_HEADER));

    {
        let agent = build_agent(
            config.clone(),
            Arc::new(StubSigner::default()),
            Arc::new(RecordingDispatcher::default()),
            Arc::new(UnreachableTransport),
        );
        agent.add_pmode(cef_pmode()).unwrap();
        assert_eq!(agent.process_incoming(&message, HttpHeaders::new()).status, 200);
    }

    let dispatcher = Arc::new(RecordingDispatcher::default());
    let restarted = build_agent(
        config,
        Arc::new(StubSigner::default()),
        dispatcher.clone(),
        Arc::new(UnreachableTransport),
    );
    assert_eq!(restarted.registry().ids().unwrap(), vec![PMODE_ID]);
    assert!(restarted.duplicates().contains("msg-42@sender"));

    let response = restarted.process_incoming(&message, HttpHeaders::new());
    assert!(response.is_empty());
    assert!(dispatcher.user_message_ids().is_empty());
}

#[test]
fn test_startup_evicts_ids_past_retention() {
    let now = chrono::Utc::now();
    let store = Arc::new(MemoryStore::with_records([
        DuplicateItem::new("old@sender", Some("cef"), None, now - chrono::Duration::days(30)),
        DuplicateItem::new("recent@sender", Some("cef"), None, now - chrono::Duration::days(1)),
    ]));

    let agent = As4Agent::builder()
        .security(Arc::new(StubSigner::default()))
        .transport(Arc::new(UnreachableTransport))
        .dispatcher(Arc::new(RecordingDispatcher::default()))
        .duplicate_store(store.clone())
        .build()
        .unwrap();

    assert!(!agent.duplicates().contains("old@sender"));
    assert!(agent.duplicates().contains("recent@sender"));
    assert!(!store.contains("old@sender"));
}

#[test]
fn test_builder_requires_collaborators() {
    let err = As4Agent::builder()
        .security(Arc::new(StubSigner::default()))
        .dispatcher(Arc::new(RecordingDispatcher::default()))
        .build()
        .unwrap_err();
    assert!(matches!(err, AgentError::MissingCollaborator("HTTP transport")));
}

#[test]
fn test_builder_rejects_unknown_profile() {
    let mut config = AgentConfig::default();
    config.agent.profile = "as2".to_string();

    let err = As4Agent::builder()
        .config(config)
        .security(Arc::new(StubSigner::default()))
        .transport(Arc::new(UnreachableTransport))
        .dispatcher(Arc::new(RecordingDispatcher::default()))
        .build()
        .unwrap_err();
    assert!(matches!(err, AgentError::UnknownProfile(ref id) if id == "as2"));
}

#[test]
fn test_invalid_stored_pmode_blocks_startup() {
    let mut broken = cef_pmode();
    broken.leg1 = None;

    let err = As4Agent::builder()
        .security(Arc::new(StubSigner::default()))
        .transport(Arc::new(UnreachableTransport))
        .dispatcher(Arc::new(RecordingDispatcher::default()))
        .pmode_store(Arc::new(MemoryStore::with_records([broken])))
        .build()
        .unwrap_err();
    match err {
        AgentError::InvalidPModes(failures) => {
            assert!(failures.iter().any(|f| f.contains("has no leg 1")), "{:?}", failures);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_add_pmode_enforces_profile() {
    let agent = build_agent(
        AgentConfig::default(),
        Arc::new(StubSigner::default()),
        Arc::new(RecordingDispatcher::default()),
        Arc::new(UnreachableTransport),
    );
    let mut pmode = cef_pmode();
    if let Some(security) = pmode.leg1.as_mut().and_then(|leg| leg.security.as_mut()) {
        security.x509_signature_algorithm = Some(SignatureAlgorithm::RsaSha512);
    }

    assert!(matches!(agent.add_pmode(pmode), Err(AgentError::InvalidPModes(_))));
    assert!(agent.registry().is_empty());
}

/// CEF PMode under which `receiver` pulls `urn:mpc:outbox` from `sender`
fn pull_pmode() -> PMode {
    let mut pmode = cef_pmode().with_mep(Mep::OneWay, MepBinding::Pull);
    pmode.id = "sender-receiver-pull".to_string();
    if let Some(leg) = pmode.leg1.as_mut() {
        leg.business_info = BusinessInfo {
            mpc: Some("urn:mpc:outbox".to_string()),
            ..Default::default()
        };
    }
    pmode
}

fn signed_pull_request(message_id: &str, mpc: &str) -> Vec<u8> {
    write_signal_envelope(&build_pull_request(message_id.to_string(), mpc), SoapVersion::Soap12)
        .unwrap()
        .replacen("</S12:Header>", &format!("{}</S12:Header>", SECURITY_HEADER), 1)
        .into_bytes()
}

/// **Pull request served from the outbox**
///
/// A pull-bound PMode registers under the profile, the signed pull request
/// resolves it by MPC, and the queued user message comes back signed.
#[test]
fn test_pull_request_returns_queued_message() {
    let security = Arc::new(StubSigner::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let agent = build_agent(
        AgentConfig::default(),
        security.clone(),
        dispatcher.clone(),
        Arc::new(UnreachableTransport),
    );
    agent.add_pmode(pull_pmode()).unwrap();

    let queued = parse_envelope(&envelope("queued-1@sender", None))
        .unwrap()
        .messaging
        .unwrap()
        .user_messages
        .remove(0);
    dispatcher.enqueue(queued);

    let response = agent.process_incoming(
        &signed_pull_request("pull-1@receiver", "urn:mpc:outbox"),
        HttpHeaders::new(),
    );

    assert_eq!(response.status, 200);
    assert_eq!(security.verified(), 1);
    assert_eq!(dispatcher.signal_ids(), vec!["pull-1@receiver"]);
    let parsed = parse_envelope(&response.body).unwrap();
    assert!(parsed.security.is_some(), "pulled message must be signed");
    let pulled = parsed.messaging.unwrap().user_messages.remove(0);
    assert_eq!(pulled.message_id(), "queued-1@sender");

    // Nothing left to pull
    let response = agent.process_incoming(
        &signed_pull_request("pull-2@receiver", "urn:mpc:outbox"),
        HttpHeaders::new(),
    );
    assert_eq!(error_codes(&response.body), vec!["EBMS:0006"]);
}

#[test]
fn test_pull_request_for_other_channel_is_rejected() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let agent = build_agent(
        AgentConfig::default(),
        Arc::new(StubSigner::default()),
        dispatcher.clone(),
        Arc::new(UnreachableTransport),
    );
    agent.add_pmode(pull_pmode()).unwrap();

    let response = agent.process_incoming(
        &signed_pull_request("pull-1@receiver", "urn:mpc:other"),
        HttpHeaders::new(),
    );

    assert_eq!(error_codes(&response.body), vec!["EBMS:0010"]);
    assert!(dispatcher.signal_ids().is_empty());
}

#[test]
fn test_deeply_nested_envelope_is_rejected() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let agent = receiver(Arc::new(StubSigner::default()), dispatcher.clone());
    let depth = 100_000;
    let message = String::from_utf8(envelope("msg-42@sender", Some(SECURITY_HEADER)))
        .unwrap()
        .replace(
            "<S12:Body/>",
            &format!("<S12:Body>{}{}</S12:Body>", "<x>".repeat(depth), "</x>".repeat(depth)),
        );

    let response = agent.process_incoming(message.as_bytes(), HttpHeaders::new());

    assert_eq!(response.status, 200);
    assert_eq!(error_codes(&response.body), vec!["EBMS:0009"]);
    assert!(agent.duplicates().is_empty());
    assert!(dispatcher.user_message_ids().is_empty());
}

/// **Two agents talking AS4**
///
/// The sender's transport feeds the receiver's inbound pipeline, so the
/// outbound message, its receipt and the receipt interpretation all run
/// through production code.
#[tokio::test]
async fn test_send_to_partner_agent() {
    let receiver_dispatcher = Arc::new(RecordingDispatcher::default());
    let partner = Arc::new(receiver(Arc::new(StubSigner::default()), receiver_dispatcher.clone()));

    let transport = Arc::new(LoopbackTransport::new(partner.clone()));
    let mut config = AgentConfig::default();
    config.agent.message_id_domain = "sender.example".to_string();
    let sender = build_agent(
        config,
        Arc::new(StubSigner::default()),
        Arc::new(RecordingDispatcher::default()),
        transport.clone(),
    );
    sender.add_pmode(cef_pmode()).unwrap();

    let outgoing = OutgoingUserMessage::new(PMODE_ID)
        .with_property("originalSender", "C1")
        .with_property("finalRecipient", "C4");
    let outcome = sender
        .send_user_message(outgoing, &RetryPolicy::no_retry())
        .await
        .unwrap();

    assert_eq!(outcome.result, SendResult::Success);
    assert_eq!(outcome.attempts, 1);
    assert!(outcome.message_id.ends_with("@sender.example"));
    assert_eq!(transport.posted.load(Ordering::SeqCst), 1);
    assert_eq!(receiver_dispatcher.user_message_ids(), vec![outcome.message_id.clone()]);

    let receipt = outcome.signal.unwrap();
    assert_eq!(receipt.ref_to_message_id(), Some(outcome.message_id.as_str()));
    assert!(sender.duplicates().contains(receipt.message_id()));
}

#[tokio::test]
async fn test_send_reports_partner_rejection() {
    let receiver_dispatcher = Arc::new(RecordingDispatcher::default());
    let partner = Arc::new(receiver(Arc::new(StubSigner::rejecting()), receiver_dispatcher.clone()));

    let sender = build_agent(
        AgentConfig::default(),
        Arc::new(StubSigner::default()),
        Arc::new(RecordingDispatcher::default()),
        Arc::new(LoopbackTransport::new(partner)),
    );
    sender.add_pmode(cef_pmode()).unwrap();

    let outgoing = OutgoingUserMessage::new(PMODE_ID)
        .with_property("originalSender", "C1")
        .with_property("finalRecipient", "C4");
    let outcome = sender
        .send_user_message(outgoing, &RetryPolicy::no_retry())
        .await
        .unwrap();

    assert_eq!(outcome.result, SendResult::ErrorSignalReceived);
    let codes: Vec<&str> = outcome.catalog_errors().iter().map(|e| e.code).collect();
    assert_eq!(codes, vec!["EBMS:0101"]);
    assert!(receiver_dispatcher.user_message_ids().is_empty());
}
