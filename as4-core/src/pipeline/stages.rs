//! The ordered inbound stages
//!
//! Each stage either advances the [`ProcessingState`] or stops the pipeline
//! with the ebMS errors to report. Security checks are fail-fast: the first
//! violation ends processing before the duplicate store is touched.

use super::state::{LegNumber, MessageKind, ProcessingState, Stage};
use super::PipelineContext;
use crate::compression::{decompress_attachments, CompressionError};
use crate::duplicate::DuplicateCheck;
use crate::issues::ErrorList;
use crate::pmode::{
    DigestAlgorithm, EncryptionAlgorithm, Mep, RegistryError, SignatureAlgorithm,
};
use crate::profile::ValidationMode;
use crate::signal::{
    build_error, EbmsError, ErrorRecord, EBMS_DECOMPRESSION_FAILURE, EBMS_FAILED_AUTHENTICATION,
    EBMS_FAILED_DECRYPTION, EBMS_INVALID_HEADER, EBMS_OTHER, EBMS_POLICY_NONCOMPLIANCE,
    EBMS_PROCESSING_MODE_MISMATCH, ORIGIN_EBMS, ORIGIN_SECURITY,
};
use crate::soap::parse_envelope;
use crate::traits::SecurityError;
use tracing::{debug, warn};

/// Why a stage stopped the pipeline
#[derive(Debug)]
pub enum StageError {
    /// Protocol violation, reported to the sender
    Rejected(Vec<ErrorRecord>),
    /// Defect on our side
    Internal(String),
}

pub type StageFn = fn(&PipelineContext<'_>, &mut ProcessingState) -> Result<(), StageError>;

/// Stages in execution order
pub static STAGES: [(Stage, StageFn); 5] = [
    (Stage::ExtractMessaging, extract_messaging),
    (Stage::ResolvePMode, resolve_pmode),
    (Stage::VerifySecurity, verify_security),
    (Stage::DuplicateCheck, check_duplicate),
    (Stage::Dispatch, dispatch),
];

fn reject(state: &ProcessingState, error: &EbmsError, origin: &str, detail: impl Into<String>) -> StageError {
    StageError::Rejected(vec![
        build_error(error, state.message_id(), Some(origin)).with_detail(detail)
    ])
}

/// One error per failure in `issues`; warnings are only logged
fn reject_issues(state: &ProcessingState, error: &EbmsError, origin: &str, issues: &ErrorList) -> Option<StageError> {
    for warning in issues.warnings() {
        warn!(message_id = ?state.message_id(), %warning, "Validation warning");
    }
    if !issues.has_failures() {
        return None;
    }
    let records = issues
        .failures()
        .map(|issue| {
            build_error(error, state.message_id(), Some(origin)).with_detail(issue.to_string())
        })
        .collect();
    Some(StageError::Rejected(records))
}

fn extract_messaging(ctx: &PipelineContext<'_>, state: &mut ProcessingState) -> Result<(), StageError> {
    let parsed = parse_envelope(&state.envelope)
        .map_err(|e| reject(state, &EBMS_INVALID_HEADER, ORIGIN_EBMS, e.to_string()))?;

    state.soap_version = Some(parsed.soap_version);
    state.security_header = parsed.security;

    let messaging = match (parsed.messaging_count, parsed.messaging) {
        (1, Some(messaging)) => messaging,
        (0, _) | (_, None) => {
            return Err(reject(state, &EBMS_INVALID_HEADER, ORIGIN_EBMS, "no eb:Messaging header"))
        }
        (count, Some(_)) => {
            return Err(reject(
                state,
                &EBMS_INVALID_HEADER,
                ORIGIN_EBMS,
                format!("{} eb:Messaging headers", count),
            ))
        }
    };

    let users = messaging.user_messages.len();
    let signals = messaging.signal_messages.len();
    state.messaging = Some(messaging);

    if users > 1 {
        return Err(reject(state, &EBMS_INVALID_HEADER, ORIGIN_EBMS, format!("{} UserMessages", users)));
    }
    if signals > 1 {
        return Err(reject(state, &EBMS_INVALID_HEADER, ORIGIN_EBMS, format!("{} SignalMessages", signals)));
    }
    if users == 0 && signals == 0 {
        return Err(reject(state, &EBMS_INVALID_HEADER, ORIGIN_EBMS, "eb:Messaging is empty"));
    }

    let mut issues = ErrorList::new();
    if let Some(user) = state.user_message() {
        ctx.validator.validate_user_message(user, &mut issues);
    } else if let Some(signal) = state.signal_message() {
        ctx.validator.validate_signal_message(signal, &mut issues);
    }
    match reject_issues(state, &EBMS_INVALID_HEADER, ORIGIN_EBMS, &issues) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn resolve_pmode(ctx: &PipelineContext<'_>, state: &mut ProcessingState) -> Result<(), StageError> {
    let (pmode, mode) = match state.message_kind() {
        Some(MessageKind::User) => {
            let Some(user) = state.user_message() else {
                return Err(StageError::Internal("user message disappeared".to_string()));
            };
            let found = match user.pmode_id() {
                Some(id) => ctx.registry.find(id),
                None => ctx
                    .registry
                    .find_by_parties(user.from_party_ids(), user.to_party_ids()),
            };
            let pmode = match found {
                Ok(pmode) => pmode,
                Err(RegistryError::AmbiguousParties(ids)) => {
                    return Err(reject(
                        state,
                        &EBMS_PROCESSING_MODE_MISMATCH,
                        ORIGIN_EBMS,
                        format!("parties match several PModes: {}", ids.join(", ")),
                    ))
                }
                Err(e) => return Err(StageError::Internal(e.to_string())),
            };
            (pmode, ValidationMode::UserMessage)
        }
        Some(MessageKind::PullRequest) => {
            let mpc = state
                .signal_message()
                .and_then(|s| match &s.kind {
                    crate::ebms::SignalKind::PullRequest(pull) => Some(pull.mpc.clone()),
                    _ => None,
                })
                .unwrap_or_default();
            let pmode = ctx.pull_resolver.and_then(|resolver| resolver.resolve(&mpc));
            (pmode, ValidationMode::SignalMessage)
        }
        // Receipts and errors are processed without a PMode
        Some(MessageKind::Receipt) | Some(MessageKind::Error) => return Ok(()),
        None => return Err(StageError::Internal("no message to resolve".to_string())),
    };

    let Some(pmode) = pmode else {
        return Err(reject(
            state,
            &EBMS_PROCESSING_MODE_MISMATCH,
            ORIGIN_EBMS,
            "no PMode matches the message",
        ));
    };

    let is_reply = state
        .user_message()
        .map_or(false, |u| u.message_info.ref_to_message_id.is_some());
    state.leg = Some(if is_reply && pmode.mep == Mep::TwoWay && pmode.leg2.is_some() {
        LegNumber::Leg2
    } else {
        LegNumber::Leg1
    });

    debug!(pmode = %pmode.id, leg = ?state.leg, "Resolved PMode");
    state.pmode = Some(pmode);

    let mut issues = ErrorList::new();
    if let Some(pmode) = &state.pmode {
        ctx.validator.validate_pmode(pmode, mode, &mut issues);
    }
    match reject_issues(state, &EBMS_PROCESSING_MODE_MISMATCH, ORIGIN_EBMS, &issues) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Fail-fast checks of the received security header against the leg
fn check_security_policy(ctx: &PipelineContext<'_>, state: &ProcessingState) -> Result<(), StageError> {
    let (Some(leg), Some(pmode)) = (state.effective_leg(), state.pmode.as_ref()) else {
        return Ok(());
    };
    let Some(security) = &leg.security else {
        return Ok(());
    };

    if state.soap_version != Some(leg.protocol.soap_version) {
        return Err(reject(
            state,
            &EBMS_INVALID_HEADER,
            ORIGIN_EBMS,
            format!("PMode requires {}", leg.protocol.soap_version),
        ));
    }

    if let Some(user) = state.user_message() {
        let (from, to) = match state.leg {
            Some(LegNumber::Leg2) => (&pmode.responder, &pmode.initiator),
            _ => (&pmode.initiator, &pmode.responder),
        };
        let (Some(from), Some(to)) = (from, to) else {
            return Err(reject(
                state,
                &EBMS_FAILED_AUTHENTICATION,
                ORIGIN_SECURITY,
                "PMode does not define both parties",
            ));
        };
        if !user.from_party_ids().iter().any(|id| from.matches(id)) {
            return Err(reject(
                state,
                &EBMS_FAILED_AUTHENTICATION,
                ORIGIN_SECURITY,
                format!("sender is not PMode party '{}'", from.id_value),
            ));
        }
        if !user.to_party_ids().iter().any(|id| to.matches(id)) {
            return Err(reject(
                state,
                &EBMS_FAILED_AUTHENTICATION,
                ORIGIN_SECURITY,
                format!("receiver is not PMode party '{}'", to.id_value),
            ));
        }
    }

    let header = state.security_header.as_ref();

    if security.is_signing_configured() && !header.map_or(false, |h| h.is_signed()) {
        return Err(reject(state, &EBMS_POLICY_NONCOMPLIANCE, ORIGIN_SECURITY, "message is not signed"));
    }
    if let Some(uri) = header.and_then(|h| h.signature_algorithm.as_deref()) {
        let accepted = SignatureAlgorithm::from_uri(uri)
            .map_or(false, |alg| ctx.validator.accepted_signature_algorithms().contains(&alg));
        if !accepted {
            return Err(reject(
                state,
                &EBMS_POLICY_NONCOMPLIANCE,
                ORIGIN_SECURITY,
                format!("signature algorithm {} is not accepted", uri),
            ));
        }
    }
    for uri in header.map(|h| h.digest_algorithms.as_slice()).unwrap_or_default() {
        let accepted = DigestAlgorithm::from_uri(uri)
            .map_or(false, |alg| ctx.validator.accepted_digest_algorithms().contains(&alg));
        if !accepted {
            return Err(reject(
                state,
                &EBMS_POLICY_NONCOMPLIANCE,
                ORIGIN_SECURITY,
                format!("digest algorithm {} is not accepted", uri),
            ));
        }
    }

    let encryption = header.map(|h| h.encryption_algorithms.as_slice()).unwrap_or_default();
    if security.is_encryption_configured() && encryption.is_empty() && !state.attachments.is_empty() {
        return Err(reject(state, &EBMS_POLICY_NONCOMPLIANCE, ORIGIN_SECURITY, "payload is not encrypted"));
    }
    for uri in encryption {
        let accepted = EncryptionAlgorithm::from_uri(uri)
            .map_or(false, |alg| ctx.validator.accepted_encryption_algorithms().contains(&alg));
        if !accepted {
            return Err(reject(
                state,
                &EBMS_POLICY_NONCOMPLIANCE,
                ORIGIN_SECURITY,
                format!("encryption algorithm {} is not accepted", uri),
            ));
        }
    }

    if let Some(version) = security.wss_version {
        if !ctx.validator.accepted_wss_versions().contains(&version) {
            return Err(reject(
                state,
                &EBMS_POLICY_NONCOMPLIANCE,
                ORIGIN_SECURITY,
                format!("{} is not supported", version),
            ));
        }
        if let Some(declared) = header.and_then(|h| h.declared_wss_version) {
            if declared != version {
                return Err(reject(
                    state,
                    &EBMS_POLICY_NONCOMPLIANCE,
                    ORIGIN_SECURITY,
                    format!("message uses {} but PMode requires {}", declared, version),
                ));
            }
        }
    }

    Ok(())
}

fn verify_security(ctx: &PipelineContext<'_>, state: &mut ProcessingState) -> Result<(), StageError> {
    check_security_policy(ctx, state)?;

    let security = state.leg_security().cloned();
    if let (Some(security), true) = (security, state.security_header.is_some()) {
        let attachments = std::mem::take(&mut state.attachments);
        match ctx.security.verify(&state.envelope, attachments, &security) {
            Ok(verified) => {
                state.signing_certificate = verified.signing_certificate;
                state.attachments = verified.attachments;
            }
            Err(SecurityError::DecryptionFailed(detail)) => {
                return Err(reject(state, &EBMS_FAILED_DECRYPTION, ORIGIN_SECURITY, detail));
            }
            Err(e) => {
                return Err(reject(state, &EBMS_FAILED_AUTHENTICATION, ORIGIN_SECURITY, e.to_string()));
            }
        }

        if let Some(user) = state.user_message() {
            let mut issues = ErrorList::new();
            ctx.validator.validate_initiator_identity(
                user,
                state.signing_certificate.as_ref(),
                state.tls_client_certificate.as_ref(),
                &mut issues,
            );
            if let Some(err) = reject_issues(state, &EBMS_FAILED_AUTHENTICATION, ORIGIN_SECURITY, &issues) {
                return Err(err);
            }
        }
    }

    // Compressed payloads are inflated once decrypted
    let attachments = std::mem::take(&mut state.attachments);
    let inflated = match state.user_message() {
        Some(user) => decompress_attachments(user, attachments, ctx.max_decompressed_size),
        None => Ok(attachments),
    };
    match inflated {
        Ok(attachments) => {
            state.attachments = attachments;
            Ok(())
        }
        Err(
            e @ (CompressionError::Unsupported(_)
            | CompressionError::Decompress { .. }
            | CompressionError::TooLarge { .. }),
        ) => {
            Err(reject(state, &EBMS_DECOMPRESSION_FAILURE, ORIGIN_EBMS, e.to_string()))
        }
        Err(e) => Err(StageError::Internal(e.to_string())),
    }
}

fn check_duplicate(ctx: &PipelineContext<'_>, state: &mut ProcessingState) -> Result<(), StageError> {
    if !ctx.duplicate_detection {
        return Ok(());
    }
    if let Some(pmode) = &state.pmode {
        if !pmode.is_duplicate_detection_enabled() {
            debug!(pmode = %pmode.id, "Duplicate detection disabled");
            return Ok(());
        }
    }

    let check = ctx.duplicates.register_and_check(
        state.message_id(),
        Some(ctx.profile_id),
        state.pmode.as_ref().map(|p| p.id.as_str()),
    );
    if check == DuplicateCheck::AlreadySeen {
        warn!(message_id = ?state.message_id(), "Duplicate message received");
        state.duplicate = true;
    }
    Ok(())
}

fn dispatch(ctx: &PipelineContext<'_>, state: &mut ProcessingState) -> Result<(), StageError> {
    if state.is_ping() {
        debug!(message_id = ?state.message_id(), "Ping message acknowledged without dispatch");
        return Ok(());
    }

    let result = if let Some(user) = state.user_message() {
        ctx.dispatcher
            .dispatch_user_message(user, &state.attachments, state)
    } else if let Some(signal) = state.signal_message() {
        ctx.dispatcher.dispatch_signal_message(signal, state)
    } else {
        return Err(StageError::Internal("no message to dispatch".to_string()));
    };

    match result {
        Ok(result) => {
            state.dispatch_result = Some(result);
            Ok(())
        }
        Err(e) => Err(reject(state, &EBMS_OTHER, ORIGIN_EBMS, e.to_string())),
    }
}
