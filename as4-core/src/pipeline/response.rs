//! Mapping of a pipeline outcome to the synchronous HTTP response

use super::stages::StageError;
use super::state::{MessageKind, ProcessingState};
use super::PipelineContext;
use crate::ebms::{generate_message_id, Attachment};
use crate::metrics;
use crate::signal::{
    build_error, build_receipt, build_signal_message_with_id, ErrorRecord, EBMS_EMPTY_MESSAGE_PARTITION_CHANNEL,
    EBMS_OTHER, ORIGIN_EBMS,
};
use crate::soap::{write_signal_envelope, write_user_message_envelope, SoapVersion};
use tracing::{error, info};

/// HTTP response to return to the sending MSH
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl IncomingResponse {
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

fn response_version(ctx: &PipelineContext<'_>, state: &ProcessingState) -> SoapVersion {
    state.soap_version.unwrap_or_else(|| ctx.validator.soap_version())
}

/// Serialize, optionally secure, then package an envelope
fn packaged(
    ctx: &PipelineContext<'_>,
    state: &ProcessingState,
    envelope: String,
    attachments: Vec<Attachment>,
) -> Result<IncomingResponse, String> {
    let version = response_version(ctx, state);
    let (envelope, attachments) = match state.leg_security() {
        Some(security) if security.is_signing_configured() => {
            let secured = ctx
                .security
                .secure(envelope.into_bytes(), attachments, security, version)
                .map_err(|e| e.to_string())?;
            (secured.envelope, secured.attachments)
        }
        _ => (envelope.into_bytes(), attachments),
    };

    let packaged = ctx
        .packager
        .package(envelope, attachments, version)
        .map_err(|e| e.to_string())?;
    Ok(IncomingResponse {
        status: 200,
        content_type: Some(packaged.content_type),
        body: packaged.body,
    })
}

fn error_signal(ctx: &PipelineContext<'_>, state: &ProcessingState, status: u16, errors: Vec<ErrorRecord>) -> IncomingResponse {
    let version = response_version(ctx, state);
    let signal = build_signal_message_with_id(generate_message_id(ctx.message_id_domain), errors);
    match write_signal_envelope(&signal, version) {
        Ok(envelope) => IncomingResponse {
            status,
            content_type: Some(format!("{}; charset=utf-8", version.mime_type())),
            body: envelope.into_bytes(),
        },
        Err(e) => {
            error!(error = %e, "Failed to write error signal");
            IncomingResponse::empty(500)
        }
    }
}

fn internal_error(ctx: &PipelineContext<'_>, state: &ProcessingState, reason: &str) -> IncomingResponse {
    error!(message_id = ?state.message_id(), %reason, "Internal error while processing message");
    metrics::inbound_internal_error();
    let record = build_error(&EBMS_OTHER, state.message_id(), Some(ORIGIN_EBMS)).with_detail(reason);
    error_signal(ctx, state, 500, vec![record])
}

fn success(ctx: &PipelineContext<'_>, state: &mut ProcessingState) -> Result<IncomingResponse, String> {
    match state.message_kind() {
        Some(MessageKind::User) => {
            let (Some(security), Some(user)) = (state.leg_security(), state.user_message()) else {
                return Ok(IncomingResponse::empty(200));
            };
            if !security.receipt_as_response() {
                return Ok(IncomingResponse::empty(200));
            }
            let references = state
                .security_header
                .as_ref()
                .map(|h| h.references.as_slice())
                .unwrap_or_default();
            let receipt = build_receipt(
                generate_message_id(ctx.message_id_domain),
                user,
                security.send_receipt_non_repudiation == Some(true),
                references,
            );
            let envelope = write_signal_envelope(&receipt, response_version(ctx, state))
                .map_err(|e| e.to_string())?;
            packaged(ctx, state, envelope, Vec::new())
        }
        Some(MessageKind::PullRequest) => {
            let pulled = state.dispatch_result.as_mut().and_then(|r| r.pulled.take());
            match pulled {
                Some((user, attachments)) => {
                    let envelope = write_user_message_envelope(&user, response_version(ctx, state))
                        .map_err(|e| e.to_string())?;
                    packaged(ctx, state, envelope, attachments)
                }
                None => {
                    let warning = build_error(
                        &EBMS_EMPTY_MESSAGE_PARTITION_CHANNEL,
                        state.message_id(),
                        Some(ORIGIN_EBMS),
                    );
                    state.errors.push(warning.clone());
                    Ok(error_signal(ctx, state, 200, vec![warning]))
                }
            }
        }
        _ => Ok(IncomingResponse::empty(200)),
    }
}

/// Build the response for a finished pipeline run
pub(crate) fn respond(
    ctx: &PipelineContext<'_>,
    state: &mut ProcessingState,
    outcome: Result<(), StageError>,
) -> IncomingResponse {
    match outcome {
        Ok(()) if state.duplicate => {
            metrics::inbound_duplicate();
            IncomingResponse::empty(200)
        }
        Ok(()) => match success(ctx, state) {
            Ok(response) => {
                info!(message_id = ?state.message_id(), kind = ?state.message_kind(), "Message accepted");
                metrics::inbound_accepted();
                response
            }
            Err(reason) => internal_error(ctx, state, &reason),
        },
        Err(StageError::Rejected(errors)) => {
            info!(
                message_id = ?state.message_id(),
                codes = ?errors.iter().map(|e| e.code.as_str()).collect::<Vec<_>>(),
                "Message rejected"
            );
            metrics::inbound_rejected(errors.iter().map(|e| e.code.as_str()));

            let as_response = state
                .effective_leg()
                .map_or(true, |leg| leg.reports_errors_as_response());
            if as_response {
                error_signal(ctx, state, 200, errors)
            } else {
                IncomingResponse::empty(400)
            }
        }
        Err(StageError::Internal(reason)) => internal_error(ctx, state, &reason),
    }
}
