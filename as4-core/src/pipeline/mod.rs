//! Inbound header-processor pipeline
//!
//! One synchronous pass per received message through a static, ordered
//! list of stages:
//!
//! 1. extract the `eb:Messaging` header
//! 2. resolve the PMode and effective leg
//! 3. verify the security header against the leg (fail-fast)
//! 4. register the message id with the duplicate manager
//! 5. dispatch to the application
//!
//! A stage failure ends the pass; [`process`] turns the outcome into the
//! HTTP response for the sender.

mod response;
mod stages;
mod state;

pub use response::IncomingResponse;
pub use stages::{StageError, StageFn, STAGES};
pub use state::{LegNumber, MessageKind, ProcessingState, Stage};

use crate::duplicate::DuplicateManager;
use crate::ebms::Attachment;
use crate::metrics::Timer;
use crate::pmode::PModeRegistry;
use crate::profile::ProfileValidator;
use crate::traits::{
    CertificateInfo, HttpHeaders, MessageDispatcher, MessagePackager, PullRequestPModeResolver,
    SecurityProcessor,
};
use tracing::debug;

/// Borrowed view of the agent's components for one pipeline pass
#[derive(Clone, Copy)]
pub struct PipelineContext<'a> {
    pub registry: &'a PModeRegistry,
    pub duplicates: &'a DuplicateManager,
    /// Agent-wide switch for the duplicate check stage
    pub duplicate_detection: bool,
    pub validator: &'a dyn ProfileValidator,
    pub profile_id: &'a str,
    pub security: &'a dyn SecurityProcessor,
    pub dispatcher: &'a dyn MessageDispatcher,
    pub pull_resolver: Option<&'a dyn PullRequestPModeResolver>,
    pub packager: &'a dyn MessagePackager,
    /// Domain part of generated receipt and error signal ids
    pub message_id_domain: &'a str,
    /// Largest accepted size of one inflated attachment
    pub max_decompressed_size: u64,
}

/// A received HTTP request, already split into envelope and attachments
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    pub envelope: Vec<u8>,
    pub attachments: Vec<Attachment>,
    pub headers: HttpHeaders,
    /// Client certificate of the mutually authenticated TLS connection
    pub tls_client_certificate: Option<CertificateInfo>,
}

impl IncomingRequest {
    pub fn new(envelope: impl Into<Vec<u8>>) -> Self {
        Self {
            envelope: envelope.into(),
            ..Default::default()
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_headers(mut self, headers: HttpHeaders) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_tls_client_certificate(mut self, certificate: CertificateInfo) -> Self {
        self.tls_client_certificate = Some(certificate);
        self
    }
}

/// Run the stages in order, stopping at the first failure
///
/// A duplicate ends the pass successfully before dispatch.
pub fn run_stages(ctx: &PipelineContext<'_>, state: &mut ProcessingState) -> Result<(), StageError> {
    for (stage, run) in STAGES.iter() {
        debug!(%stage, "Running stage");
        run(ctx, state)?;
        state.completed_stages.push(*stage);
        if state.duplicate {
            break;
        }
    }
    Ok(())
}

/// Process one inbound message and build the HTTP response
pub fn process(ctx: &PipelineContext<'_>, request: IncomingRequest) -> (ProcessingState, IncomingResponse) {
    let timer = Timer::new("as4_inbound_processing_duration_seconds");
    let mut state = ProcessingState::new(request.envelope, request.attachments, request.headers)
        .with_tls_client_certificate(request.tls_client_certificate);

    let outcome = run_stages(ctx, &mut state);
    let response = response::respond(ctx, &mut state, outcome);
    timer.stop();
    (state, response)
}
