//! Agent composition root
//!
//! An [`As4Agent`] owns one PMode registry, one duplicate manager and one
//! profile, plus the collaborators the embedding application provides.
//! Several agents can live in one process; nothing is global.

use crate::config::{AgentConfig, ConfigError};
use crate::duplicate::{DuplicateItem, DuplicateManager};
use crate::issues::ErrorList;
use crate::metrics;
use crate::pipeline::{self, IncomingRequest, IncomingResponse, PipelineContext};
use crate::pmode::{validate_structure, PMode, PModeRegistry, RegistryError};
use crate::profile::{As4Profile, ProfileRegistry, ProfileValidator, ValidationMode};
use crate::sender::{self, OutgoingUserMessage, RetryPolicy, SendContext, SendError, SendOutcome};
use crate::storage::{JsonFileStore, MemoryStore, RecordStore, StorageError};
use crate::traits::{
    HttpHeaders, HttpTransport, MessageDispatcher, MessagePackager, PullRequestPModeResolver,
    RegistryPullResolver, SecurityProcessor, SinglePartPackager,
};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Defects that keep an agent from starting
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("Unknown profile '{0}'")]
    UnknownProfile(String),

    #[error("Invalid PModes: {}", .0.join("; "))]
    InvalidPModes(Vec<String>),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Structural and profile findings for one PMode, as display strings
pub fn pmode_failures(pmode: &PMode, validator: &dyn ProfileValidator) -> Vec<String> {
    let mut failures: Vec<String> = validate_structure(pmode)
        .iter()
        .map(ToString::to_string)
        .collect();

    let mut issues = ErrorList::new();
    validator.validate_pmode(pmode, ValidationMode::for_pmode(pmode), &mut issues);
    failures.extend(issues.failures().map(ToString::to_string));
    failures
}

/// A running AS4 message service handler
pub struct As4Agent {
    config: AgentConfig,
    profile: As4Profile,
    validator: Arc<dyn ProfileValidator>,
    registry: Arc<PModeRegistry>,
    duplicates: Arc<DuplicateManager>,
    security: Arc<dyn SecurityProcessor>,
    transport: Arc<dyn HttpTransport>,
    dispatcher: Arc<dyn MessageDispatcher>,
    packager: Arc<dyn MessagePackager>,
    pull_resolver: Arc<dyn PullRequestPModeResolver>,
}

impl As4Agent {
    pub fn builder() -> As4AgentBuilder {
        As4AgentBuilder::default()
    }

    fn pipeline_context(&self) -> PipelineContext<'_> {
        PipelineContext {
            registry: &self.registry,
            duplicates: &self.duplicates,
            duplicate_detection: self.config.duplicates.enabled,
            validator: self.validator.as_ref(),
            profile_id: self.profile.id(),
            security: self.security.as_ref(),
            dispatcher: self.dispatcher.as_ref(),
            pull_resolver: Some(self.pull_resolver.as_ref()),
            packager: self.packager.as_ref(),
            message_id_domain: &self.config.agent.message_id_domain,
            max_decompressed_size: self.config.agent.max_decompressed_size,
        }
    }

    /// Run the inbound pipeline on a bare SOAP envelope
    pub fn process_incoming(&self, envelope: &[u8], headers: HttpHeaders) -> IncomingResponse {
        self.process_incoming_request(IncomingRequest::new(envelope).with_headers(headers))
    }

    /// Run the inbound pipeline on a fully decomposed request
    pub fn process_incoming_request(&self, request: IncomingRequest) -> IncomingResponse {
        let (_, response) = pipeline::process(&self.pipeline_context(), request);
        metrics::duplicate_store_size(self.duplicates.len());
        response
    }

    /// Send a user message under the PMode it names
    pub async fn send_user_message(
        &self,
        outgoing: OutgoingUserMessage,
        policy: &RetryPolicy,
    ) -> Result<SendOutcome, SendError> {
        let ctx = SendContext {
            registry: &self.registry,
            duplicates: &self.duplicates,
            security: self.security.as_ref(),
            transport: self.transport.as_ref(),
            packager: self.packager.as_ref(),
            message_id_domain: &self.config.agent.message_id_domain,
            profile_id: self.profile.id(),
        };
        sender::send_user_message(&ctx, outgoing, policy).await
    }

    /// Retry policy from the `[send]` configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        self.config.send.retry_policy()
    }

    /// Validate a PMode against structure and profile, then register it
    pub fn add_pmode(&self, pmode: PMode) -> Result<(), AgentError> {
        let failures = pmode_failures(&pmode, self.validator.as_ref());
        if !failures.is_empty() {
            return Err(AgentError::InvalidPModes(failures));
        }
        self.registry.add(pmode)?;
        metrics::pmodes_registered(self.registry.len());
        Ok(())
    }

    /// Forget message ids older than the configured retention
    pub fn evict_expired_duplicates(&self) -> Vec<String> {
        let cutoff = chrono::Duration::from_std(self.config.duplicates.retention)
            .ok()
            .and_then(|retention| Utc::now().checked_sub_signed(retention));
        let Some(cutoff) = cutoff else {
            return Vec::new();
        };

        let evicted = self.duplicates.evict_items_before(cutoff);
        if !evicted.is_empty() {
            info!(count = evicted.len(), "Evicted expired message ids");
            metrics::duplicates_evicted(evicted.len());
        }
        metrics::duplicate_store_size(self.duplicates.len());
        evicted
    }

    pub fn registry(&self) -> &Arc<PModeRegistry> {
        &self.registry
    }

    pub fn duplicates(&self) -> &Arc<DuplicateManager> {
        &self.duplicates
    }

    pub fn profile(&self) -> &As4Profile {
        &self.profile
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

impl std::fmt::Debug for As4Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("As4Agent")
            .field("profile", &self.profile.id())
            .field("pmodes", &self.registry.len())
            .field("duplicates", &self.duplicates.len())
            .finish()
    }
}

/// Builder for [`As4Agent`]
///
/// Security processor, transport and dispatcher are required. Stores
/// default to the paths in the configuration, or memory when none is set.
#[derive(Default)]
pub struct As4AgentBuilder {
    config: AgentConfig,
    profiles: Option<ProfileRegistry>,
    security: Option<Arc<dyn SecurityProcessor>>,
    transport: Option<Arc<dyn HttpTransport>>,
    dispatcher: Option<Arc<dyn MessageDispatcher>>,
    packager: Option<Arc<dyn MessagePackager>>,
    pull_resolver: Option<Arc<dyn PullRequestPModeResolver>>,
    pmode_store: Option<Arc<dyn RecordStore<PMode>>>,
    duplicate_store: Option<Arc<dyn RecordStore<DuplicateItem>>>,
}

impl As4AgentBuilder {
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Profiles to pick `agent.profile` from; the shipped ones by default
    pub fn profiles(mut self, profiles: ProfileRegistry) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn security(mut self, security: Arc<dyn SecurityProcessor>) -> Self {
        self.security = Some(security);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn MessageDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn packager(mut self, packager: Arc<dyn MessagePackager>) -> Self {
        self.packager = Some(packager);
        self
    }

    pub fn pull_resolver(mut self, resolver: Arc<dyn PullRequestPModeResolver>) -> Self {
        self.pull_resolver = Some(resolver);
        self
    }

    pub fn pmode_store(mut self, store: Arc<dyn RecordStore<PMode>>) -> Self {
        self.pmode_store = Some(store);
        self
    }

    pub fn duplicate_store(mut self, store: Arc<dyn RecordStore<DuplicateItem>>) -> Self {
        self.duplicate_store = Some(store);
        self
    }

    pub fn build(self) -> Result<As4Agent, AgentError> {
        let config = self.config;
        config.validate()?;

        let security = self
            .security
            .ok_or(AgentError::MissingCollaborator("security processor"))?;
        let transport = self
            .transport
            .ok_or(AgentError::MissingCollaborator("HTTP transport"))?;
        let dispatcher = self
            .dispatcher
            .ok_or(AgentError::MissingCollaborator("message dispatcher"))?;

        let profiles = self
            .profiles
            .unwrap_or_else(|| ProfileRegistry::standard(config.agent.debug_mode));
        let profile = profiles
            .get(&config.agent.profile)
            .cloned()
            .ok_or_else(|| AgentError::UnknownProfile(config.agent.profile.clone()))?;
        let validator = profile.validator();

        let pmode_store: Arc<dyn RecordStore<PMode>> = match (self.pmode_store, &config.pmodes.store_path) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(JsonFileStore::<PMode>::open(path)?),
            (None, None) => Arc::new(MemoryStore::<PMode>::new()),
        };
        let registry = Arc::new(PModeRegistry::load(pmode_store)?);

        let mut failures = Vec::new();
        for pmode in registry.all()? {
            failures.extend(pmode_failures(&pmode, validator.as_ref()));
        }
        if !failures.is_empty() {
            return Err(AgentError::InvalidPModes(failures));
        }

        let duplicate_store: Arc<dyn RecordStore<DuplicateItem>> =
            match (self.duplicate_store, &config.duplicates.store_path) {
                (Some(store), _) => store,
                (None, Some(path)) => Arc::new(JsonFileStore::<DuplicateItem>::open(path)?),
                (None, None) => Arc::new(MemoryStore::<DuplicateItem>::new()),
            };
        let duplicates = Arc::new(DuplicateManager::load(duplicate_store)?);
        if !config.duplicates.enabled {
            warn!("Duplicate detection is disabled");
        }

        let pull_resolver = self
            .pull_resolver
            .unwrap_or_else(|| Arc::new(RegistryPullResolver::new(Arc::clone(&registry))));
        let packager = self
            .packager
            .unwrap_or_else(|| Arc::new(SinglePartPackager));

        metrics::init_metrics();
        metrics::pmodes_registered(registry.len());
        info!(
            profile = profile.id(),
            pmodes = registry.len(),
            known_message_ids = duplicates.len(),
            "AS4 agent ready"
        );

        let agent = As4Agent {
            config,
            profile,
            validator,
            registry,
            duplicates,
            security,
            transport,
            dispatcher,
            packager,
            pull_resolver,
        };
        agent.evict_expired_duplicates();
        Ok(agent)
    }
}
