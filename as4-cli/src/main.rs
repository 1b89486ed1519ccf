use anyhow::{bail, Context, Result};
use as4_core::agent::pmode_failures;
use as4_core::ebms::{SignalKind, UserMessage};
use as4_core::logging::{init_logging_with_config, LogLevel};
use as4_core::pmode::PMode;
use as4_core::soap::parse_envelope;
use as4_core::storage::{JsonFileStore, RecordStore};
use as4_core::{AgentConfig, PModeRegistry, ProfileRegistry};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "as4")]
#[command(author, version, about = "AS4 PMode and envelope tooling", long_about = None)]
struct Args {
    /// Agent configuration file (TOML); defaults plus AS4_* variables otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
enum Command {
    /// Check every stored PMode against its structure and the configured profile
    Validate {
        /// PMode store to check instead of `pmodes.store_path`
        #[arg(long)]
        pmodes: Option<PathBuf>,
    },

    /// Print a PMode that satisfies a profile
    Template {
        /// Profile id (cef, esens, peppol, entsog)
        profile: String,
        /// Initiator party id
        initiator: String,
        /// Responder party id
        responder: String,
        /// Responder endpoint
        address: Option<String>,
        /// Also add the PMode to this JSON store
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Summarize the ebMS header of a SOAP envelope
    Inspect {
        /// File holding the envelope
        envelope: PathBuf,
    },

    /// List the known profiles
    Profiles,
}

fn load_config(path: Option<&Path>) -> Result<AgentConfig> {
    let mut config = match path {
        Some(path) => AgentConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AgentConfig::default(),
    };
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

fn validate(config: &AgentConfig, pmodes: Option<PathBuf>) -> Result<()> {
    let Some(path) = pmodes.or_else(|| config.pmodes.store_path.clone()) else {
        bail!("no PMode store given; pass --pmodes or set pmodes.store_path");
    };
    if !path.exists() {
        bail!("PMode store {} does not exist", path.display());
    }

    let profiles = ProfileRegistry::standard(config.agent.debug_mode);
    let Some(profile) = profiles.get(&config.agent.profile) else {
        bail!("unknown profile '{}'", config.agent.profile);
    };
    let validator = profile.validator();

    let store: Arc<dyn RecordStore<PMode>> = Arc::new(JsonFileStore::<PMode>::open(&path)?);
    let registry = PModeRegistry::load(store)?;
    info!(path = %path.display(), pmodes = registry.len(), profile = profile.id(), "Validating PModes");

    let mut invalid = 0;
    for pmode in registry.all()? {
        let failures = pmode_failures(&pmode, validator.as_ref());
        if failures.is_empty() {
            println!("{}: ok", pmode.id);
            continue;
        }
        invalid += 1;
        println!("{}: {} problem(s)", pmode.id, failures.len());
        for failure in failures {
            println!("  - {}", failure);
        }
    }

    if invalid > 0 {
        bail!("{} of {} PModes are invalid", invalid, registry.len());
    }
    Ok(())
}

fn template(
    config: &AgentConfig,
    profile_id: &str,
    initiator: &str,
    responder: &str,
    address: Option<&str>,
    store: Option<PathBuf>,
) -> Result<()> {
    let profiles = ProfileRegistry::standard(config.agent.debug_mode);
    let Some(profile) = profiles.get(profile_id) else {
        bail!(
            "unknown profile '{}' (known: {})",
            profile_id,
            profiles.ids().join(", ")
        );
    };

    let pmode = profile.create_pmode_template(initiator, responder, address);
    println!("{}", serde_json::to_string_pretty(&pmode)?);

    if let Some(path) = store {
        let failures = pmode_failures(&pmode, profile.validator().as_ref());
        for failure in &failures {
            warn!(pmode = %pmode.id, "{}", failure);
        }
        let store: Arc<dyn RecordStore<PMode>> = Arc::new(JsonFileStore::<PMode>::open(&path)?);
        let registry = PModeRegistry::load(store)?;
        registry
            .add(pmode)
            .with_context(|| format!("adding PMode to {}", path.display()))?;
        info!(path = %path.display(), pmodes = registry.len(), "PMode stored");
    }
    Ok(())
}

fn print_user_message(user_message: &UserMessage) {
    println!("UserMessage {}", user_message.message_id());
    if let Some(ref_to) = &user_message.message_info.ref_to_message_id {
        println!("  RefToMessageId: {}", ref_to);
    }
    if let Some(mpc) = &user_message.mpc {
        println!("  MPC: {}", mpc);
    }
    for party in user_message.from_party_ids() {
        println!("  From: {}", party.value);
    }
    for party in user_message.to_party_ids() {
        println!("  To: {}", party.value);
    }
    if let Some(collaboration) = &user_message.collaboration_info {
        println!("  Service: {}", collaboration.service.value);
        println!("  Action: {}", collaboration.action);
        println!("  ConversationId: {}", collaboration.conversation_id);
        if let Some(pmode) = collaboration.agreement_ref.as_ref().and_then(|a| a.pmode.as_deref()) {
            println!("  PMode: {}", pmode);
        }
    }
    if user_message.is_ping() {
        println!("  (ping)");
    }
    for property in &user_message.message_properties {
        println!("  Property {} = {}", property.name, property.value);
    }
    for part in &user_message.payload_info {
        println!("  Part {}", part.href.as_deref().unwrap_or("<body>"));
    }
}

fn inspect(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let envelope = parse_envelope(&bytes).context("parsing SOAP envelope")?;

    println!("SOAP {}", envelope.soap_version.as_str());
    println!("Messaging headers: {}", envelope.messaging_count);

    if let Some(messaging) = &envelope.messaging {
        for user_message in &messaging.user_messages {
            print_user_message(user_message);
        }
        for signal in &messaging.signal_messages {
            let kind = match &signal.kind {
                SignalKind::PullRequest(pull) => format!("PullRequest mpc={}", pull.mpc),
                SignalKind::Receipt(_) => "Receipt".to_string(),
                SignalKind::Errors(errors) => {
                    let codes: Vec<&str> = errors.iter().map(|e| e.code.as_str()).collect();
                    format!("Errors {}", codes.join(","))
                }
            };
            println!("SignalMessage {} {}", signal.message_id(), kind);
            if let Some(ref_to) = signal.ref_to_message_id() {
                println!("  RefToMessageId: {}", ref_to);
            }
        }
    }

    match &envelope.security {
        Some(security) => {
            println!("Security:");
            if let Some(version) = security.declared_wss_version {
                println!("  WSS: {}", version.as_str());
            }
            if let Some(algorithm) = &security.signature_algorithm {
                println!("  Signature: {}", algorithm);
            }
            for algorithm in &security.digest_algorithms {
                println!("  Digest: {}", algorithm);
            }
            for algorithm in &security.encryption_algorithms {
                println!("  Encryption: {}", algorithm);
            }
            println!("  References: {}", security.references.len());
        }
        None => println!("Security: none"),
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    let mut log_config = config.logging.log_config();
    if let Some(level) = &args.log_level {
        log_config.level = LogLevel::from_name(level).unwrap_or_else(|| {
            eprintln!("Invalid log level '{}', using 'info'", level);
            LogLevel::Info
        });
    }
    if args.json_logs {
        log_config = log_config.json_format(true);
    }
    init_logging_with_config(log_config)?;

    debug!(profile = %config.agent.profile, "Configuration loaded");

    match args.command {
        Command::Validate { pmodes } => validate(&config, pmodes),
        Command::Template {
            profile,
            initiator,
            responder,
            address,
            store,
        } => template(
            &config,
            &profile,
            &initiator,
            &responder,
            address.as_deref(),
            store,
        ),
        Command::Inspect { envelope } => inspect(&envelope),
        Command::Profiles => {
            for profile in ProfileRegistry::standard(config.agent.debug_mode).iter() {
                println!("{:<8} {}", profile.id(), profile.display_name());
            }
            Ok(())
        }
    }
}
