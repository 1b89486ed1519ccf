//! ebMS3/AS4 message service handler core
//!
//! Decides for every inbound and outbound AS4 message which Processing
//! Mode governs it, whether the message obeys that agreement and the
//! active interoperability profile, whether it was already received, and
//! which ebMS signal answers it.
//!
//! Cryptography, HTTP and MIME handling are delegated to the collaborator
//! traits in [`traits`].

pub mod agent;
pub mod compression;
pub mod config;
pub mod duplicate;
pub mod ebms;
pub mod issues;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod pmode;
pub mod profile;
pub mod sender;
pub mod signal;
pub mod soap;
pub mod storage;
pub mod traits;

pub use agent::{As4Agent, As4AgentBuilder, AgentError};
pub use config::{AgentConfig, ConfigError};
pub use duplicate::{DuplicateCheck, DuplicateItem, DuplicateManager};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogLevel};
pub use pipeline::{IncomingRequest, IncomingResponse};
pub use pmode::{PMode, PModeRegistry};
pub use profile::{As4Profile, ProfileRegistry};
pub use sender::{OutgoingUserMessage, RetryPolicy, SendError, SendOutcome, SendResult};
