//! Collaborator trait boundaries
//!
//! The agent decides *what* happens to a message; these traits do the
//! work it delegates:
//! - Security (WS-Security sign/encrypt/verify/decrypt)
//! - Transport (HTTP POST to the partner)
//! - Packaging (SOAP-with-attachments composition)
//! - Dispatch (handing accepted messages to the application)
//! - Pull resolution (PMode lookup for pull requests)
//!
//! Tests plug in in-memory doubles.

pub mod dispatcher;
pub mod packager;
pub mod pull;
pub mod security;
pub mod transport;

pub use dispatcher::{DispatchError, DispatchResult, MessageDispatcher};
pub use packager::{MessagePackager, PackagedMessage, PackagingError, SinglePartPackager};
pub use pull::{PullRequestPModeResolver, RegistryPullResolver};
pub use security::{
    CertificateInfo, SecuredMessage, SecurityError, SecurityProcessor, SecurityResult,
    VerifiedMessage,
};
pub use transport::{HttpHeaders, HttpRequest, HttpResponse, HttpTransport, TransportError};

pub use crate::storage::RecordStore;
