//! Delivery of accepted messages to the application

use crate::ebms::{Attachment, SignalMessage, UserMessage};
use crate::pipeline::ProcessingState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Message rejected by consumer: {0}")]
    Rejected(String),

    #[error("Consumer unavailable: {0}")]
    Unavailable(String),
}

/// What the application hands back after a dispatch
#[derive(Debug, Clone, Default)]
pub struct DispatchResult {
    /// Message to return for a pull request; `None` when the MPC is empty
    pub pulled: Option<(UserMessage, Vec<Attachment>)>,
}

impl DispatchResult {
    pub fn accepted() -> Self {
        Self::default()
    }

    pub fn pulled(user_message: UserMessage, attachments: Vec<Attachment>) -> Self {
        Self {
            pulled: Some((user_message, attachments)),
        }
    }
}

/// Consumer of messages that passed every pipeline stage
pub trait MessageDispatcher: Send + Sync {
    fn dispatch_user_message(
        &self,
        user_message: &UserMessage,
        attachments: &[Attachment],
        state: &ProcessingState,
    ) -> Result<DispatchResult, DispatchError>;

    /// Receipts, errors and pull requests
    fn dispatch_signal_message(
        &self,
        signal: &SignalMessage,
        state: &ProcessingState,
    ) -> Result<DispatchResult, DispatchError>;
}
