use thiserror::Error;
use uuid::Uuid;

use cachefarm_wire::WireError;

use super::events::{EventTag, SenderTag};
use super::refresher::Operation;

#[derive(Debug, Error)]
pub enum CacheError {
    /// No refresher registered under this id; the farm runs mismatched builds.
    #[error("no cache refresher registered for id {0}")]
    UnknownRefresher(Uuid),
    #[error("cache refresher id {id} is already registered by `{existing}`")]
    DuplicateRefresher { id: Uuid, existing: &'static str },
    #[error("cache refresher `{refresher}` does not support {operation}")]
    Unsupported {
        refresher: &'static str,
        operation: Operation,
    },
    #[error("malformed payload for cache refresher `{refresher}`: {source}")]
    MalformedPayload {
        refresher: &'static str,
        #[source]
        source: WireError,
    },
    #[error("failed to encode payload: {0}")]
    Encode(#[from] WireError),
    #[error("no handler registered for {sender}.{event}")]
    DispatchMiss { sender: SenderTag, event: EventTag },
    #[error("a handler is already registered for {sender}.{event}")]
    DuplicateHandler { sender: SenderTag, event: EventTag },
    #[error("handler for {sender}.{event} failed: {source}")]
    HandlerFailed {
        sender: SenderTag,
        event: EventTag,
        #[source]
        source: Box<CacheError>,
    },
    #[error("expected {expected} event arguments, found {found}")]
    UnexpectedArgs {
        expected: &'static str,
        found: &'static str,
    },
    #[error("distributed cache events are already bound")]
    AlreadyBound,
    #[error("distributed cache events are not bound")]
    NotBound,
    #[error("model rebuild worker has stopped")]
    WorkerStopped,
    #[error("model rebuild worker needs a tokio runtime")]
    NoRuntime,
    #[error("instruction transport failed: {message}")]
    Transport { message: String },
}

impl CacheError {
    pub fn unsupported(refresher: &'static str, operation: Operation) -> Self {
        Self::Unsupported {
            refresher,
            operation,
        }
    }

    pub fn malformed(refresher: &'static str, source: WireError) -> Self {
        Self::MalformedPayload { refresher, source }
    }

    pub fn unexpected_args(expected: &'static str, found: &'static str) -> Self {
        Self::UnexpectedArgs { expected, found }
    }

    pub fn handler_failed(sender: SenderTag, event: EventTag, source: CacheError) -> Self {
        Self::HandlerFailed {
            sender,
            event,
            source: Box::new(source),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Configuration errors mean the farm itself is misdeployed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownRefresher(_) | Self::DuplicateRefresher { .. } | Self::DuplicateHandler { .. }
        )
    }
}
