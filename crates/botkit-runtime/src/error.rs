//! Terminal outcomes of a multiplexer run.

use botkit_core::{EventKind, TransportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to open {kind} stream: {source}")]
    Open {
        kind: EventKind,
        #[source]
        source: TransportError,
    },

    #[error("{kind} stream failed: {source}")]
    Stream {
        kind: EventKind,
        #[source]
        source: TransportError,
    },

    #[error("{kind} stream ended")]
    StreamEnded { kind: EventKind },

    #[error("failed to ack {kind} sequence {sequence_id}: {source}")]
    Ack {
        kind: EventKind,
        sequence_id: u64,
        #[source]
        source: TransportError,
    },

    #[error("{kind} consumer channel closed")]
    ConsumerClosed { kind: EventKind },

    #[error("subscription task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),

    #[error("cancelled")]
    Cancelled,
}

impl RunError {
    /// Event kind whose task produced this outcome, if any.
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Self::Open { kind, .. }
            | Self::Stream { kind, .. }
            | Self::StreamEnded { kind }
            | Self::Ack { kind, .. }
            | Self::ConsumerClosed { kind } => Some(*kind),
            Self::TaskFailed(_) | Self::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
