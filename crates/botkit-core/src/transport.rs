//! Transport boundary: the RPC client the multiplexer subscribes through.
//! Connection setup, TLS and framing stay on the far side of this trait.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::types::{EventKind, Notification};

/// Stream of decoded items for one event kind.
pub type NotificationStream = BoxStream<'static, Result<Notification, TransportError>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("{kind} stream is already open")]
    AlreadyOpen { kind: EventKind },

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("transport io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Mock-injectable RPC client.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open the server-push stream for `kind`.
    async fn open_stream(&self, kind: EventKind) -> Result<NotificationStream, TransportError>;

    /// Acknowledge receipt of `sequence_id` on the `kind` stream.
    async fn ack(&self, kind: EventKind, sequence_id: u64) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn open_stream(&self, kind: EventKind) -> Result<NotificationStream, TransportError> {
        (**self).open_stream(kind).await
    }

    async fn ack(&self, kind: EventKind, sequence_id: u64) -> Result<(), TransportError> {
        (**self).ack(kind, sequence_id).await
    }
}
