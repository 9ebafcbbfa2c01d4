//! In-process transport. A [`MemoryFeed`] pushes notifications into
//! per-kind queues that [`MemoryTransport`] exposes as streams.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::transport::{NotificationStream, Transport, TransportError};
use crate::types::{EventKind, Notification};

type Item = Result<Notification, TransportError>;

pub struct MemoryTransport {
    queues: Mutex<HashMap<EventKind, mpsc::UnboundedReceiver<Item>>>,
    acked: Mutex<Vec<(EventKind, u64)>>,
    failing_opens: Mutex<HashMap<EventKind, String>>,
    failing_acks: Mutex<HashSet<EventKind>>,
}

/// Producer side of a [`MemoryTransport`]. Streams end once every clone of
/// the feed has been dropped.
#[derive(Clone)]
pub struct MemoryFeed {
    senders: Arc<HashMap<EventKind, mpsc::UnboundedSender<Item>>>,
}

impl MemoryTransport {
    pub fn new() -> (Self, MemoryFeed) {
        let mut senders = HashMap::new();
        let mut queues = HashMap::new();
        for kind in EventKind::ALL {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.insert(kind, tx);
            queues.insert(kind, rx);
        }
        let transport = Self {
            queues: Mutex::new(queues),
            acked: Mutex::new(Vec::new()),
            failing_opens: Mutex::new(HashMap::new()),
            failing_acks: Mutex::new(HashSet::new()),
        };
        let feed = MemoryFeed {
            senders: Arc::new(senders),
        };
        (transport, feed)
    }

    /// Acknowledgements received so far, in arrival order.
    pub fn acked(&self) -> Vec<(EventKind, u64)> {
        self.acked.lock().clone()
    }

    /// Make the next `open_stream(kind)` fail with an RPC error.
    pub fn fail_open(&self, kind: EventKind, reason: impl Into<String>) {
        self.failing_opens.lock().insert(kind, reason.into());
    }

    /// Make every `ack` on `kind` fail.
    pub fn fail_acks(&self, kind: EventKind) {
        self.failing_acks.lock().insert(kind);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open_stream(&self, kind: EventKind) -> Result<NotificationStream, TransportError> {
        if let Some(reason) = self.failing_opens.lock().remove(&kind) {
            return Err(TransportError::Rpc(reason));
        }
        let rx = self
            .queues
            .lock()
            .remove(&kind)
            .ok_or(TransportError::AlreadyOpen { kind })?;
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(stream.boxed())
    }

    async fn ack(&self, kind: EventKind, sequence_id: u64) -> Result<(), TransportError> {
        if self.failing_acks.lock().contains(&kind) {
            return Err(TransportError::Rpc(format!(
                "ack {sequence_id} on {kind} rejected"
            )));
        }
        self.acked.lock().push((kind, sequence_id));
        Ok(())
    }
}

impl MemoryFeed {
    /// Queue a notification on the stream matching its kind.
    pub fn push(&self, notification: impl Into<Notification>) -> Result<(), TransportError> {
        let notification = notification.into();
        self.push_to(notification.kind(), notification)
    }

    /// Queue a notification on an explicit stream, regardless of its kind.
    pub fn push_to(
        &self,
        kind: EventKind,
        notification: impl Into<Notification>,
    ) -> Result<(), TransportError> {
        self.send(kind, Ok(notification.into()))
    }

    /// Make the `kind` stream yield `error` after anything already queued.
    pub fn fail(&self, kind: EventKind, error: TransportError) -> Result<(), TransportError> {
        self.send(kind, Err(error))
    }

    fn send(&self, kind: EventKind, item: Item) -> Result<(), TransportError> {
        self.senders
            .get(&kind)
            .ok_or(TransportError::Closed)?
            .send(item)
            .map_err(|_| TransportError::Closed)
    }
}
