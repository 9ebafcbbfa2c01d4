//! Subscriptions: one event kind bound to a consumer channel and a logger,
//! plus the receive/ack/forward loop each one runs.

use std::convert::Infallible;
use std::sync::Arc;

use botkit_core::types::{
    GcReceivedMsg, KxCompleted, ReceivedGcInvite, ReceivedPm, ReceivedPost, ReceivedPostStatus,
    ReceivedTip, TipProgressEvent,
};
use botkit_core::{Event, EventKind, Transport};
use botkit_log::Logger;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::RunError;

/// Where decoded events of one kind go, and who logs about them.
#[derive(Debug)]
pub struct Route<E> {
    pub tx: mpsc::Sender<E>,
    pub log: Logger,
}

impl<E> Route<E> {
    pub fn new(tx: mpsc::Sender<E>, log: Logger) -> Self {
        Self { tx, log }
    }
}

/// Host-supplied routes. A `None` field leaves that kind unsubscribed.
#[derive(Debug, Default)]
pub struct NotificationRoutes {
    pub group_messages: Option<Route<GcReceivedMsg>>,
    pub group_invites: Option<Route<ReceivedGcInvite>>,
    pub private_messages: Option<Route<ReceivedPm>>,
    pub kx_completed: Option<Route<KxCompleted>>,
    pub posts: Option<Route<ReceivedPost>>,
    pub post_statuses: Option<Route<ReceivedPostStatus>>,
    pub tip_progress: Option<Route<TipProgressEvent>>,
    pub tips_received: Option<Route<ReceivedTip>>,
}

impl NotificationRoutes {
    /// The active subscriptions, one per populated route.
    pub fn into_subscriptions(self) -> Vec<Subscription> {
        [
            self.group_messages.map(Subscription::GroupMessage),
            self.group_invites.map(Subscription::GroupInvite),
            self.private_messages.map(Subscription::PrivateMessage),
            self.kx_completed.map(Subscription::KxCompleted),
            self.posts.map(Subscription::Post),
            self.post_statuses.map(Subscription::PostStatus),
            self.tip_progress.map(Subscription::TipProgress),
            self.tips_received.map(Subscription::TipReceived),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// One active subscription, tagged by event kind.
#[derive(Debug)]
pub enum Subscription {
    GroupMessage(Route<GcReceivedMsg>),
    GroupInvite(Route<ReceivedGcInvite>),
    PrivateMessage(Route<ReceivedPm>),
    KxCompleted(Route<KxCompleted>),
    Post(Route<ReceivedPost>),
    PostStatus(Route<ReceivedPostStatus>),
    TipProgress(Route<TipProgressEvent>),
    TipReceived(Route<ReceivedTip>),
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::GroupMessage(_) => EventKind::GroupMessage,
            Self::GroupInvite(_) => EventKind::GroupInvite,
            Self::PrivateMessage(_) => EventKind::PrivateMessage,
            Self::KxCompleted(_) => EventKind::KxCompleted,
            Self::Post(_) => EventKind::Post,
            Self::PostStatus(_) => EventKind::PostStatus,
            Self::TipProgress(_) => EventKind::TipProgress,
            Self::TipReceived(_) => EventKind::TipReceived,
        }
    }

    /// Pump events until the stream fails, the consumer goes away or
    /// `cancel` fires. Never returns successfully.
    pub async fn run<T: Transport>(
        self,
        transport: Arc<T>,
        cancel: CancellationToken,
    ) -> Result<Infallible, RunError> {
        match self {
            Self::GroupMessage(route) => pump(transport, route, cancel).await,
            Self::GroupInvite(route) => pump(transport, route, cancel).await,
            Self::PrivateMessage(route) => pump(transport, route, cancel).await,
            Self::KxCompleted(route) => pump(transport, route, cancel).await,
            Self::Post(route) => pump(transport, route, cancel).await,
            Self::PostStatus(route) => pump(transport, route, cancel).await,
            Self::TipProgress(route) => pump(transport, route, cancel).await,
            Self::TipReceived(route) => pump(transport, route, cancel).await,
        }
    }
}

async fn pump<T: Transport, E: Event>(
    transport: Arc<T>,
    route: Route<E>,
    cancel: CancellationToken,
) -> Result<Infallible, RunError> {
    let kind = E::KIND;
    let Route { tx, log } = route;

    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(RunError::Cancelled),
        opened = transport.open_stream(kind) => opened.map_err(|source| {
            log.error(format_args!("unable to open {kind} stream: {source}"));
            RunError::Open { kind, source }
        })?,
    };
    log.debug(format_args!("{kind} stream opened"));

    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RunError::Cancelled),
            item = stream.next() => item,
        };

        let notification = match item {
            Some(Ok(notification)) => notification,
            Some(Err(source)) => {
                log.error(format_args!("{kind} stream failed: {source}"));
                return Err(RunError::Stream { kind, source });
            }
            None => {
                log.warn(format_args!("{kind} stream ended"));
                return Err(RunError::StreamEnded { kind });
            }
        };

        let event = match E::try_from(notification) {
            Ok(event) => event,
            Err(other) => {
                log.warn(format_args!(
                    "dropping {} notification received on {kind} stream",
                    other.kind()
                ));
                continue;
            }
        };

        if let Some(sequence_id) = event.sequence_id() {
            let acked = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RunError::Cancelled),
                acked = transport.ack(kind, sequence_id) => acked,
            };
            if let Err(source) = acked {
                log.error(format_args!("unable to ack {kind} {sequence_id}: {source}"));
                return Err(RunError::Ack {
                    kind,
                    sequence_id,
                    source,
                });
            }
            log.trace(format_args!("acked {kind} {sequence_id}"));
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RunError::Cancelled),
            sent = tx.send(event) => {
                if sent.is_err() {
                    log.warn(format_args!("{kind} consumer went away"));
                    return Err(RunError::ConsumerClosed { kind });
                }
            }
        }
    }
}
