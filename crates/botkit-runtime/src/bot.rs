//! The multiplexer: one task per subscription, supervised as a fail-fast
//! group.

use std::convert::Infallible;
use std::sync::Arc;

use botkit_core::{EventKind, Transport};
use botkit_log::Logger;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::RunError;
use crate::subscription::{NotificationRoutes, Subscription};

pub struct Bot<T: Transport> {
    transport: Arc<T>,
    subscriptions: Vec<Subscription>,
    log: Logger,
}

impl<T: Transport> Bot<T> {
    pub fn new(transport: Arc<T>, routes: NotificationRoutes, log: Logger) -> Self {
        Self {
            transport,
            subscriptions: routes.into_subscriptions(),
            log,
        }
    }

    /// Kinds that will get a task when the bot runs.
    pub fn active_kinds(&self) -> Vec<EventKind> {
        self.subscriptions.iter().map(Subscription::kind).collect()
    }

    /// Run every subscription until the first one stops or `cancel` fires.
    ///
    /// The first outcome wins: it cancels the rest of the group, every
    /// sibling task is joined, and that outcome is returned. With no
    /// subscriptions this waits for `cancel` and returns
    /// [`RunError::Cancelled`].
    pub async fn run(self, cancel: CancellationToken) -> Result<Infallible, RunError> {
        let group = cancel.child_token();
        let mut tasks = JoinSet::new();

        for sub in self.subscriptions {
            let kind = sub.kind();
            self.log.debug(format_args!("starting {kind} subscription"));
            tasks.spawn(sub.run(Arc::clone(&self.transport), group.clone()));
        }
        self.log
            .info(format_args!("multiplexer running with {} subscriptions", tasks.len()));

        let outcome = match tasks.join_next().await {
            None => {
                group.cancelled().await;
                RunError::Cancelled
            }
            Some(Ok(Err(err))) => err,
            Some(Ok(Ok(never))) => match never {},
            Some(Err(join)) => RunError::TaskFailed(join),
        };

        group.cancel();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Err(RunError::Cancelled)) => {}
                Ok(Err(err)) => self.log.debug(format_args!("sibling stopped: {err}")),
                Ok(Ok(never)) => match never {},
                Err(join) => self.log.warn(format_args!("sibling task failed: {join}")),
            }
        }

        if outcome.is_cancelled() {
            self.log.info("multiplexer cancelled");
        } else {
            self.log.error(format_args!("multiplexer stopped: {outcome}"));
        }
        Err(outcome)
    }
}
