//! Type-erased pending calls
//!
//! A queued call owns its operation (arguments are captured by the closure,
//! so a retry replays the same request) and the channel its caller waits on.

use crate::error::ScheduleError;
use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::oneshot;

pub(crate) type Reply<T, E> = oneshot::Sender<Result<T, ScheduleError<E>>>;

/// A call whose result type has been erased
pub(crate) trait Call<E>: Send {
    /// Invoke the operation once; on success the value is delivered to the caller
    fn attempt(&mut self) -> BoxFuture<'_, Result<(), E>>;

    /// Deliver a final failure to the caller
    fn reject(&mut self, error: ScheduleError<E>);

    /// The caller stopped waiting (deadline elapsed or future dropped)
    fn is_abandoned(&self) -> bool;
}

pub(crate) struct PendingCall<F, T, E> {
    op: F,
    reply: Option<Reply<T, E>>,
}

impl<F, T, E> PendingCall<F, T, E> {
    pub(crate) fn new(op: F, reply: Reply<T, E>) -> Self {
        Self {
            op,
            reply: Some(reply),
        }
    }
}

impl<F, Fut, T, E> Call<E> for PendingCall<F, T, E>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    fn attempt(&mut self) -> BoxFuture<'_, Result<(), E>> {
        let pending = (self.op)();
        Box::pin(async move {
            let value = pending.await?;
            if let Some(reply) = self.reply.take() {
                // Receiver gone means the caller gave up; nothing to deliver to
                let _ = reply.send(Ok(value));
            }
            Ok(())
        })
    }

    fn reject(&mut self, error: ScheduleError<E>) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(Err(error));
        }
    }

    fn is_abandoned(&self) -> bool {
        self.reply.as_ref().map_or(true, oneshot::Sender::is_closed)
    }
}
