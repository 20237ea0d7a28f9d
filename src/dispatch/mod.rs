//! Dispatcher and worker pool: maps packet codes to handlers and runs
//! them on a fixed worker pool while preserving per-session ordering by
//! always routing a given session's jobs to the same worker.

use crate::codec::ReadOnlyPacket;
use crate::session::Session;
use futures_util::future::BoxFuture;
use hashbrown::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// Handler-level result: nothing unwinds past the dispatcher boundary, so
/// handlers return this sum type instead.
pub enum HandlerOutcome {
    Ok,
    DomainError { code: u16, message: String },
    Fatal,
}

/// A handler is given the session the packet arrived on (so it can reply
/// on that connection) plus the packet itself. One table of these is built
/// once at boot and shared by every connection; the session argument is
/// what lets a single global table still answer on the right connection.
pub type HandlerFn =
    Arc<dyn Fn(Arc<AsyncMutex<Session>>, ReadOnlyPacket) -> BoxFuture<'static, HandlerOutcome> + Send + Sync>;

/// Maps `u16` packet codes to registered handlers. Handlers are
/// registered once at boot; lookups after that never mutate the table.
#[derive(Default, Clone)]
pub struct Dispatcher {
    handlers: Arc<HashMap<u16, HandlerFn>>,
}

pub struct DispatcherBuilder {
    handlers: HashMap<u16, HandlerFn>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(mut self, command_code: u16, handler: HandlerFn) -> Self {
        self.handlers.insert(command_code, handler);
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            handlers: Arc::new(self.handlers),
        }
    }
}

impl Dispatcher {
    /// Looks up the handler for `command_code`. An absent handler is
    /// logged and dropped by the caller, never fatal.
    pub fn handler_for(&self, command_code: u16) -> Option<HandlerFn> {
        self.handlers.get(&command_code).cloned()
    }
}

/// One worker's mailbox: an unbounded queue feeding one dedicated task,
/// drained strictly in submission order.
struct Worker {
    sender: mpsc::UnboundedSender<BoxFuture<'static, ()>>,
}

impl Worker {
    fn spawn() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<BoxFuture<'static, ()>>();
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                job.await;
            }
        });
        Self { sender }
    }

    fn submit(&self, job: BoxFuture<'static, ()>) {
        let _ = self.sender.send(job);
    }
}

/// A fixed-size pool of worker tasks, sized at construction (configurable,
/// defaulting to available parallelism). A session's jobs are always
/// routed to the same worker by hashing its id, so per-session ordering
/// holds without giving every session a dedicated task.
pub struct WorkerPool {
    workers: Vec<Worker>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            workers: (0..size).map(|_| Worker::spawn()).collect(),
        }
    }

    fn worker_for(&self, session_id: Uuid) -> &Worker {
        let index = (session_id.as_u128() % self.workers.len() as u128) as usize;
        &self.workers[index]
    }

    pub fn queue_work(&self, session_id: Uuid, job: BoxFuture<'static, ()>) {
        self.worker_for(session_id).submit(job);
    }

    /// No per-session state to release: workers are shared across
    /// sessions, so a closed session simply stops submitting jobs.
    pub fn remove_session(&self, _session_id: Uuid) {}
}

#[cfg(test)]
mod test {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn jobs_for_the_same_session_run_in_submission_order() {
        let pool = WorkerPool::new(4);
        let session = Uuid::new_v4();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5u32 {
            let order = order.clone();
            pool.queue_work(
                session,
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    order.lock().push(i);
                }),
            );
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn different_sessions_do_not_block_each_other() {
        let pool = WorkerPool::new(4);
        let completed = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let session = Uuid::new_v4();
            let completed = completed.clone();
            pool.queue_work(
                session,
                Box::pin(async move {
                    completed.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn pool_size_is_fixed_and_session_routing_is_stable() {
        let pool = WorkerPool::new(3);
        assert_eq!(pool.workers.len(), 3);

        let session = Uuid::new_v4();
        let first: *const Worker = pool.worker_for(session);
        let second: *const Worker = pool.worker_for(session);
        assert_eq!(first, second);
    }

    #[test]
    fn pool_size_is_never_rounded_down_to_zero() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.workers.len(), 1);
    }
}
