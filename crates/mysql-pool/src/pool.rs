//! Connection pool implementation.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use mysql_client::Client;

use crate::config::PoolConfig;
use crate::error::PoolError;

/// A connection pool for MySQL.
///
/// Cloning the pool is cheap; all clones share the same state.
///
/// Invariants: the pool never holds more than `max_connections` live
/// sessions, and `idle + borrowed` always equals the total. Waiters are
/// woken strictly in FIFO order, each already holding the connection that
/// freed up — a handed-off connection is never observable to other
/// acquirers.
///
/// Dropping the pool while connections are borrowed is allowed (the
/// shared state lives until the last guard returns), but [`Pool::close`]
/// should be called first so parked waiters observe [`PoolError::Closed`]
/// instead of waiting forever.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    config: PoolConfig,
    state: Mutex<PoolState>,
    /// Fast-path ceiling check; authoritative only under the state lock.
    total: AtomicUsize,
    closed: AtomicBool,
}

struct PoolState {
    idle: VecDeque<Client>,
    waiters: VecDeque<oneshot::Sender<Client>>,
}

impl Pool {
    /// Create a pool. No connections are opened until first use.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::Configuration)?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    waiters: VecDeque::new(),
                }),
                total: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Borrow a connection.
    ///
    /// Resolution order: an idle connection (immediately); a freshly
    /// connected one while the pool is under its ceiling (the slot is
    /// reserved before the network round-trip and surrendered on
    /// failure); otherwise the caller parks in the waiter queue until a
    /// release hands a connection over.
    pub async fn acquire(&self) -> Result<PooledConn, PoolError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }

        enum Plan {
            Ready(Client),
            Create,
            Wait(oneshot::Receiver<Client>),
        }

        let plan = {
            let mut state = self.inner.state.lock();
            if let Some(client) = state.idle.pop_front() {
                Plan::Ready(client)
            } else if self.inner.total.load(Ordering::Relaxed) < self.inner.config.max_connections
            {
                // Reserve the slot now so concurrent acquirers cannot
                // overshoot the ceiling while we connect.
                self.inner.total.fetch_add(1, Ordering::Relaxed);
                Plan::Create
            } else {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                Plan::Wait(rx)
            }
        };

        match plan {
            Plan::Ready(client) => {
                tracing::trace!("acquired idle connection");
                Ok(self.guard(client))
            }
            Plan::Create => {
                match Client::connect(
                    &self.inner.config.mysql_config,
                    self.inner.config.client_config.clone(),
                )
                .await
                {
                    Ok(client) => {
                        tracing::debug!(total = self.size(), "pool opened new connection");
                        Ok(self.guard(client))
                    }
                    Err(e) => {
                        self.inner.total.fetch_sub(1, Ordering::Relaxed);
                        Err(PoolError::Connect(e))
                    }
                }
            }
            Plan::Wait(rx) => {
                tracing::trace!("pool at capacity, waiting for a release");
                match rx.await {
                    Ok(client) => Ok(self.guard(client)),
                    // Sender dropped: the pool was closed underneath us.
                    Err(_) => Err(PoolError::Closed),
                }
            }
        }
    }

    /// Total live connections (idle + borrowed).
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.total.load(Ordering::Relaxed)
    }

    /// Currently idle connections.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().idle.len()
    }

    /// Acquirers currently parked waiting for a release.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.inner.state.lock().waiters.len()
    }

    /// Whether [`Pool::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Close the pool: parked waiters observe [`PoolError::Closed`] and
    /// idle connections are dropped. Borrowed connections are dropped as
    /// their guards return.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);

        let (waiters, idle) = {
            let mut state = self.inner.state.lock();
            (
                std::mem::take(&mut state.waiters),
                std::mem::take(&mut state.idle),
            )
        };
        self.inner.total.fetch_sub(idle.len(), Ordering::Relaxed);
        tracing::debug!(
            dropped_idle = idle.len(),
            woken_waiters = waiters.len(),
            "pool closed"
        );
        // Dropping the senders wakes every waiter with Closed; dropping
        // the clients closes their sockets.
        drop(waiters);
        drop(idle);
    }

    fn guard(&self, client: Client) -> PooledConn {
        PooledConn {
            client: Some(client),
            pool: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("total", &self.size())
            .field("idle", &self.idle_count())
            .field("max", &self.inner.config.max_connections)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Return a connection to the pool, preferring a direct handoff to the
/// head waiter.
fn release(pool: &Arc<PoolInner>, mut client: Client) {
    // A closed pool or a dead session takes the connection out of
    // rotation entirely.
    if pool.closed.load(Ordering::Acquire) || client.is_closed() {
        pool.total.fetch_sub(1, Ordering::Relaxed);
        tracing::trace!("released connection dropped");
        return;
    }

    loop {
        let waiter = pool.state.lock().waiters.pop_front();
        match waiter {
            Some(tx) => match tx.send(client) {
                Ok(()) => {
                    tracing::trace!("connection handed to waiting acquirer");
                    return;
                }
                // The waiter gave up (future dropped); try the next one.
                Err(returned) => client = returned,
            },
            None => {
                pool.state.lock().idle.push_back(client);
                tracing::trace!("connection returned to idle queue");
                return;
            }
        }
    }
}

/// A connection borrowed from the pool.
///
/// Dereferences to [`Client`]. Dropping the guard returns the connection:
/// to the longest-waiting acquirer when one is parked, to the idle queue
/// otherwise. Sessions that were closed while borrowed are discarded
/// instead of being re-pooled.
pub struct PooledConn {
    client: Option<Client>,
    pool: Arc<PoolInner>,
}

impl PooledConn {
    /// Take the connection out of the pool permanently.
    ///
    /// The pool's slot is released; the caller now owns the session.
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn detach(mut self) -> Client {
        self.pool.total.fetch_sub(1, Ordering::Relaxed);
        self.client.take().expect("connection present until drop")
    }
}

impl Deref for PooledConn {
    type Target = Client;

    #[allow(clippy::expect_used)]
    fn deref(&self) -> &Client {
        self.client.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConn {
    #[allow(clippy::expect_used)]
    fn deref_mut(&mut self) -> &mut Client {
        self.client.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            release(&self.pool, client);
        }
    }
}

impl std::fmt::Debug for PooledConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConn")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}
