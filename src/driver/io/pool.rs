// Copyright Rouven Bauer
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A thread-safe, per-address pool of [`Connection`]s: size caps, acquisition back-pressure, and
//! health-driven eviction. The public [`ConnectionPool`] is bound to a single address (the one in
//! its [`ConnectionConfig`]); the keyed-by-address machinery underneath is what
//! [`PoolInner::deactivate`] and a future routing layer would share.

mod single_pool;

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use log::debug;
use parking_lot::{Condvar, Mutex};

use self::single_pool::AddressPool;
pub use self::single_pool::PooledConnection;
use crate::address::Address;
use crate::driver::config::{ConnectionConfig, PoolConfig};
use crate::driver::io::bolt::{Connection, PoolHandle};
use crate::time::Instant;
use crate::{Neo4jError, Result};

#[derive(Debug, Default)]
struct PoolState {
    pools: HashMap<Arc<Address>, AddressPool>,
    closed: bool,
}

#[derive(Debug)]
struct PoolInner {
    state: Mutex<PoolState>,
    condition: Condvar,
    pool_config: PoolConfig,
}

impl PoolHandle for PoolInner {
    fn deactivate(&self, address: &Address) {
        debug!("deactivating address {address}");
        let mut state = self.state.lock();
        if let Some(pool) = state.pools.get_mut(address) {
            pool.idle.clear();
            if pool.is_empty() {
                state.pools.remove(address);
            }
        }
        self.condition.notify_all();
    }
}

impl PoolInner {
    fn release(&self, address: &Arc<Address>, mut connection: Connection) {
        if connection.needs_reset() {
            if connection.reset().is_err() {
                // the connection drove itself defunct while resetting; fall through and let the
                // closed/defunct check below decide not to keep it.
            }
        }
        let mut state = self.state.lock();
        let pool = state.pools.entry(Arc::clone(address)).or_default();
        pool.in_use = pool.in_use.saturating_sub(1);
        if !connection.closed() && !connection.defunct() && !state.closed {
            pool.idle.push_back(connection);
        }
        self.condition.notify_all();
    }

    fn remove(&self, address: &Address) {
        let mut state = self.state.lock();
        if let Some(mut pool) = state.pools.remove(address) {
            pool.idle.clear();
        }
        self.condition.notify_all();
    }
}

/// A pool of [`Connection`]s to a single address. Hands out [`PooledConnection`]s that return
/// themselves to the idle FIFO (or close themselves, if gone bad) on drop.
#[derive(Debug)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
    config: ConnectionConfig,
}

impl ConnectionPool {
    pub fn new(config: ConnectionConfig, pool_config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState::default()),
                condition: Condvar::new(),
                pool_config,
            }),
            config,
        }
    }

    /// Acquires a connection to this pool's bound address, waiting up to `timeout` for either an
    /// idle connection to free up or room to open a new one.
    pub fn acquire(&self, timeout: Duration) -> Result<PooledConnection> {
        self.acquire_direct(Arc::clone(&self.config.address), timeout)
    }

    pub(crate) fn acquire_direct(
        &self,
        address: Arc<Address>,
        timeout: Duration,
    ) -> Result<PooledConnection> {
        let deadline = Instant::now() + timeout;
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(Neo4jError::disconnect("connection pool is closed"));
            }
            loop {
                let pool = state.pools.entry(Arc::clone(&address)).or_default();
                while let Some(connection) = pool.idle.pop_front() {
                    if connection.closed() || connection.defunct() || connection.timed_out() {
                        continue;
                    }
                    pool.in_use += 1;
                    return Ok(PooledConnection::new(
                        connection,
                        Arc::clone(&address),
                        Arc::clone(&self.inner),
                    ));
                }
                let has_room = match self.inner.pool_config.max_connection_pool_size {
                    None => true,
                    Some(max) => pool.total() < max,
                };
                if has_room {
                    pool.reservations += 1;
                    break;
                }
                let remaining = match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) if !remaining.is_zero() => remaining,
                    _ => {
                        return Err(Neo4jError::ClientError {
                            message: format!(
                                "timed out after {timeout:?} acquiring a connection to {address}"
                            ),
                        })
                    }
                };
                let timed_out = self.inner.condition.wait_for(&mut state, remaining);
                if timed_out.timed_out() && Instant::now() >= deadline {
                    return Err(Neo4jError::ClientError {
                        message: format!(
                            "timed out after {timeout:?} acquiring a connection to {address}"
                        ),
                    });
                }
            }
        }
        let connected = self.connect(&address);
        let mut state = self.inner.state.lock();
        let pool = state.pools.entry(Arc::clone(&address)).or_default();
        pool.reservations -= 1;
        match connected {
            Ok(mut connection) => {
                connection.set_max_connection_lifetime(
                    self.inner.pool_config.max_connection_lifetime,
                );
                connection.attach_pool(Arc::downgrade(&self.inner) as Weak<dyn PoolHandle>);
                pool.in_use += 1;
                drop(state);
                Ok(PooledConnection::new(
                    connection,
                    Arc::clone(&address),
                    Arc::clone(&self.inner),
                ))
            }
            Err(err) => {
                drop(state);
                if matches!(err, Neo4jError::ServiceUnavailable { .. }) {
                    self.inner.remove(&address);
                }
                Err(err)
            }
        }
    }

    fn connect(&self, address: &Arc<Address>) -> Result<Connection> {
        debug_assert_eq!(**address, *self.config.address);
        Connection::connect(&self.config)
    }

    /// Closes and drops every idle connection for `address`; in-use connections are left alive
    /// and will be closed by their borrower once they observe the failure that triggered this.
    pub(crate) fn deactivate(&self, address: &Address) {
        self.inner.deactivate(address);
    }

    /// Closes and drops every connection (idle or otherwise known) for `address`.
    pub(crate) fn remove(&self, address: &Address) {
        self.inner.remove(address);
    }

    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        for (_, mut pool) in state.pools.drain() {
            pool.idle.clear();
        }
        self.inner.condition.notify_all();
    }

    pub fn closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn in_use_connection_count(&self, address: &Address) -> usize {
        self.inner
            .state
            .lock()
            .pools
            .get(address)
            .map(|pool| pool.in_use)
            .unwrap_or(0)
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::config::auth::AuthToken;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new(Address::from(("127.0.0.1", 9001)))
            .with_auth(Arc::new(AuthToken::new_none_auth()))
            .without_connect_timeout()
    }

    #[test]
    fn closing_an_empty_pool_is_idempotent() {
        let pool = ConnectionPool::new(config(), PoolConfig::new());
        assert!(!pool.closed());
        pool.close();
        pool.close();
        assert!(pool.closed());
    }

    #[test]
    fn acquire_on_closed_pool_fails_fast() {
        let pool = ConnectionPool::new(config(), PoolConfig::new());
        pool.close();
        let result = pool.acquire(Duration::from_millis(50));
        assert!(matches!(result, Err(Neo4jError::ServiceUnavailable { .. })));
    }

    #[test]
    fn in_use_count_starts_at_zero_for_unknown_address() {
        let pool = ConnectionPool::new(config(), PoolConfig::new());
        assert_eq!(pool.in_use_connection_count(&config().address), 0);
    }
}
