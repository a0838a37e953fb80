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

//! Per-address bookkeeping: the idle FIFO plus the in-use/reservation counters that, together,
//! let [`super::ConnectionPool`] decide whether a new connection may be opened without holding an
//! idle one open past its reuse.

use std::collections::VecDeque;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::PoolInner;
use crate::address::Address;
use crate::driver::io::bolt::Connection;

/// One address' share of the pool. Idle connections sit in `idle`, FIFO; `in_use` counts
/// connections currently checked out (not represented as values here — see [`PooledConnection`]);
/// `reservations` counts connections being opened, under the lock, before they exist.
#[derive(Debug, Default)]
pub(crate) struct AddressPool {
    pub(crate) idle: VecDeque<Connection>,
    pub(crate) in_use: usize,
    pub(crate) reservations: usize,
}

impl AddressPool {
    pub(crate) fn is_empty(&self) -> bool {
        self.idle.is_empty() && self.in_use == 0 && self.reservations == 0
    }

    pub(crate) fn total(&self) -> usize {
        self.idle.len() + self.in_use + self.reservations
    }
}

/// A [`Connection`] checked out of a [`super::ConnectionPool`]. Returns itself to the pool's idle
/// FIFO (or closes itself, if it went bad while borrowed) when dropped.
#[derive(Debug)]
pub struct PooledConnection {
    inner: Arc<PoolInner>,
    address: Arc<Address>,
    connection: ManuallyDrop<Connection>,
}

impl PooledConnection {
    pub(crate) fn new(
        connection: Connection,
        address: Arc<Address>,
        inner: Arc<PoolInner>,
    ) -> Self {
        Self {
            inner,
            address,
            connection: ManuallyDrop::new(connection),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        // safety: `connection` is never touched again after this call takes it out.
        let connection = unsafe { ManuallyDrop::take(&mut self.connection) };
        self.inner.release(&self.address, connection);
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.connection
    }
}
