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

#![allow(clippy::option_map_unit_fn)]

//! # Bolt protocol client core
//!
//! This crate provides the low-level client of the Bolt protocol: handshake, chunked message
//! framing, a per-connection state machine that dispatches asynchronous server replies to
//! per-request subscribers, and a thread-safe, per-address connection pool.
//!
//! It does not provide a session/transaction API, query result materialization, or cluster
//! routing. Those belong one layer up, on top of the primitives exposed here:
//! [`driver::io::bolt::Connection`] and [`driver::io::pool::ConnectionPool`].
//!
//! ## Basic Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use bolt_client::address::Address;
//! use bolt_client::driver::{AuthToken, ConnectionConfig, ConnectionPool, PoolConfig};
//! use bolt_client::value;
//!
//! let address = Address::from(("localhost", 7687));
//! let auth = Arc::new(AuthToken::new_basic_auth("neo4j", "pass"));
//! let connection_config = ConnectionConfig::new(address).with_auth(auth);
//! let pool_config = PoolConfig::new().with_max_connection_pool_size(16);
//! let pool = ConnectionPool::new(connection_config, pool_config);
//!
//! let mut connection = pool.acquire(Duration::from_secs(5)).unwrap();
//! let mut records = Vec::new();
//! connection
//!     .run("RETURN $x", Some(&value!({"x": 1})), Default::default())
//!     .unwrap();
//! connection.pull_all(Default::default()).unwrap();
//! connection.send_all().unwrap();
//! connection.fetch_all().unwrap();
//! ```
//!
//! ## Concepts
//!
//! ### Wire core
//! [`driver::io::bolt`] owns the handshake, the chunked framing buffers (Outbox/Inbox), and the
//! PackStream codec the rest of the crate is built on.
//!
//! ### Connection
//! [`driver::io::bolt::Connection`] is a long-lived, authenticated session speaking Bolt v1-v3. It
//! multiplexes requests and routes replies through a FIFO of response callbacks, one per
//! outstanding request.
//!
//! ### Connection pool
//! [`driver::io::pool::ConnectionPool`] keeps a bounded, per-address set of connections, blocking
//! acquisition up to a configurable timeout and evicting connections that are closed, defunct, or
//! have outlived `max_connection_lifetime`.

pub mod address;
pub mod driver;
mod error;
mod macros;
mod time;
mod util;
pub mod value;

pub use error::{Neo4jError, Result};
pub use value::ValueReceive;
pub use value::ValueSend;

mod private {
    // Trait to prevent traits from being implemented outside of this crate.
    pub trait Sealed {}
}
