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

//! Builder-style configuration surface: where to connect ([`ConnectionConfig`]) and how the pool
//! behaves once connected ([`PoolConfig`]).

pub(crate) mod auth;
mod tls;

use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::result::Result as StdResult;
use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;

use crate::address::{Address, AddressResolver};
use auth::AuthToken;

const DEFAULT_USER_AGENT: &str = env!("BOLT_DEFAULT_USER_AGENT");
pub(crate) const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_CONNECTION_ACQUISITION_TIMEOUT: Duration = Duration::from_secs(60);
pub(crate) const DEFAULT_MAX_CONNECTION_POOL_SIZE: usize = 100;

/// Where and how to open a [`Connection`](crate::driver::io::bolt::Connection): the target
/// address, credentials, optional TLS, and the socket-level connect timeout.
pub struct ConnectionConfig {
    pub(crate) address: Arc<Address>,
    pub(crate) user_agent: String,
    pub(crate) auth: Arc<AuthToken>,
    pub(crate) tls_config: Option<Arc<ClientConfig>>,
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) resolver: Option<Arc<dyn AddressResolver>>,
    pub(crate) keep_alive: bool,
}

impl Debug for ConnectionConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("address", &self.address)
            .field("user_agent", &self.user_agent)
            .field("tls_config", &self.tls_config.as_ref().map(|_| "..."))
            .field("connect_timeout", &self.connect_timeout)
            .field("keep_alive", &self.keep_alive)
            .finish()
    }
}

impl ConnectionConfig {
    pub fn new(address: Address) -> Self {
        Self {
            address: Arc::new(address),
            user_agent: String::from(DEFAULT_USER_AGENT),
            auth: Arc::new(AuthToken::new_none_auth()),
            tls_config: None,
            connect_timeout: Some(DEFAULT_CONNECTION_TIMEOUT),
            resolver: None,
            keep_alive: true,
        }
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Arc::new(address);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_auth(mut self, auth: Arc<AuthToken>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn without_connect_timeout(mut self) -> Self {
        self.connect_timeout = None;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn AddressResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn without_resolver(mut self) -> Self {
        self.resolver = None;
        self
    }

    pub fn with_encryption_trust_default_cas(mut self) -> StdResult<Self, TlsConfigError> {
        match tls::secure_tls_config() {
            Ok(config) => {
                self.tls_config = Some(Arc::new(config));
                Ok(self)
            }
            Err(message) => Err(TlsConfigError {
                message,
                config: self,
            }),
        }
    }

    pub fn with_encryption_trust_custom_cas<P: AsRef<Path>>(
        mut self,
        paths: &[P],
    ) -> StdResult<Self, TlsConfigError> {
        let paths: Vec<&Path> = paths.iter().map(AsRef::as_ref).collect();
        match tls::custom_ca_tls_config(&paths) {
            Ok(config) => {
                self.tls_config = Some(Arc::new(config));
                Ok(self)
            }
            Err(message) => Err(TlsConfigError {
                message,
                config: self,
            }),
        }
    }

    pub fn with_encryption_trust_on_first_use(mut self) -> Self {
        self.tls_config = Some(Arc::new(tls::trust_on_first_use_tls_config()));
        self
    }

    pub fn without_encryption(mut self) -> Self {
        self.tls_config = None;
        self
    }
}

#[derive(Debug)]
pub struct TlsConfigError {
    pub message: String,
    pub config: ConnectionConfig,
}

impl std::fmt::Display for TlsConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TlsConfigError {}

/// How a [`ConnectionPool`](crate::driver::io::pool::ConnectionPool) manages the connections it
/// hands out: size cap, acquisition timeout, and connection lifetime.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub(crate) max_connection_pool_size: Option<usize>,
    pub(crate) connection_acquisition_timeout: Option<Duration>,
    pub(crate) max_connection_lifetime: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self {
            max_connection_pool_size: Some(DEFAULT_MAX_CONNECTION_POOL_SIZE),
            connection_acquisition_timeout: Some(DEFAULT_CONNECTION_ACQUISITION_TIMEOUT),
            max_connection_lifetime: None,
        }
    }

    pub fn with_max_connection_pool_size(mut self, size: usize) -> Self {
        self.max_connection_pool_size = Some(size);
        self
    }

    pub fn with_unbounded_connection_pool_size(mut self) -> Self {
        self.max_connection_pool_size = None;
        self
    }

    pub fn with_connection_acquisition_timeout(mut self, timeout: Duration) -> Self {
        self.connection_acquisition_timeout = Some(timeout);
        self
    }

    pub fn without_connection_acquisition_timeout(mut self) -> Self {
        self.connection_acquisition_timeout = None;
        self
    }

    pub fn with_max_connection_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_connection_lifetime = Some(lifetime);
        self
    }

    pub fn without_max_connection_lifetime(mut self) -> Self {
        self.max_connection_lifetime = None;
        self
    }
}
