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

use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::sync::Arc;
use std::vec::IntoIter;

pub mod resolution;

pub use resolution::AddressResolver;

pub(crate) const DEFAULT_PORT: u16 = 7687;
const COLON_BYTES: usize = ':'.len_utf8();

/// An address as configured by the user: a host name or IP literal plus a port.
///
/// Equality and hashing key off the normalized host (`key`), not the original spelling, so
/// `"127.0.0.1"` and an IP constructed programmatically compare equal.
#[derive(Debug, Clone)]
pub struct Address {
    host: String,
    port: u16,
    key: String,
}

impl PartialEq for Address {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.port == other.port
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.port.hash(state);
    }
}

impl Address {
    /// Resolves this address into concrete socket addresses: first through the optional
    /// custom [`AddressResolver`], then through DNS for each resulting logical address.
    pub(crate) fn resolve(
        self: &Arc<Self>,
        resolver: Option<&dyn AddressResolver>,
    ) -> crate::Result<Vec<SocketAddr>> {
        resolution::resolve(self, resolver)
    }

    fn normalize_ip(host: &str) -> String {
        IpAddr::from_str(host)
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| host.to_string())
    }

    pub fn host(&self) -> &str {
        self.host.as_str()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.host.find(':').is_some() {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl From<(String, u16)> for Address {
    fn from((host, port): (String, u16)) -> Self {
        let key = Self::normalize_ip(&host);
        Self { host, port, key }
    }
}

impl From<(&str, u16)> for Address {
    fn from((host, port): (&str, u16)) -> Self {
        let key = Self::normalize_ip(host);
        Self {
            host: String::from(host),
            port,
            key,
        }
    }
}

fn parse(host: &str) -> (String, u16) {
    if let Some(pos_colon) = host.rfind(':') {
        if let Some(pos_bracket) = host.rfind(']') {
            if pos_bracket < pos_colon {
                // [IPv6]:port (colon after bracket)
                let port = host[pos_colon + COLON_BYTES..]
                    .parse()
                    .unwrap_or(DEFAULT_PORT);
                (String::from(&host[..pos_colon]), port)
            } else {
                // [IPv6] (bracket after colon)
                (String::from(host), DEFAULT_PORT)
            }
        } else if host[..pos_colon].rfind(':').is_some() {
            // IPv6 (multiple colons, no brackets)
            (String::from(host), DEFAULT_PORT)
        } else {
            // IPv4:port (single colon)
            let port = host[pos_colon + COLON_BYTES..]
                .parse()
                .unwrap_or(DEFAULT_PORT);
            (String::from(&host[..pos_colon]), port)
        }
    } else {
        (String::from(host), DEFAULT_PORT)
    }
}

impl From<&str> for Address {
    fn from(host: &str) -> Self {
        let (host, port) = parse(host);
        let key = Self::normalize_ip(&host);
        Self { host, port, key }
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self::from((format!("{}", addr.ip()), addr.port()))
    }
}

impl ToSocketAddrs for Address {
    type Iter = IntoIter<SocketAddr>;

    fn to_socket_addrs(&self) -> std::io::Result<Self::Iter> {
        (self.host.as_str(), self.port).to_socket_addrs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("localhost", "localhost", 7687)]
    #[case("localhost:1337", "localhost", 1337)]
    #[case("127.0.0.1:7687", "127.0.0.1", 7687)]
    #[case("[::1]:7687", "[::1]", 7687)]
    #[case("[::1]", "[::1]", 7687)]
    fn test_parse(#[case] input: &str, #[case] host: &str, #[case] port: u16) {
        let address = Address::from(input);
        assert_eq!(address.host(), host);
        assert_eq!(address.port(), port);
    }

    #[test]
    fn equality_keys_on_normalized_host_and_port() {
        let a = Address::from(("127.0.0.1", 7687));
        let b = Address::from(("127.0.0.1", 7687));
        assert_eq!(a, b);
        assert_ne!(a, Address::from(("127.0.0.1", 7688)));
    }
}
