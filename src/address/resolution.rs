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

use log::debug;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use super::Address;

/// User-supplied hook that rewrites a logical [`Address`] into one or more logical addresses
/// before DNS resolution runs, e.g. to route through a load balancer or split a single
/// configured host into a fixed set of cluster members.
///
/// Must not return an empty vector.
pub trait AddressResolver: std::fmt::Debug + Send + Sync {
    fn resolve(&self, address: &Address) -> Vec<Address>;
}

/// Resolves `address` to concrete socket addresses.
///
/// Resolution is two-staged: the optional custom resolver runs first and produces zero or more
/// logical addresses (absence of a resolver degenerates to a single-element pass-through), each
/// of which is then resolved via the platform resolver (DNS or `/etc/hosts`). The results of all
/// stages are flattened into one list, in the order the logical addresses were produced.
pub(crate) fn resolve(
    address: &Arc<Address>,
    resolver: Option<&dyn AddressResolver>,
) -> crate::Result<Vec<SocketAddr>> {
    debug!("resolve in: {address}");
    let logical_addresses = match resolver {
        None => vec![Address::clone(address)],
        Some(resolver) => {
            let addrs = resolver.resolve(address);
            if addrs.is_empty() {
                return Err(crate::Neo4jError::InvalidConfig {
                    message: String::from("address resolver returned no addresses"),
                });
            }
            addrs
        }
    };
    let mut resolved = Vec::with_capacity(logical_addresses.len());
    for logical in &logical_addresses {
        resolved.extend(dns_resolve(logical)?);
    }
    debug!("resolve out: {resolved:?}");
    Ok(resolved)
}

fn dns_resolve(address: &Address) -> crate::Result<Vec<SocketAddr>> {
    address.to_socket_addrs().map(|iter| iter.collect()).map_err(|err| {
        crate::Neo4jError::disconnect(format!("failed to resolve address {address}: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct StaticResolver {
        addresses: Vec<Address>,
    }

    impl AddressResolver for StaticResolver {
        fn resolve(&self, _address: &Address) -> Vec<Address> {
            self.addresses.clone()
        }
    }

    #[test]
    fn no_resolver_passes_through_before_dns() {
        let address = Arc::new(Address::from(("127.0.0.1", 7687)));
        let resolved = resolve(&address, None).unwrap();
        assert_eq!(resolved, vec![SocketAddr::from(([127, 0, 0, 1], 7687))]);
    }

    #[test]
    fn custom_resolver_fans_out_before_dns() {
        let address = Arc::new(Address::from(("ignored", 1)));
        let resolver = StaticResolver {
            addresses: vec![
                Address::from(("127.0.0.1", 7687)),
                Address::from(("127.0.0.2", 7688)),
            ],
        };
        let resolved = resolve(&address, Some(&resolver)).unwrap();
        assert_eq!(
            resolved,
            vec![
                SocketAddr::from(([127, 0, 0, 1], 7687)),
                SocketAddr::from(([127, 0, 0, 2], 7688)),
            ]
        );
    }

    #[test]
    fn empty_resolver_result_is_invalid_config() {
        let address = Arc::new(Address::from(("ignored", 1)));
        let resolver = StaticResolver { addresses: vec![] };
        let err = resolve(&address, Some(&resolver)).unwrap_err();
        assert!(matches!(err, crate::Neo4jError::InvalidConfig { .. }));
    }
}
