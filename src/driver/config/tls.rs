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

//! Builds the `rustls::ClientConfig`s behind [`super::ConnectionConfig`]'s encryption options.
//! Scoped to what the wire core needs to open a TLS socket; certificate *storage* policy beyond
//! an in-memory trust-on-first-use cache is left to the embedding application.

use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, Error as TlsError, RootCertStore, ServerName};

pub(crate) fn secure_tls_config() -> Result<ClientConfig, String> {
    let mut roots = RootCertStore::empty();
    for cert in rustls_native_certs::load_native_certs()
        .map_err(|err| format!("failed to load platform CA certificates: {err}"))?
    {
        // a handful of platform roots are malformed; skip rather than fail the whole config
        let _ = roots.add(&Certificate(cert.0));
    }
    Ok(ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth())
}

pub(crate) fn custom_ca_tls_config(paths: &[&Path]) -> Result<ClientConfig, String> {
    let mut roots = RootCertStore::empty();
    for path in paths {
        let file =
            std::fs::File::open(path).map_err(|err| format!("failed to open {path:?}: {err}"))?;
        let mut reader = BufReader::new(file);
        let certs = rustls_pemfile::certs(&mut reader)
            .map_err(|err| format!("failed to parse PEM certificates in {path:?}: {err}"))?;
        for cert in certs {
            roots
                .add(&Certificate(cert))
                .map_err(|err| format!("invalid certificate in {path:?}: {err}"))?;
        }
    }
    Ok(ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth())
}

/// Accepts whatever certificate it first sees for a given server name, then pins it for the
/// lifetime of this config. Not persisted across process restarts.
#[derive(Debug, Default)]
struct TrustOnFirstUse {
    pinned: Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl ServerCertVerifier for TrustOnFirstUse {
    fn verify_server_cert(
        &self,
        end_entity: &Certificate,
        _intermediates: &[Certificate],
        server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<ServerCertVerified, TlsError> {
        let key = format!("{server_name:?}");
        let mut pinned = self.pinned.lock().unwrap();
        match pinned.get(&key) {
            Some(known) if known.as_slice() == end_entity.0.as_slice() => {
                Ok(ServerCertVerified::assertion())
            }
            Some(_) => Err(TlsError::General(format!(
                "certificate for {key} does not match the pinned certificate"
            ))),
            None => {
                pinned.insert(key, end_entity.0.clone());
                Ok(ServerCertVerified::assertion())
            }
        }
    }
}

pub(crate) fn trust_on_first_use_tls_config() -> ClientConfig {
    ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(TrustOnFirstUse::default()))
        .with_no_client_auth()
}
