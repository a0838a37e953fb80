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

//! The magic preamble + version negotiation that precedes any Bolt message traffic. Speaks
//! protocol versions 1 through 3 only; a server that doesn't support any of those is treated the
//! same as one that can't be reached at all.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use rustls::ClientConfig;
use socket2::{Socket as Socket2, TcpKeepalive};

use super::socket::{BufTcpStream, Socket};
use super::{dbg_extra, socket_debug};
use crate::address::{Address, AddressResolver};
use crate::driver::io::deadline::wait_readable;
use crate::{Neo4jError, Result};

const BOLT_MAGIC_PREAMBLE: [u8; 4] = [0x60, 0x60, 0xB0, 0x17];
// Offered in descending order; the server echoes back whichever one it picks (or all zeroes).
const BOLT_VERSION_OFFER: [u8; 16] = [
    0, 0, 0, 3, // Bolt 3
    0, 0, 0, 2, // Bolt 2
    0, 0, 0, 1, // Bolt 1
    0, 0, 0, 0, // -
];

pub(crate) struct HandshakeOutcome {
    pub(crate) socket: Socket<BufTcpStream>,
    pub(crate) raw_socket: TcpStream,
    pub(crate) version: u8,
    pub(crate) local_port: u16,
}

pub(crate) fn open(
    address: &Arc<Address>,
    resolver: Option<&dyn AddressResolver>,
    connect_timeout: Option<Duration>,
    keep_alive: bool,
    tls_config: Option<Arc<ClientConfig>>,
) -> Result<HandshakeOutcome> {
    debug!("{}C: <OPEN> {address}", dbg_extra(None, None));

    let targets = address.resolve(resolver)?;
    let raw_socket = connect(&targets, connect_timeout)?;
    if keep_alive {
        let socket2 = Socket2::from(raw_socket.try_clone().map_err(Neo4jError::connect_error)?);
        socket2
            .set_tcp_keepalive(&TcpKeepalive::new())
            .map_err(Neo4jError::connect_error)?;
    }
    let local_port = raw_socket.local_addr().map(|a| a.port()).unwrap_or(0);

    let buffered = BufTcpStream::new(&raw_socket, true)?;
    let mut socket = Socket::new(buffered, address.host(), tls_config.clone())?;

    socket_debug!(local_port, "C: <HANDSHAKE> {:02X?}", BOLT_MAGIC_PREAMBLE);
    if let Err(err) = socket.write_all(&BOLT_MAGIC_PREAMBLE) {
        let _ = raw_socket.shutdown(Shutdown::Both);
        return Neo4jError::wrap_write(Err(err));
    }
    socket_debug!(local_port, "C: <BOLT> {:02X?}", BOLT_VERSION_OFFER);
    if let Err(err) = socket.write_all(&BOLT_VERSION_OFFER) {
        let _ = raw_socket.shutdown(Shutdown::Both);
        return Neo4jError::wrap_write(Err(err));
    }
    if let Err(err) = socket.flush() {
        let _ = raw_socket.shutdown(Shutdown::Both);
        return Neo4jError::wrap_write(Err(err));
    }

    // The one-second poll only makes sense before any bytes have been decrypted: once TLS is in
    // play the handshake above already forced a real Bolt-speaking TLS peer to answer.
    if tls_config.is_none() {
        if let Err(err) = wait_readable(&raw_socket) {
            let _ = raw_socket.shutdown(Shutdown::Both);
            return Err(err);
        }
    }

    let reply = match read_version_reply(&mut socket) {
        Ok(reply) => reply,
        Err(err) => {
            let _ = raw_socket.shutdown(Shutdown::Both);
            return Err(err);
        }
    };
    socket_debug!(local_port, "S: <BOLT> {:02X?}", reply);

    let version = match decode_version(&reply) {
        Ok(version) => version,
        Err(err) => {
            let _ = raw_socket.shutdown(Shutdown::Both);
            return Err(err);
        }
    };

    Ok(HandshakeOutcome {
        socket,
        raw_socket,
        version,
        local_port,
    })
}

/// Reads the 4-byte version reply, distinguishing a clean close (no bytes at all) from a garbled,
/// partial one: `read_exact` alone can't tell those apart, since it only reports success or
/// failure, not how many bytes it actually saw before EOF.
fn read_version_reply(socket: &mut dyn Read) -> Result<[u8; 4]> {
    let mut reply = [0u8; 4];
    let mut read = 0;
    while read < reply.len() {
        match socket.read(&mut reply[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(err) => return Neo4jError::wrap_read(Err(err)),
        }
    }
    if read == 0 {
        return Err(Neo4jError::ServiceUnavailable {
            message: "server closed the connection during the handshake".into(),
            source: None,
        });
    }
    if read != reply.len() {
        return Err(Neo4jError::protocol_error(format!(
            "garbled handshake response: got only {read} of 4 bytes"
        )));
    }
    Ok(reply)
}

fn connect(targets: &[SocketAddr], connect_timeout: Option<Duration>) -> Result<TcpStream> {
    if targets.is_empty() {
        return Err(Neo4jError::disconnect("address resolved to no targets"));
    }
    let mut last_err = None;
    for addr in targets {
        let attempt = match connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Neo4jError::wrap_connect(Err(last_err.expect("targets is non-empty")))
}

fn decode_version(reply: &[u8; 4]) -> Result<u8> {
    match reply {
        [0, 0, 0, 0] => Err(Neo4jError::disconnect(
            "server did not agree on a supported bolt version (1-3)",
        )),
        [0, 0, 0, 1] => Ok(1),
        [0, 0, 0, 2] => Ok(2),
        [0, 0, 0, 3] => Ok(3),
        [0x48, 0x54, 0x54, 0x50] => Err(Neo4jError::disconnect(
            "server responded with HTTP; is the port a Bolt port?",
        )),
        _ => Err(Neo4jError::protocol_error(format!(
            "unintelligible handshake response {reply:02X?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case([0, 0, 0, 1], 1)]
    #[case([0, 0, 0, 2], 2)]
    #[case([0, 0, 0, 3], 3)]
    fn decodes_supported_versions(#[case] reply: [u8; 4], #[case] expected: u8) {
        assert_eq!(decode_version(&reply).unwrap(), expected);
    }

    #[test]
    fn no_agreement_is_service_unavailable() {
        assert!(matches!(
            decode_version(&[0, 0, 0, 0]),
            Err(Neo4jError::ServiceUnavailable { .. })
        ));
    }

    #[test]
    fn http_collision_is_service_unavailable() {
        assert!(matches!(
            decode_version(b"HTTP"),
            Err(Neo4jError::ServiceUnavailable { .. })
        ));
    }

    #[test]
    fn garbled_reply_is_protocol_error() {
        assert!(matches!(
            decode_version(&[9, 9, 9, 9]),
            Err(Neo4jError::ProtocolError { .. })
        ));
    }

    #[test]
    fn full_reply_is_read() {
        let mut source: &[u8] = &[0, 0, 0, 3];
        assert_eq!(read_version_reply(&mut source).unwrap(), [0, 0, 0, 3]);
    }

    #[test]
    fn immediate_close_is_service_unavailable() {
        let mut source: &[u8] = &[];
        assert!(matches!(
            read_version_reply(&mut source),
            Err(Neo4jError::ServiceUnavailable { .. })
        ));
    }

    #[test]
    fn partial_reply_is_protocol_error() {
        let mut source: &[u8] = &[0, 0];
        assert!(matches!(
            read_version_reply(&mut source),
            Err(Neo4jError::ProtocolError { .. })
        ));
    }
}
