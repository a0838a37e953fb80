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

//! The only socket-level deadline the wire core ever applies past the initial `connect` syscall:
//! the handshake's one-second poll loop (waiting for the negotiated-version reply to become
//! readable). Everything else is either a one-shot `connect_timeout` (handled by
//! `TcpStream::connect_timeout` directly) or unbounded blocking I/O that runs to completion or
//! drives the connection defunct.

use std::io::ErrorKind;
use std::net::TcpStream;
use std::time::Duration;

use crate::{Neo4jError, Result};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Blocks until `stream` has data available to read, polling in one-second slices so the wait
/// isn't one unbounded syscall.
pub(crate) fn wait_readable(stream: &TcpStream) -> Result<()> {
    stream
        .set_read_timeout(Some(POLL_INTERVAL))
        .map_err(Neo4jError::connect_error)?;
    let mut probe = [0u8; 1];
    let result = loop {
        match stream.peek(&mut probe) {
            Ok(_) => break Ok(()),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                continue
            }
            Err(err) => break Err(Neo4jError::connect_error(err)),
        }
    };
    stream
        .set_read_timeout(None)
        .map_err(Neo4jError::connect_error)?;
    result
}
