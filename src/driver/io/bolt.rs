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

//! A single authenticated Bolt session speaking protocol version 1, 2, or 3, plus the framing and
//! value-codec primitives ([`chunk`]/`packstream`) it is built on.

mod chunk;
mod handshake;
pub mod message_parameters;
mod packstream;
mod response;
mod socket;

use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Weak};
use std::time::Duration;

use atomic_refcell::AtomicRefCell;
use log::{debug, log_enabled, Level};

use self::chunk::{Inbox, InboxMessage, Outbox};
use self::message_parameters::{
    BeginParameters, CommitParameters, DiscardParameters, PullParameters, RollbackParameters,
    RunParameters,
};
use self::packstream::{PackStreamSerializeError, PackStreamSerializer, PackStreamSerializerImpl};
use self::socket::{BufTcpStream, Socket};
use crate::address::Address;
use crate::driver::config::auth::AuthToken;
use crate::driver::config::ConnectionConfig;
use crate::time::Instant;
use crate::{Neo4jError, Result, ValueReceive, ValueSend};

pub(crate) use response::{BoltMeta, BoltRecordFields, BoltResponse, ResponseCallbacks};
use response::ResponseMessage;
use response::ResponseVariant;

macro_rules! bolt_debug_extra {
    ($bolt:expr) => {{
        let meta = $bolt.meta.borrow();
        match meta.get("connection_id") {
            Some(ValueReceive::String(id)) => dbg_extra(Some($bolt.local_port), Some(id.as_str())),
            _ => dbg_extra(Some($bolt.local_port), None),
        }
    }};
}
pub(crate) use bolt_debug_extra;

macro_rules! bolt_debug {
    ($bolt:expr, $($args:tt)+) => {
        if log_enabled!(Level::Debug) {
            debug!("{}{}", bolt_debug_extra!($bolt), format!($($args)+));
        }
    };
}
pub(crate) use bolt_debug;

macro_rules! socket_debug {
    ($local_port:expr, $($args:tt)+) => {
        if log_enabled!(Level::Debug) {
            debug!("{}{}", dbg_extra(Some($local_port), None), format!($($args)+));
        }
    };
}
pub(crate) use socket_debug;

pub(crate) fn dbg_extra(port: Option<u16>, bolt_id: Option<&str>) -> String {
    format!(
        "[#{:04X} {:<10}] ",
        port.unwrap_or(0),
        bolt_id.unwrap_or("")
    )
}

const HELLO: u8 = 0x01;
const INIT: u8 = 0x01;
const GOODBYE: u8 = 0x02;
const RUN: u8 = 0x10;
const BEGIN: u8 = 0x11;
const COMMIT: u8 = 0x12;
const ROLLBACK: u8 = 0x13;
const RESET: u8 = 0x0F;
const DISCARD_ALL: u8 = 0x2F;
const PULL_ALL: u8 = 0x3F;

const SUCCESS: u8 = 0x70;
const IGNORED: u8 = 0x7E;
const FAILURE: u8 = 0x7F;

/// A handle a [`Connection`] uses to tell its owning pool it has gone bad. Kept as a trait (rather
/// than a direct dependency on `super::pool`) so the module graph stays one-directional: `pool`
/// depends on `bolt`, not the other way around.
pub(crate) trait PoolHandle: Debug + Send + Sync {
    fn deactivate(&self, address: &Address);
}

/// Distinguishes an error a response handler raised on purpose (a hydrated `CypherError`,
/// `AuthError`, ...) from one that means the wire exchange itself broke. Only the latter should
/// defunct the connection; [`Connection::fetch_message`] is the sole place this is unwrapped.
enum DispatchError {
    /// Raised by `on_success`/`on_record`/`on_ignored`/`on_failure`. The connection is still
    /// perfectly usable; the error is just the outcome of this particular message.
    Handled(Neo4jError),
    /// An I/O failure or a genuine protocol violation: the connection can't be trusted anymore.
    Fatal(Neo4jError),
}

impl From<Neo4jError> for DispatchError {
    fn from(err: Neo4jError) -> Self {
        DispatchError::Fatal(err)
    }
}

/// What server capability gates a wire-level behavior.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Feature {
    /// Raw byte array parameters/values (server agent >= Neo4j 3.2).
    Bytes,
}

/// What the server told us about itself during INIT/HELLO, plus whatever else it volunteered in
/// the success metadata.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    address: Arc<Address>,
    protocol_version: u8,
    agent: String,
    metadata: BoltMeta,
}

impl ServerInfo {
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn protocol_version(&self) -> u8 {
        self.protocol_version
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn metadata(&self) -> &BoltMeta {
        &self.metadata
    }

    pub fn supports(&self, feature: Feature) -> bool {
        match feature {
            Feature::Bytes => self.agent_at_least(3, 2),
        }
    }

    /// Parses `"Neo4j/3.5.12"`-style agent strings; unparsable agents are treated as not
    /// supporting the feature being asked about.
    fn agent_at_least(&self, major: u32, minor: u32) -> bool {
        let Some(version) = self.agent.split('/').nth(1) else {
            return false;
        };
        let mut parts = version.split('.');
        let Some(Ok(v_major)) = parts.next().map(|s| s.parse::<u32>()) else {
            return false;
        };
        let Some(Ok(v_minor)) = parts.next().map(|s| s.parse::<u32>()) else {
            return false;
        };
        (v_major, v_minor) >= (major, minor)
    }
}

/// A long-lived, authenticated Bolt session. Owns the socket, the write-side [`Outbox`] and
/// read-side [`Inbox`], and the FIFO of [`BoltResponse`] subscribers waiting on replies that
/// haven't arrived yet.
pub struct Connection {
    address: Arc<Address>,
    version: u8,
    socket: Socket<BufTcpStream>,
    raw_socket: TcpStream,
    local_port: u16,
    outbox: Outbox,
    inbox: Inbox,
    responses: VecDeque<BoltResponse>,
    closed: bool,
    defunct: bool,
    creation_timestamp: Instant,
    max_connection_lifetime: Option<Duration>,
    user_agent: String,
    auth: Arc<AuthToken>,
    server_info: ServerInfo,
    supports_bytes: bool,
    meta: AtomicRefCell<BoltMeta>,
    pool: Option<Weak<dyn PoolHandle>>,
}

impl Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .field("version", &self.version)
            .field("closed", &self.closed)
            .field("defunct", &self.defunct)
            .finish()
    }
}

impl Connection {
    /// Opens a socket, negotiates a protocol version, and runs INIT/HELLO. The returned
    /// connection is ready for `run`.
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        let outcome = handshake::open(
            &config.address,
            config.resolver.as_deref(),
            config.connect_timeout,
            config.keep_alive,
            config.tls_config.clone(),
        )?;
        let mut connection = Self {
            address: Arc::clone(&config.address),
            version: outcome.version,
            socket: outcome.socket,
            raw_socket: outcome.raw_socket,
            local_port: outcome.local_port,
            outbox: Outbox::new(),
            inbox: Inbox::new(),
            responses: VecDeque::new(),
            closed: false,
            defunct: false,
            creation_timestamp: Instant::now(),
            max_connection_lifetime: None,
            user_agent: config.user_agent.clone(),
            auth: Arc::clone(&config.auth),
            server_info: ServerInfo {
                address: Arc::clone(&config.address),
                protocol_version: outcome.version,
                agent: String::new(),
                metadata: BoltMeta::new(),
            },
            supports_bytes: false,
            meta: AtomicRefCell::new(BoltMeta::new()),
            pool: None,
        };
        connection.initialize()?;
        Ok(connection)
    }

    pub(crate) fn attach_pool(&mut self, pool: Weak<dyn PoolHandle>) {
        self.pool = Some(pool);
    }

    pub(crate) fn set_max_connection_lifetime(&mut self, lifetime: Option<Duration>) {
        self.max_connection_lifetime = lifetime;
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    pub fn protocol_version(&self) -> u8 {
        self.version
    }

    pub fn closed(&self) -> bool {
        self.closed
    }

    pub fn defunct(&self) -> bool {
        self.defunct
    }

    /// Whether this connection has outlived its pool's `max_connection_lifetime`.
    pub(crate) fn timed_out(&self) -> bool {
        match self.max_connection_lifetime {
            None => false,
            Some(lifetime) => self.creation_timestamp.elapsed() >= lifetime,
        }
    }

    fn initialize(&mut self) -> Result<()> {
        match self.version {
            1 | 2 => self.init(),
            3 => self.hello(),
            v => Err(Neo4jError::protocol_error(format!(
                "no handshake procedure for negotiated bolt version {v}"
            ))),
        }
    }

    fn init(&mut self) -> Result<()> {
        let user_agent = self.user_agent.clone();
        let auth = Arc::clone(&self.auth);
        {
            let mut s = PackStreamSerializerImpl::new(&mut self.outbox);
            s.write_struct_header(INIT, 2)?;
            s.write_string(&user_agent)?;
            s.write_dict(auth.data())?;
        }
        self.outbox.chunk();
        self.outbox.chunk();
        bolt_debug!(self, "C: INIT {user_agent:?} {{...}}");
        self.finish_handshake_message()
    }

    fn hello(&mut self) -> Result<()> {
        let mut headers: HashMap<String, ValueSend> = self.auth.data().clone();
        headers.insert(
            "user_agent".into(),
            ValueSend::String(self.user_agent.clone()),
        );
        {
            let mut s = PackStreamSerializerImpl::new(&mut self.outbox);
            s.write_struct_header(HELLO, 1)?;
            s.write_dict(&headers)?;
        }
        self.outbox.chunk();
        self.outbox.chunk();
        bolt_debug!(self, "C: HELLO {{...}}");
        self.finish_handshake_message()
    }

    fn finish_handshake_message(&mut self) -> Result<()> {
        let meta_slot: Arc<parking_lot::Mutex<Option<BoltMeta>>> =
            Arc::new(parking_lot::Mutex::new(None));
        let meta_slot2 = Arc::clone(&meta_slot);
        let callbacks = ResponseCallbacks::new().with_on_success(move |meta| {
            *meta_slot2.lock() = Some(meta);
            Ok(())
        });
        let response = BoltResponse::new(ResponseMessage::Init, ResponseVariant::Init, callbacks);
        self.responses.push_back(response);
        self.send_all()?;
        self.fetch_all()?;
        let meta = Arc::try_unwrap(meta_slot)
            .expect("no other reference survives fetch_all")
            .into_inner()
            .ok_or_else(|| Neo4jError::protocol_error("server never replied to INIT/HELLO"))?;
        if let Some(ValueReceive::String(agent)) = meta.get("server") {
            self.server_info.agent = agent.clone();
        }
        self.server_info.metadata = meta.clone();
        *self.meta.borrow_mut() = meta;
        self.supports_bytes = self.server_info.supports(Feature::Bytes);
        Ok(())
    }

    /// Sends a Cypher statement. `parameters`, when given, must be a [`ValueSend::Map`]. On
    /// protocol 1/2, `extra` must be left at its defaults: there is nowhere on the wire to put
    /// bookmarks/timeout/metadata/mode fields for a plain `RUN`.
    pub fn run(
        &mut self,
        query: &str,
        parameters: Option<&ValueSend>,
        extra: RunParameters,
    ) -> Result<()> {
        if self.version < 3 && extra.has_extra_fields() {
            return Err(Neo4jError::InvalidConfig {
                message: format!(
                    "bookmarks/tx_timeout/tx_metadata/mode on RUN require protocol >= 3, \
                     negotiated {}",
                    self.version
                ),
            });
        }
        if let Some(parameters) = parameters {
            if !self.supports_bytes && contains_bytes(parameters) {
                return Err(Neo4jError::InvalidConfig {
                    message: "server does not support raw byte parameters".into(),
                });
            }
        }
        let variant = if query.eq_ignore_ascii_case("COMMIT") {
            ResponseVariant::Commit
        } else {
            ResponseVariant::Plain
        };
        let response = BoltResponse::new(ResponseMessage::Run, variant, extra.callbacks);
        let run_extra = RunExtra {
            bookmarks: extra.bookmarks,
            tx_timeout: extra.tx_timeout,
            tx_metadata: extra.tx_metadata,
            mode: extra.mode,
            bookmark: None,
        };
        self.append_run(query, parameters, &run_extra, response)?;
        bolt_debug!(self, "C: RUN {query:?} ...");
        Ok(())
    }

    pub fn pull_all(&mut self, extra: PullParameters) -> Result<()> {
        self.append_message(PULL_ALL, 0, |_| Ok(()))?;
        self.responses.push_back(BoltResponse::new(
            ResponseMessage::Pull,
            ResponseVariant::Plain,
            extra.callbacks,
        ));
        bolt_debug!(self, "C: PULL_ALL");
        Ok(())
    }

    pub fn discard_all(&mut self, extra: DiscardParameters) -> Result<()> {
        self.append_message(DISCARD_ALL, 0, |_| Ok(()))?;
        self.responses.push_back(BoltResponse::new(
            ResponseMessage::Discard,
            ResponseVariant::Plain,
            extra.callbacks,
        ));
        bolt_debug!(self, "C: DISCARD_ALL");
        Ok(())
    }

    pub fn begin(&mut self, bookmarks: &[String], extra: BeginParameters) -> Result<()> {
        bolt_debug!(self, "C: BEGIN ...");
        match self.version {
            3 => {
                let run_extra = RunExtra {
                    bookmarks: extra.bookmarks,
                    tx_timeout: extra.tx_timeout,
                    tx_metadata: extra.tx_metadata,
                    mode: extra.mode,
                    bookmark: None,
                };
                let response = BoltResponse::new(
                    ResponseMessage::Begin,
                    ResponseVariant::Plain,
                    extra.callbacks,
                );
                self.append_struct_with_extra(BEGIN, 1, &run_extra, response)
            }
            1 | 2 => {
                let run_extra = RunExtra {
                    bookmarks: extra.bookmarks,
                    tx_timeout: None,
                    tx_metadata: None,
                    mode: None,
                    bookmark: last_bookmark(bookmarks),
                };
                let (response, shared) = BoltResponse::new_shared(
                    ResponseMessage::Begin,
                    ResponseVariant::Plain,
                    extra.callbacks,
                );
                self.append_run("BEGIN", None, &run_extra, response)?;
                self.append_message(DISCARD_ALL, 0, |_| Ok(()))?;
                self.responses.push_back(BoltResponse::from_shared(
                    ResponseMessage::Discard,
                    ResponseVariant::Plain,
                    shared,
                ));
                Ok(())
            }
            v => Err(Neo4jError::protocol_error(format!(
                "no BEGIN encoding for bolt version {v}"
            ))),
        }
    }

    pub fn commit(&mut self, extra: CommitParameters) -> Result<()> {
        bolt_debug!(self, "C: COMMIT");
        match self.version {
            3 => {
                let response = BoltResponse::new(
                    ResponseMessage::Commit,
                    ResponseVariant::Commit,
                    extra.callbacks,
                );
                self.append_message(COMMIT, 0, |_| Ok(()))?;
                self.responses.push_back(response);
                Ok(())
            }
            1 | 2 => {
                let (response, shared) = BoltResponse::new_shared(
                    ResponseMessage::Commit,
                    ResponseVariant::Commit,
                    extra.callbacks,
                );
                self.append_run("COMMIT", None, &RunExtra::default(), response)?;
                self.append_message(DISCARD_ALL, 0, |_| Ok(()))?;
                self.responses.push_back(BoltResponse::from_shared(
                    ResponseMessage::Discard,
                    ResponseVariant::Commit,
                    shared,
                ));
                Ok(())
            }
            v => Err(Neo4jError::protocol_error(format!(
                "no COMMIT encoding for bolt version {v}"
            ))),
        }
    }

    pub fn rollback(&mut self, extra: RollbackParameters) -> Result<()> {
        bolt_debug!(self, "C: ROLLBACK");
        match self.version {
            3 => {
                let response = BoltResponse::new(
                    ResponseMessage::Rollback,
                    ResponseVariant::Plain,
                    extra.callbacks,
                );
                self.append_message(ROLLBACK, 0, |_| Ok(()))?;
                self.responses.push_back(response);
                Ok(())
            }
            1 | 2 => {
                let (response, shared) = BoltResponse::new_shared(
                    ResponseMessage::Rollback,
                    ResponseVariant::Plain,
                    extra.callbacks,
                );
                self.append_run("ROLLBACK", None, &RunExtra::default(), response)?;
                self.append_message(DISCARD_ALL, 0, |_| Ok(()))?;
                self.responses.push_back(BoltResponse::from_shared(
                    ResponseMessage::Discard,
                    ResponseVariant::Plain,
                    shared,
                ));
                Ok(())
            }
            v => Err(Neo4jError::protocol_error(format!(
                "no ROLLBACK encoding for bolt version {v}"
            ))),
        }
    }

    /// Sent and drained synchronously: RESET must clear the wire before anything else is queued.
    pub fn reset(&mut self) -> Result<()> {
        bolt_debug!(self, "C: RESET");
        self.append_message(RESET, 0, |_| Ok(()))?;
        self.responses.push_back(BoltResponse::new(
            ResponseMessage::Reset,
            ResponseVariant::Reset,
            ResponseCallbacks::new(),
        ));
        self.sync()?;
        Ok(())
    }

    /// Whether the response queue has unfinished business: callers returning a connection to the
    /// pool use this to decide whether a [`Self::reset`] is needed first.
    pub fn needs_reset(&self) -> bool {
        !self.responses.is_empty()
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        bolt_debug!(self, "C: <CLOSE>");
        if self.version >= 3
            && !self.defunct
            && self.append_message(GOODBYE, 0, |_| Ok(())).is_ok()
        {
            let _ = self.send_all();
        }
        self.closed = true;
        self.shutdown_socket();
    }

    fn shutdown_socket(&mut self) {
        let _ = self.raw_socket.shutdown(Shutdown::Both);
    }

    pub fn send_all(&mut self) -> Result<()> {
        if self.outbox.view().is_empty() {
            return Ok(());
        }
        if self.closed || self.defunct {
            return Err(Neo4jError::disconnect("connection is closed"));
        }
        match self.socket.write_all(self.outbox.view()) {
            Ok(()) => {
                self.outbox.clear();
                Ok(())
            }
            Err(err) => Err(self.set_defunct(Neo4jError::write_error(err))),
        }
    }

    pub fn fetch_message(&mut self) -> Result<(usize, usize)> {
        if self.responses.is_empty() {
            return Ok((0, 0));
        }
        if self.closed || self.defunct {
            return Err(Neo4jError::disconnect("connection is closed"));
        }
        let message = match self.inbox.receive(&mut self.socket) {
            Ok(message) => message,
            Err(err) => return Err(self.set_defunct(err)),
        };
        match self.dispatch(message) {
            Ok(counts) => Ok(counts),
            // A handler (on_success/on_record/on_ignored/on_failure) surfaced an ordinary
            // protocol-level outcome, e.g. a hydrated CypherError or AuthError. The wire exchange
            // itself completed fine, so the connection stays open and usable.
            Err(DispatchError::Handled(err)) => Err(err),
            // An I/O failure or a genuine protocol violation: the connection can't be trusted.
            Err(DispatchError::Fatal(err)) => Err(self.set_defunct(err)),
        }
    }

    pub fn fetch_all(&mut self) -> Result<(usize, usize)> {
        let mut records = 0;
        let mut summaries = 0;
        while !self.responses.is_empty() {
            let (r, s) = self.fetch_message()?;
            records += r;
            summaries += s;
        }
        Ok((records, summaries))
    }

    pub fn sync(&mut self) -> Result<(usize, usize)> {
        self.send_all()?;
        self.fetch_all()
    }

    fn dispatch(&mut self, message: InboxMessage) -> Result<(usize, usize), DispatchError> {
        match message {
            InboxMessage::Record(fields) => {
                let response = self
                    .responses
                    .front_mut()
                    .expect("checked non-empty by caller");
                response
                    .callbacks
                    .lock()
                    .unwrap()
                    .on_record(ValueReceive::List(fields))
                    .map_err(DispatchError::Handled)?;
                Ok((1, 0))
            }
            InboxMessage::Summary { signature, meta } => {
                let response = self
                    .responses
                    .pop_front()
                    .expect("checked non-empty by caller");
                match signature {
                    SUCCESS => {
                        response
                            .callbacks
                            .lock()
                            .unwrap()
                            .on_success(ValueReceive::Map(meta))
                            .map_err(DispatchError::Handled)?;
                    }
                    IGNORED => {
                        response
                            .callbacks
                            .lock()
                            .unwrap()
                            .on_ignored()
                            .map_err(DispatchError::Handled)?;
                    }
                    FAILURE => {
                        if response.variant == ResponseVariant::Reset {
                            // The server rejected our own recovery RESET: the protocol itself is
                            // broken, not just this one request.
                            response
                                .callbacks
                                .lock()
                                .unwrap()
                                .on_failure(ValueReceive::Map(meta))
                                .map_err(DispatchError::Fatal)?;
                        } else {
                            self.send_reset_for_failure()?;
                            response
                                .callbacks
                                .lock()
                                .unwrap()
                                .on_failure(ValueReceive::Map(meta))
                                .map_err(DispatchError::Handled)?;
                        }
                    }
                    other => {
                        return Err(DispatchError::Fatal(Neo4jError::protocol_error(format!(
                            "unexpected summary signature {other:#04x}"
                        ))))
                    }
                }
                Ok((0, 1))
            }
        }
    }

    /// The server auto-IGNOREs every request still queued behind a FAILURE until it sees a RESET;
    /// appending one here and draining the queue puts the connection back into a usable state
    /// before the original failure is surfaced to its caller.
    fn send_reset_for_failure(&mut self) -> Result<()> {
        self.append_message(RESET, 0, |_| Ok(()))?;
        self.responses.push_back(BoltResponse::new(
            ResponseMessage::Reset,
            ResponseVariant::Reset,
            ResponseCallbacks::new(),
        ));
        self.send_all()?;
        self.fetch_all()?;
        Ok(())
    }

    /// Transitions into the terminal defunct state: the socket is shut down, the owning pool (if
    /// any) is told to deactivate this address, and the triggering error is re-mapped according to
    /// whether a COMMIT was left outstanding.
    fn set_defunct(&mut self, err: Neo4jError) -> Neo4jError {
        if self.defunct {
            return err;
        }
        bolt_debug!(self, "  connection defunct: {err}");
        self.defunct = true;
        self.closed = true;
        self.shutdown_socket();
        if let Some(pool) = self.pool.as_ref().and_then(Weak::upgrade) {
            pool.deactivate(&self.address);
        }
        let had_commit = self.responses.iter().any(BoltResponse::is_commit);
        self.responses.clear();
        if had_commit {
            Neo4jError::IncompleteCommitError {
                message: format!(
                    "connection to {} became defunct with a commit outstanding: {err}",
                    self.address
                ),
            }
        } else {
            match err {
                err @ Neo4jError::ServiceUnavailable { .. } => err,
                err => Neo4jError::ServiceUnavailable {
                    message: format!("connection to {} became defunct: {err}", self.address),
                    source: None,
                },
            }
        }
    }

    fn append_run(
        &mut self,
        query: &str,
        parameters: Option<&ValueSend>,
        extra: &RunExtra,
        response: BoltResponse,
    ) -> Result<()> {
        let has_extra = extra.bookmarks.is_some()
            || extra.tx_timeout.is_some()
            || extra.tx_metadata.is_some()
            || extra.mode.is_some()
            || extra.bookmark.is_some();
        let field_count = if has_extra { 3 } else { 2 };
        {
            let mut s = PackStreamSerializerImpl::new(&mut self.outbox);
            s.write_struct_header(RUN, field_count)?;
            s.write_string(query)?;
            write_parameters(&mut s, parameters)?;
            if has_extra {
                write_extra(&mut s, extra)?;
            }
        }
        self.outbox.chunk();
        self.outbox.chunk();
        self.responses.push_back(response);
        Ok(())
    }

    fn append_struct_with_extra(
        &mut self,
        signature: u8,
        field_count: u8,
        extra: &RunExtra,
        response: BoltResponse,
    ) -> Result<()> {
        {
            let mut s = PackStreamSerializerImpl::new(&mut self.outbox);
            s.write_struct_header(signature, field_count)?;
            write_extra(&mut s, extra)?;
        }
        self.outbox.chunk();
        self.outbox.chunk();
        self.responses.push_back(response);
        Ok(())
    }

    fn append_message(
        &mut self,
        signature: u8,
        field_count: u8,
        write_fields: impl FnOnce(
            &mut PackStreamSerializerImpl<'_, Outbox>,
        ) -> std::result::Result<(), PackStreamSerializeError>,
    ) -> Result<()> {
        {
            let mut s = PackStreamSerializerImpl::new(&mut self.outbox);
            s.write_struct_header(signature, field_count)?;
            write_fields(&mut s)?;
        }
        self.outbox.chunk();
        self.outbox.chunk();
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Default)]
struct RunExtra<'a> {
    bookmarks: Option<&'a [String]>,
    tx_timeout: Option<Duration>,
    tx_metadata: Option<&'a HashMap<String, ValueSend>>,
    mode: Option<&'a str>,
    bookmark: Option<String>,
}

fn write_parameters(
    s: &mut PackStreamSerializerImpl<'_, Outbox>,
    parameters: Option<&ValueSend>,
) -> std::result::Result<(), PackStreamSerializeError> {
    match parameters {
        None => s.write_dict_header(0),
        Some(ValueSend::Map(map)) => s.write_dict(map),
        Some(_) => Err("query parameters must be a Map".into()),
    }
}

fn write_extra(
    s: &mut PackStreamSerializerImpl<'_, Outbox>,
    extra: &RunExtra,
) -> std::result::Result<(), PackStreamSerializeError> {
    let mut size: u64 = 0;
    if extra.bookmarks.is_some() {
        size += 1;
    }
    if extra.tx_timeout.is_some() {
        size += 1;
    }
    if extra.tx_metadata.is_some() {
        size += 1;
    }
    if extra.mode.is_some() {
        size += 1;
    }
    if extra.bookmark.is_some() {
        size += 1;
    }
    s.write_dict_header(size)?;
    if let Some(bookmarks) = extra.bookmarks {
        s.write_string("bookmarks")?;
        s.write_list(bookmarks)?;
    }
    if let Some(bookmark) = &extra.bookmark {
        s.write_string("bookmark")?;
        s.write_string(bookmark)?;
    }
    if let Some(tx_timeout) = extra.tx_timeout {
        s.write_string("tx_timeout")?;
        s.write_int(tx_timeout.as_millis() as i64)?;
    }
    if let Some(tx_metadata) = extra.tx_metadata {
        s.write_string("tx_metadata")?;
        s.write_dict(tx_metadata)?;
    }
    if let Some(mode) = extra.mode {
        s.write_string("mode")?;
        s.write_string(mode)?;
    }
    Ok(())
}

/// The legacy (pre-3) single `bookmark` field: the bookmark whose integer suffix (the digits after
/// the last `:`) is largest.
fn last_bookmark(bookmarks: &[String]) -> Option<String> {
    bookmarks
        .iter()
        .filter_map(|b| {
            let suffix = b.rsplit(':').next().unwrap_or(b.as_str());
            suffix.parse::<i64>().ok().map(|n| (n, b))
        })
        .max_by_key(|(n, _)| *n)
        .map(|(_, b)| b.clone())
}

fn contains_bytes(value: &ValueSend) -> bool {
    match value {
        ValueSend::Bytes(_) => true,
        ValueSend::List(values) => values.iter().any(contains_bytes),
        ValueSend::Map(values) => values.values().any(contains_bytes),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_bookmark_picks_max_integer_suffix() {
        let bookmarks = vec![
            "neo4j-bookmark:v1:5".to_string(),
            "neo4j-bookmark:v1:42".to_string(),
            "neo4j-bookmark:v1:7".to_string(),
        ];
        assert_eq!(
            last_bookmark(&bookmarks),
            Some("neo4j-bookmark:v1:42".to_string())
        );
    }

    #[test]
    fn last_bookmark_ignores_unparsable_entries() {
        let bookmarks = vec!["garbage".to_string(), "neo4j-bookmark:v1:3".to_string()];
        assert_eq!(
            last_bookmark(&bookmarks),
            Some("neo4j-bookmark:v1:3".to_string())
        );
    }

    #[test]
    fn last_bookmark_of_empty_slice_is_none() {
        assert_eq!(last_bookmark(&[]), None);
    }

    #[test]
    fn contains_bytes_detects_nested_bytes() {
        let mut map = HashMap::new();
        map.insert(
            "k".to_string(),
            ValueSend::List(vec![ValueSend::Bytes(vec![1])]),
        );
        assert!(contains_bytes(&ValueSend::Map(map)));
        assert!(!contains_bytes(&ValueSend::Integer(1)));
    }
}
