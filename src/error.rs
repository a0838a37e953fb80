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

use std::fmt::{Display, Formatter};
use std::io;
use thiserror::Error;

use crate::driver::io::bolt::BoltMeta;
use crate::ValueReceive;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Neo4jError {
    /// The transport could not be established or broke while in use (connection refused, reset,
    /// timed out, or the server closed the socket).
    #[error("service unavailable: {message}")]
    ServiceUnavailable {
        message: String,
        source: Option<io::Error>,
    },
    /// The wire did not follow the protocol (bad handshake, unexpected signature, malformed
    /// chunk framing, ...). The connection that raised it is no longer usable.
    #[error(
        "the driver encountered a protocol violation, \
        this is likely a bug in the driver or the server: {message}"
    )]
    ProtocolError { message: String },
    /// TLS could not be established with the server.
    #[error("security error: {message}")]
    SecurityError { message: String },
    /// Authentication failed during INIT/HELLO.
    #[error("authentication failed: {message}")]
    AuthError { message: String },
    /// The server raised a FAILURE during normal operation.
    #[error("{0}")]
    CypherError(ServerError),
    /// Raised locally, e.g. when a connection could not be acquired from the pool in time.
    #[error("client error: {message}")]
    ClientError { message: String },
    /// A connection became defunct while a COMMIT was outstanding; whether it reached durable
    /// storage is unknown.
    #[error("incomplete commit: {message}")]
    IncompleteCommitError { message: String },
    /// The server reported it can no longer serve this connection (e.g. it is shutting down).
    #[error("connection expired: {message}")]
    ConnectionExpired { message: String },
    #[error("database unavailable: {0}")]
    DatabaseUnavailableError(ServerError),
    #[error("not a leader: {0}")]
    NotALeaderError(ServerError),
    #[error("forbidden on read-only database: {0}")]
    ForbiddenOnReadOnlyDatabaseError(ServerError),
    /// A value, configuration option, or argument was invalid independent of any connection to a
    /// server (e.g. an unserializable parameter value, an unsupported feature for the negotiated
    /// protocol version, or a malformed auth token).
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl Neo4jError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Neo4jError::CypherError(err) => err.is_retryable(),
            Neo4jError::ServiceUnavailable { .. }
            | Neo4jError::ConnectionExpired { .. }
            | Neo4jError::DatabaseUnavailableError(_) => true,
            _ => false,
        }
    }

    pub(crate) fn read_err(err: io::Error) -> Self {
        Self::ServiceUnavailable {
            message: format!("failed to read: {err}"),
            source: Some(err),
        }
    }

    pub(crate) fn wrap_read<T>(res: io::Result<T>) -> crate::Result<T> {
        res.map_err(Self::read_err)
    }

    pub(crate) fn write_error(err: io::Error) -> Neo4jError {
        Self::ServiceUnavailable {
            message: format!("failed to write: {err}"),
            source: Some(err),
        }
    }

    pub(crate) fn wrap_write<T>(res: io::Result<T>) -> crate::Result<T> {
        res.map_err(Self::write_error)
    }

    pub(crate) fn connect_error(err: io::Error) -> Neo4jError {
        Self::ServiceUnavailable {
            message: format!("failed to open connection: {err}"),
            source: Some(err),
        }
    }

    pub(crate) fn wrap_connect<T>(res: io::Result<T>) -> crate::Result<T> {
        res.map_err(Self::connect_error)
    }

    pub(crate) fn disconnect<S: Into<String>>(message: S) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn protocol_error<S: Into<String>>(message: S) -> Self {
        Self::ProtocolError {
            message: message.into(),
        }
    }

    /// Maps a FAILURE's `code` to the error kind the driver surfaces to the caller, per the
    /// classification embedded in the Neo4j status code (`Neo.<Classification>.<Category>.<Title>`).
    pub(crate) fn from_server_meta(meta: BoltMeta) -> Self {
        let err = ServerError::from_meta(meta);
        match err.code() {
            "Neo.ClientError.Security.Unauthorized" => Self::AuthError {
                message: err.message().to_string(),
            },
            "Neo.ClientError.Cluster.NotALeader" => Self::NotALeaderError(err),
            "Neo.ClientError.General.ForbiddenOnReadOnlyDatabase" => {
                Self::ForbiddenOnReadOnlyDatabaseError(err)
            }
            "Neo.TransientError.General.DatabaseUnavailable" => Self::DatabaseUnavailableError(err),
            code if code.starts_with("Neo.ClientError") || code.starts_with("Neo.DatabaseError") => {
                Self::CypherError(err)
            }
            _ => Self::CypherError(err),
        }
    }
}

#[derive(Debug)]
pub struct ServerError {
    code: String,
    message: String,
}

impl ServerError {
    pub fn new(code: String, message: String) -> Self {
        Self { code, message }
    }

    pub fn from_meta(mut meta: BoltMeta) -> Self {
        let code = match meta.remove("code") {
            Some(ValueReceive::String(code)) => code,
            _ => "Neo.DatabaseError.General.UnknownError".into(),
        };
        let message = match meta.remove("message") {
            Some(ValueReceive::String(message)) => message,
            _ => "An unknown error occurred.".into(),
        };
        Self { code, message }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn classification(&self) -> &str {
        self.code.split('.').nth(1).unwrap_or("")
    }

    pub fn category(&self) -> &str {
        self.code.split('.').nth(2).unwrap_or("")
    }

    pub fn title(&self) -> &str {
        self.code.split('.').nth(3).unwrap_or("")
    }

    fn is_retryable(&self) -> bool {
        self.classification() == "TransientError"
    }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "server error {}: {}", self.code, self.message)
    }
}

pub type Result<T> = std::result::Result<T, Neo4jError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn meta(code: &str, message: &str) -> BoltMeta {
        let mut m = HashMap::new();
        m.insert("code".to_string(), ValueReceive::String(code.into()));
        m.insert("message".to_string(), ValueReceive::String(message.into()));
        m
    }

    #[rstest]
    #[case("Neo.ClientError.Security.Unauthorized", true)]
    #[case("Neo.ClientError.Statement.SyntaxError", false)]
    fn classifies_auth_errors(#[case] code: &str, #[case] is_auth: bool) {
        let err = Neo4jError::from_server_meta(meta(code, "boom"));
        assert_eq!(matches!(err, Neo4jError::AuthError { .. }), is_auth);
    }

    #[test]
    fn classifies_not_a_leader() {
        let err = Neo4jError::from_server_meta(meta("Neo.ClientError.Cluster.NotALeader", "x"));
        assert!(matches!(err, Neo4jError::NotALeaderError(_)));
    }

    #[test]
    fn server_error_splits_status_code() {
        let err = ServerError::new(
            "Neo.ClientError.Statement.SyntaxError".into(),
            "bad cypher".into(),
        );
        assert_eq!(err.classification(), "ClientError");
        assert_eq!(err.category(), "Statement");
        assert_eq!(err.title(), "SyntaxError");
    }

    #[test]
    fn transient_errors_are_retryable() {
        let err = ServerError::new(
            "Neo.TransientError.Transaction.DeadlockDetected".into(),
            "x".into(),
        );
        assert!(err.is_retryable());
    }
}
