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

use crate::error::ServerError;
use crate::{Neo4jError, Result, ValueReceive};
use core::fmt::{Debug, Formatter};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub(crate) enum ResponseMessage {
    Hello,
    Init,
    Reset,
    Run,
    Discard,
    Pull,
    Begin,
    Commit,
    Rollback,
    Goodbye,
}

/// Distinguishes the three `on_failure` mappings the wire core needs; otherwise all three behave
/// identically.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum ResponseVariant {
    /// Plain response: failure metadata is hydrated into its protocol-mapped error kind.
    Plain,
    /// Init/Hello response: `Neo.ClientError.Security.Unauthorized` becomes `AuthError`, any
    /// other failure becomes `ServiceUnavailable`.
    Init,
    /// Commit response: behaves like [`ResponseVariant::Plain`], but its mere presence in the
    /// response queue is what turns a defunct transition into `IncompleteCommitError`.
    Commit,
    /// RESET response: a FAILURE here always means the protocol is broken, not a Cypher error.
    Reset,
}

#[derive(Debug)]
pub(crate) struct BoltResponse {
    pub(crate) message: ResponseMessage,
    pub(crate) variant: ResponseVariant,
    pub(crate) callbacks: Arc<Mutex<ResponseCallbacks>>,
    pub(crate) complete: bool,
}

impl BoltResponse {
    /// Builds a queued response. `callbacks`' `on_success`/`on_record`/`on_ignored`/`on_summary`
    /// hooks are whatever the caller supplied; `on_failure` is always the variant's protocol
    /// mapping, since the RESET-before-surfacing and error-kind choice aren't per-call options.
    pub(crate) fn new(
        message: ResponseMessage,
        variant: ResponseVariant,
        callbacks: ResponseCallbacks,
    ) -> Self {
        let (response, _) = Self::new_shared(message, variant, callbacks);
        response
    }

    /// Like [`Self::new`], but also returns a clone of the callback handle so a second response
    /// (e.g. the `DISCARD_ALL` that tags along with a legacy `RUN "BEGIN"`) can dispatch to the
    /// very same callbacks.
    pub(crate) fn new_shared(
        message: ResponseMessage,
        variant: ResponseVariant,
        mut callbacks: ResponseCallbacks,
    ) -> (Self, Arc<Mutex<ResponseCallbacks>>) {
        callbacks.on_failure_cb = Some(Self::default_on_failure(variant));
        let callbacks = Arc::new(Mutex::new(callbacks));
        (
            Self {
                message,
                variant,
                callbacks: Arc::clone(&callbacks),
                complete: false,
            },
            callbacks,
        )
    }

    pub(crate) fn from_shared(
        message: ResponseMessage,
        variant: ResponseVariant,
        callbacks: Arc<Mutex<ResponseCallbacks>>,
    ) -> Self {
        Self {
            message,
            variant,
            callbacks,
            complete: false,
        }
    }

    fn default_on_failure(
        variant: ResponseVariant,
    ) -> Box<dyn FnMut(BoltMeta) -> Result<()> + Send + Sync> {
        match variant {
            ResponseVariant::Init => Box::new(|meta| {
                let err = Neo4jError::from_server_meta(meta);
                Err(match err {
                    Neo4jError::AuthError { .. } => err,
                    _ => Neo4jError::ServiceUnavailable {
                        message: err.to_string(),
                        source: None,
                    },
                })
            }),
            ResponseVariant::Plain | ResponseVariant::Commit => {
                Box::new(|meta| Err(Neo4jError::from_server_meta(meta)))
            }
            ResponseVariant::Reset => Box::new(|meta| {
                Err(Neo4jError::protocol_error(format!(
                    "server rejected RESET: {}",
                    ServerError::from_meta(meta)
                )))
            }),
        }
    }

    pub(crate) fn is_commit(&self) -> bool {
        self.variant == ResponseVariant::Commit
    }
}

type OptBox<T> = Option<Box<T>>;
pub(crate) type BoltMeta = HashMap<String, ValueReceive>;
pub(crate) type BoltRecordFields = Vec<ValueReceive>;

pub(crate) struct ResponseCallbacks {
    on_success_cb: OptBox<dyn FnMut(BoltMeta) -> Result<()> + Send + Sync>,
    on_failure_cb: OptBox<dyn FnMut(BoltMeta) -> Result<()> + Send + Sync>,
    on_ignored_cb: OptBox<dyn FnMut() -> Result<()> + Send + Sync>,
    on_record_cb: OptBox<dyn FnMut(BoltRecordFields) -> Result<()> + Send + Sync>,
    on_summary_cb: OptBox<dyn FnMut() + Send + Sync>,
}

impl Default for ResponseCallbacks {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCallbacks {
    pub(crate) fn new() -> Self {
        Self {
            on_success_cb: None,
            on_failure_cb: None,
            on_ignored_cb: None,
            on_record_cb: None,
            on_summary_cb: None,
        }
    }

    pub(crate) fn with_on_success<F: FnMut(BoltMeta) -> Result<()> + Send + Sync + 'static>(
        mut self,
        cb: F,
    ) -> Self {
        self.on_success_cb = Some(Box::new(cb));
        self
    }

    pub(crate) fn with_on_success_pre_hook<
        F: FnMut(&BoltMeta) -> Result<()> + Send + Sync + 'static,
    >(
        mut self,
        mut pre_hook: F,
    ) -> Self {
        match self.on_success_cb {
            None => self.on_success_cb = Some(Box::new(move |meta| pre_hook(&meta))),
            Some(mut cb) => {
                self.on_success_cb = Some(Box::new(move |meta| {
                    pre_hook(&meta)?;
                    cb(meta)
                }))
            }
        };
        self
    }

    pub(crate) fn with_on_failure<F: FnMut(BoltMeta) -> Result<()> + Send + Sync + 'static>(
        mut self,
        cb: F,
    ) -> Self {
        self.on_failure_cb = Some(Box::new(cb));
        self
    }

    pub(crate) fn with_on_ignored<F: FnMut() -> Result<()> + Send + Sync + 'static>(
        mut self,
        cb: F,
    ) -> Self {
        self.on_ignored_cb = Some(Box::new(cb));
        self
    }

    pub(crate) fn with_on_record<
        F: FnMut(BoltRecordFields) -> Result<()> + Send + Sync + 'static,
    >(
        mut self,
        cb: F,
    ) -> Self {
        self.on_record_cb = Some(Box::new(cb));
        self
    }

    pub(crate) fn with_on_summary<F: FnMut() + Send + Sync + 'static>(mut self, cb: F) -> Self {
        self.on_summary_cb = Some(Box::new(cb));
        self
    }

    pub(crate) fn on_success(&mut self, meta: ValueReceive) -> Result<()> {
        let res = match meta {
            ValueReceive::Map(meta) => match self.on_success_cb.as_mut() {
                None => Ok(()),
                Some(cb) => cb(meta),
            },
            _ => Err(Neo4jError::protocol_error(
                "onSuccess meta was not a Dictionary",
            )),
        };
        self.on_summary();
        res
    }

    pub(crate) fn on_failure(&mut self, meta: ValueReceive) -> Result<()> {
        let res = match meta {
            ValueReceive::Map(meta) => match self.on_failure_cb.as_mut() {
                None => Ok(()),
                Some(cb) => cb(meta),
            },
            _ => Err(Neo4jError::protocol_error(
                "onFailure meta was not a Dictionary",
            )),
        };
        self.on_summary();
        res
    }

    pub(crate) fn on_ignored(&mut self) -> Result<()> {
        let res = self.on_ignored_cb.as_mut().map(|cb| cb()).unwrap_or(Ok(()));
        self.on_summary();
        res
    }

    pub(crate) fn on_record(&mut self, data: ValueReceive) -> Result<()> {
        match data {
            ValueReceive::List(values) => match self.on_record_cb.as_mut() {
                None => Ok(()),
                Some(cb) => cb(values),
            },
            _ => Err(Neo4jError::protocol_error("onRecord data was not a List")),
        }
    }

    fn on_summary(&mut self) {
        if let Some(cb) = self.on_summary_cb.as_mut() {
            cb()
        }
    }
}

impl Debug for ResponseCallbacks {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResponseCallbacks")
            .field("on_success", &self.on_success_cb.as_ref().map(|_| "..."))
            .field("on_failure", &self.on_failure_cb.as_ref().map(|_| "..."))
            .field("on_ignored", &self.on_ignored_cb.as_ref().map(|_| "..."))
            .field("on_record", &self.on_record_cb.as_ref().map(|_| "..."))
            .field("on_summary", &self.on_summary_cb.as_ref().map(|_| "..."))
            .finish()
    }
}
