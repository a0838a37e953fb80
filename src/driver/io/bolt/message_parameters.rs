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

//! Parameter bundles for the messages [`super::Connection`] knows how to send. Kept as plain
//! structs rather than long argument lists, since most of these messages take half a dozen
//! optional fields plus the callbacks that receive their reply.

use std::collections::HashMap;
use std::time::Duration;

use super::response::ResponseCallbacks;
use crate::ValueSend;

/// Extra fields accompanying a `RUN` (on protocol >= 3 these become RUN's `extra` map; on
/// protocol 1/2 they must all be left at their defaults, since plain `RUN` carries none of them).
#[derive(Default)]
pub struct RunParameters<'a> {
    pub(crate) bookmarks: Option<&'a [String]>,
    pub(crate) tx_timeout: Option<Duration>,
    pub(crate) tx_metadata: Option<&'a HashMap<String, ValueSend>>,
    pub(crate) mode: Option<&'a str>,
    pub(crate) callbacks: ResponseCallbacks,
}

impl<'a> RunParameters<'a> {
    pub(crate) fn has_extra_fields(&self) -> bool {
        self.bookmarks.is_some()
            || self.tx_timeout.is_some()
            || self.tx_metadata.is_some()
            || self.mode.is_some()
    }

    pub fn with_bookmarks(mut self, bookmarks: &'a [String]) -> Self {
        self.bookmarks = Some(bookmarks);
        self
    }

    pub fn with_tx_timeout(mut self, timeout: Duration) -> Self {
        self.tx_timeout = Some(timeout);
        self
    }

    pub fn with_tx_metadata(mut self, metadata: &'a HashMap<String, ValueSend>) -> Self {
        self.tx_metadata = Some(metadata);
        self
    }

    pub fn with_mode(mut self, mode: &'a str) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_callbacks(mut self, callbacks: ResponseCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }
}

/// Extra fields for `BEGIN` (protocol 3) or the `RUN "BEGIN"` it is emulated with (protocol 1/2).
#[derive(Default)]
pub struct BeginParameters<'a> {
    pub(crate) bookmarks: Option<&'a [String]>,
    pub(crate) tx_timeout: Option<Duration>,
    pub(crate) tx_metadata: Option<&'a HashMap<String, ValueSend>>,
    pub(crate) mode: Option<&'a str>,
    pub(crate) callbacks: ResponseCallbacks,
}

impl<'a> BeginParameters<'a> {
    pub fn with_bookmarks(mut self, bookmarks: &'a [String]) -> Self {
        self.bookmarks = Some(bookmarks);
        self
    }

    pub fn with_tx_timeout(mut self, timeout: Duration) -> Self {
        self.tx_timeout = Some(timeout);
        self
    }

    pub fn with_tx_metadata(mut self, metadata: &'a HashMap<String, ValueSend>) -> Self {
        self.tx_metadata = Some(metadata);
        self
    }

    pub fn with_mode(mut self, mode: &'a str) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_callbacks(mut self, callbacks: ResponseCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }
}

/// Bundles just the callbacks for messages that carry no fields of their own
/// (`PULL_ALL`/`DISCARD_ALL`/`COMMIT`/`ROLLBACK`/`RESET`).
#[derive(Default)]
pub struct NoParameters {
    pub(crate) callbacks: ResponseCallbacks,
}

impl NoParameters {
    pub fn with_callbacks(mut self, callbacks: ResponseCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }
}

pub type PullParameters = NoParameters;
pub type DiscardParameters = NoParameters;
pub type CommitParameters = NoParameters;
pub type RollbackParameters = NoParameters;
