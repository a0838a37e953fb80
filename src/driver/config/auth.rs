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

use std::collections::HashMap;

use crate::ValueSend;

/// A string-keyed map of auth fields sent verbatim as the INIT/HELLO auth dictionary.
///
/// Convenience constructors cover the schemes a server commonly accepts; [`AuthToken::new_custom_auth`]
/// escapes to an arbitrary scheme for anything else.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthToken {
    pub(crate) data: HashMap<String, ValueSend>,
}

impl AuthToken {
    /// No credentials at all (`scheme: "none"`).
    pub fn new_none_auth() -> Self {
        let mut data = HashMap::with_capacity(1);
        data.insert("scheme".into(), ValueSend::String("none".into()));
        Self { data }
    }

    pub fn new_basic_auth(username: impl Into<String>, password: impl Into<String>) -> Self {
        let mut data = HashMap::with_capacity(3);
        data.insert("scheme".into(), ValueSend::String("basic".into()));
        data.insert("principal".into(), ValueSend::String(username.into()));
        data.insert("credentials".into(), ValueSend::String(password.into()));
        Self { data }
    }

    pub fn new_basic_auth_with_realm(
        username: impl Into<String>,
        password: impl Into<String>,
        realm: impl Into<String>,
    ) -> Self {
        let mut token = Self::new_basic_auth(username, password);
        token
            .data
            .insert("realm".into(), ValueSend::String(realm.into()));
        token
    }

    pub fn new_bearer_auth(base64_encoded_token: impl Into<String>) -> Self {
        let mut data = HashMap::with_capacity(2);
        data.insert("scheme".into(), ValueSend::String("bearer".into()));
        data.insert(
            "credentials".into(),
            ValueSend::String(base64_encoded_token.into()),
        );
        Self { data }
    }

    pub fn new_kerberos_auth(base64_encoded_ticket: impl Into<String>) -> Self {
        let mut data = HashMap::with_capacity(3);
        data.insert("scheme".into(), ValueSend::String("kerberos".into()));
        data.insert("principal".into(), ValueSend::String("".into()));
        data.insert(
            "credentials".into(),
            ValueSend::String(base64_encoded_ticket.into()),
        );
        Self { data }
    }

    /// Builds an arbitrary auth dictionary; any argument left `None` (or, for `credentials`/
    /// `realm`, empty) is omitted rather than sent as an empty string.
    pub fn new_custom_auth(
        principal: Option<String>,
        credentials: Option<String>,
        realm: Option<String>,
        scheme: impl Into<String>,
        parameters: Option<HashMap<String, ValueSend>>,
    ) -> Self {
        let mut data = HashMap::new();
        if let Some(principal) = principal {
            data.insert("principal".into(), ValueSend::String(principal));
        }
        if let Some(credentials) = credentials.filter(|c| !c.is_empty()) {
            data.insert("credentials".into(), ValueSend::String(credentials));
        }
        if let Some(realm) = realm.filter(|r| !r.is_empty()) {
            data.insert("realm".into(), ValueSend::String(realm));
        }
        data.insert("scheme".into(), ValueSend::String(scheme.into()));
        if let Some(parameters) = parameters.filter(|p| !p.is_empty()) {
            data.insert("parameters".into(), ValueSend::Map(parameters));
        }
        Self { data }
    }

    pub(crate) fn data(&self) -> &HashMap<String, ValueSend> {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_carries_scheme_principal_credentials() {
        let token = AuthToken::new_basic_auth("neo4j", "pass");
        assert_eq!(
            token.data.get("scheme"),
            Some(&ValueSend::String("basic".into()))
        );
        assert_eq!(
            token.data.get("principal"),
            Some(&ValueSend::String("neo4j".into()))
        );
        assert_eq!(
            token.data.get("credentials"),
            Some(&ValueSend::String("pass".into()))
        );
        assert!(!token.data.contains_key("realm"));
    }

    #[test]
    fn custom_auth_omits_empty_optionals() {
        let token = AuthToken::new_custom_auth(
            Some("principal".into()),
            Some(String::new()),
            None,
            "my_scheme",
            None,
        );
        assert!(!token.data.contains_key("credentials"));
        assert!(!token.data.contains_key("realm"));
        assert!(!token.data.contains_key("parameters"));
        assert_eq!(
            token.data.get("scheme"),
            Some(&ValueSend::String("my_scheme".into()))
        );
    }
}
