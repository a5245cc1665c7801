// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Domain clients and the [`CrmClient`] facade that wires them to one
//! session.
//!
//! | Client | Base path |
//! |--------|-----------|
//! | [`LeadsApi`] | `/leads` |
//! | [`CalendarApi`] | `/calendar/api` |
//! | [`FilesApi`] | `/leads/files` |
//! | [`OutreachApi`] | `/outreach/api/v1` |
//!
//! Every client shares the same [`AuthenticatedClient`] and
//! [`IdentityResolver`], so they all see the same credentials, the same
//! in-flight refresh and the same cached user id.

use std::sync::Arc;

use serde_json::Value;

use crate::{
    auth::{
        AuthApi, AuthenticatedClient, Endpoint, IdentityResolver, RequestExecutor,
        SessionController, TokenRefresher,
    },
    config::ClientConfig,
    error::ClientResult,
    state::SessionState,
    storage::{KeyValueStore, SessionDatabase},
};

pub mod calendar;
pub mod files;
pub mod leads;
pub mod outreach;

pub use calendar::CalendarApi;
pub use files::{FilesApi, UploadOptions};
pub use leads::{Lead, LeadQuery, LeadsApi, LeadsPage};
pub use outreach::{MessageQuery, OutreachApi, SendMessage};

/// One session and every client built on it.
#[derive(Clone, Debug)]
pub struct CrmClient {
    state: Arc<SessionState>,
    executor: RequestExecutor,
    client: AuthenticatedClient,
    auth: AuthApi,
    resolver: IdentityResolver,
    controller: SessionController,
    leads: LeadsApi,
    calendar: CalendarApi,
    files: FilesApi,
    outreach: OutreachApi,
}

impl CrmClient {
    /// Open the durable credential store under `config.data_dir` and build
    /// the client on it.
    pub fn open(config: &ClientConfig) -> ClientResult<Self> {
        let database = SessionDatabase::open_in(&config.data_dir)?;
        Self::new(config, Arc::new(database))
    }

    pub fn new(config: &ClientConfig, store: Arc<dyn KeyValueStore>) -> ClientResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_http(builder.build()?, &config.api_base_url, store))
    }

    pub fn with_http(http: reqwest::Client, base_url: &str, store: Arc<dyn KeyValueStore>) -> Self {
        let state = Arc::new(SessionState::new(store));
        let endpoint = Endpoint::new(http, base_url);
        let refresher = TokenRefresher::new(endpoint.clone(), Arc::clone(&state));
        let executor = RequestExecutor::new(Arc::clone(&state), refresher);
        let client = AuthenticatedClient::new(endpoint, Arc::clone(&state), executor.clone());
        let auth = AuthApi::new(client.clone());
        let resolver = IdentityResolver::new(Arc::clone(&state), client.clone());
        let controller = SessionController::new(Arc::clone(&state), auth.clone(), executor.clone());

        Self {
            leads: LeadsApi::new(client.clone(), resolver.clone()),
            calendar: CalendarApi::new(client.clone(), resolver.clone()),
            files: FilesApi::new(client.clone(), resolver.clone()),
            outreach: OutreachApi::new(client.clone(), resolver.clone()),
            state,
            executor,
            client,
            auth,
            resolver,
            controller,
        }
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    pub fn auth(&self) -> &AuthApi {
        &self.auth
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub fn session(&self) -> &SessionController {
        &self.controller
    }

    pub fn leads(&self) -> &LeadsApi {
        &self.leads
    }

    pub fn calendar(&self) -> &CalendarApi {
        &self.calendar
    }

    pub fn files(&self) -> &FilesApi {
        &self.files
    }

    pub fn outreach(&self) -> &OutreachApi {
        &self.outreach
    }
}

/// Copy of a JSON object body with `user_id` set, as the domain services
/// expect on writes. Non-object bodies are returned untouched.
pub(crate) fn with_user_id(body: &Value, user_id: &str) -> Value {
    match body {
        Value::Object(fields) => {
            let mut fields = fields.clone();
            fields.insert("user_id".to_string(), Value::String(user_id.to_string()));
            Value::Object(fields)
        }
        _ => body.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::storage::MemoryStore;

    #[test]
    fn user_id_is_injected_into_objects() {
        let body = with_user_id(&json!({"name": "Acme", "user_id": "spoofed"}), "u-1");
        assert_eq!(body, json!({"name": "Acme", "user_id": "u-1"}));
    }

    #[test]
    fn non_objects_pass_through() {
        assert_eq!(with_user_id(&json!([1, 2]), "u-1"), json!([1, 2]));
    }

    #[test]
    fn clients_share_one_session() {
        let config = ClientConfig::for_base_url("http://127.0.0.1:9");
        let crm = CrmClient::new(&config, Arc::new(MemoryStore::new())).unwrap();

        crm.state().store_tokens("a-1", Some("r-1")).unwrap();

        assert!(crm.session().is_loading());
        assert_eq!(
            crm.client().state().access_token().unwrap().as_deref(),
            Some("a-1")
        );
    }

    #[test]
    fn open_persists_credentials_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ClientConfig::for_base_url("http://127.0.0.1:9");
        config.data_dir = dir.path().to_path_buf();

        {
            let crm = CrmClient::open(&config).unwrap();
            crm.state().store_tokens("a-1", Some("r-1")).unwrap();
        }

        let crm = CrmClient::open(&config).unwrap();
        assert_eq!(crm.state().refresh_token().unwrap().as_deref(), Some("r-1"));
    }
}
