// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The shared authenticated HTTP client.
//!
//! Every domain client holds a clone of one [`AuthenticatedClient`]. Each
//! attempt of a request builds its headers from the credential store at
//! send time and runs through the [`RequestExecutor`], so an expired access
//! token is refreshed and the request retried once without the caller
//! noticing.
//!
//! ## Response classification
//!
//! | Response | Result |
//! |----------|--------|
//! | 2xx | JSON body (empty body decodes as `null`) |
//! | 401 | `ClientError::Unauthorized` |
//! | other, message mentions an invalid/expired token | `ClientError::Unauthorized` |
//! | other | `ClientError::Status` |

use std::future::Future;
use std::sync::Arc;

use reqwest::multipart::Form;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::executor::RequestExecutor;
use super::headers::{build_auth_headers, build_headers};
use crate::error::{ClientError, ClientResult};
use crate::state::SessionState;

/// Base URL plus the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Endpoint {
    http: reqwest::Client,
    base_url: Arc<str>,
}

impl Endpoint {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a service path (`/leads/...`).
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Decode a response, mapping non-2xx statuses to [`ClientError`].
    pub async fn read_json<T: DeserializeOwned>(
        response: Response,
        authenticated: bool,
    ) -> ClientResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = ClientError::from_response(status, &body, authenticated);
            debug!(status = status.as_u16(), error = %err, "Request rejected");
            return Err(err);
        }

        if body.trim().is_empty() {
            return Ok(serde_json::from_value(serde_json::Value::Null)?);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[derive(Clone)]
pub struct AuthenticatedClient {
    endpoint: Endpoint,
    state: Arc<SessionState>,
    executor: RequestExecutor,
}

impl AuthenticatedClient {
    pub fn new(endpoint: Endpoint, state: Arc<SessionState>, executor: RequestExecutor) -> Self {
        Self {
            endpoint,
            state,
            executor,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(Method::GET, path, |request| request).await
    }

    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> ClientResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send(Method::GET, path, |request| request.query(query))
            .await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::POST, path, |request| request.json(body))
            .await
    }

    /// POST without a body.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(Method::POST, path, |request| request).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::PUT, path, |request| request.json(body))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(Method::DELETE, path, |request| request).await
    }

    /// Multipart POST. `form` is called once per attempt since a form body
    /// is consumed by sending it.
    pub async fn upload<T, F>(&self, path: &str, form: F) -> ClientResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> Form,
    {
        let url = self.endpoint.url(path);
        self.executor
            .execute(|| {
                let request = build_auth_headers(self.state.credentials()).map(|headers| {
                    self.endpoint
                        .http()
                        .post(&url)
                        .headers(headers)
                        .multipart(form())
                });
                dispatch(request)
            })
            .await
    }

    async fn send<T, F>(&self, method: Method, path: &str, customize: F) -> ClientResult<T>
    where
        T: DeserializeOwned,
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let url = self.endpoint.url(path);
        self.executor
            .execute(|| {
                let request = build_headers(self.state.credentials()).map(|headers| {
                    customize(
                        self.endpoint
                            .http()
                            .request(method.clone(), &url)
                            .headers(headers),
                    )
                });
                dispatch(request)
            })
            .await
    }
}

fn dispatch<T: DeserializeOwned>(
    request: ClientResult<RequestBuilder>,
) -> impl Future<Output = ClientResult<T>> {
    async move {
        let response = request?.send().await?;
        Endpoint::read_json(response, true).await
    }
}

impl std::fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("base_url", &self.endpoint.base_url())
            .finish_non_exhaustive()
    }
}
