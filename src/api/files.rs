// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Lead import files (`/leads/files`).

use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

use crate::{
    auth::{AuthenticatedClient, IdentityResolver},
    error::ClientResult,
};

const BASE: &str = "/leads/files";

/// Parsing hints for spreadsheet and CSV imports.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub sheet_name: Option<String>,
    pub encoding: Option<String>,
    pub delimiter: Option<String>,
}

impl UploadOptions {
    fn query_string(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        let hints = [
            ("sheet_name", &self.sheet_name),
            ("encoding", &self.encoding),
            ("delimiter", &self.delimiter),
        ];
        for (key, value) in hints {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                query.append_pair(key, value);
            }
        }
        query.finish()
    }
}

#[derive(Debug, Serialize)]
struct HistoryQuery {
    limit: u32,
    offset: u32,
}

#[derive(Clone, Debug)]
pub struct FilesApi {
    client: AuthenticatedClient,
    identity: IdentityResolver,
}

impl FilesApi {
    pub fn new(client: AuthenticatedClient, identity: IdentityResolver) -> Self {
        Self { client, identity }
    }

    /// Upload a lead sheet. The file contents are re-sent on retry.
    pub async fn upload(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        options: &UploadOptions,
    ) -> ClientResult<Value> {
        // The upload endpoint takes the user from the bearer token, but an
        // unresolvable identity means the session is unusable anyway.
        self.identity.get_user_id().await?;

        let query = options.query_string();
        let path = if query.is_empty() {
            format!("{BASE}/upload")
        } else {
            format!("{BASE}/upload?{query}")
        };

        self.client
            .upload(&path, || {
                Form::new().part(
                    "file",
                    Part::bytes(contents.clone()).file_name(file_name.to_string()),
                )
            })
            .await
    }

    pub async fn history(&self, limit: u32, offset: u32) -> ClientResult<Value> {
        let user_id = self.identity.get_user_id().await?;
        self.client
            .get_with_query(
                &format!("{BASE}/{user_id}/history"),
                &HistoryQuery { limit, offset },
            )
            .await
    }

    pub async fn delete(&self, file_id: i64) -> ClientResult<Value> {
        let user_id = self.identity.get_user_id().await?;
        self.client
            .delete(&format!("{BASE}/{user_id}/{file_id}"))
            .await
    }
}
