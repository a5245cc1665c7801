// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outreach service client (`/outreach/api/v1`): campaigns and messages.
//!
//! This service reports errors as `{"error": {"message": ...}}` rather than
//! `{"detail": ...}`; both shapes are understood by the shared client.

use serde::Serialize;
use serde_json::Value;

use crate::{
    auth::{AuthenticatedClient, IdentityResolver},
    error::ClientResult,
};

const BASE: &str = "/outreach/api/v1";

/// Filters for [`OutreachApi::messages`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct MessageQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessage {
    pub lead_ids: Vec<i64>,
    pub platform_id: i64,
    pub message_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<i64>,
}

#[derive(Serialize)]
struct SendMessageBody<'a> {
    #[serde(flatten)]
    message: &'a SendMessage,
    user_id: &'a str,
}

#[derive(Clone, Debug)]
pub struct OutreachApi {
    client: AuthenticatedClient,
    identity: IdentityResolver,
}

impl OutreachApi {
    pub fn new(client: AuthenticatedClient, identity: IdentityResolver) -> Self {
        Self { client, identity }
    }

    pub async fn campaigns(&self) -> ClientResult<Value> {
        let user_id = self.identity.get_user_id().await?;
        self.client
            .get(&format!("{BASE}/campaigns/user/{user_id}/campaigns"))
            .await
    }

    pub async fn campaign(&self, campaign_id: i64) -> ClientResult<Value> {
        let user_id = self.identity.get_user_id().await?;
        self.client
            .get(&format!("{BASE}/campaigns/user/{user_id}/campaigns/{campaign_id}"))
            .await
    }

    pub async fn messages(&self, query: &MessageQuery) -> ClientResult<Value> {
        let user_id = self.identity.get_user_id().await?;
        self.client
            .get_with_query(&format!("{BASE}/outreach/user/{user_id}/messages"), query)
            .await
    }

    pub async fn send_message(&self, message: &SendMessage) -> ClientResult<Value> {
        let user_id = self.identity.get_user_id().await?;
        self.client
            .post(
                &format!("{BASE}/outreach/user/{user_id}/send-message"),
                &SendMessageBody {
                    message,
                    user_id: &user_id,
                },
            )
            .await
    }
}
