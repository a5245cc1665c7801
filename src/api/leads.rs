// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Leads service client (`/leads`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::with_user_id;
use crate::{
    auth::{AuthenticatedClient, IdentityResolver},
    error::ClientResult,
    models::MessageResponse,
};

const BASE: &str = "/leads";

/// A lead as listed by the leads service. Fields the service may add later
/// are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Lead {
    /// Best available display name.
    pub fn display_name(&self) -> String {
        if let Some(full_name) = self.full_name.as_deref().filter(|n| !n.is_empty()) {
            return full_name.to_string();
        }
        let joined = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if joined.is_empty() {
            self.email.clone().unwrap_or_else(|| format!("lead #{}", self.id))
        } else {
            joined
        }
    }
}

/// One page of leads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadsPage {
    pub leads: Vec<Lead>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

/// Paging and filtering for [`LeadsApi::list`]. Unset fields are omitted
/// from the query string.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LeadQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LeadsApi {
    client: AuthenticatedClient,
    identity: IdentityResolver,
}

impl LeadsApi {
    pub fn new(client: AuthenticatedClient, identity: IdentityResolver) -> Self {
        Self { client, identity }
    }

    pub async fn list(&self, query: &LeadQuery) -> ClientResult<LeadsPage> {
        let user_id = self.identity.get_user_id().await?;
        self.client
            .get_with_query(&format!("{BASE}/{user_id}"), query)
            .await
    }

    pub async fn get(&self, lead_id: i64) -> ClientResult<Lead> {
        let user_id = self.identity.get_user_id().await?;
        self.client.get(&format!("{BASE}/{user_id}/{lead_id}")).await
    }

    pub async fn create(&self, lead: &Value) -> ClientResult<Lead> {
        let user_id = self.identity.get_user_id().await?;
        self.client.post(BASE, &with_user_id(lead, &user_id)).await
    }

    pub async fn update(&self, lead_id: i64, lead: &Value) -> ClientResult<Lead> {
        let user_id = self.identity.get_user_id().await?;
        self.client
            .put(&format!("{BASE}/{lead_id}"), &with_user_id(lead, &user_id))
            .await
    }

    pub async fn delete(&self, lead_id: i64) -> ClientResult<MessageResponse> {
        let user_id = self.identity.get_user_id().await?;
        self.client
            .delete(&format!("{BASE}/{user_id}/{lead_id}"))
            .await
    }

    pub async fn statistics_overview(&self) -> ClientResult<Value> {
        let user_id = self.identity.get_user_id().await?;
        self.client
            .get(&format!("{BASE}/user/{user_id}/statistics-overview"))
            .await
    }
}
