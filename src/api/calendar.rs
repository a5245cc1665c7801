// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Calendar service client (`/calendar/api`).
//!
//! Event payloads are passed through as JSON; scheduling rules live in the
//! calendar service.

use serde::Serialize;
use serde_json::Value;

use super::with_user_id;
use crate::{
    auth::{AuthenticatedClient, IdentityResolver},
    error::ClientResult,
};

const BASE: &str = "/calendar/api";

#[derive(Debug, Serialize)]
struct UpcomingQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct CalendarApi {
    client: AuthenticatedClient,
    identity: IdentityResolver,
}

impl CalendarApi {
    pub fn new(client: AuthenticatedClient, identity: IdentityResolver) -> Self {
        Self { client, identity }
    }

    pub async fn create_event(&self, event: &Value) -> ClientResult<Value> {
        let user_id = self.identity.get_user_id().await?;
        self.client
            .post(&format!("{BASE}/events"), &with_user_id(event, &user_id))
            .await
    }

    /// Paginated events; `query` carries the service's filter parameters.
    pub async fn list_events<Q>(&self, query: &Q) -> ClientResult<Value>
    where
        Q: Serialize + ?Sized,
    {
        let user_id = self.identity.get_user_id().await?;
        self.client
            .get_with_query(&format!("{BASE}/users/{user_id}/events"), query)
            .await
    }

    pub async fn upcoming_events(&self, limit: Option<u32>) -> ClientResult<Value> {
        let user_id = self.identity.get_user_id().await?;
        self.client
            .get_with_query(
                &format!("{BASE}/users/{user_id}/events/upcoming"),
                &UpcomingQuery { limit },
            )
            .await
    }

    pub async fn get_event(&self, event_id: i64) -> ClientResult<Value> {
        let user_id = self.identity.get_user_id().await?;
        self.client
            .get(&format!("{BASE}/users/{user_id}/events/{event_id}"))
            .await
    }

    pub async fn update_event(&self, event_id: i64, event: &Value) -> ClientResult<Value> {
        let user_id = self.identity.get_user_id().await?;
        self.client
            .put(
                &format!("{BASE}/events/{event_id}"),
                &with_user_id(event, &user_id),
            )
            .await
    }

    /// The service answers `204 No Content`.
    pub async fn delete_event(&self, event_id: i64) -> ClientResult<()> {
        let user_id = self.identity.get_user_id().await?;
        self.client
            .delete(&format!("{BASE}/users/{user_id}/events/{event_id}"))
            .await
    }
}
