// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity service endpoints.
//!
//! | Endpoint | Auth | Retry |
//! |----------|------|-------|
//! | `POST /auth/login`, `/auth/register`, `/auth/forgot-password`, `/auth/reset-password` | none | none |
//! | `GET /auth/verify-email` | none | none |
//! | `POST /auth/logout` | bearer | none (best effort) |
//! | `GET /auth/me` | bearer | via executor, or single attempt for the session controller |
//! | `/auth/user/*`, `/auth/onboarding/*`, `/auth/change-password` | bearer | via executor |
//!
//! Credential exchange is never wrapped in the executor: there is no prior
//! token that could have expired.

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::client::{AuthenticatedClient, Endpoint};
use super::headers::build_headers;
use crate::error::{ClientError, ClientResult};
use crate::models::{
    AuthResponse, AuthenticatedUser, ChangePasswordRequest, Company, ForgotPasswordRequest,
    LoginRequest, LogoutRequest, MessageResponse, OnboardingStatus, Profile, RegisterRequest,
    ResetPasswordRequest,
};

pub const LOGIN_PATH: &str = "/auth/login";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const ME_PATH: &str = "/auth/me";

#[derive(Clone, Debug)]
pub struct AuthApi {
    client: AuthenticatedClient,
}

impl AuthApi {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    fn endpoint(&self) -> &Endpoint {
        self.client.endpoint()
    }

    // ========== Credential Exchange ==========

    /// Exchange email and password for a token pair.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<AuthResponse> {
        let response: AuthResponse = self
            .post_anonymous(LOGIN_PATH, &LoginRequest { email, password })
            .await?;
        if response.access_token.is_empty() || response.refresh_token.is_empty() {
            return Err(ClientError::InvalidResponse(
                "login response is missing a token".to_string(),
            ));
        }
        debug!(expires_in = ?response.expires_in, "Credentials exchanged");
        Ok(response)
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> ClientResult<Value> {
        let result = self
            .post_anonymous(
                "/auth/register",
                &RegisterRequest {
                    email,
                    password,
                    confirm_password,
                },
            )
            .await?;
        info!("Account registered");
        Ok(result)
    }

    pub async fn verify_email(&self, token: &str) -> ClientResult<MessageResponse> {
        let response = self
            .endpoint()
            .http()
            .get(self.endpoint().url("/auth/verify-email"))
            .query(&[("token", token)])
            .send()
            .await?;
        Endpoint::read_json(response, false).await
    }

    pub async fn forgot_password(&self, email: &str) -> ClientResult<MessageResponse> {
        self.post_anonymous("/auth/forgot-password", &ForgotPasswordRequest { email })
            .await
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> ClientResult<MessageResponse> {
        self.post_anonymous(
            "/auth/reset-password",
            &ResetPasswordRequest {
                token,
                new_password,
                confirm_password,
            },
        )
        .await
    }

    /// Revoke the refresh token server-side. One attempt, no refresh.
    pub async fn logout(&self, refresh_token: &str, access_token: &str) -> ClientResult<()> {
        let headers = build_headers(self.client.state().credentials())?;
        let response = self
            .endpoint()
            .http()
            .post(self.endpoint().url(LOGOUT_PATH))
            .headers(headers)
            .json(&LogoutRequest {
                refresh_token,
                access_token,
            })
            .send()
            .await?;
        Endpoint::read_json::<Value>(response, true).await?;
        Ok(())
    }

    // ========== Current User ==========

    /// `GET /auth/me` once, without refresh-and-retry.
    ///
    /// Used by the session controller, which runs its own refresh step.
    pub async fn fetch_current_user(&self) -> ClientResult<AuthenticatedUser> {
        let headers = build_headers(self.client.state().credentials())?;
        let response = self
            .endpoint()
            .http()
            .get(self.endpoint().url(ME_PATH))
            .headers(headers)
            .send()
            .await?;
        Endpoint::read_json(response, true).await
    }

    /// `GET /auth/me` through the executor.
    pub async fn current_user(&self) -> ClientResult<AuthenticatedUser> {
        self.client.get(ME_PATH).await
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> ClientResult<MessageResponse> {
        self.client
            .post(
                "/auth/change-password",
                &ChangePasswordRequest {
                    current_password,
                    new_password,
                    confirm_password,
                },
            )
            .await
    }

    // ========== Profile & Onboarding ==========

    pub async fn profile(&self) -> ClientResult<Profile> {
        self.client.get("/auth/user/profile").await
    }

    pub async fn update_profile(&self, profile: &Profile) -> ClientResult<Value> {
        self.client.put("/auth/user/profile", profile).await
    }

    pub async fn company(&self) -> ClientResult<Company> {
        self.client.get("/auth/user/company").await
    }

    pub async fn update_company(&self, company: &Company) -> ClientResult<Value> {
        self.client.put("/auth/user/company", company).await
    }

    pub async fn onboarding_status(&self) -> ClientResult<OnboardingStatus> {
        self.client.get("/auth/onboarding/status").await
    }

    pub async fn update_personal_info(&self, profile: &Profile) -> ClientResult<Value> {
        self.client.put("/auth/onboarding/personal", profile).await
    }

    pub async fn update_company_info(&self, company: &Company) -> ClientResult<Value> {
        self.client.put("/auth/onboarding/company", company).await
    }

    pub async fn complete_onboarding(&self) -> ClientResult<Value> {
        self.client.post_empty("/auth/onboarding/complete").await
    }

    async fn post_anonymous<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .endpoint()
            .http()
            .post(self.endpoint().url(path))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(body)
            .send()
            .await?;
        Endpoint::read_json(response, false).await
    }
}
