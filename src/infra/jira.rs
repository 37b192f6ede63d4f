use async_trait::async_trait;
use base64::prelude::{BASE64_STANDARD, Engine as _};
use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, AUTHORIZATION},
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::JiraSettings;
use crate::domain::ticket::{Ticket, normalize};
use crate::error::{AppError, AppResult};
use crate::services::{ConnectionStatus, IssueTrackerService};

pub struct JiraClient {
    http: Client,
    base_url: Option<String>,
    username: Option<String>,
    token: Option<String>,
    acceptance_field: String,
}

impl JiraClient {
    pub fn new(settings: &JiraSettings) -> Self {
        Self {
            http: Client::new(),
            base_url: settings.base_url.clone(),
            username: settings.username.clone(),
            token: settings.token.clone(),
            acceptance_field: settings.acceptance_field.clone(),
        }
    }

    fn api_details(&self) -> AppResult<(&str, &str, &str)> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or_else(|| AppError::Configuration("Jira base URL not configured".to_string()))?;
        let username = self
            .username
            .as_deref()
            .ok_or_else(|| AppError::Configuration("Jira username not configured".to_string()))?;
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| AppError::Configuration("Jira API token not configured".to_string()))?;
        Ok((base_url, username, token))
    }

    fn auth_header(username: &str, token: &str) -> String {
        let credentials = format!("{username}:{token}");
        let encoded = BASE64_STANDARD.encode(credentials);
        format!("Basic {encoded}")
    }

    fn api_url(base_url: &str, endpoint: &str) -> String {
        format!("{}/rest/api/3{endpoint}", base_url.trim_end_matches('/'))
    }

    async fn get(&self, endpoint: &str) -> AppResult<reqwest::Response> {
        let (base_url, username, token) = self.api_details()?;
        let url = Self::api_url(base_url, endpoint);
        debug!(%url, "calling Jira");

        self.http
            .get(url)
            .header(AUTHORIZATION, Self::auth_header(username, token))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| AppError::IssueTracker(format!("failed to call Jira: {err}")))
    }
}

#[async_trait]
impl IssueTrackerService for JiraClient {
    async fn fetch_ticket(&self, id: &str) -> AppResult<Ticket> {
        let response = self.get(&format!("/issue/{id}")).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("ticket {id} not found")));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read response>".to_string());
            return Err(AppError::IssueTracker(format!(
                "failed to fetch ticket: {status} - {body}"
            )));
        }

        let payload: Value = response.json().await.map_err(|err| {
            AppError::IssueTracker(format!("failed to parse Jira response: {err}"))
        })?;

        let ticket = normalize(&payload, &self.acceptance_field)?;
        info!(key = %ticket.key, "fetched ticket");
        Ok(ticket)
    }

    async fn test_connection(&self) -> ConnectionStatus {
        let response = match self.get("/myself").await {
            Ok(response) => response,
            Err(err) => return ConnectionStatus::failed(format!("Connection error: {err}")),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return ConnectionStatus::failed(format!("Connection failed: {status} - {body}"));
        }

        match response.json::<JiraMyself>().await {
            Ok(me) => ConnectionStatus::connected(me.describe()),
            Err(err) => ConnectionStatus::failed(format!("Connection error: {err}")),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraMyself {
    display_name: Option<String>,
    email_address: Option<String>,
}

impl JiraMyself {
    fn describe(&self) -> String {
        format!(
            "Connected as {} ({})",
            self.display_name.as_deref().unwrap_or("unknown user"),
            self.email_address.as_deref().unwrap_or("no email"),
        )
    }
}
