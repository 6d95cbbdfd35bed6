//! GitHub REST implementation of [`BillingApi`].
//!
//! Every call goes through [`GitHubClient::request`], which retries network
//! errors and 5xx responses under a shared attempt budget and sleeps through
//! 429 responses without consuming it.

mod budgets;
mod cost_centers;
pub mod retry;
mod teams;

pub use budgets::{BudgetType, classify_product};
pub use retry::RetryPolicy;

use crate::api::{BillingApi, CostCenterRef, Team};
use crate::cache::CostCenterCache;
use crate::error::{CostCenterError, Result};
use async_trait::async_trait;
use backoff::backoff::Backoff;
use chrono::Utc;
use config::{GitHubConfig, RetryConfig};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use retry::{RETRYABLE_STATUSES, is_transient, truncate_body};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const ACCEPT_HEADER: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT_VALUE: &str = "gh-cost-center";

pub struct GitHubClient {
    http: Client,
    base_url: String,
    enterprise: String,
    token: Option<String>,
    retry: RetryPolicy,
    cache: Option<Arc<CostCenterCache>>
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig, retry: &RetryConfig) -> Result<Self> {
        if config.enterprise.trim().is_empty() {
            return Err(CostCenterError::Configuration(
                "github.enterprise is required".to_string()
            ));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(CostCenterError::Http)?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            enterprise: config.enterprise.clone(),
            token: config.token.clone(),
            retry: RetryPolicy::from(retry),
            cache: None
        })
    }

    pub fn with_cache(mut self, cache: Arc<CostCenterCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn cache(&self) -> Option<&Arc<CostCenterCache>> {
        self.cache.as_ref()
    }

    pub fn enterprise(&self) -> &str {
        &self.enterprise
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn enterprise_url(&self, path: &str) -> String {
        format!(
            "{}/enterprises/{}{}",
            self.base_url,
            urlencoding::encode(&self.enterprise),
            path
        )
    }

    /// Record a name -> id pair in the durable cache. Failures only warn.
    fn remember(&self, name: &str, id: &str) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(name, id, name) {
                warn!(name = %name, error = %e, "Failed to update cost center cache");
            }
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        body: Option<&serde_json::Value>
    ) -> std::result::Result<(StatusCode, HeaderMap, Vec<u8>), reqwest::Error> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .header(ACCEPT, ACCEPT_HEADER)
            .header(USER_AGENT, USER_AGENT_VALUE)
            .header(API_VERSION_HEADER, API_VERSION);

        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(method = %method, url = %url, "HTTP request");

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;
        Ok((status, headers, bytes.to_vec()))
    }

    /// Issue a call and return the raw body of the first 2xx response.
    pub(crate) async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>
    ) -> Result<Vec<u8>> {
        let mut attempt: u32 = 0;
        let mut rate_limit_waits: u32 = 0;
        let mut backoff = self.retry.backoff();

        loop {
            let (status, headers, bytes) = match self.send_once(&method, url, body).await {
                Ok(response) => response,
                Err(e) if is_transient(&e) => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        return Err(CostCenterError::Transient {
                            attempts: attempt,
                            source: e
                        });
                    }
                    let wait = backoff.next_backoff().unwrap_or(self.retry.backoff_base);
                    warn!(
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        url = %url,
                        error = %e,
                        "Transient error, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
                Err(e) => return Err(CostCenterError::Http(e))
            };

            if status.is_success() {
                return Ok(bytes);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                rate_limit_waits += 1;
                if let Some(max) = self.retry.max_rate_limit_waits {
                    if rate_limit_waits > max {
                        return Err(CostCenterError::RateLimited { waits: max });
                    }
                }
                let wait = self.retry.rate_limit_wait(&headers, Utc::now());
                warn!(
                    wait_ms = wait.as_millis() as u64,
                    url = %url,
                    "Rate limit hit, waiting"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if RETRYABLE_STATUSES.contains(&status.as_u16()) {
                attempt += 1;
                if attempt < self.retry.max_attempts {
                    let wait = backoff.next_backoff().unwrap_or(self.retry.backoff_base);
                    warn!(
                        status = status.as_u16(),
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        url = %url,
                        "Retryable HTTP error, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
            }

            return Err(CostCenterError::Api {
                status: status.as_u16(),
                body: truncate_body(&bytes)
            });
        }
    }

    /// Issue a call and decode the response body as JSON.
    pub(crate) async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>
    ) -> Result<T> {
        let context = format!("{} {}", method, url);
        let bytes = self.request(method, url, body).await?;
        serde_json::from_slice(&bytes).map_err(|source| CostCenterError::Decode { context, source })
    }
}

#[async_trait]
impl BillingApi for GitHubClient {
    async fn list_org_teams(&self, org: &str) -> Result<Vec<Team>> {
        self.fetch_org_teams(org).await
    }

    async fn list_enterprise_teams(&self) -> Result<Vec<Team>> {
        self.fetch_enterprise_teams().await
    }

    async fn list_org_team_members(&self, org: &str, team_slug: &str) -> Result<Vec<String>> {
        self.fetch_org_team_members(org, team_slug).await
    }

    async fn list_enterprise_team_members(&self, team_slug: &str) -> Result<Vec<String>> {
        self.fetch_enterprise_team_members(team_slug).await
    }

    async fn list_active_cost_centers(&self) -> Result<HashMap<String, String>> {
        self.fetch_active_cost_centers().await
    }

    async fn create_cost_center(&self, name: &str) -> Result<String> {
        self.post_cost_center(name).await
    }

    async fn cost_center_members(&self, cost_center_id: &str) -> Result<Vec<String>> {
        Ok(self.fetch_cost_center(cost_center_id).await?.user_logins())
    }

    async fn current_cost_center(&self, user: &str) -> Result<Option<CostCenterRef>> {
        self.fetch_membership(user).await
    }

    async fn add_users(&self, cost_center_id: &str, users: &[String]) -> Result<()> {
        self.modify_resources(Method::POST, cost_center_id, users)
            .await
    }

    async fn remove_users(&self, cost_center_id: &str, users: &[String]) -> Result<()> {
        self.modify_resources(Method::DELETE, cost_center_id, users)
            .await
    }

    async fn create_product_budget(
        &self,
        cost_center_id: &str,
        cost_center_name: &str,
        product: &str,
        amount: u64
    ) -> Result<bool> {
        self.ensure_product_budget(cost_center_id, cost_center_name, product, amount)
            .await
    }
}
