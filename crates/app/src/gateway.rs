//! REST implementation of [`BankingGateway`].
//!
//! Endpoints, relative to `gateway.base_url`:
//!
//! - `GET accounts` and `GET accounts/{id}`
//! - `GET companies/{company_id}/accounts`
//! - `PATCH accounts/{id}` with `{"last_sync_at": ...}`
//! - `GET accounts/{id}/transactions?account_number=&from=&to=&page=&limit=`
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine::{BankAccount, BankingGateway, FetchPage, FetchRequest, GatewayError};
use reqwest::{Method, StatusCode, Url, header::CONTENT_TYPE};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::{Serialize, de::DeserializeOwned};

use crate::settings;

pub struct HttpGateway {
    base_url: Url,
    api_key: Option<String>,
    http: ClientWithMiddleware,
}

#[derive(Serialize)]
struct LastSync {
    last_sync_at: DateTime<Utc>,
}

impl HttpGateway {
    /// Transport errors and transient answers (5xx, 408, 429) are retried
    /// until `max_attempts` requests were made, `retry_delay_ms` apart.
    pub fn new(config: &settings::Gateway) -> Result<Self, GatewayError> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|err| GatewayError::Transport(format!("invalid base_url: {err}")))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let delay = Duration::from_millis(config.retry_delay_ms);
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(delay, delay)
            .build_with_max_retries(config.max_attempts.saturating_sub(1));
        let http = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            http,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path)
            .map_err(|err| GatewayError::Transport(format!("invalid endpoint {path}: {err}")))
    }

    /// Sends a request through the retrying client. `Ok(None)` on 404.
    async fn send<B: Serialize>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Option<reqwest::Response>, GatewayError> {
        let mut request = self.http.request(method, url.clone()).query(query);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(body) = body {
            let payload =
                serde_json::to_string(body).map_err(|err| GatewayError::Decode(err.to_string()))?;
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(payload);
        }

        let res = request.send().await.map_err(|err| {
            tracing::warn!(%url, %err, "gateway request failed");
            GatewayError::Transport(err.to_string())
        })?;
        match res.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(res)),
            status => {
                let message = res
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                tracing::warn!(%url, status = status.as_u16(), "gateway answered with an error");
                Err(GatewayError::Status {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, GatewayError> {
        let url = self.endpoint(path)?;
        match self.send::<()>(Method::GET, url, query, None).await? {
            Some(res) => res
                .json::<T>()
                .await
                .map(Some)
                .map_err(|err| GatewayError::Decode(err.to_string())),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BankingGateway for HttpGateway {
    async fn bank_account(&self, id: &str) -> Result<Option<BankAccount>, GatewayError> {
        self.get_json(&format!("accounts/{id}"), &[]).await
    }

    async fn bank_accounts_by_company(
        &self,
        company_id: &str,
    ) -> Result<Vec<BankAccount>, GatewayError> {
        Ok(self
            .get_json(&format!("companies/{company_id}/accounts"), &[])
            .await?
            .unwrap_or_default())
    }

    async fn all_bank_accounts(&self) -> Result<Vec<BankAccount>, GatewayError> {
        Ok(self.get_json("accounts", &[]).await?.unwrap_or_default())
    }

    async fn update_last_sync(&self, id: &str, at: DateTime<Utc>) -> Result<(), GatewayError> {
        let url = self.endpoint(&format!("accounts/{id}"))?;
        match self
            .send(Method::PATCH, url, &[], Some(&LastSync { last_sync_at: at }))
            .await?
        {
            Some(_) => Ok(()),
            None => Err(GatewayError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                message: format!("account {id} not found"),
            }),
        }
    }

    async fn fetch_transactions(
        &self,
        account_id: &str,
        request: &FetchRequest,
    ) -> Result<FetchPage, GatewayError> {
        let query = [
            ("account_number", request.account_number.clone()),
            ("from", request.from.to_rfc3339()),
            ("to", request.to.to_rfc3339()),
            ("page", request.page.to_string()),
            ("limit", request.limit.to_string()),
        ];
        self.get_json(&format!("accounts/{account_id}/transactions"), &query)
            .await?
            .ok_or_else(|| GatewayError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                message: format!("account {account_id} not found"),
            })
    }
}
