use std::{sync::Arc, time::Duration};

use api_types::{
    auth::{LoginRequest, LoginResponse, MessageResponse, RegisterRequest},
    expense::{Expense, ExpenseFilter, ExpenseRequest, Period},
    summary::{Summary, SummaryQuery},
};
use chrono::NaiveDate;
use reqwest::{Method, RequestBuilder, Response, Url, header};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    config::ClientConfig,
    credentials::CredentialStore,
    error::{ClientError, Result},
};

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Whether a request carries the stored bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Public,
    Bearer,
}

/// Typed client for the expense API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    http: reqwest::Client,
    credentials: Arc<CredentialStore>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, credentials: Arc<CredentialStore>) -> Result<Self> {
        // `Url::join` drops the last segment unless the base ends with a slash.
        let mut base_url = config.base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base_url =
            Url::parse(&base_url).map_err(|err| ClientError::InvalidUrl(err.to_string()))?;

        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(concat!("trackexp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url,
            http,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn sign_up(&self, payload: &RegisterRequest) -> Result<MessageResponse> {
        let request = self.request(Method::POST, "auth/signup", Access::Public).await?;
        self.fetch(request.json(payload)).await
    }

    pub async fn sign_in(&self, payload: &LoginRequest) -> Result<LoginResponse> {
        let request = self.request(Method::POST, "auth/signin", Access::Public).await?;
        self.fetch(request.json(payload)).await
    }

    pub async fn list_expenses(&self) -> Result<Vec<Expense>> {
        let request = self.request(Method::GET, "expenses", Access::Bearer).await?;
        self.fetch(request).await
    }

    pub async fn create_expense(&self, payload: &ExpenseRequest) -> Result<Expense> {
        let request = self.request(Method::POST, "expenses", Access::Bearer).await?;
        self.fetch(request.json(payload)).await
    }

    pub async fn get_expense(&self, id: i64) -> Result<Expense> {
        let path = format!("expenses/{id}");
        let request = self.request(Method::GET, &path, Access::Bearer).await?;
        self.fetch(request).await
    }

    pub async fn update_expense(&self, id: i64, payload: &ExpenseRequest) -> Result<Expense> {
        let path = format!("expenses/{id}");
        let request = self.request(Method::PUT, &path, Access::Bearer).await?;
        self.fetch(request.json(payload)).await
    }

    /// Any 2xx counts as success; the body is ignored.
    pub async fn delete_expense(&self, id: i64) -> Result<()> {
        let path = format!("expenses/{id}");
        let request = self.request(Method::DELETE, &path, Access::Bearer).await?;
        self.send(request).await?;
        Ok(())
    }

    pub async fn filter_expenses(&self, filter: &ExpenseFilter) -> Result<Vec<Expense>> {
        let request = self.request(Method::GET, "expenses/filter", Access::Bearer).await?;
        self.fetch(request.query(filter)).await
    }

    pub async fn expenses_for(&self, period: Period) -> Result<Vec<Expense>> {
        let path = format!("expenses/{}", period.as_path());
        let request = self.request(Method::GET, &path, Access::Bearer).await?;
        self.fetch(request).await
    }

    pub async fn expenses_today(&self) -> Result<Vec<Expense>> {
        self.expenses_for(Period::Today).await
    }

    pub async fn expenses_this_week(&self) -> Result<Vec<Expense>> {
        self.expenses_for(Period::Week).await
    }

    pub async fn expenses_this_month(&self) -> Result<Vec<Expense>> {
        self.expenses_for(Period::Month).await
    }

    pub async fn summary(&self, start_date: NaiveDate, end_date: NaiveDate) -> Result<Summary> {
        let request = self.request(Method::GET, "expenses/summary", Access::Bearer).await?;
        let query = SummaryQuery {
            start_date,
            end_date,
        };
        self.fetch(request.query(&query)).await
    }

    async fn request(&self, method: Method, path: &str, access: Access) -> Result<RequestBuilder> {
        let endpoint = self
            .base_url
            .join(path)
            .map_err(|err| ClientError::InvalidUrl(err.to_string()))?;
        Ok(self.authorize(self.http.request(method, endpoint), access).await)
    }

    /// Attaches `Authorization: Bearer <token>` when a token is stored.
    ///
    /// Without a token the request goes out as is and the server rejects it.
    async fn authorize(&self, request: RequestBuilder, access: Access) -> RequestBuilder {
        if access == Access::Public {
            return request;
        }

        // File read and decrypt stay off the async workers.
        let credentials = Arc::clone(&self.credentials);
        let token = match tokio::task::spawn_blocking(move || credentials.auth_token()).await {
            Ok(Ok(Some(token))) if !token.is_empty() => token,
            Ok(Ok(_)) => return request,
            Ok(Err(err)) => {
                tracing::warn!("cannot read credentials, sending request unauthenticated: {err}");
                return request;
            }
            Err(err) => {
                tracing::warn!("credential lookup did not complete: {err}");
                return request;
            }
        };

        match header::HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                request.header(header::AUTHORIZATION, value)
            }
            Err(err) => {
                tracing::warn!("stored token is not a valid header value: {err}");
                request
            }
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = request.build()?;
        let method = request.method().clone();
        let path = request.url().path().to_string();

        let res = self.http.execute(request).await.map_err(|err| {
            tracing::debug!(%method, %path, "request failed: {err}");
            ClientError::Transport(err)
        })?;

        let status = res.status();
        tracing::debug!(%method, %path, status = status.as_u16(), "api response");
        if status.is_success() {
            return Ok(res);
        }

        let body = res.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let res = self.send(request).await?;
        let body = res.bytes().await?;
        if body.is_empty() {
            return Err(ClientError::Decode("empty response body".to_string()));
        }
        serde_json::from_slice(&body).map_err(|err| ClientError::Decode(err.to_string()))
    }
}

/// Picks the most specific message out of an error body.
fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<ErrorBody>(body).unwrap_or_default();
    let non_blank = |message: &String| !message.trim().is_empty();
    parsed
        .message
        .filter(non_blank)
        .or(parsed.error.filter(non_blank))
        .unwrap_or_else(|| body.trim().to_string())
}
