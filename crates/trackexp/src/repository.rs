//! Domain-level access to the API.
//!
//! Every operation is spawned on the repository's runtime handle and awaited
//! from the caller, so the request never runs on the caller's own task. A
//! panic inside the spawned work comes back as [`ClientError::Task`].

use std::{future::Future, sync::Arc};

use api_types::{
    auth::{LoginRequest, LoginResponse, MessageResponse, RegisterRequest},
    expense::{Expense, ExpenseFilter, ExpenseRequest, Period},
    summary::Summary,
};
use chrono::NaiveDate;
use tokio::{runtime::Handle, task::JoinError};

use crate::{
    client::ApiClient,
    credentials::{Credential, CredentialStore},
    error::{ClientError, CredentialError, Result},
};

async fn offload<T, F>(runtime: &Handle, work: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    runtime
        .spawn(work)
        .await
        .map_err(|err| ClientError::Task(describe_join_error(err)))?
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_cancelled() {
        return "task was cancelled".to_string();
    }
    match err.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "task panicked".to_string()),
        Err(err) => err.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct AuthRepository {
    client: ApiClient,
    credentials: Arc<CredentialStore>,
    runtime: Handle,
}

impl AuthRepository {
    pub fn new(client: ApiClient, credentials: Arc<CredentialStore>, runtime: Handle) -> Self {
        Self {
            client,
            credentials,
            runtime,
        }
    }

    /// Signs in and, on success, stores the returned token and identity before
    /// handing the response back. A failed sign-in leaves the store untouched.
    pub async fn login(&self, payload: LoginRequest) -> Result<LoginResponse> {
        let client = self.client.clone();
        let credentials = Arc::clone(&self.credentials);
        offload(&self.runtime, async move {
            let response = client.sign_in(&payload).await?;
            let credential = Credential {
                auth_token: response.token.clone(),
                user_id: response.id,
                username: response.username.clone(),
                email: response.email.clone(),
            };
            tokio::task::spawn_blocking(move || credentials.save(&credential))
                .await
                .map_err(|err| ClientError::Task(describe_join_error(err)))??;
            tracing::info!(user_id = response.id, username = %response.username, "signed in");
            Ok(response)
        })
        .await
    }

    pub async fn register(&self, payload: RegisterRequest) -> Result<MessageResponse> {
        let client = self.client.clone();
        offload(&self.runtime, async move { client.sign_up(&payload).await }).await
    }

    /// Forgets the stored credential. No request is sent.
    pub fn logout(&self) -> std::result::Result<(), CredentialError> {
        self.credentials.clear()?;
        tracing::info!("signed out");
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.auth_token(), Some(token) if !token.is_empty())
    }

    pub fn auth_token(&self) -> Option<String> {
        self.current_user().map(|credential| credential.auth_token)
    }

    pub fn user_id(&self) -> Option<i64> {
        self.current_user().map(|credential| credential.user_id)
    }

    pub fn current_user(&self) -> Option<Credential> {
        match self.credentials.get() {
            Ok(credential) => credential,
            Err(err) => {
                tracing::warn!("cannot read credentials: {err}");
                None
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    client: ApiClient,
    runtime: Handle,
}

impl ExpenseRepository {
    pub fn new(client: ApiClient, runtime: Handle) -> Self {
        Self { client, runtime }
    }

    pub async fn list(&self) -> Result<Vec<Expense>> {
        let client = self.client.clone();
        offload(&self.runtime, async move { client.list_expenses().await }).await
    }

    pub async fn create(&self, payload: ExpenseRequest) -> Result<Expense> {
        let client = self.client.clone();
        offload(&self.runtime, async move { client.create_expense(&payload).await }).await
    }

    pub async fn get(&self, id: i64) -> Result<Expense> {
        let client = self.client.clone();
        offload(&self.runtime, async move { client.get_expense(id).await }).await
    }

    pub async fn update(&self, id: i64, payload: ExpenseRequest) -> Result<Expense> {
        let client = self.client.clone();
        offload(&self.runtime, async move {
            client.update_expense(id, &payload).await
        })
        .await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let client = self.client.clone();
        offload(&self.runtime, async move { client.delete_expense(id).await }).await
    }

    pub async fn filter(&self, filter: ExpenseFilter) -> Result<Vec<Expense>> {
        let client = self.client.clone();
        offload(&self.runtime, async move { client.filter_expenses(&filter).await }).await
    }

    pub async fn for_period(&self, period: Period) -> Result<Vec<Expense>> {
        let client = self.client.clone();
        offload(&self.runtime, async move { client.expenses_for(period).await }).await
    }

    pub async fn today(&self) -> Result<Vec<Expense>> {
        self.for_period(Period::Today).await
    }

    pub async fn this_week(&self) -> Result<Vec<Expense>> {
        self.for_period(Period::Week).await
    }

    pub async fn this_month(&self) -> Result<Vec<Expense>> {
        self.for_period(Period::Month).await
    }

    pub async fn summary(&self, start_date: NaiveDate, end_date: NaiveDate) -> Result<Summary> {
        let client = self.client.clone();
        offload(&self.runtime, async move {
            client.summary(start_date, end_date).await
        })
        .await
    }
}
