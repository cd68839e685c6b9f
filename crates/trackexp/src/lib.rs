//! Client core for the TrackExp expense service.
//!
//! The presentation layer talks to orchestrators only. Orchestrators call
//! repositories, repositories call the [`client::ApiClient`], and outcomes come
//! back as observable [`orchestrator::Slot`] states.

use std::sync::Arc;

use tokio::runtime::Handle;

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod form;
pub mod orchestrator;
pub mod repository;
pub mod telemetry;

pub use api_types;

use crate::{
    client::ApiClient,
    config::ClientConfig,
    credentials::CredentialStore,
    error::Result,
    orchestrator::{AuthOrchestrator, ExpenseOrchestrator},
    repository::{AuthRepository, ExpenseRepository},
};

/// Everything that lives as long as the signed-in process: one credential
/// store, one HTTP client and the repositories built on them.
#[derive(Debug, Clone)]
pub struct Session {
    credentials: Arc<CredentialStore>,
    runtime: Handle,
    auth: AuthRepository,
    expenses: ExpenseRepository,
}

impl Session {
    /// Must be called from within a Tokio runtime; its handle becomes the
    /// background context for every request.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_runtime(config, Handle::current())
    }

    pub fn with_runtime(config: &ClientConfig, runtime: Handle) -> Result<Self> {
        let credentials = Arc::new(CredentialStore::open(&config.credentials_dir)?);
        let client = ApiClient::new(config, Arc::clone(&credentials))?;
        tracing::debug!(base_url = %client.base_url(), "session ready");

        Ok(Self {
            auth: AuthRepository::new(client.clone(), Arc::clone(&credentials), runtime.clone()),
            expenses: ExpenseRepository::new(client, runtime.clone()),
            credentials,
            runtime,
        })
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn auth_repository(&self) -> &AuthRepository {
        &self.auth
    }

    pub fn expense_repository(&self) -> &ExpenseRepository {
        &self.expenses
    }

    /// A fresh orchestrator for one screen; dropping it cancels its work.
    pub fn auth_orchestrator(&self) -> AuthOrchestrator {
        AuthOrchestrator::new(self.auth.clone(), self.runtime.clone())
    }

    pub fn expense_orchestrator(&self) -> ExpenseOrchestrator {
        ExpenseOrchestrator::new(self.expenses.clone(), self.runtime.clone())
    }
}
