use std::sync::Arc;

use api_types::auth::{LoginRequest, LoginResponse, MessageResponse, RegisterRequest};
use tokio::{runtime::Handle, sync::watch};

use super::{OperationResult, Scope, Slot, SlotState};
use crate::{credentials::Credential, repository::AuthRepository};

#[derive(Debug)]
pub struct AuthOrchestrator {
    repository: AuthRepository,
    login: Arc<Slot<LoginResponse>>,
    register: Arc<Slot<MessageResponse>>,
    scope: Scope,
}

impl AuthOrchestrator {
    pub fn new(repository: AuthRepository, runtime: Handle) -> Self {
        Self {
            repository,
            login: Arc::default(),
            register: Arc::default(),
            scope: Scope::new(runtime),
        }
    }

    pub fn login_result(&self) -> watch::Receiver<SlotState<LoginResponse>> {
        self.login.subscribe()
    }

    pub fn register_result(&self) -> watch::Receiver<SlotState<MessageResponse>> {
        self.register.subscribe()
    }

    pub fn login(&self, payload: LoginRequest) {
        let ticket = self.login.begin();
        let slot = Arc::clone(&self.login);
        let repository = self.repository.clone();
        self.scope.spawn(async move {
            let response = repository.login(payload).await;
            slot.finish(ticket, OperationResult::from_response(response, "Login failed"));
        });
    }

    pub fn register(&self, payload: RegisterRequest) {
        let ticket = self.register.begin();
        let slot = Arc::clone(&self.register);
        let repository = self.repository.clone();
        self.scope.spawn(async move {
            let response = repository.register(payload).await;
            slot.finish(
                ticket,
                OperationResult::from_response(response, "Registration failed"),
            );
        });
    }

    /// Clears the stored credential. Failures are logged, never raised.
    pub fn logout(&self) {
        if let Err(err) = self.repository.logout() {
            tracing::error!("failed to clear credentials: {err}");
        }
        self.login.consume();
    }

    pub fn is_logged_in(&self) -> bool {
        self.repository.is_logged_in()
    }

    pub fn current_user(&self) -> Option<Credential> {
        self.repository.current_user()
    }

    pub fn cancel_all(&self) {
        self.scope.cancel_all();
        self.login.abandon();
        self.register.abandon();
    }
}
