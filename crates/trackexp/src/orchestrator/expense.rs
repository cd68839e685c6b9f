use std::{future::Future, sync::Arc};

use api_types::{
    expense::{Expense, ExpenseFilter, ExpenseRequest, Period},
    summary::Summary,
};
use chrono::NaiveDate;
use tokio::{runtime::Handle, sync::watch};

use super::{OperationResult, Scope, Slot, SlotState};
use crate::{error::ClientError, repository::ExpenseRepository};

/// Payload of the write-operation slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Created(Expense),
    Updated(Expense),
    Deleted(i64),
}

/// Drives the expense screens: one slot for lists, one for the detail view,
/// one for writes and one for the summary.
#[derive(Debug)]
pub struct ExpenseOrchestrator {
    repository: ExpenseRepository,
    expense_list: Arc<Slot<Vec<Expense>>>,
    single_expense: Arc<Slot<Expense>>,
    operation: Arc<Slot<WriteOutcome>>,
    summary: Arc<Slot<Summary>>,
    scope: Scope,
}

impl ExpenseOrchestrator {
    /// Work is spawned on `runtime`; methods may be called from any thread.
    pub fn new(repository: ExpenseRepository, runtime: Handle) -> Self {
        Self {
            repository,
            expense_list: Arc::default(),
            single_expense: Arc::default(),
            operation: Arc::default(),
            summary: Arc::default(),
            scope: Scope::new(runtime),
        }
    }

    pub fn expense_list(&self) -> watch::Receiver<SlotState<Vec<Expense>>> {
        self.expense_list.subscribe()
    }

    pub fn single_expense(&self) -> watch::Receiver<SlotState<Expense>> {
        self.single_expense.subscribe()
    }

    pub fn operation_result(&self) -> watch::Receiver<SlotState<WriteOutcome>> {
        self.operation.subscribe()
    }

    pub fn expense_summary(&self) -> watch::Receiver<SlotState<Summary>> {
        self.summary.subscribe()
    }

    pub fn fetch_all_expenses(&self) {
        let repository = self.repository.clone();
        self.launch(&self.expense_list, "Failed to fetch expenses", async move {
            repository.list().await
        });
    }

    pub fn filter_expenses(&self, filter: ExpenseFilter) {
        let repository = self.repository.clone();
        self.launch(&self.expense_list, "Failed to filter expenses", async move {
            repository.filter(filter).await
        });
    }

    pub fn fetch_todays_expenses(&self) {
        self.fetch_period(Period::Today, "Failed to fetch today's expenses");
    }

    pub fn fetch_this_weeks_expenses(&self) {
        self.fetch_period(Period::Week, "Failed to fetch week's expenses");
    }

    pub fn fetch_this_months_expenses(&self) {
        self.fetch_period(Period::Month, "Failed to fetch month's expenses");
    }

    pub fn fetch_expense(&self, id: i64) {
        let repository = self.repository.clone();
        self.launch(&self.single_expense, "Failed to fetch expense details", async move {
            repository.get(id).await
        });
    }

    pub fn create_expense(&self, payload: ExpenseRequest) {
        let repository = self.repository.clone();
        self.launch(&self.operation, "Failed to create expense", async move {
            repository.create(payload).await.map(WriteOutcome::Created)
        });
    }

    pub fn update_expense(&self, id: i64, payload: ExpenseRequest) {
        let repository = self.repository.clone();
        self.launch(&self.operation, "Failed to update expense", async move {
            repository.update(id, payload).await.map(WriteOutcome::Updated)
        });
    }

    pub fn delete_expense(&self, id: i64) {
        let repository = self.repository.clone();
        self.launch(&self.operation, "Failed to delete expense", async move {
            repository.delete(id).await.map(|()| WriteOutcome::Deleted(id))
        });
    }

    pub fn fetch_summary(&self, start_date: NaiveDate, end_date: NaiveDate) {
        let repository = self.repository.clone();
        self.launch(&self.summary, "Failed to fetch summary", async move {
            repository.summary(start_date, end_date).await
        });
    }

    /// Call once the write result has been handled.
    pub fn clear_operation_result(&self) {
        self.operation.consume();
    }

    /// Aborts every operation still in flight and returns their slots to idle.
    pub fn cancel_all(&self) {
        self.scope.cancel_all();
        self.expense_list.abandon();
        self.single_expense.abandon();
        self.operation.abandon();
        self.summary.abandon();
    }

    pub fn in_flight(&self) -> usize {
        self.scope.in_flight()
    }

    fn fetch_period(&self, period: Period, fallback: &'static str) {
        let repository = self.repository.clone();
        self.launch(&self.expense_list, fallback, async move {
            repository.for_period(period).await
        });
    }

    fn launch<T, F>(&self, slot: &Arc<Slot<T>>, fallback: &'static str, work: F)
    where
        T: Send + Sync + 'static,
        F: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        let ticket = slot.begin();
        let slot = Arc::clone(slot);
        self.scope.spawn(async move {
            slot.finish(ticket, OperationResult::from_response(work.await, fallback));
        });
    }
}
