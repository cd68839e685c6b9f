//! The add and edit expense screens share one form, switched by [`FormMode`].

use std::collections::BTreeMap;

use api_types::{
    Category, Currency,
    expense::{Expense, ExpenseRequest},
};
use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;

use crate::orchestrator::ExpenseOrchestrator;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Update { id: i64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    Title,
    Amount,
    Currency,
    Category,
    Date,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldError {
    Required,
    InvalidAmount,
    UnknownCurrency,
    UnknownCategory,
    InvalidDate,
}

pub type FieldErrors = BTreeMap<Field, FieldError>;

/// Raw user input, kept as text until [`ExpenseForm::validate`].
#[derive(Clone, Debug)]
pub struct ExpenseForm {
    mode: FormMode,
    pub title: String,
    pub amount: String,
    pub currency: String,
    pub category: String,
    pub date: String,
}

impl ExpenseForm {
    /// Defaults to today, the first currency and the first category.
    pub fn new(mode: FormMode) -> Self {
        Self {
            mode,
            title: String::new(),
            amount: String::new(),
            currency: Currency::ALL[0].to_string(),
            category: Category::ALL[0].to_string(),
            date: Local::now().date_naive().format(DATE_FORMAT).to_string(),
        }
    }

    /// Update-mode form prefilled from a fetched record.
    pub fn editing(expense: &Expense) -> Self {
        Self {
            mode: FormMode::Update { id: expense.id },
            title: expense.title.clone(),
            amount: expense.amount.to_string(),
            currency: expense.currency.to_string(),
            category: expense.category.to_string(),
            date: expense.date.format(DATE_FORMAT).to_string(),
        }
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn title(&self) -> &'static str {
        match self.mode {
            FormMode::Create => "Add Expense",
            FormMode::Update { .. } => "Edit Expense",
        }
    }

    pub fn validate(&self) -> Result<ExpenseRequest, FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = self.title.trim();
        if title.is_empty() {
            errors.insert(Field::Title, FieldError::Required);
        }

        let amount = required(&self.amount, Field::Amount, &mut errors).and_then(|raw| {
            raw.parse::<Decimal>()
                .map_err(|_| errors.insert(Field::Amount, FieldError::InvalidAmount))
                .ok()
        });

        let currency = required(&self.currency, Field::Currency, &mut errors).and_then(|raw| {
            raw.parse::<Currency>()
                .map_err(|_| errors.insert(Field::Currency, FieldError::UnknownCurrency))
                .ok()
        });

        let category = required(&self.category, Field::Category, &mut errors).and_then(|raw| {
            raw.parse::<Category>()
                .map_err(|_| errors.insert(Field::Category, FieldError::UnknownCategory))
                .ok()
        });

        let date = required(&self.date, Field::Date, &mut errors).and_then(|raw| {
            NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map_err(|_| errors.insert(Field::Date, FieldError::InvalidDate))
                .ok()
        });

        match (amount, currency, category, date) {
            (Some(amount), Some(currency), Some(category), Some(date)) if errors.is_empty() => {
                Ok(ExpenseRequest {
                    title: title.to_string(),
                    amount,
                    currency,
                    category,
                    date,
                })
            }
            _ => Err(errors),
        }
    }

    /// Validates and hands the request to `create_expense` or `update_expense`
    /// according to the mode. Nothing is sent when a field is invalid.
    pub fn submit(&self, expenses: &ExpenseOrchestrator) -> Result<(), FieldErrors> {
        let request = self.validate()?;
        match self.mode {
            FormMode::Create => expenses.create_expense(request),
            FormMode::Update { id } => expenses.update_expense(id, request),
        }
        Ok(())
    }
}

fn required<'a>(raw: &'a str, field: Field, errors: &mut FieldErrors) -> Option<&'a str> {
    let raw = raw.trim();
    if raw.is_empty() {
        errors.insert(field, FieldError::Required);
        return None;
    }
    Some(raw)
}
