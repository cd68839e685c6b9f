use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Serializes as the bare wire code and never rejects an unrecognized one.
macro_rules! wire_code {
    ($ty:ident) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let code = String::deserialize(deserializer)?;
                Ok(Self::from_code(&code))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        /// Only the known variants parse; user input never becomes `Unknown`.
        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .into_iter()
                    .find(|known| known.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| UnknownVariant(s.to_string()))
            }
        }

        impl $ty {
            /// Maps a code received from the server, keeping unrecognized ones verbatim.
            pub fn from_code(code: &str) -> Self {
                Self::ALL
                    .into_iter()
                    .find(|known| known.as_str() == code)
                    .unwrap_or_else(|| Self::Unknown(code.to_string()))
            }

            pub fn is_known(&self) -> bool {
                !matches!(self, Self::Unknown(_))
            }
        }
    };
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Currency {
    #[default]
    Inr,
    Usd,
    Eur,
    /// A code the server sent that this client has no variant for.
    Unknown(String),
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Inr, Currency::Usd, Currency::Eur];

    /// Returns the ISO 4217 code used on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inr => "INR",
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Unknown(code) => code,
        }
    }
}

wire_code!(Currency);

/// Expense category as understood by the server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    #[default]
    Food,
    Transportation,
    Shopping,
    Utilities,
    Healthcare,
    Entertainment,
    Other,
    Unknown(String),
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Food,
        Category::Transportation,
        Category::Shopping,
        Category::Utilities,
        Category::Healthcare,
        Category::Entertainment,
        Category::Other,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Food => "FOOD",
            Self::Transportation => "TRANSPORTATION",
            Self::Shopping => "SHOPPING",
            Self::Utilities => "UTILITIES",
            Self::Healthcare => "HEALTHCARE",
            Self::Entertainment => "ENTERTAINMENT",
            Self::Other => "OTHER",
            Self::Unknown(code) => code,
        }
    }
}

wire_code!(Category);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value `{}`", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

pub mod auth {
    use super::*;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct LoginRequest {
        pub username: String,
        pub password: String,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct LoginResponse {
        /// Opaque bearer token.
        pub token: String,
        /// Token scheme, usually `Bearer`.
        #[serde(rename = "type", default = "default_token_type")]
        pub token_type: String,
        pub id: i64,
        pub username: String,
        pub email: String,
    }

    fn default_token_type() -> String {
        "Bearer".to_string()
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct RegisterRequest {
        pub username: String,
        pub email: String,
        pub password: String,
    }

    /// Confirmation returned by sign-up.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct MessageResponse {
        pub message: String,
    }
}

pub mod expense {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::*;

    /// An expense record as stored by the server.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Expense {
        pub id: i64,
        pub title: String,
        #[serde(with = "rust_decimal::serde::float")]
        pub amount: Decimal,
        pub currency: Currency,
        pub category: Category,
        /// Serialized as `YYYY-MM-DD`.
        pub date: NaiveDate,
        pub user_id: i64,
    }

    /// Body for both create and update.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ExpenseRequest {
        pub title: String,
        #[serde(with = "rust_decimal::serde::float")]
        pub amount: Decimal,
        pub currency: Currency,
        pub category: Category,
        pub date: NaiveDate,
    }

    impl ExpenseRequest {
        /// Whether `expense` carries exactly these fields, ignoring server-assigned ones.
        pub fn matches(&self, expense: &Expense) -> bool {
            self.title == expense.title
                && self.amount == expense.amount
                && self.currency == expense.currency
                && self.category == expense.category
                && self.date == expense.date
        }
    }

    /// Query for `expenses/filter`. Absent fields are left out of the query string.
    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ExpenseFilter {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub category: Option<Category>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub start_date: Option<NaiveDate>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub end_date: Option<NaiveDate>,
    }

    impl ExpenseFilter {
        pub fn between(start_date: NaiveDate, end_date: NaiveDate) -> Self {
            Self {
                category: None,
                start_date: Some(start_date),
                end_date: Some(end_date),
            }
        }

        pub fn category(mut self, category: Category) -> Self {
            self.category = Some(category);
            self
        }

        /// Both bounds are inclusive.
        pub fn accepts(&self, expense: &Expense) -> bool {
            self.category
                .as_ref()
                .is_none_or(|category| *category == expense.category)
                && self.start_date.is_none_or(|d| expense.date >= d)
                && self.end_date.is_none_or(|d| expense.date <= d)
        }
    }

    /// Calendar window served by the server's fixed-period endpoints.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Period {
        Today,
        Week,
        Month,
    }

    impl Period {
        /// Path segment below `expenses/`.
        pub fn as_path(self) -> &'static str {
            match self {
                Self::Today => "today",
                Self::Week => "week",
                Self::Month => "month",
            }
        }
    }
}

pub mod summary {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Summary {
        #[serde(with = "rust_decimal::serde::float")]
        pub total: Decimal,
        pub category_summary: BTreeMap<Category, Decimal>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SummaryQuery {
        pub start_date: NaiveDate,
        pub end_date: NaiveDate,
    }
}
