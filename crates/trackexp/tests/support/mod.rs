//! In-process stand-in for the expense API, served on an ephemeral port.

#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Datelike, Local, NaiveDate};
use rust_decimal::Decimal;
use serde_json::json;
use tokio::{net::TcpListener, sync::watch};
use trackexp::{
    Session,
    api_types::{
        auth::{LoginRequest, LoginResponse, MessageResponse, RegisterRequest},
        expense::{Expense, ExpenseFilter, ExpenseRequest},
        summary::{Summary, SummaryQuery},
    },
    config::ClientConfig,
    orchestrator::{OperationResult, SlotState},
};

pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "secret";

struct Account {
    id: i64,
    email: String,
    password: String,
    token: String,
}

#[derive(Default)]
struct Store {
    accounts: BTreeMap<String, Account>,
    expenses: BTreeMap<i64, Expense>,
    next_id: i64,
    list_delay: Option<Duration>,
    detail_body: Option<&'static str>,
    signin_saw_authorization: bool,
}

#[derive(Clone, Default)]
pub struct FakeApi {
    store: Arc<Mutex<Store>>,
}

impl FakeApi {
    pub fn with_alice() -> Self {
        let api = Self::default();
        api.store.lock().unwrap().accounts.insert(
            USERNAME.to_string(),
            Account {
                id: 3,
                email: "alice@example.com".to_string(),
                password: PASSWORD.to_string(),
                token: "token-alice".to_string(),
            },
        );
        api
    }

    /// Slows down `GET expenses` only.
    pub fn delay_list(&self, delay: Duration) {
        self.store.lock().unwrap().list_delay = Some(delay);
    }

    /// Makes `GET expenses/{id}` answer 200 with `body` verbatim.
    pub fn detail_body(&self, body: &'static str) {
        self.store.lock().unwrap().detail_body = Some(body);
    }

    pub fn signin_saw_authorization(&self) -> bool {
        self.store.lock().unwrap().signin_saw_authorization
    }

    pub fn stored(&self) -> Vec<Expense> {
        self.store.lock().unwrap().expenses.values().cloned().collect()
    }

    pub async fn serve(&self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api/")
    }

    fn owner(&self, headers: &HeaderMap) -> Result<i64, Response> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        let store = self.store.lock().unwrap();
        store
            .accounts
            .values()
            .find(|account| Some(account.token.as_str()) == bearer)
            .map(|account| account.id)
            .ok_or_else(|| StatusCode::UNAUTHORIZED.into_response())
    }
}

fn router(api: FakeApi) -> Router {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/signin", post(signin))
        .route("/api/expenses", get(list).post(create))
        .route("/api/expenses/filter", get(filter))
        .route("/api/expenses/summary", get(summary))
        .route("/api/expenses/today", get(today))
        .route("/api/expenses/week", get(week))
        .route("/api/expenses/month", get(month))
        .route(
            "/api/expenses/{id}",
            get(get_one).put(update).delete(delete),
        )
        .with_state(api)
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "Expense not found" })),
    )
        .into_response()
}

async fn signup(State(api): State<FakeApi>, Json(payload): Json<RegisterRequest>) -> Response {
    let mut store = api.store.lock().unwrap();
    if store.accounts.contains_key(&payload.username) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Error: Username is already taken!" })),
        )
            .into_response();
    }
    let id = store.accounts.len() as i64 + 10;
    store.accounts.insert(
        payload.username.clone(),
        Account {
            id,
            email: payload.email,
            password: payload.password,
            token: format!("token-{}", payload.username),
        },
    );
    Json(MessageResponse {
        message: "User registered successfully!".to_string(),
    })
    .into_response()
}

async fn signin(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Response {
    let mut store = api.store.lock().unwrap();
    store.signin_saw_authorization |= headers.contains_key(header::AUTHORIZATION);
    match store.accounts.get(&payload.username) {
        Some(account) if account.password == payload.password => Json(LoginResponse {
            token: account.token.clone(),
            token_type: "Bearer".to_string(),
            id: account.id,
            username: payload.username.clone(),
            email: account.email.clone(),
        })
        .into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Bad credentials" })),
        )
            .into_response(),
    }
}

fn owned_by(api: &FakeApi, owner: i64, keep: impl Fn(&Expense) -> bool) -> Vec<Expense> {
    let store = api.store.lock().unwrap();
    store
        .expenses
        .values()
        .filter(|expense| expense.user_id == owner && keep(expense))
        .cloned()
        .collect()
}

async fn list(State(api): State<FakeApi>, headers: HeaderMap) -> Response {
    let owner = match api.owner(&headers) {
        Ok(owner) => owner,
        Err(res) => return res,
    };
    let delay = api.store.lock().unwrap().list_delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    Json(owned_by(&api, owner, |_| true)).into_response()
}

async fn create(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Json(payload): Json<ExpenseRequest>,
) -> Response {
    let owner = match api.owner(&headers) {
        Ok(owner) => owner,
        Err(res) => return res,
    };
    let mut store = api.store.lock().unwrap();
    store.next_id += 1;
    let expense = Expense {
        id: store.next_id,
        title: payload.title,
        amount: payload.amount,
        currency: payload.currency,
        category: payload.category,
        date: payload.date,
        user_id: owner,
    };
    store.expenses.insert(expense.id, expense.clone());
    (StatusCode::CREATED, Json(expense)).into_response()
}

async fn get_one(State(api): State<FakeApi>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    let owner = match api.owner(&headers) {
        Ok(owner) => owner,
        Err(res) => return res,
    };
    let store = api.store.lock().unwrap();
    if let Some(body) = store.detail_body {
        return (StatusCode::OK, body).into_response();
    }
    match store.expenses.get(&id) {
        Some(expense) if expense.user_id == owner => Json(expense.clone()).into_response(),
        _ => not_found(),
    }
}

async fn update(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<ExpenseRequest>,
) -> Response {
    let owner = match api.owner(&headers) {
        Ok(owner) => owner,
        Err(res) => return res,
    };
    let mut store = api.store.lock().unwrap();
    match store.expenses.get_mut(&id) {
        Some(expense) if expense.user_id == owner => {
            expense.title = payload.title;
            expense.amount = payload.amount;
            expense.currency = payload.currency;
            expense.category = payload.category;
            expense.date = payload.date;
            Json(expense.clone()).into_response()
        }
        _ => not_found(),
    }
}

async fn delete(State(api): State<FakeApi>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    let owner = match api.owner(&headers) {
        Ok(owner) => owner,
        Err(res) => return res,
    };
    let mut store = api.store.lock().unwrap();
    match store.expenses.get(&id) {
        Some(expense) if expense.user_id == owner => {
            store.expenses.remove(&id);
            StatusCode::NO_CONTENT.into_response()
        }
        _ => not_found(),
    }
}

async fn filter(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Query(filter): Query<ExpenseFilter>,
) -> Response {
    match api.owner(&headers) {
        Ok(owner) => Json(owned_by(&api, owner, |expense| filter.accepts(expense))).into_response(),
        Err(res) => res,
    }
}

async fn summary(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Query(query): Query<SummaryQuery>,
) -> Response {
    let owner = match api.owner(&headers) {
        Ok(owner) => owner,
        Err(res) => return res,
    };
    let range = ExpenseFilter::between(query.start_date, query.end_date);
    let mut summary = Summary {
        total: Decimal::ZERO,
        category_summary: BTreeMap::new(),
    };
    for expense in owned_by(&api, owner, |expense| range.accepts(expense)) {
        summary.total += expense.amount;
        *summary
            .category_summary
            .entry(expense.category)
            .or_insert(Decimal::ZERO) += expense.amount;
    }
    Json(summary).into_response()
}

async fn period(api: FakeApi, headers: HeaderMap, keep: impl Fn(NaiveDate) -> bool) -> Response {
    match api.owner(&headers) {
        Ok(owner) => Json(owned_by(&api, owner, |expense| keep(expense.date))).into_response(),
        Err(res) => res,
    }
}

async fn today(State(api): State<FakeApi>, headers: HeaderMap) -> Response {
    let today = Local::now().date_naive();
    period(api, headers, |date| date == today).await
}

async fn week(State(api): State<FakeApi>, headers: HeaderMap) -> Response {
    let week = Local::now().date_naive().iso_week();
    period(api, headers, |date| date.iso_week() == week).await
}

async fn month(State(api): State<FakeApi>, headers: HeaderMap) -> Response {
    let today = Local::now().date_naive();
    period(api, headers, |date| {
        date.year() == today.year() && date.month() == today.month()
    })
    .await
}

/// A session against `base_url` with credentials kept in a fresh temp dir.
pub fn session(base_url: &str) -> (Session, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = ClientConfig {
        base_url: base_url.to_string(),
        timeout_secs: 5,
        credentials_dir: dir.path().to_path_buf(),
        ..ClientConfig::default()
    };
    (Session::new(&config).unwrap(), dir)
}

pub fn alice_login() -> LoginRequest {
    LoginRequest {
        username: USERNAME.to_string(),
        password: PASSWORD.to_string(),
    }
}

pub fn request(title: &str, amount: Decimal, date: NaiveDate) -> ExpenseRequest {
    ExpenseRequest {
        title: title.to_string(),
        amount,
        currency: trackexp::api_types::Currency::Usd,
        category: trackexp::api_types::Category::Food,
        date,
    }
}

pub fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Waits until the slot holds a terminal result and returns it.
pub async fn settled<T: Clone>(rx: &mut watch::Receiver<SlotState<T>>) -> OperationResult<T> {
    let state = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|state| matches!(state, Some(result) if !result.is_pending())),
    )
    .await
    .expect("slot did not settle in time")
    .unwrap();
    (*state).clone().unwrap()
}
