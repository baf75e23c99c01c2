#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes, to_bytes};
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, Request, StatusCode};
use chrono::Utc;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::Barrier;
use tower::ServiceExt;

use quire::billing::{BillingProvider, CheckoutRequest, CheckoutSession, Customer, NewCustomer};
use quire::config::{BillingConfig, ServerConfig};
use quire::error::{Error, Result};
use quire::server::{AppState, create_router};
use quire::store::Store;
use quire::types::{SUBSCRIPTION_ACTIVE, Subscription, User};

pub const PRICE_ID: &str = "price_test";
pub const CHECKOUT_URL: &str = "https://checkout.example/session/cs_test";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCheckout {
    pub customer_id: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// In-memory billing provider. Customer ids derive from the idempotency key,
/// so a repeated key yields the same customer as the provider would.
#[derive(Default)]
pub struct FakeBilling {
    pub customer_keys: Mutex<Vec<String>>,
    pub checkouts: Mutex<Vec<RecordedCheckout>>,
    fail_next_customer: AtomicBool,
    customer_gate: Mutex<Option<Arc<Barrier>>>,
}

impl FakeBilling {
    pub fn fail_next_customer(&self) {
        self.fail_next_customer.store(true, Ordering::SeqCst);
    }

    /// Makes customer creation wait until `callers` requests are inside it.
    pub fn hold_customers(&self, callers: usize) {
        *self.customer_gate.lock().unwrap() = Some(Arc::new(Barrier::new(callers)));
    }

    pub fn customer_keys(&self) -> Vec<String> {
        self.customer_keys.lock().unwrap().clone()
    }

    pub fn checkouts(&self) -> Vec<RecordedCheckout> {
        self.checkouts.lock().unwrap().clone()
    }
}

#[async_trait]
impl BillingProvider for FakeBilling {
    async fn create_customer(&self, customer: &NewCustomer<'_>) -> Result<Customer> {
        self.customer_keys
            .lock()
            .unwrap()
            .push(customer.idempotency_key.to_string());

        let gate = self.customer_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }

        if self.fail_next_customer.swap(false, Ordering::SeqCst) {
            return Err(Error::Billing("connection reset".to_string()));
        }

        Ok(Customer {
            id: format!("cus_{}", customer.idempotency_key.replace('-', "")),
        })
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession> {
        self.checkouts.lock().unwrap().push(RecordedCheckout {
            customer_id: request.customer_id.to_string(),
            price_id: request.price_id.to_string(),
            success_url: request.success_url.to_string(),
            cancel_url: request.cancel_url.to_string(),
        });

        Ok(CheckoutSession {
            id: "cs_test".to_string(),
            url: CHECKOUT_URL.to_string(),
        })
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    /// The `name=value` pair of the session cookie being set, if any.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("quire_session="))
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }

    pub fn set_cookie(&self) -> Option<&str> {
        self.headers.get(SET_COOKIE).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }

    /// Messages reported for a field in a validation failure.
    pub fn field_errors(&self, field: &str) -> Vec<String> {
        assert_eq!(self.status, StatusCode::UNPROCESSABLE_ENTITY);
        let body = self.json();
        assert_eq!(body["status"], "error");
        body["error"][field]
            .as_array()
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(|m| m.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A signed-in user: its id and the cookie pair to send back.
pub struct TestUser {
    pub id: String,
    pub cookie: String,
}

pub struct TestApp {
    pub temp_dir: TempDir,
    pub state: Arc<AppState>,
    pub billing: Arc<FakeBilling>,
    router: Router,
}

impl TestApp {
    pub async fn start() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let db_path = temp_dir.path().join("quire.db");

        let config = ServerConfig {
            database_url: format!("sqlite://{}", db_path.display()),
            billing: BillingConfig::new("sk_test", PRICE_ID),
            ..ServerConfig::default()
        };

        let billing = Arc::new(FakeBilling::default());
        let state = Arc::new(AppState::new(&config, billing.clone()).expect("build state"));
        let router = create_router(Arc::clone(&state));

        Self {
            temp_dir,
            state,
            billing,
            router,
        }
    }

    pub async fn store(&self) -> Arc<dyn Store> {
        self.state.database.connect().await.expect("connect store")
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::get(path);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("build request"))
            .await
    }

    pub async fn post_form(
        &self,
        path: &str,
        cookie: Option<&str>,
        fields: &[(&str, &str)],
    ) -> TestResponse {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let mut builder =
            Request::post(path).header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body)).expect("build request"))
            .await
    }

    pub async fn sign_up(&self, email: &str, name: &str) -> TestUser {
        let response = self
            .post_form(
                "/auth/signup",
                None,
                &[("email", email), ("password", "correct horse"), ("name", name)],
            )
            .await;
        assert_eq!(response.status, StatusCode::SEE_OTHER, "sign-up failed");

        let cookie = response.session_cookie().expect("session cookie set");
        let user: User = self
            .store()
            .await
            .get_user_by_email(email)
            .expect("load user")
            .expect("user exists");

        TestUser {
            id: user.id,
            cookie,
        }
    }

    pub async fn subscribe(&self, user: &TestUser) {
        let now = Utc::now();
        self.store()
            .await
            .upsert_subscription(&Subscription {
                stripe_subscription_id: format!("sub_{}", user.id),
                user_id: user.id.clone(),
                interval: "month".to_string(),
                status: SUBSCRIPTION_ACTIVE.to_string(),
                plan_id: PRICE_ID.to_string(),
                current_period_start: now.timestamp(),
                current_period_end: now.timestamp() + 30 * 24 * 60 * 60,
                created_at: now,
                updated_at: now,
            })
            .expect("upsert subscription");
    }

    /// Creates a site through the action and returns its id.
    pub async fn create_site(&self, user: &TestUser, subdirectory: &str) -> String {
        let response = self
            .post_form(
                "/actions/sites",
                Some(user.cookie.as_str()),
                &[
                    ("name", "My Blog"),
                    ("description", "Notes and essays"),
                    ("subdirectory", subdirectory),
                ],
            )
            .await;
        assert_eq!(response.location(), Some("/dashboard/sites"));

        self.store()
            .await
            .list_sites(&user.id, None)
            .expect("list sites")
            .into_iter()
            .find(|site| site.subdirectory == subdirectory)
            .expect("site created")
            .id
    }
}
