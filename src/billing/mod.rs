//! Billing provider seam.
//!
//! Actions only need two calls from the payment processor: create a customer
//! and open a hosted checkout session for it. [`StripeClient`] implements them
//! over HTTPS; tests substitute an in-memory provider.

mod stripe;

pub use stripe::StripeClient;

use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct NewCustomer<'a> {
    pub email: &'a str,
    pub name: &'a str,
    /// Sent as the provider's idempotency key so that retries after a crash
    /// return the customer created by the first attempt.
    pub idempotency_key: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub customer_id: &'a str,
    pub price_id: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn create_customer(&self, customer: &NewCustomer<'_>) -> Result<Customer>;

    async fn create_checkout_session(&self, request: &CheckoutRequest<'_>)
    -> Result<CheckoutSession>;
}
